//! Policy update proposal builder
//!
//! Describes the governance calls that would switch the active policy to a
//! recommended revision. Output is an unsigned description only.

use crate::policy::AllocationBucket;
use crate::risk::RiskLevel;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Governance module the commands target
pub const GOVERNANCE_MODULE: &str = "yieldpilot::governance";

/// Transaction kind of the emitted payload
pub const TX_KIND: &str = "programmableTransaction";

/// Target network, supplied by the caller's configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalKind {
    PolicyUpdateProposal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyUpdateAction {
    UpdateAllocation { bucket: String, from: f64, to: f64 },
    #[serde(rename_all = "camelCase")]
    SwitchActivePolicy {
        from_policy_id: String,
        to_policy_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAllocationArgs {
    pub policy_id: String,
    pub bucket: String,
    pub from: f64,
    pub to: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchActivePolicyArgs {
    pub from_policy_id: String,
    pub to_policy_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args", rename_all = "snake_case")]
pub enum GovernanceCommand {
    UpdateAllocation(UpdateAllocationArgs),
    SwitchActivePolicy(SwitchActivePolicyArgs),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalMetadata {
    #[serde(rename = "type")]
    pub kind: ProposalKind,
    pub source_policy_id: String,
    pub source_version: u32,
    pub target_policy_id: String,
    pub target_version: u32,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalPayload {
    pub network: Network,
    pub tx_kind: String,
    pub module: String,
    pub commands: Vec<GovernanceCommand>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyUpdateProposal {
    pub metadata: ProposalMetadata,
    pub actions: Vec<PolicyUpdateAction>,
    pub payload: ProposalPayload,
}

/// Source and target policy versions plus the risk that motivated the switch
#[derive(Debug, Clone, Copy)]
pub struct PolicyUpdateInput<'a> {
    pub source_policy_id: &'a str,
    pub source_version: u32,
    pub target_policy_id: &'a str,
    pub target_version: u32,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub source_allocations: &'a BTreeMap<String, AllocationBucket>,
    pub target_allocations: &'a BTreeMap<String, AllocationBucket>,
}

fn to_command(action: &PolicyUpdateAction, target_policy_id: &str) -> GovernanceCommand {
    match action {
        PolicyUpdateAction::UpdateAllocation { bucket, from, to } => {
            GovernanceCommand::UpdateAllocation(UpdateAllocationArgs {
                policy_id: target_policy_id.to_string(),
                bucket: bucket.clone(),
                from: *from,
                to: *to,
            })
        }
        PolicyUpdateAction::SwitchActivePolicy {
            from_policy_id,
            to_policy_id,
        } => GovernanceCommand::SwitchActivePolicy(SwitchActivePolicyArgs {
            from_policy_id: from_policy_id.clone(),
            to_policy_id: to_policy_id.clone(),
        }),
    }
}

/// One `UPDATE_ALLOCATION` per bucket whose base differs (a missing bucket
/// counts as 0), in sorted order, then a final `SWITCH_ACTIVE_POLICY`
pub fn build_policy_update_proposal(
    input: &PolicyUpdateInput<'_>,
    network: Network,
) -> PolicyUpdateProposal {
    let buckets: BTreeSet<&String> = input
        .source_allocations
        .keys()
        .chain(input.target_allocations.keys())
        .collect();

    let mut actions: Vec<PolicyUpdateAction> = buckets
        .into_iter()
        .filter_map(|bucket| {
            let from = input.source_allocations.get(bucket).map_or(0.0, |b| b.base);
            let to = input.target_allocations.get(bucket).map_or(0.0, |b| b.base);
            (from != to).then(|| PolicyUpdateAction::UpdateAllocation {
                bucket: bucket.clone(),
                from,
                to,
            })
        })
        .collect();

    actions.push(PolicyUpdateAction::SwitchActivePolicy {
        from_policy_id: input.source_policy_id.to_string(),
        to_policy_id: input.target_policy_id.to_string(),
    });

    let commands = actions
        .iter()
        .map(|action| to_command(action, input.target_policy_id))
        .collect();

    PolicyUpdateProposal {
        metadata: ProposalMetadata {
            kind: ProposalKind::PolicyUpdateProposal,
            source_policy_id: input.source_policy_id.to_string(),
            source_version: input.source_version,
            target_policy_id: input.target_policy_id.to_string(),
            target_version: input.target_version,
            risk_score: input.risk_score,
            risk_level: input.risk_level,
        },
        actions,
        payload: ProposalPayload {
            network,
            tx_kind: TX_KIND.to_string(),
            module: GOVERNANCE_MODULE.to_string(),
            commands,
        },
    }
}
