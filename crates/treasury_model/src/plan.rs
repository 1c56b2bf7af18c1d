//! Execution plan engine
//!
//! Turns a policy and a snapshot into a claim-and-distribute proposal:
//! - Budget is the claimable yield capped by the per-epoch transfer guard
//! - The treasury floor can only ever reduce the budget
//! - Rules shift working weights additively, then weights are normalized
//!   under each bucket's bounds
//! - Bucket amounts always sum to the budget exactly (1e6 fixed point,
//!   the sorted-last bucket takes the residual)

use crate::math::{round6, Micros};
use crate::normalize::bounded_normalize;
use crate::policy::{Guards, Policy};
use crate::snapshot::{DerivedMetrics, Snapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Token moved by transfer actions
pub const TRANSFER_TOKEN: &str = "USDC";

/// Where claimed yield lands and where each bucket is paid out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressConfig {
    pub treasury_vault: String,
    #[serde(default)]
    pub bucket_destinations: BTreeMap<String, String>,
}

impl AddressConfig {
    /// Destination for a bucket; the bucket name itself when unmapped
    pub fn destination_for<'a>(&'a self, bucket: &'a str) -> &'a str {
        self.bucket_destinations
            .get(bucket)
            .map(String::as_str)
            .unwrap_or(bucket)
    }
}

/// Abstract on-chain action (never signed or sent by this crate)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    ClaimYield {
        to: String,
        amount: Micros,
    },
    Transfer {
        token: String,
        from: String,
        to: String,
        amount: Micros,
    },
}

impl Action {
    pub fn amount(&self) -> Micros {
        match self {
            Action::ClaimYield { amount, .. } | Action::Transfer { amount, .. } => *amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggeredRule {
    pub rule_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    #[default]
    Draft,
    Proposed,
    Executed,
}

/// Output of one plan computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub policy_id: String,
    pub snapshot_id: String,
    pub budget: Micros,
    pub bucket_amounts: BTreeMap<String, Micros>,
    pub triggered_rules: Vec<TriggeredRule>,
    pub actions: Vec<Action>,
    pub explanation: String,
    #[serde(default)]
    pub status: PlanStatus,
}

impl ExecutionPlan {
    /// Sum of all bucket amounts (equals `budget`)
    pub fn allocated_total(&self) -> Micros {
        self.bucket_amounts.values().sum()
    }
}

/// Budget after guards, plus whether the treasury floor cut it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetDecision {
    pub amount: Micros,
    pub floor_limited: bool,
}

/// min(claimableYield, maxTransferPerEpoch), then reduced (never raised)
/// so the treasury stays at or above its floor
pub fn compute_budget(snapshot: &Snapshot, guards: &Guards) -> BudgetDecision {
    let mut budget = snapshot.claimable_yield.min(guards.max_transfer_per_epoch);
    let mut floor_limited = false;

    if let Some(treasury) = snapshot.treasury_balance {
        if treasury - budget < guards.treasury_floor {
            let allowed = (treasury - guards.treasury_floor).max(0.0);
            if allowed < budget {
                log::debug!(
                    "budget: treasury floor {} limits budget to {}",
                    guards.treasury_floor,
                    allowed
                );
                budget = allowed;
                floor_limited = true;
            }
        }
    }

    BudgetDecision {
        amount: Micros::from_f64(budget.max(0.0)),
        floor_limited,
    }
}

/// Apply every firing rule, in declared order, to the base weights.
///
/// Rules naming an unknown metric or an unknown bucket are skipped.
pub fn evaluate_rules(
    policy: &Policy,
    metrics: &DerivedMetrics,
) -> (BTreeMap<String, f64>, Vec<TriggeredRule>) {
    let mut weights = policy.base_weights();
    let mut triggered = Vec::new();

    for rule in &policy.rules {
        let condition = &rule.condition;
        let Some(current) = metrics.get(&condition.metric) else {
            continue;
        };
        if !condition.operator.evaluate(current, condition.threshold) {
            continue;
        }
        let Some(weight) = weights.get_mut(&rule.effect.bucket) else {
            log::debug!(
                "rules: {} targets unknown bucket {}, skipped",
                rule.id,
                rule.effect.bucket
            );
            continue;
        };

        *weight += rule.effect.delta;
        log::debug!("rules: {} fired, {} += {}", rule.id, rule.effect.bucket, rule.effect.delta);

        triggered.push(TriggeredRule {
            rule_id: rule.id.clone(),
            reason: format!(
                "{} {} {} (actual: {})",
                condition.metric,
                condition.operator,
                condition.threshold,
                round6(current)
            ),
        });
    }

    (weights, triggered)
}

/// Split `budget` by `weights`; the sorted-last key receives the residual
/// so the amounts sum to the budget exactly
pub fn allocate_budget(
    budget: Micros,
    weights: &BTreeMap<String, f64>,
) -> BTreeMap<String, Micros> {
    let mut amounts = BTreeMap::new();
    let mut allocated = Micros::ZERO;
    let last = weights.len().saturating_sub(1);

    for (i, (key, weight)) in weights.iter().enumerate() {
        let remaining = budget.saturating_sub(allocated);
        let amount = if i == last {
            remaining
        } else {
            budget.scaled(*weight).min(remaining)
        };
        allocated = allocated + amount;
        amounts.insert(key.clone(), amount);
    }

    amounts
}

fn build_actions(
    budget: Micros,
    bucket_amounts: &BTreeMap<String, Micros>,
    address_config: &AddressConfig,
) -> Vec<Action> {
    if budget.is_zero() {
        return Vec::new();
    }

    let mut actions = vec![Action::ClaimYield {
        to: address_config.treasury_vault.clone(),
        amount: budget,
    }];

    for (bucket, amount) in bucket_amounts {
        if amount.is_zero() {
            continue;
        }
        actions.push(Action::Transfer {
            token: TRANSFER_TOKEN.to_string(),
            from: address_config.treasury_vault.clone(),
            to: address_config.destination_for(bucket).to_string(),
            amount: *amount,
        });
    }

    actions
}

fn build_explanation(
    budget: BudgetDecision,
    triggered: &[TriggeredRule],
    action_count: usize,
) -> String {
    let mut parts = vec![format!(
        "Budget set to {} based on claimableYield and maxTransferPerEpoch.",
        budget.amount
    )];
    if budget.floor_limited {
        parts.push("Treasury floor reduced the budget.".to_string());
    }
    if triggered.is_empty() {
        parts.push("No dynamic rule was triggered.".to_string());
    } else {
        let ids: Vec<&str> = triggered.iter().map(|r| r.rule_id.as_str()).collect();
        parts.push(format!("Triggered rules: {}.", ids.join(", ")));
    }
    parts.push(format!("Generated {} actions in proposal-only mode.", action_count));
    parts.join(" ")
}

/// Compute the execution plan for one (policy, snapshot) pair.
///
/// Pure: identical inputs give an identical plan. Inputs are expected to have
/// passed `Policy::validate` / `Snapshot::validate`; degenerate numbers are
/// resolved by the normalizer's fallbacks rather than reported.
pub fn compute_execution_plan(
    policy_id: &str,
    policy: &Policy,
    snapshot: &Snapshot,
    address_config: &AddressConfig,
) -> ExecutionPlan {
    let metrics = snapshot.derived_metrics();
    let budget = compute_budget(snapshot, &policy.guards);

    let (working, triggered_rules) = evaluate_rules(policy, &metrics);

    let min_map: BTreeMap<String, f64> = policy
        .allocations
        .iter()
        .map(|(key, bucket)| (key.clone(), bucket.min))
        .collect();
    let max_map: BTreeMap<String, f64> = policy
        .allocations
        .iter()
        .map(|(key, bucket)| (key.clone(), bucket.max))
        .collect();
    let normalized = bounded_normalize(&working, &min_map, &max_map);

    let bucket_amounts = allocate_budget(budget.amount, &normalized);
    let actions = build_actions(budget.amount, &bucket_amounts, address_config);
    let explanation = build_explanation(budget, &triggered_rules, actions.len());

    log::debug!(
        "plan: policy {} snapshot {} budget {} rules fired {} actions {}",
        policy_id,
        snapshot.id,
        budget.amount,
        triggered_rules.len(),
        actions.len()
    );

    ExecutionPlan {
        policy_id: policy_id.to_string(),
        snapshot_id: snapshot.id.clone(),
        budget: budget.amount,
        bucket_amounts,
        triggered_rules,
        actions,
        explanation,
        status: PlanStatus::Draft,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::SCALE;
    use crate::policy::tests::sample_policy;
    use crate::snapshot::tests::sample_snapshot;

    fn address_config() -> AddressConfig {
        let mut bucket_destinations = BTreeMap::new();
        bucket_destinations.insert("ecosystem".to_string(), "ecosystem_vault".to_string());
        bucket_destinations.insert("buyback".to_string(), "buyback_vault".to_string());
        bucket_destinations.insert("reserve".to_string(), "reserve_vault".to_string());
        AddressConfig {
            treasury_vault: "treasury".to_string(),
            bucket_destinations,
        }
    }

    fn usd(whole: u64) -> Micros {
        Micros(whole * SCALE)
    }

    #[test]
    fn test_plan_is_deterministic() {
        let policy = sample_policy();
        let snapshot = sample_snapshot();
        let run1 = compute_execution_plan("policy_1", &policy, &snapshot, &address_config());
        let run2 = compute_execution_plan("policy_1", &policy, &snapshot, &address_config());
        assert_eq!(run1, run2);
    }

    #[test]
    fn test_budget_under_cap_and_above_floor() {
        let plan = compute_execution_plan(
            "policy_1",
            &sample_policy(),
            &sample_snapshot(),
            &address_config(),
        );
        // min(32000, 50000); 780000 - 32000 >= 200000
        assert_eq!(plan.budget, usd(32_000));
        assert_eq!(plan.allocated_total(), usd(32_000));
    }

    #[test]
    fn test_treasury_floor_clamps_budget() {
        let snapshot = Snapshot {
            id: "snapshot_2".to_string(),
            claimable_yield: 50_000.0,
            mint24h: 0.0,
            redeem24h: 0.0,
            instant_cap_used: 1_000.0,
            instant_cap_total: 10_000.0,
            treasury_balance: Some(205_000.0),
        };
        let plan = compute_execution_plan("policy_2", &sample_policy(), &snapshot, &address_config());
        assert_eq!(plan.budget, usd(5_000));
        assert_eq!(plan.allocated_total(), usd(5_000));
        assert!(plan.explanation.contains("Treasury floor reduced the budget."));
    }

    #[test]
    fn test_treasury_below_floor_gives_zero_budget_and_no_actions() {
        let mut snapshot = sample_snapshot();
        snapshot.treasury_balance = Some(150_000.0);
        let plan = compute_execution_plan("p", &sample_policy(), &snapshot, &address_config());
        assert_eq!(plan.budget, Micros::ZERO);
        assert!(plan.actions.is_empty());
        assert!(plan.bucket_amounts.values().all(|a| a.is_zero()));
        assert!(plan.explanation.contains("Generated 0 actions"));
    }

    #[test]
    fn test_floor_does_not_limit_an_empty_budget() {
        let mut snapshot = sample_snapshot();
        snapshot.claimable_yield = 0.0;
        snapshot.treasury_balance = Some(150_000.0);
        let decision = compute_budget(&snapshot, &sample_policy().guards);
        assert_eq!(decision.amount, Micros::ZERO);
        assert!(!decision.floor_limited);

        let plan = compute_execution_plan("p", &sample_policy(), &snapshot, &address_config());
        assert!(!plan.explanation.contains("Treasury floor"));
    }

    #[test]
    fn test_missing_treasury_is_unconstrained() {
        let mut snapshot = sample_snapshot();
        snapshot.treasury_balance = None;
        snapshot.claimable_yield = 80_000.0;
        let decision = compute_budget(&snapshot, &sample_policy().guards);
        assert_eq!(decision.amount, usd(50_000));
        assert!(!decision.floor_limited);
    }

    #[test]
    fn test_cap_rule_fires_with_reason() {
        let plan = compute_execution_plan(
            "policy_1",
            &sample_policy(),
            &sample_snapshot(),
            &address_config(),
        );
        assert_eq!(plan.triggered_rules.len(), 1);
        let fired = &plan.triggered_rules[0];
        assert_eq!(fired.rule_id, "cap-pressure-increase-reserve");
        assert_eq!(fired.reason, "instantCapUtilization > 0.8 (actual: 0.866667)");
        assert!(plan.explanation.contains("Triggered rules: cap-pressure-increase-reserve."));
    }

    #[test]
    fn test_rules_stack_on_same_bucket() {
        let mut policy = sample_policy();
        let mut second = policy.rules[0].clone();
        second.id = "net-mint-positive".to_string();
        second.condition.metric = "netMint24h".to_string();
        second.condition.threshold = 0.0;
        policy.rules.push(second);

        let (weights, fired) = evaluate_rules(&policy, &sample_snapshot().derived_metrics());
        assert_eq!(fired.len(), 2);
        assert!((weights["reserve"] - 0.4).abs() < 1e-12);
        assert_eq!(weights["ecosystem"], 0.5);
    }

    #[test]
    fn test_unknown_metric_and_bucket_are_skipped() {
        let mut policy = sample_policy();
        policy.rules[0].condition.metric = "runwayDays".to_string();
        let mut ghost = sample_policy().rules[0].clone();
        ghost.id = "ghost".to_string();
        ghost.effect.bucket = "marketing".to_string();
        policy.rules.push(ghost);

        let (weights, fired) = evaluate_rules(&policy, &sample_snapshot().derived_metrics());
        assert!(fired.is_empty());
        assert_eq!(weights, policy.base_weights());
    }

    #[test]
    fn test_actions_claim_then_sorted_transfers() {
        let plan = compute_execution_plan(
            "policy_1",
            &sample_policy(),
            &sample_snapshot(),
            &address_config(),
        );
        assert_eq!(plan.actions.len(), 4);
        assert_eq!(
            plan.actions[0],
            Action::ClaimYield {
                to: "treasury".to_string(),
                amount: usd(32_000),
            }
        );
        let destinations: Vec<&str> = plan.actions[1..]
            .iter()
            .map(|action| match action {
                Action::Transfer { to, token, from, .. } => {
                    assert_eq!(token, TRANSFER_TOKEN);
                    assert_eq!(from, "treasury");
                    to.as_str()
                }
                other => panic!("unexpected action {:?}", other),
            })
            .collect();
        assert_eq!(destinations, vec!["buyback_vault", "ecosystem_vault", "reserve_vault"]);

        let transferred: Micros = plan.actions[1..].iter().map(Action::amount).sum();
        assert_eq!(transferred, plan.budget);
    }

    #[test]
    fn test_unmapped_bucket_uses_bucket_name() {
        let config = AddressConfig {
            treasury_vault: "treasury".to_string(),
            bucket_destinations: BTreeMap::new(),
        };
        assert_eq!(config.destination_for("reserve"), "reserve");
    }

    #[test]
    fn test_allocate_budget_residual_to_last_key() {
        let mut weights = BTreeMap::new();
        weights.insert("a".to_string(), 1.0 / 3.0);
        weights.insert("b".to_string(), 1.0 / 3.0);
        weights.insert("c".to_string(), 1.0 / 3.0);

        let amounts = allocate_budget(Micros(100), &weights);
        assert_eq!(amounts["a"], Micros(33));
        assert_eq!(amounts["b"], Micros(33));
        assert_eq!(amounts["c"], Micros(34));
        assert_eq!(amounts.values().sum::<Micros>(), Micros(100));
    }

    #[test]
    fn test_allocate_budget_never_overdraws() {
        // weights summing above 1 cannot push the residual negative
        let mut weights = BTreeMap::new();
        weights.insert("a".to_string(), 0.7);
        weights.insert("b".to_string(), 0.7);
        weights.insert("c".to_string(), 0.7);

        let amounts = allocate_budget(Micros(1_000), &weights);
        assert_eq!(amounts["a"], Micros(700));
        assert_eq!(amounts["b"], Micros(300));
        assert_eq!(amounts["c"], Micros::ZERO);
    }

    #[test]
    fn test_plan_json_shape() {
        let plan = compute_execution_plan(
            "policy_1",
            &sample_policy(),
            &sample_snapshot(),
            &address_config(),
        );
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["budget"], 32_000.0);
        assert_eq!(value["status"], "draft");
        assert_eq!(value["actions"][0]["type"], "CLAIM_YIELD");
        assert_eq!(value["actions"][1]["type"], "TRANSFER");
        assert_eq!(value["actions"][1]["token"], "USDC");
        assert_eq!(value["triggeredRules"][0]["ruleId"], "cap-pressure-increase-reserve");

        let back: ExecutionPlan = serde_json::from_value(value).unwrap();
        assert_eq!(back, plan);
    }
}
