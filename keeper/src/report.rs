//! Per-snapshot evaluation and report output
//!
//! One report bundles everything the engine derives from a snapshot under the
//! active policy: the execution plan, the stress report, the recommended
//! policy revision and the governance proposal that would activate it.

use crate::config::Config;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use treasury_model::{
    apply_stress_recommendation, build_policy_update_proposal, compute_execution_plan,
    default_stress_scenarios, run_stress_report, AddressConfig, ExecutionPlan, Network, Policy,
    PolicyUpdateInput, PolicyUpdateProposal, RecommendationResult, RiskLevel, Snapshot,
    StressReport, StressScenario,
};

/// Everything a batch needs besides the snapshot itself
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub policy_id: String,
    pub policy_version: u32,
    pub policy: Policy,
    pub address_config: AddressConfig,
    pub network: Network,
    pub scenarios: Vec<StressScenario>,
}

impl EvaluationContext {
    pub fn new(config: &Config, policy: Policy) -> Self {
        Self {
            policy_id: config.policy_id.clone(),
            policy_version: config.policy_version,
            address_config: config.address_config(&policy),
            policy,
            network: config.network,
            scenarios: default_stress_scenarios(),
        }
    }

    /// Id the recommended revision is proposed under
    pub fn target_policy_id(&self) -> String {
        format!("{}_v{}", self.policy_id, self.target_version())
    }

    pub fn target_version(&self) -> u32 {
        self.policy_version.saturating_add(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotReport {
    pub snapshot_id: String,
    pub plan: ExecutionPlan,
    pub stress: StressReport,
    pub recommendation: RecommendationResult,
    pub proposal: PolicyUpdateProposal,
}

impl SnapshotReport {
    pub fn risk_score(&self) -> u8 {
        self.stress.risk_report.score
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.stress.risk_report.level
    }
}

/// Run the full pipeline for one snapshot. Pure; safe to call from any thread.
pub fn evaluate_snapshot(ctx: &EvaluationContext, snapshot: &Snapshot) -> SnapshotReport {
    let plan = compute_execution_plan(&ctx.policy_id, &ctx.policy, snapshot, &ctx.address_config);
    let stress = run_stress_report(snapshot, &ctx.scenarios);
    let recommendation = apply_stress_recommendation(&ctx.policy, &stress.risk_report);

    let target_policy_id = ctx.target_policy_id();
    let proposal = build_policy_update_proposal(
        &PolicyUpdateInput {
            source_policy_id: &ctx.policy_id,
            source_version: ctx.policy_version,
            target_policy_id: &target_policy_id,
            target_version: ctx.target_version(),
            risk_score: stress.risk_report.score,
            risk_level: stress.risk_report.level,
            source_allocations: &ctx.policy.allocations,
            target_allocations: &recommendation.recommended_policy.allocations,
        },
        ctx.network,
    );

    SnapshotReport {
        snapshot_id: snapshot.id.clone(),
        plan,
        stress,
        recommendation,
        proposal,
    }
}

/// Write `<output_dir>/<snapshotId>.json`, creating the directory if needed.
///
/// The snapshot id must be a single plain file name so the report cannot land
/// outside `output_dir`.
pub fn write_report(output_dir: &str, report: &SnapshotReport) -> Result<PathBuf> {
    let mut components = Path::new(&report.snapshot_id).components();
    if !matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) {
        anyhow::bail!(
            "Snapshot id {:?} is not a plain file name, refusing to write report",
            report.snapshot_id
        );
    }

    let dir = shellexpand::tilde(output_dir);
    let dir = Path::new(dir.as_ref());
    std::fs::create_dir_all(dir)
        .context(format!("Failed to create output directory {}", output_dir))?;

    let path = dir.join(format!("{}.json", report.snapshot_id));
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(&path, json)
        .context(format!("Failed to write report to {}", path.display()))?;

    Ok(path)
}
