//! Deterministic default policy built from a short intake form

use crate::error::{ModelError, ModelResult};
use crate::policy::{
    AllocationBucket, Condition, Execution, ExecutionMode, Guards, Objective, Operator, Policy,
    Rule, RuleEffect,
};
use crate::recommend::{BUYBACK_BUCKET, ECOSYSTEM_BUCKET, RESERVE_BUCKET};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Longest allowed epoch (one week)
pub const MAX_EPOCH_HOURS: u32 = 168;

/// Netting threshold above which ecosystem spend is increased
const STRONG_NET_MINT: f64 = 50_000.0;

/// Cap utilization above which reserve is increased
const CAP_PRESSURE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskAppetite {
    Low,
    Medium,
    High,
}

impl RiskAppetite {
    /// Reserve shift applied by the cap-pressure rule
    fn weight_shift(self) -> f64 {
        match self {
            RiskAppetite::Low => 0.1,
            RiskAppetite::Medium => 0.15,
            RiskAppetite::High => 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyForm {
    pub objective: Objective,
    pub epoch_hours: u32,
    pub budget_cap: f64,
    pub treasury_floor: f64,
    pub risk_level: RiskAppetite,
    #[serde(default)]
    pub whitelist: Vec<String>,
}

impl PolicyForm {
    pub fn validate(&self) -> ModelResult<()> {
        if self.epoch_hours == 0 || self.epoch_hours > MAX_EPOCH_HOURS {
            return Err(ModelError::InvalidForm("epochHours must be within 1..=168"));
        }
        if !self.budget_cap.is_finite() || self.budget_cap <= 0.0 {
            return Err(ModelError::InvalidForm("budgetCap must be positive"));
        }
        if !self.treasury_floor.is_finite() || self.treasury_floor < 0.0 {
            return Err(ModelError::InvalidForm("treasuryFloor must be non-negative"));
        }
        if self.whitelist.iter().any(|address| address.is_empty()) {
            return Err(ModelError::InvalidForm("whitelist entries must not be empty"));
        }
        Ok(())
    }
}

/// (ecosystem, buyback, reserve) base weights
fn base_weights(objective: Objective) -> (f64, f64, f64) {
    match objective {
        Objective::Growth => (0.6, 0.25, 0.15),
        Objective::Defense => (0.3, 0.2, 0.5),
        Objective::Balanced => (0.5, 0.3, 0.2),
    }
}

fn rule(id: &str, metric: &str, threshold: f64, bucket: &str, delta: f64) -> Rule {
    Rule {
        id: id.to_string(),
        condition: Condition {
            metric: metric.to_string(),
            operator: Operator::Gt,
            threshold,
        },
        effect: RuleEffect {
            bucket: bucket.to_string(),
            delta,
        },
    }
}

/// Build the default three-bucket policy for a validated form
pub fn default_policy_template(form: &PolicyForm) -> ModelResult<Policy> {
    form.validate()?;

    let (ecosystem, buyback, reserve) = base_weights(form.objective);
    let shift = form.risk_level.weight_shift();

    let mut allocations = BTreeMap::new();
    allocations.insert(
        ECOSYSTEM_BUCKET.to_string(),
        AllocationBucket::new(ecosystem, 0.2, 0.75),
    );
    allocations.insert(
        BUYBACK_BUCKET.to_string(),
        AllocationBucket::new(buyback, 0.1, 0.5),
    );
    allocations.insert(
        RESERVE_BUCKET.to_string(),
        AllocationBucket::new(reserve, 0.1, 0.6),
    );

    let policy = Policy {
        objective: form.objective,
        allocations,
        rules: vec![
            rule(
                "cap-pressure-increase-reserve",
                "instantCapUtilization",
                CAP_PRESSURE,
                RESERVE_BUCKET,
                shift,
            ),
            rule(
                "net-mint-strong-increase-ecosystem",
                "netMint24h",
                STRONG_NET_MINT,
                ECOSYSTEM_BUCKET,
                shift / 2.0,
            ),
        ],
        guards: Guards {
            max_transfer_per_epoch: form.budget_cap,
            treasury_floor: form.treasury_floor,
            whitelist: form.whitelist.iter().cloned().collect::<BTreeSet<_>>(),
        },
        execution: Execution {
            mode: ExecutionMode::ProposalOnly,
            epoch_hours: form.epoch_hours,
        },
        metrics: ["runwayDays", "claimableYield", "capUtilization", "netMint24h"]
            .iter()
            .map(|m| m.to_string())
            .collect(),
    };

    policy.validate()?;
    Ok(policy)
}
