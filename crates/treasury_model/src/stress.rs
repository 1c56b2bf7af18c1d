//! Stress scenario simulator
//!
//! Applies multiplicative/additive shocks to a snapshot and reports runway and
//! cap-utilization before and after. The input snapshot is never modified; each
//! scenario derives a new one. Results are sorted by scenario id so downstream
//! scoring is independent of input order.

use crate::error::{ModelError, ModelResult};
use crate::math::{clamp_f64, ratio, round2};
use crate::snapshot::Snapshot;
use core::fmt;
use serde::{Deserialize, Serialize};

/// Runway reported when there is no net outflow (100 years)
pub const STABLE_RUNWAY_DAYS: f64 = 36_500.0;

/// Named market shock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressScenario {
    pub id: String,
    pub label: String,
    /// Relative change of claimable yield (-0.5 = yield halves)
    pub apy_shock_pct: f64,
    /// Multiplier on 24h redemptions
    pub redeem_shock_multiplier: f64,
    /// Cap utilization forced by the scenario; current utilization when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap_utilization_target: Option<f64>,
}

impl StressScenario {
    pub fn validate(&self) -> ModelResult<()> {
        let invalid = |reason| ModelError::InvalidScenario {
            scenario_id: self.id.clone(),
            reason,
        };
        if self.id.is_empty() {
            return Err(invalid("id must not be empty"));
        }
        if !self.apy_shock_pct.is_finite() {
            return Err(invalid("apyShockPct must be finite"));
        }
        if !self.redeem_shock_multiplier.is_finite() || self.redeem_shock_multiplier < 0.0 {
            return Err(invalid("redeemShockMultiplier must be finite and non-negative"));
        }
        if let Some(target) = self.cap_utilization_target {
            if !target.is_finite() || !(0.0..=1.0).contains(&target) {
                return Err(invalid("capUtilizationTarget must be within [0, 1]"));
            }
        }
        Ok(())
    }
}

/// Default catalog: APY halving, redemption doubling, combined cap pressure
pub fn default_stress_scenarios() -> Vec<StressScenario> {
    vec![
        StressScenario {
            id: "apy_down_50".to_string(),
            label: "APY Down 50%".to_string(),
            apy_shock_pct: -0.5,
            redeem_shock_multiplier: 1.0,
            cap_utilization_target: Some(0.75),
        },
        StressScenario {
            id: "redeem_2x".to_string(),
            label: "Redeem 2x".to_string(),
            apy_shock_pct: 0.0,
            redeem_shock_multiplier: 2.0,
            cap_utilization_target: Some(0.82),
        },
        StressScenario {
            id: "cap_90".to_string(),
            label: "Cap Utilization 90%".to_string(),
            apy_shock_pct: -0.2,
            redeem_shock_multiplier: 1.3,
            cap_utilization_target: Some(0.9),
        },
    ]
}

/// Qualitative survivability signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskSignal {
    #[serde(rename = "Runway below 30 days")]
    RunwayBelow30Days,
    #[serde(rename = "Runway dropped by more than 40%")]
    RunwayDropOver40Pct,
    #[serde(rename = "Cap utilization above 90%")]
    CapUtilizationAbove90Pct,
    #[serde(rename = "Claimable yield dropped by more than 40%")]
    YieldDropOver40Pct,
    #[serde(rename = "Redemption pressure increased materially")]
    RedemptionPressure,
}

impl RiskSignal {
    pub fn message(self) -> &'static str {
        match self {
            RiskSignal::RunwayBelow30Days => "Runway below 30 days",
            RiskSignal::RunwayDropOver40Pct => "Runway dropped by more than 40%",
            RiskSignal::CapUtilizationAbove90Pct => "Cap utilization above 90%",
            RiskSignal::YieldDropOver40Pct => "Claimable yield dropped by more than 40%",
            RiskSignal::RedemptionPressure => "Redemption pressure increased materially",
        }
    }
}

impl fmt::Display for RiskSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Outcome of one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub scenario: StressScenario,
    pub pre_snapshot: Snapshot,
    pub post_snapshot: Snapshot,
    pub runway_before_days: f64,
    pub runway_after_days: f64,
    pub runway_delta_days: f64,
    pub cap_utilization_after: f64,
    pub risk_signals: Vec<RiskSignal>,
}

/// Days until the treasury is exhausted at the current net outflow.
///
/// Zero treasury gives 0; no net outflow gives `STABLE_RUNWAY_DAYS`.
pub fn estimate_runway_days(snapshot: &Snapshot) -> f64 {
    let treasury = snapshot.treasury_balance.unwrap_or(0.0).max(0.0);
    let net_outflow = (snapshot.redeem24h - snapshot.mint24h).max(0.0);
    if treasury == 0.0 {
        return 0.0;
    }
    if net_outflow == 0.0 {
        return STABLE_RUNWAY_DAYS;
    }
    treasury / net_outflow
}

/// Derive the post-shock snapshot; untouched fields pass through
pub fn apply_scenario(snapshot: &Snapshot, scenario: &StressScenario) -> Snapshot {
    let claimable_yield = (snapshot.claimable_yield * (1.0 + scenario.apy_shock_pct)).max(0.0);
    let redeem24h = (snapshot.redeem24h * scenario.redeem_shock_multiplier).max(0.0);
    let utilization = scenario
        .cap_utilization_target
        .unwrap_or_else(|| snapshot.cap_utilization());
    let instant_cap_used = snapshot.instant_cap_total * clamp_f64(utilization, 0.0, 1.0);

    Snapshot {
        claimable_yield: round2(claimable_yield),
        redeem24h: round2(redeem24h),
        instant_cap_used: round2(instant_cap_used),
        ..snapshot.clone()
    }
}

/// Signals in fixed order; several may fire together
pub fn risk_signals(pre: &Snapshot, post: &Snapshot) -> Vec<RiskSignal> {
    let mut signals = Vec::new();
    let runway_before = estimate_runway_days(pre);
    let runway_after = estimate_runway_days(post);

    if runway_after < 30.0 {
        signals.push(RiskSignal::RunwayBelow30Days);
    }
    if runway_before > 0.0 && runway_after / runway_before < 0.6 {
        signals.push(RiskSignal::RunwayDropOver40Pct);
    }
    if post.cap_utilization() >= 0.9 {
        signals.push(RiskSignal::CapUtilizationAbove90Pct);
    }
    if pre.claimable_yield > 0.0 && post.claimable_yield / pre.claimable_yield < 0.6 {
        signals.push(RiskSignal::YieldDropOver40Pct);
    }
    if post.redeem24h > pre.redeem24h * 1.5 {
        signals.push(RiskSignal::RedemptionPressure);
    }

    signals
}

/// Run one scenario against the snapshot
pub fn simulate(snapshot: &Snapshot, scenario: &StressScenario) -> ScenarioResult {
    let post = apply_scenario(snapshot, scenario);
    let runway_before = round2(estimate_runway_days(snapshot));
    let runway_after = round2(estimate_runway_days(&post));
    let cap_after = round2(ratio(post.instant_cap_used, post.instant_cap_total));
    let signals = risk_signals(snapshot, &post);

    log::debug!(
        "stress: {} runway {} -> {} days, cap {}, {} signal(s)",
        scenario.id,
        runway_before,
        runway_after,
        cap_after,
        signals.len()
    );

    ScenarioResult {
        scenario: scenario.clone(),
        pre_snapshot: snapshot.clone(),
        post_snapshot: post,
        runway_before_days: runway_before,
        runway_after_days: runway_after,
        runway_delta_days: round2(runway_after - runway_before),
        cap_utilization_after: cap_after,
        risk_signals: signals,
    }
}

/// Run every scenario; results are sorted by scenario id regardless of input order
pub fn run_stress_test(snapshot: &Snapshot, scenarios: &[StressScenario]) -> Vec<ScenarioResult> {
    let mut ordered: Vec<&StressScenario> = scenarios.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));
    ordered
        .into_iter()
        .map(|scenario| simulate(snapshot, scenario))
        .collect()
}
