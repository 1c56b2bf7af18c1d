//! Risk scorer - aggregates scenario results into a 0..=100 score
//!
//! Score = runway tier + runway-drop tier + cap tier, capped at 100.
//! Each tier looks only at the worst value across all scenarios, so
//! worsening any single input can never lower the score.

use crate::snapshot::Snapshot;
use crate::stress::{run_stress_test, RiskSignal, ScenarioResult, StressScenario};
use serde::{Deserialize, Serialize};

/// Maximum number of signals surfaced in a report
pub const MAX_TOP_SIGNALS: usize = 5;

pub const RECOMMEND_RAISE_RESERVE: &str =
    "Increase reserve allocation by 10%-20% to protect runway.";
pub const RECOMMEND_LOWER_DISTRIBUTION: &str =
    "Lower aggressive distribution until cap utilization returns below 80%.";
pub const RECOMMEND_TIGHTEN_SPEND: &str =
    "Reduce discretionary spending bucket and tighten maxTransferPerEpoch.";
pub const RECOMMEND_KEEP_MONITORING: &str =
    "Current policy is resilient under tested scenarios; keep monitoring.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// >= 70 HIGH, >= 35 MEDIUM, else LOW
    pub fn from_score(score: u8) -> Self {
        if score >= 70 {
            RiskLevel::High
        } else if score >= 35 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskReport {
    pub score: u8,
    pub level: RiskLevel,
    pub top_signals: Vec<RiskSignal>,
    pub recommendations: Vec<String>,
}

impl RiskReport {
    /// Report for an empty scenario list
    pub fn empty() -> Self {
        Self {
            score: 0,
            level: RiskLevel::Low,
            top_signals: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

/// Worst-case aggregates the score is computed from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskInputs {
    /// Minimum post-scenario runway (days)
    pub worst_runway_days: f64,
    /// Maximum (before - after) / before, 1.0 when before <= 0
    pub worst_runway_drop_ratio: f64,
    /// Maximum post-scenario cap utilization
    pub worst_cap_utilization: f64,
}

impl RiskInputs {
    /// `None` for an empty result list
    pub fn from_results(results: &[ScenarioResult]) -> Option<Self> {
        if results.is_empty() {
            return None;
        }
        let worst_runway_days = results
            .iter()
            .map(|r| r.runway_after_days)
            .fold(f64::INFINITY, f64::min);
        let worst_runway_drop_ratio = results
            .iter()
            .map(runway_drop_ratio)
            .fold(f64::NEG_INFINITY, f64::max);
        let worst_cap_utilization = results
            .iter()
            .map(|r| r.cap_utilization_after)
            .fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            worst_runway_days,
            worst_runway_drop_ratio,
            worst_cap_utilization,
        })
    }

    /// Sum of the three tier contributions, capped at 100
    pub fn score(&self) -> u8 {
        let runway = if self.worst_runway_days < 14.0 {
            40
        } else if self.worst_runway_days < 30.0 {
            28
        } else if self.worst_runway_days < 60.0 {
            15
        } else {
            0
        };

        let drop = if self.worst_runway_drop_ratio > 0.6 {
            25
        } else if self.worst_runway_drop_ratio > 0.4 {
            16
        } else if self.worst_runway_drop_ratio > 0.2 {
            8
        } else {
            0
        };

        let cap = if self.worst_cap_utilization >= 0.9 {
            25
        } else if self.worst_cap_utilization >= 0.8 {
            15
        } else if self.worst_cap_utilization >= 0.7 {
            8
        } else {
            0
        };

        let total: u32 = runway + drop + cap;
        total.min(100) as u8
    }
}

fn runway_drop_ratio(result: &ScenarioResult) -> f64 {
    if result.runway_before_days <= 0.0 {
        return 1.0;
    }
    ((result.runway_before_days - result.runway_after_days) / result.runway_before_days).max(0.0)
}

/// Union of all signals in first-seen order (results are already id-sorted)
fn distinct_signals(results: &[ScenarioResult]) -> Vec<RiskSignal> {
    let mut seen = Vec::new();
    for signal in results.iter().flat_map(|r| r.risk_signals.iter().copied()) {
        if !seen.contains(&signal) {
            seen.push(signal);
        }
    }
    seen
}

fn recommendations(inputs: &RiskInputs, signals: &[RiskSignal]) -> Vec<String> {
    let mut out = Vec::new();
    if inputs.worst_runway_days < 30.0 || inputs.worst_runway_drop_ratio > 0.4 {
        out.push(RECOMMEND_RAISE_RESERVE.to_string());
    }
    if inputs.worst_cap_utilization >= 0.85 {
        out.push(RECOMMEND_LOWER_DISTRIBUTION.to_string());
    }
    if signals.contains(&RiskSignal::YieldDropOver40Pct) {
        out.push(RECOMMEND_TIGHTEN_SPEND.to_string());
    }
    if out.is_empty() {
        out.push(RECOMMEND_KEEP_MONITORING.to_string());
    }
    out
}

/// Score, classify and summarize a set of scenario results
pub fn compute_risk_score(results: &[ScenarioResult]) -> RiskReport {
    let Some(inputs) = RiskInputs::from_results(results) else {
        return RiskReport::empty();
    };

    let score = inputs.score();
    let level = RiskLevel::from_score(score);
    let signals = distinct_signals(results);
    let recommendations = recommendations(&inputs, &signals);

    log::debug!(
        "risk: score {} ({}) worst runway {} drop {} cap {}",
        score,
        level.as_str(),
        inputs.worst_runway_days,
        inputs.worst_runway_drop_ratio,
        inputs.worst_cap_utilization
    );

    RiskReport {
        score,
        level,
        top_signals: signals.into_iter().take(MAX_TOP_SIGNALS).collect(),
        recommendations,
    }
}

/// Simulator output together with its risk report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressReport {
    pub scenario_results: Vec<ScenarioResult>,
    pub risk_report: RiskReport,
}

/// Run the scenarios and score them in one step
pub fn run_stress_report(snapshot: &Snapshot, scenarios: &[StressScenario]) -> StressReport {
    let scenario_results = run_stress_test(snapshot, scenarios);
    let risk_report = compute_risk_score(&scenario_results);
    StressReport {
        scenario_results,
        risk_report,
    }
}
