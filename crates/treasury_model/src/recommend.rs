//! Risk-driven policy revision
//!
//! Builds a new policy from an existing one and a risk report. The source
//! policy is never touched. Weight shifts target the `reserve`, `ecosystem`
//! and `buyback` buckets; any of them may be absent.

use crate::math::round4;
use crate::policy::{AllocationBucket, Guards, Policy};
use crate::risk::{RiskLevel, RiskReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const RESERVE_BUCKET: &str = "reserve";
pub const ECOSYSTEM_BUCKET: &str = "ecosystem";
pub const BUYBACK_BUCKET: &str = "buyback";

/// One changed base weight, keyed `<bucket>.base`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDiff {
    pub key: String,
    pub before: f64,
    pub after: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResult {
    pub recommended_policy: Policy,
    pub diffs: Vec<PolicyDiff>,
}

/// Per-tier weight deltas and transfer-cap factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierAdjustment {
    pub reserve: f64,
    pub ecosystem: f64,
    pub buyback: f64,
    /// `None` leaves maxTransferPerEpoch unchanged
    pub transfer_cap_factor: Option<f64>,
}

impl TierAdjustment {
    pub fn for_level(level: RiskLevel) -> Self {
        match level {
            RiskLevel::High => Self {
                reserve: 0.15,
                ecosystem: -0.08,
                buyback: -0.07,
                transfer_cap_factor: Some(0.85),
            },
            RiskLevel::Medium => Self {
                reserve: 0.08,
                ecosystem: -0.04,
                buyback: -0.04,
                transfer_cap_factor: Some(0.92),
            },
            RiskLevel::Low => Self {
                reserve: 0.02,
                ecosystem: -0.01,
                buyback: -0.01,
                transfer_cap_factor: None,
            },
        }
    }

    fn delta_for(&self, bucket: &str) -> f64 {
        match bucket {
            RESERVE_BUCKET => self.reserve,
            ECOSYSTEM_BUCKET => self.ecosystem,
            BUYBACK_BUCKET => self.buyback,
            _ => 0.0,
        }
    }
}

/// max(0, x) / sum(max(0, .)); equal split when the sum is <= 0
fn normalize_positive(values: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let total: f64 = values.values().map(|v| v.max(0.0)).sum();
    if total <= 0.0 {
        let equal = 1.0 / values.len().max(1) as f64;
        return values.keys().map(|key| (key.clone(), equal)).collect();
    }
    values
        .iter()
        .map(|(key, value)| (key.clone(), value.max(0.0) / total))
        .collect()
}

/// Derive a revised policy and the list of changed base weights
pub fn apply_stress_recommendation(policy: &Policy, report: &RiskReport) -> RecommendationResult {
    let adjustment = TierAdjustment::for_level(report.level);

    let shifted: BTreeMap<String, f64> = policy
        .allocations
        .iter()
        .map(|(key, bucket)| (key.clone(), bucket.base + adjustment.delta_for(key)))
        .collect();
    let normalized = normalize_positive(&shifted);

    let allocations: BTreeMap<String, AllocationBucket> = policy
        .allocations
        .iter()
        .map(|(key, bucket)| {
            let base = round4(normalized.get(key).copied().unwrap_or(0.0));
            let revised = AllocationBucket {
                base,
                min: bucket.min.min(base),
                max: bucket.max.max(base),
            };
            (key.clone(), revised)
        })
        .collect();

    let max_transfer_per_epoch = match adjustment.transfer_cap_factor {
        Some(factor) => round4(policy.guards.max_transfer_per_epoch * factor),
        None => policy.guards.max_transfer_per_epoch,
    };

    let diffs: Vec<PolicyDiff> = policy
        .allocations
        .iter()
        .filter_map(|(key, bucket)| {
            let before = round4(bucket.base);
            let after = allocations[key].base;
            (before != after).then(|| PolicyDiff {
                key: format!("{}.base", key),
                before,
                after,
            })
        })
        .collect();

    log::debug!(
        "recommend: level {} changed {} bucket(s), maxTransferPerEpoch {} -> {}",
        report.level.as_str(),
        diffs.len(),
        policy.guards.max_transfer_per_epoch,
        max_transfer_per_epoch
    );

    let recommended_policy = Policy {
        allocations,
        guards: Guards {
            max_transfer_per_epoch,
            ..policy.guards.clone()
        },
        ..policy.clone()
    };

    RecommendationResult {
        recommended_policy,
        diffs,
    }
}
