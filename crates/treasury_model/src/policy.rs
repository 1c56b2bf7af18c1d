//! Declarative allocation policy
//!
//! A policy names allocation buckets with a default weight and post-normalization
//! bounds, conditional re-allocation rules, hard guards and an execution cadence.
//!
//! Key invariants:
//! - Buckets are kept in a `BTreeMap`, so iteration is always in sorted key order
//! - `min <= base <= max` is NOT required; only each value lies in [0, 1]
//! - Policies are values: a revised policy is a new value, never a mutation

use crate::error::{ModelError, ModelResult};
use core::fmt;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Allocation objective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    Growth,
    Defense,
    Balanced,
}

/// Bucket weight configuration (fractions of the epoch budget)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationBucket {
    /// Default weight before rule deltas
    pub base: f64,
    /// Lower bound on the normalized weight
    pub min: f64,
    /// Upper bound on the normalized weight
    pub max: f64,
}

impl AllocationBucket {
    pub fn new(base: f64, min: f64, max: f64) -> Self {
        Self { base, min, max }
    }
}

/// Comparison operator for rule conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "==")]
    Eq,
}

impl Operator {
    /// Evaluate `left <op> right`
    pub fn evaluate(self, left: f64, right: f64) -> bool {
        match self {
            Operator::Gt => left > right,
            Operator::Gte => left >= right,
            Operator::Lt => left < right,
            Operator::Lte => left <= right,
            Operator::Eq => left == right,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Eq => "==",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<metric> <op> <threshold>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub metric: String,
    #[serde(rename = "op")]
    pub operator: Operator,
    #[serde(rename = "value")]
    pub threshold: f64,
}

/// Weight shift applied when a rule fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEffect {
    pub bucket: String,
    pub delta: f64,
}

/// Conditional re-allocation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(rename = "if")]
    pub condition: Condition,
    #[serde(rename = "then")]
    pub effect: RuleEffect,
}

/// Hard constraints that override rule-driven allocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guards {
    /// Per-epoch transfer cap (USD)
    pub max_transfer_per_epoch: f64,
    /// Treasury balance that a plan may never dip below (USD)
    pub treasury_floor: f64,
    /// Allowed destination addresses
    #[serde(default)]
    pub whitelist: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    ProposalOnly,
    AutoExecute,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub mode: ExecutionMode,
    pub epoch_hours: u32,
}

/// Complete allocation policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub objective: Objective,
    pub allocations: BTreeMap<String, AllocationBucket>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    pub guards: Guards,
    pub execution: Execution,
    pub metrics: Vec<String>,
}

fn check_unit_interval(bucket: &str, field: &'static str, value: f64) -> ModelResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ModelError::WeightOutOfRange {
            bucket: bucket.to_string(),
            field,
            value,
        })
    }
}

fn check_guard(field: &'static str, value: f64) -> ModelResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ModelError::InvalidGuard { field, value })
    }
}

impl Policy {
    /// Schema validation, run by the caller before any computation
    pub fn validate(&self) -> ModelResult<()> {
        if self.allocations.is_empty() {
            return Err(ModelError::EmptyAllocations);
        }
        for (name, bucket) in &self.allocations {
            if name.is_empty() {
                return Err(ModelError::EmptyBucketName);
            }
            check_unit_interval(name, "base", bucket.base)?;
            check_unit_interval(name, "min", bucket.min)?;
            check_unit_interval(name, "max", bucket.max)?;
        }

        for (index, rule) in self.rules.iter().enumerate() {
            if rule.id.is_empty() {
                return Err(ModelError::EmptyRuleId { index });
            }
            let invalid = |reason| ModelError::InvalidRule {
                rule_id: rule.id.clone(),
                reason,
            };
            if rule.condition.metric.is_empty() {
                return Err(invalid("condition metric must not be empty"));
            }
            if !rule.condition.threshold.is_finite() {
                return Err(invalid("condition value must be finite"));
            }
            if rule.effect.bucket.is_empty() {
                return Err(invalid("effect bucket must not be empty"));
            }
            if !rule.effect.delta.is_finite() {
                return Err(invalid("effect delta must be finite"));
            }
        }

        check_guard("maxTransferPerEpoch", self.guards.max_transfer_per_epoch)?;
        check_guard("treasuryFloor", self.guards.treasury_floor)?;

        if self.execution.epoch_hours == 0 {
            return Err(ModelError::InvalidEpochHours);
        }

        if self.metrics.is_empty() {
            return Err(ModelError::NoMetrics);
        }
        if self.metrics.iter().any(|m| m.is_empty()) {
            return Err(ModelError::EmptyMetricName);
        }

        Ok(())
    }

    /// Base weight per bucket, sorted by key
    pub fn base_weights(&self) -> BTreeMap<String, f64> {
        self.allocations
            .iter()
            .map(|(key, bucket)| (key.clone(), bucket.base))
            .collect()
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.allocations.contains_key(bucket)
    }
}
