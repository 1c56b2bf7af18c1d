//! Schema-layer errors
//!
//! Raised only by the `validate` functions at the boundary. The computation
//! functions never fail on validated input.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("policy has no allocation buckets")]
    EmptyAllocations,

    #[error("allocation bucket name must not be empty")]
    EmptyBucketName,

    #[error("bucket {bucket}: {field} = {value} must be within [0, 1]")]
    WeightOutOfRange {
        bucket: String,
        field: &'static str,
        value: f64,
    },

    #[error("rule at index {index} has an empty id")]
    EmptyRuleId { index: usize },

    #[error("rule {rule_id}: {reason}")]
    InvalidRule {
        rule_id: String,
        reason: &'static str,
    },

    #[error("guard {field} must be finite and non-negative, got {value}")]
    InvalidGuard { field: &'static str, value: f64 },

    #[error("execution epochHours must be positive")]
    InvalidEpochHours,

    #[error("policy must track at least one metric")]
    NoMetrics,

    #[error("metric name must not be empty")]
    EmptyMetricName,

    #[error("snapshot id must not be empty")]
    EmptySnapshotId,

    #[error("snapshot {snapshot_id}: {field} must be finite and non-negative, got {value}")]
    InvalidSnapshotField {
        snapshot_id: String,
        field: &'static str,
        value: f64,
    },

    #[error("scenario {scenario_id}: {reason}")]
    InvalidScenario {
        scenario_id: String,
        reason: &'static str,
    },

    #[error("policy form: {0}")]
    InvalidForm(&'static str),
}

pub type ModelResult<T> = Result<T, ModelError>;
