//! Point-in-time treasury metrics and the metric set rules are evaluated against

use crate::error::{ModelError, ModelResult};
use crate::math::ratio;
use serde::{Deserialize, Serialize};

/// Immutable on-chain facts at one instant (USD values)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub claimable_yield: f64,
    pub mint24h: f64,
    pub redeem24h: f64,
    pub instant_cap_used: f64,
    pub instant_cap_total: f64,
    /// Absent means the treasury is unconstrained by the floor guard
    #[serde(default)]
    pub treasury_balance: Option<f64>,
}

impl Snapshot {
    /// used / total, 0 when the cap is not configured
    pub fn cap_utilization(&self) -> f64 {
        ratio(self.instant_cap_used, self.instant_cap_total)
    }

    pub fn net_mint_24h(&self) -> f64 {
        self.mint24h - self.redeem24h
    }

    pub fn derived_metrics(&self) -> DerivedMetrics {
        DerivedMetrics {
            claimable_yield: self.claimable_yield,
            instant_cap_utilization: self.cap_utilization(),
            net_mint_24h: self.net_mint_24h(),
            mint_24h: self.mint24h,
            redeem_24h: self.redeem24h,
            treasury_balance: self.treasury_balance.unwrap_or(0.0),
        }
    }

    /// Schema validation, run by the caller before any computation
    pub fn validate(&self) -> ModelResult<()> {
        if self.id.is_empty() {
            return Err(ModelError::EmptySnapshotId);
        }
        let mut fields = vec![
            ("claimableYield", self.claimable_yield),
            ("mint24h", self.mint24h),
            ("redeem24h", self.redeem24h),
            ("instantCapUsed", self.instant_cap_used),
            ("instantCapTotal", self.instant_cap_total),
        ];
        if let Some(balance) = self.treasury_balance {
            fields.push(("treasuryBalance", balance));
        }
        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::InvalidSnapshotField {
                    snapshot_id: self.id.clone(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Metrics a rule condition may reference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedMetrics {
    pub claimable_yield: f64,
    pub instant_cap_utilization: f64,
    pub net_mint_24h: f64,
    pub mint_24h: f64,
    pub redeem_24h: f64,
    pub treasury_balance: f64,
}

impl DerivedMetrics {
    /// Metric names as they appear in rule conditions
    pub const NAMES: [&'static str; 6] = [
        "claimableYield",
        "instantCapUtilization",
        "netMint24h",
        "mint24h",
        "redeem24h",
        "treasuryBalance",
    ];

    /// Look up a metric by name; unknown names yield `None`
    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "claimableYield" => Some(self.claimable_yield),
            "instantCapUtilization" => Some(self.instant_cap_utilization),
            "netMint24h" => Some(self.net_mint_24h),
            "mint24h" => Some(self.mint_24h),
            "redeem24h" => Some(self.redeem_24h),
            "treasuryBalance" => Some(self.treasury_balance),
            _ => None,
        }
    }
}
