//! Shared fixtures for the YieldPilot integration tests
//!
//! Fixtures are parsed from the same JSON the surrounding application stores,
//! so every test also exercises the wire format.

use treasury_model::{AddressConfig, Policy, Snapshot};

pub const POLICY_ID: &str = "policy_balanced_v1";

pub const BALANCED_POLICY_JSON: &str = r#"{
  "objective": "balanced",
  "allocations": {
    "ecosystem": { "base": 0.5, "min": 0.2, "max": 0.75 },
    "buyback":   { "base": 0.3, "min": 0.1, "max": 0.5 },
    "reserve":   { "base": 0.2, "min": 0.1, "max": 0.6 }
  },
  "rules": [
    {
      "id": "cap-pressure-increase-reserve",
      "if": { "metric": "instantCapUtilization", "op": ">", "value": 0.8 },
      "then": { "bucket": "reserve", "delta": 0.1 }
    }
  ],
  "guards": {
    "maxTransferPerEpoch": 50000,
    "treasuryFloor": 200000,
    "whitelist": ["0xecosystem", "0xbuyback", "0xreserve"]
  },
  "execution": { "mode": "proposal_only", "epochHours": 24 },
  "metrics": ["runwayDays", "claimableYield", "capUtilization", "netMint24h"]
}"#;

pub const HEALTHY_SNAPSHOT_JSON: &str = r#"{
  "id": "snapshot_healthy",
  "claimableYield": 32000,
  "mint24h": 180000,
  "redeem24h": 92000,
  "instantCapUsed": 5200000,
  "instantCapTotal": 6000000,
  "treasuryBalance": 780000
}"#;

pub const FLOOR_SNAPSHOT_JSON: &str = r#"{
  "id": "snapshot_floor",
  "claimableYield": 50000,
  "mint24h": 0,
  "redeem24h": 0,
  "instantCapUsed": 1000,
  "instantCapTotal": 10000,
  "treasuryBalance": 205000
}"#;

pub fn balanced_policy() -> Policy {
    serde_json::from_str(BALANCED_POLICY_JSON).expect("policy fixture parses")
}

pub fn healthy_snapshot() -> Snapshot {
    serde_json::from_str(HEALTHY_SNAPSHOT_JSON).expect("snapshot fixture parses")
}

pub fn floor_snapshot() -> Snapshot {
    serde_json::from_str(FLOOR_SNAPSHOT_JSON).expect("snapshot fixture parses")
}

/// Snapshot with a net outflow strong enough to drain the treasury in weeks
pub fn draining_snapshot() -> Snapshot {
    Snapshot {
        id: "snapshot_draining".to_string(),
        claimable_yield: 20_000.0,
        mint24h: 50_000.0,
        redeem24h: 60_000.0,
        instant_cap_used: 5_100_000.0,
        instant_cap_total: 6_000_000.0,
        treasury_balance: Some(600_000.0),
    }
}

pub fn address_config() -> AddressConfig {
    AddressConfig {
        treasury_vault: "0xtreasury".to_string(),
        bucket_destinations: [
            ("buyback", "0xbuyback"),
            ("ecosystem", "0xecosystem"),
            ("reserve", "0xreserve"),
        ]
        .iter()
        .map(|(bucket, address)| (bucket.to_string(), address.to_string()))
        .collect(),
    }
}
