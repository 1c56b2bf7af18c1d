//! Keeper configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use treasury_model::{AddressConfig, Network, Policy};

fn default_alert_score_threshold() -> u8 {
    70
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Active policy document (JSON)
    pub policy_path: String,

    /// Directory scanned for `*.json` snapshots
    pub snapshot_dir: String,

    /// Directory reports are written to
    pub output_dir: String,

    /// Polling interval in seconds
    pub poll_interval_secs: u64,

    /// Network named in update proposals
    pub network: Network,

    /// Vault that receives claimed yield
    pub treasury_vault: String,

    /// Risk score at or above which a snapshot is reported as an alert
    #[serde(default = "default_alert_score_threshold")]
    pub alert_score_threshold: u8,

    /// Maximum reports written per batch, highest risk first
    pub max_reports_per_batch: usize,

    /// Identifier and version of the active policy
    pub policy_id: String,
    pub policy_version: u32,

    /// Payout address per bucket; unmapped buckets use `<bucket>_vault`
    #[serde(default)]
    pub bucket_destinations: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from TOML file
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("KEEPER_CONFIG")
            .unwrap_or_else(|_| "keeper-config.toml".to_string());
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path);
        let config_str = std::fs::read_to_string(expanded.as_ref())
            .context(format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config TOML")?;

        Ok(config)
    }

    /// Create default configuration
    pub fn default_testnet() -> Self {
        Self {
            policy_path: "./policy.json".to_string(),
            snapshot_dir: "./snapshots".to_string(),
            output_dir: "./reports".to_string(),
            poll_interval_secs: 60,
            network: Network::Testnet,
            treasury_vault: "treasury_vault".to_string(),
            alert_score_threshold: default_alert_score_threshold(),
            max_reports_per_batch: 10,
            policy_id: "policy_main".to_string(),
            policy_version: 1,
            bucket_destinations: BTreeMap::new(),
        }
    }

    /// Write default config to file
    pub fn write_default(path: &str) -> Result<()> {
        let config = Self::default_testnet();
        let toml_str = toml::to_string_pretty(&config)
            .context("Failed to serialize config")?;

        let expanded = shellexpand::tilde(path);
        std::fs::write(expanded.as_ref(), toml_str)
            .context(format!("Failed to write config to {}", path))?;

        log::info!("Created default config at {}", path);
        Ok(())
    }

    /// Destinations for every bucket of `policy`
    pub fn address_config(&self, policy: &Policy) -> AddressConfig {
        let bucket_destinations = policy
            .allocations
            .keys()
            .map(|bucket| {
                let destination = self
                    .bucket_destinations
                    .get(bucket)
                    .cloned()
                    .unwrap_or_else(|| format!("{}_vault", bucket));
                (bucket.clone(), destination)
            })
            .collect();

        AddressConfig {
            treasury_vault: self.treasury_vault.clone(),
            bucket_destinations,
        }
    }
}
