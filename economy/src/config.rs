//! Top-level configuration for the economy engine
//!
//! One TOML file (or the defaults) configures every layer: ledger
//! storage, accrual timing, the device and container catalogs, and the
//! referral bonus schedule.

use accrual_engine::{AccrualConfig, DeviceCatalog};
use referral_engine::ReferralConfig;
use reward_engine::ContainerCatalog;
use serde::{Deserialize, Serialize};

/// Full economy engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EconomyConfig {
    /// Ledger store settings
    #[serde(default)]
    pub ledger: ledger_store::Config,

    /// Accrual tick and cap settings
    #[serde(default)]
    pub accrual: AccrualConfig,

    /// Purchasable device kinds
    #[serde(default)]
    pub devices: DeviceCatalog,

    /// Purchasable containers
    #[serde(default)]
    pub containers: ContainerCatalog,

    /// Referral bonus schedule
    #[serde(default)]
    pub referral: ReferralConfig,
}

impl EconomyConfig {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("failed to read config: {}", e)))?;
        let config: EconomyConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load defaults with the ledger's environment-variable overrides
    pub fn from_env() -> crate::Result<Self> {
        let mut config = EconomyConfig::default();
        config.ledger = ledger_store::Config::from_env().map_err(crate::Error::Ledger)?;
        Ok(config)
    }
}
