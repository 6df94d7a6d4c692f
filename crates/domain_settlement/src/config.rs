//! Engine configuration

use serde::Deserialize;

use core_kernel::Currency;

/// Settlement engine configuration
///
/// Every field has a default, so an empty environment yields a usable config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of calendar days between a chain's last paid day and
    /// the first payable day of a new timeline for the chain to continue
    pub near_threshold_days: i64,
    /// Currency of all daily amounts
    pub currency: Currency,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            near_threshold_days: 16,
            currency: Currency::NOK,
        }
    }
}

impl EngineConfig {
    /// Loads configuration from `SETTLEMENT_*` environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("SETTLEMENT"))
            .build()?
            .try_deserialize()
    }

    pub fn with_near_threshold_days(mut self, days: i64) -> Self {
        self.near_threshold_days = days;
        self
    }
}
