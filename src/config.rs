use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CycleError;

/// Hard business-rule limits. Every opportunity must pass these before
/// execution.
///
/// Boundary convention: "must exceed" checks are strict (`>`), so a margin
/// exactly at the floor is rejected. Percent-change range checks are
/// inclusive on both ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    pub min_margin_percent: f64,
    pub max_price_change_percent: f64,
    pub min_price_change_percent: f64,
    pub max_transfer_fraction_of_warehouse: f64,
    pub min_profit_increase_threshold: f64,
    pub max_transfers_per_cycle: u32,
    pub max_price_changes_per_cycle: u32,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            min_margin_percent: 10.0,                 // clearance floor = cost * 1.1
            max_price_change_percent: 15.0,
            min_price_change_percent: 1.0,
            max_transfer_fraction_of_warehouse: 0.3,  // never drain the warehouse
            min_profit_increase_threshold: 50.0,      // $/month
            max_transfers_per_cycle: 5,
            max_price_changes_per_cycle: 10,
        }
    }
}

impl GuardrailConfig {
    /// Minimum acceptable price for a product at the configured margin floor
    pub fn margin_floor(&self, cost_price: f64) -> f64 {
        cost_price * (1.0 + self.min_margin_percent / 100.0)
    }
}

/// Immutable configuration snapshot for the whole loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub guardrails: GuardrailConfig,

    // Decision matrix
    pub velocity_threshold: f64,
    pub target_days: u32,
    pub overstock_units: u32,
    pub velocity_window_days: u32,
    pub warehouse_outlet: String,

    // Signal gathering
    pub crawl_frequency_secs: u64,

    // Cycle pacing
    pub min_sleep_secs: u64,
    pub max_sleep_secs: u64,
    pub kill_switch_cooldown_secs: u64,
    pub fatal_backoff_secs: u64,
    pub max_cycle_duration_secs: u64,
    pub call_timeout_secs: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            guardrails: GuardrailConfig::default(),
            velocity_threshold: 3.0,
            target_days: 14,
            overstock_units: 50,
            velocity_window_days: 30,
            warehouse_outlet: "warehouse".to_string(),
            crawl_frequency_secs: 6 * 3600,
            min_sleep_secs: 300,
            max_sleep_secs: 3600,
            kill_switch_cooldown_secs: 300,
            fatal_backoff_secs: 900,
            max_cycle_duration_secs: 600,
            call_timeout_secs: 10,
        }
    }
}

impl OptimizerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults. A present-but-unparseable value is a fatal
    /// `ConfigurationError`, not a silent default.
    pub fn from_env() -> Result<Self, CycleError> {
        let defaults = Self::default();
        let guardrail_defaults = defaults.guardrails.clone();

        let config = Self {
            guardrails: GuardrailConfig {
                min_margin_percent: env_f64("MIN_MARGIN_PERCENT", guardrail_defaults.min_margin_percent)?,
                max_price_change_percent: env_f64(
                    "MAX_PRICE_CHANGE_PERCENT",
                    guardrail_defaults.max_price_change_percent,
                )?,
                min_price_change_percent: env_f64(
                    "MIN_PRICE_CHANGE_PERCENT",
                    guardrail_defaults.min_price_change_percent,
                )?,
                max_transfer_fraction_of_warehouse: env_f64(
                    "MAX_TRANSFER_FRACTION",
                    guardrail_defaults.max_transfer_fraction_of_warehouse,
                )?,
                min_profit_increase_threshold: env_f64(
                    "MIN_PROFIT_INCREASE",
                    guardrail_defaults.min_profit_increase_threshold,
                )?,
                max_transfers_per_cycle: env_u32(
                    "MAX_TRANSFERS_PER_CYCLE",
                    guardrail_defaults.max_transfers_per_cycle,
                )?,
                max_price_changes_per_cycle: env_u32(
                    "MAX_PRICE_CHANGES_PER_CYCLE",
                    guardrail_defaults.max_price_changes_per_cycle,
                )?,
            },
            velocity_threshold: env_f64("VELOCITY_THRESHOLD", defaults.velocity_threshold)?,
            target_days: env_u32("TARGET_DAYS", defaults.target_days)?,
            overstock_units: env_u32("OVERSTOCK_UNITS", defaults.overstock_units)?,
            velocity_window_days: env_u32("VELOCITY_WINDOW_DAYS", defaults.velocity_window_days)?,
            warehouse_outlet: std::env::var("WAREHOUSE_OUTLET")
                .unwrap_or(defaults.warehouse_outlet),
            crawl_frequency_secs: env_u64("CRAWL_FREQUENCY_SECS", defaults.crawl_frequency_secs)?,
            min_sleep_secs: env_u64("MIN_SLEEP_SECS", defaults.min_sleep_secs)?,
            max_sleep_secs: env_u64("MAX_SLEEP_SECS", defaults.max_sleep_secs)?,
            kill_switch_cooldown_secs: env_u64(
                "KILL_SWITCH_COOLDOWN_SECS",
                defaults.kill_switch_cooldown_secs,
            )?,
            fatal_backoff_secs: env_u64("FATAL_BACKOFF_SECS", defaults.fatal_backoff_secs)?,
            max_cycle_duration_secs: env_u64(
                "MAX_CYCLE_DURATION_SECS",
                defaults.max_cycle_duration_secs,
            )?,
            call_timeout_secs: env_u64("CALL_TIMEOUT_SECS", defaults.call_timeout_secs)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CycleError> {
        let g = &self.guardrails;
        if g.min_margin_percent < 0.0 {
            return Err(CycleError::configuration("MIN_MARGIN_PERCENT must be >= 0"));
        }
        if g.min_price_change_percent > g.max_price_change_percent {
            return Err(CycleError::configuration(
                "MIN_PRICE_CHANGE_PERCENT exceeds MAX_PRICE_CHANGE_PERCENT",
            ));
        }
        if !(0.0..=1.0).contains(&g.max_transfer_fraction_of_warehouse) {
            return Err(CycleError::configuration(
                "MAX_TRANSFER_FRACTION must be within [0, 1]",
            ));
        }
        if self.min_sleep_secs > self.max_sleep_secs {
            return Err(CycleError::configuration(
                "MIN_SLEEP_SECS exceeds MAX_SLEEP_SECS",
            ));
        }
        if self.target_days == 0 {
            return Err(CycleError::configuration("TARGET_DAYS must be positive"));
        }
        if self.max_cycle_duration_secs == 0 {
            return Err(CycleError::configuration(
                "MAX_CYCLE_DURATION_SECS must be positive",
            ));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn max_cycle_duration(&self) -> Duration {
        Duration::from_secs(self.max_cycle_duration_secs)
    }
}

fn env_f64(key: &str, default: f64) -> Result<f64, CycleError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<f64>()
            .map_err(|_| CycleError::configuration(format!("{} is not a number: '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64, CycleError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|_| CycleError::configuration(format!("{} is not an integer: '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}

fn env_u32(key: &str, default: u32) -> Result<u32, CycleError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u32>()
            .map_err(|_| CycleError::configuration(format!("{} is not an integer: '{}'", key, raw))),
        Err(_) => Ok(default),
    }
}
