//! # Register Configuration
//!
//! Configuration for the register services.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TILL_TAX_RATE_BPS=1900                                             │
//! │     TILL_DATABASE_PATH=/var/lib/till/till.db                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/till-pos/register.toml (Linux)                           │
//! │     ~/Library/Application Support/com.till.till-pos/register.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     19% tax, 100 lines per cart, 3 store attempts                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # register.toml
//! [store]
//! name = "Almacén Don Pedro"
//! database_path = "/var/lib/till/till.db"
//!
//! [checkout]
//! tax_rate_bps = 1900
//! max_cart_lines = 100
//! max_line_quantity = 999
//!
//! [retry]
//! max_attempts = 3
//! initial_backoff_ms = 50
//! max_backoff_ms = 1000
//!
//! [inventory]
//! low_stock_threshold = 5
//! expiry_warning_days = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use till_core::validation::validate_tax_rate_bps;
use till_core::{CartLimits, TaxRate, DEFAULT_TAX_RATE_BPS, MAX_CART_LINES, MAX_LINE_QUANTITY};
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;

// =============================================================================
// Errors
// =============================================================================

/// Failure to load, validate or save `register.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid register configuration: {0}")]
    Invalid(String),

    #[error("Failed to read or write config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("No config path available")]
    NoConfigPath,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Store Settings
// =============================================================================

/// Identity of the shop and where its data lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Shown on receipts and in logs.
    #[serde(default = "default_store_name")]
    pub name: String,

    /// SQLite database file. `None` runs on in-memory stores.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

fn default_store_name() -> String {
    "Till POS".to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            name: default_store_name(),
            database_path: None,
        }
    }
}

// =============================================================================
// Checkout Settings
// =============================================================================

/// Tax rate and cart limits applied by the checkout engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Tax rate in basis points (1900 = 19%).
    #[serde(default = "default_tax_rate_bps")]
    pub tax_rate_bps: u32,

    /// Maximum distinct lines per cart.
    #[serde(default = "default_max_cart_lines")]
    pub max_cart_lines: usize,

    /// Maximum quantity of one line.
    #[serde(default = "default_max_line_quantity")]
    pub max_line_quantity: i64,
}

fn default_tax_rate_bps() -> u32 {
    DEFAULT_TAX_RATE_BPS
}

fn default_max_cart_lines() -> usize {
    MAX_CART_LINES
}

fn default_max_line_quantity() -> i64 {
    MAX_LINE_QUANTITY
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            tax_rate_bps: default_tax_rate_bps(),
            max_cart_lines: default_max_cart_lines(),
            max_line_quantity: default_max_line_quantity(),
        }
    }
}

impl CheckoutSettings {
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    pub fn limits(&self) -> CartLimits {
        CartLimits {
            max_lines: self.max_cart_lines,
            max_line_quantity: self.max_line_quantity,
        }
    }
}

// =============================================================================
// Retry Settings
// =============================================================================

/// Bounded retry for transient store failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts per store call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First backoff delay (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (milliseconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    50
}

fn default_max_backoff() -> u64 {
    1000
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

// =============================================================================
// Inventory Settings
// =============================================================================

/// Thresholds for the inventory reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySettings {
    /// Products at or below this stock are reported as low.
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: i64,

    /// Products expiring within this many days are reported.
    #[serde(default = "default_expiry_warning_days")]
    pub expiry_warning_days: u32,
}

fn default_low_stock_threshold() -> i64 {
    5
}

fn default_expiry_warning_days() -> u32 {
    30
}

impl Default for InventorySettings {
    fn default() -> Self {
        InventorySettings {
            low_stock_threshold: default_low_stock_threshold(),
            expiry_warning_days: default_expiry_warning_days(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete register configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterConfig {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub inventory: InventorySettings,
}

impl RegisterConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (register.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading register config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load register config, using defaults");
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoConfigPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Register config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.store.name.trim().is_empty() {
            return Err(ConfigError::Invalid("store.name must not be empty".into()));
        }

        validate_tax_rate_bps(self.checkout.tax_rate_bps)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.checkout.max_cart_lines == 0 {
            return Err(ConfigError::Invalid(
                "checkout.max_cart_lines must be greater than 0".into(),
            ));
        }

        if self.checkout.max_line_quantity <= 0 {
            return Err(ConfigError::Invalid(
                "checkout.max_line_quantity must be greater than 0".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                self.retry.initial_backoff_ms, self.retry.max_backoff_ms
            )));
        }

        if self.inventory.low_stock_threshold < 0 {
            return Err(ConfigError::Invalid(
                "inventory.low_stock_threshold must not be negative".into(),
            ));
        }

        Ok(())
    }

    /// Applies `TILL_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(name) = lookup("TILL_STORE_NAME") {
            self.store.name = name;
        }

        if let Some(path) = lookup("TILL_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.store.database_path = Some(PathBuf::from(path));
        }

        if let Some(bps) = parse_override(&lookup, "TILL_TAX_RATE_BPS") {
            debug!(bps, "Overriding tax rate from environment");
            self.checkout.tax_rate_bps = bps;
        }

        if let Some(lines) = parse_override(&lookup, "TILL_MAX_CART_LINES") {
            self.checkout.max_cart_lines = lines;
        }

        if let Some(qty) = parse_override(&lookup, "TILL_MAX_LINE_QUANTITY") {
            self.checkout.max_line_quantity = qty;
        }

        if let Some(attempts) = parse_override(&lookup, "TILL_RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = attempts;
        }

        if let Some(threshold) = parse_override(&lookup, "TILL_LOW_STOCK_THRESHOLD") {
            self.inventory.low_stock_threshold = threshold;
        }

        if let Some(days) = parse_override(&lookup, "TILL_EXPIRY_WARNING_DAYS") {
            self.inventory.expiry_warning_days = days;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "till", "till-pos")
            .map(|dirs| dirs.config_dir().join("register.toml"))
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = RegisterConfig::default();
        assert_eq!(config.checkout.tax_rate_bps, 1900);
        assert_eq!(config.checkout.max_cart_lines, 100);
        assert_eq!(config.checkout.max_line_quantity, 999);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.inventory.low_stock_threshold, 5);
        assert!(config.store.database_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = RegisterConfig::default();

        config.checkout.tax_rate_bps = 10_001;
        assert!(config.validate().is_err());
        config.checkout.tax_rate_bps = 1900;

        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
        config.retry.max_attempts = 1;

        config.retry.initial_backoff_ms = 2000;
        assert!(config.validate().is_err());
        config.retry.initial_backoff_ms = 10;

        config.checkout.max_cart_lines = 0;
        assert!(config.validate().is_err());
        config.checkout.max_cart_lines = 10;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: RegisterConfig = toml::from_str(
            r#"
            [checkout]
            tax_rate_bps = 0

            [inventory]
            low_stock_threshold = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.checkout.tax_rate(), TaxRate::zero());
        assert_eq!(config.checkout.max_cart_lines, 100);
        assert_eq!(config.inventory.low_stock_threshold, 12);
        assert_eq!(config.inventory.expiry_warning_days, 30);
        assert_eq!(config.store.name, "Till POS");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("TILL_TAX_RATE_BPS", "1000"),
            ("TILL_DATABASE_PATH", "/tmp/till.db"),
            ("TILL_RETRY_MAX_ATTEMPTS", "not-a-number"),
        ]);

        let mut config = RegisterConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.checkout.tax_rate_bps, 1000);
        assert_eq!(config.store.database_path, Some(PathBuf::from("/tmp/till.db")));
        // unparseable values are ignored
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("till-config-{}", uuid::Uuid::new_v4()))
            .join("register.toml");

        let mut config = RegisterConfig::default();
        config.store.name = "Almacén Don Pedro".to_string();
        config.inventory.expiry_warning_days = 7;
        config.save(Some(path.clone())).unwrap();

        let loaded = RegisterConfig::load(Some(path.clone())).unwrap();
        assert_eq!(loaded.store.name, "Almacén Don Pedro");
        assert_eq!(loaded.inventory.expiry_warning_days, 7);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_toml_serialization() {
        let config = RegisterConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[checkout]"));
        assert!(toml_str.contains("[retry]"));
    }

    #[test]
    fn test_retry_policy_from_settings() {
        let policy = RetrySettings::default().policy();
        assert_eq!(policy.max_attempts(), 3);
    }
}
