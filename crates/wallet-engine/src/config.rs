//! # Wallet Configuration
//!
//! Risk thresholds and defaults for the engines.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     WALLET__OTP__AMOUNT_THRESHOLD_CENTS=50000                          │
//! │     WALLET__VELOCITY__MAX_DAILY_REDEMPTIONS=5                          │
//! │                                                                         │
//! │  2. TOML Config File (optional)                                        │
//! │     wallet.toml                                                         │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! currency = "AED"
//! default_lot_validity_days = 365
//! lock_timeout_ms = 5000
//!
//! [otp]
//! amount_threshold_cents = 100000   # codes required above AED 1,000
//! expiry_minutes = 10
//!
//! [velocity]
//! max_daily_redemptions = 10
//! max_hourly_spend_cents = 500000
//! auto_freeze_threshold_cents = 2000000
//!
//! [kyc_tier_limits]
//! basic = 200000
//! verified = 5000000
//! premium = 50000000
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use wallet_core::velocity::VelocityLimits;
use wallet_core::{DEFAULT_CURRENCY, DEFAULT_LOT_VALIDITY_DAYS};

const ENV_PREFIX: &str = "WALLET";
const ENV_SEPARATOR: &str = "__";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("Failed to load config: {0}")]
    Load(#[from] config::ConfigError),

    /// A value is out of its allowed range.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// One-time code settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpConfig {
    /// Redemptions crediting more than this need a code.
    #[serde(default = "default_otp_threshold")]
    pub amount_threshold_cents: i64,

    /// How long an issued code stays valid.
    #[serde(default = "default_otp_expiry")]
    pub expiry_minutes: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        OtpConfig {
            amount_threshold_cents: default_otp_threshold(),
            expiry_minutes: default_otp_expiry(),
        }
    }
}

/// Velocity limits and the auto-freeze threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VelocityConfig {
    /// Redemptions allowed per UTC calendar day.
    #[serde(default = "default_max_daily_redemptions")]
    pub max_daily_redemptions: u32,

    /// Debits allowed per UTC clock hour, in cents.
    #[serde(default = "default_max_hourly_spend")]
    pub max_hourly_spend_cents: i64,

    /// Debits over the last 24 hours above this freeze the wallet.
    #[serde(default = "default_auto_freeze_threshold")]
    pub auto_freeze_threshold_cents: i64,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        VelocityConfig {
            max_daily_redemptions: default_max_daily_redemptions(),
            max_hourly_spend_cents: default_max_hourly_spend(),
            auto_freeze_threshold_cents: default_auto_freeze_threshold(),
        }
    }
}

// =============================================================================
// Wallet Config
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Currency of credits that don't name one.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Lot lifetime when neither the card nor the caller sets one.
    #[serde(default = "default_lot_validity_days")]
    pub default_lot_validity_days: i64,

    /// Bound on waiting for a user's lock before failing with `Busy`.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    #[serde(default)]
    pub otp: OtpConfig,

    #[serde(default)]
    pub velocity: VelocityConfig,

    /// KYC tier → largest single debit in cents.
    #[serde(default = "default_kyc_tier_limits")]
    pub kyc_tier_limits: HashMap<String, i64>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        WalletConfig {
            currency: default_currency(),
            default_lot_validity_days: default_lot_validity_days(),
            lock_timeout_ms: default_lock_timeout_ms(),
            otp: OtpConfig::default(),
            velocity: VelocityConfig::default(),
            kyc_tier_limits: default_kyc_tier_limits(),
        }
    }
}

impl WalletConfig {
    /// Loads defaults, then the optional TOML file, then `WALLET__*` variables.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&WalletConfig::default())?);

        if let Some(path) = path {
            debug!(path, "Reading wallet config file");
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true),
        );

        let loaded: WalletConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Rejects values the engines cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        wallet_core::validation::validate_currency(&self.currency)
            .map_err(|e| ConfigError::invalid("currency", e.to_string()))?;
        wallet_core::validation::validate_validity_days(self.default_lot_validity_days)
            .map_err(|e| ConfigError::invalid("default_lot_validity_days", e.to_string()))?;

        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::invalid("lock_timeout_ms", "must be positive"));
        }
        if self.otp.amount_threshold_cents < 0 {
            return Err(ConfigError::invalid("otp.amount_threshold_cents", "must not be negative"));
        }
        if self.otp.expiry_minutes <= 0 {
            return Err(ConfigError::invalid("otp.expiry_minutes", "must be positive"));
        }
        if self.velocity.max_hourly_spend_cents <= 0 {
            return Err(ConfigError::invalid("velocity.max_hourly_spend_cents", "must be positive"));
        }
        if self.velocity.auto_freeze_threshold_cents <= 0 {
            return Err(ConfigError::invalid(
                "velocity.auto_freeze_threshold_cents",
                "must be positive",
            ));
        }
        if let Some((tier, _)) = self.kyc_tier_limits.iter().find(|(_, limit)| **limit < 0) {
            return Err(ConfigError::invalid("kyc_tier_limits", format!("tier '{}' is negative", tier)));
        }

        Ok(())
    }

    /// Limits as consumed by `wallet_core::velocity`.
    pub fn velocity_limits(&self) -> VelocityLimits {
        VelocityLimits {
            max_daily_redemptions: self.velocity.max_daily_redemptions,
            max_hourly_spend_cents: self.velocity.max_hourly_spend_cents,
            auto_freeze_threshold_cents: self.velocity.auto_freeze_threshold_cents,
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_lot_validity_days() -> i64 {
    DEFAULT_LOT_VALIDITY_DAYS
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_otp_threshold() -> i64 {
    100_000
}

fn default_otp_expiry() -> i64 {
    10
}

fn default_max_daily_redemptions() -> u32 {
    10
}

fn default_max_hourly_spend() -> i64 {
    500_000
}

fn default_auto_freeze_threshold() -> i64 {
    2_000_000
}

fn default_kyc_tier_limits() -> HashMap<String, i64> {
    HashMap::from([
        ("basic".to_string(), 200_000),
        ("verified".to_string(), 5_000_000),
        ("premium".to_string(), 50_000_000),
    ])
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WalletConfig::default();
        config.validate().unwrap();

        assert_eq!(config.otp.expiry_minutes, 10);
        assert_eq!(config.currency, "AED");
        assert_eq!(config.lock_timeout(), Duration::from_secs(5));
        assert_eq!(config.velocity_limits().max_daily_redemptions, 10);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let parsed: WalletConfig = toml_like(
            r#"
            [otp]
            amount_threshold_cents = 25000
            "#,
        );

        assert_eq!(parsed.otp.amount_threshold_cents, 25_000);
        assert_eq!(parsed.otp.expiry_minutes, 10);
        assert_eq!(parsed.velocity, VelocityConfig::default());
    }

    #[test]
    fn test_load_file_and_env() {
        let path = std::env::temp_dir().join(format!("wallet-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "default_lot_validity_days = 90\n[velocity]\nmax_daily_redemptions = 4\n",
        )
        .unwrap();

        std::env::set_var("WALLET__LOCK_TIMEOUT_MS", "750");
        let loaded = WalletConfig::load(path.to_str()).unwrap();
        std::env::remove_var("WALLET__LOCK_TIMEOUT_MS");
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.default_lot_validity_days, 90);
        assert_eq!(loaded.velocity.max_daily_redemptions, 4);
        assert_eq!(loaded.lock_timeout_ms, 750);
        assert_eq!(loaded.kyc_tier_limits.get("basic"), Some(&200_000));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = WalletConfig::default();
        config.otp.expiry_minutes = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "otp.expiry_minutes"
        ));

        let mut config = WalletConfig::default();
        config.currency = "aed".to_string();
        assert!(config.validate().is_err());
    }

    fn toml_like(source: &str) -> WalletConfig {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }
}
