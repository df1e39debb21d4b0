//! Server configuration module.
//!
//! Configuration is read from an optional `kirana.toml` in the working
//! directory, then overridden by `KIRANA_*` environment variables
//! (`KIRANA_PORT=9000`, `KIRANA_TENANT_DB_DIR=/var/lib/kirana/shops`).

use chrono::{DateTime, Utc};
use kirana_core::period::{Period, NEPAL_UTC_OFFSET_MINUTES};
use kirana_core::receipt::ShopInfo;
use kirana_core::{TaxRate, Tenant, DEFAULT_VAT_BPS};
use kirana_db::CheckoutPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Secret used by debug builds when none is configured.
const DEV_JWT_SECRET: &str = "kirana-dev-secret-change-in-production";

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// Platform database (vendors and superadmins)
    pub platform_db_path: PathBuf,

    /// Directory holding one SQLite file per vendor
    pub tenant_db_dir: PathBuf,

    /// Base domain vendors are served under, e.g. `kirana.np`
    pub tenant_domain: Option<String>,

    /// HMAC secret for session tokens. Required in release builds.
    pub jwt_secret: String,

    /// Session token lifetime in seconds
    pub token_lifetime_secs: i64,

    /// VAT in basis points (1300 = 13%)
    pub vat_bps: u32,

    pub currency_symbol: String,
    pub currency_code: String,

    /// Let checkouts take stock below zero
    pub allow_negative_stock: bool,

    /// Receipt header lines
    pub shop_address: String,
    pub shop_phone: String,

    /// Offset of the shops' local time from UTC, for "today" and date filters
    pub utc_offset_minutes: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8000,
            platform_db_path: PathBuf::from("platform.sqlite3"),
            tenant_db_dir: PathBuf::from("tenant_dbs"),
            tenant_domain: None,
            jwt_secret: String::new(),
            token_lifetime_secs: 12 * 3600,
            vat_bps: DEFAULT_VAT_BPS,
            currency_symbol: "Rs.".to_string(),
            currency_code: "NPR".to_string(),
            allow_negative_stock: true,
            shop_address: String::new(),
            shop_phone: String::new(),
            utc_offset_minutes: NEPAL_UTC_OFFSET_MINUTES,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `kirana.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("kirana")
    }

    /// Load configuration from `{file_stem}.toml` (optional) and the environment.
    pub fn load_from(file_stem: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(file_stem).required(false))
            .add_source(config::Environment::with_prefix("KIRANA").try_parsing(true))
            .build()?;

        let mut config: ServerConfig = settings.try_deserialize()?;

        if config.jwt_secret.trim().is_empty() {
            if cfg!(debug_assertions) {
                tracing::warn!("KIRANA_JWT_SECRET not set, using the development secret");
                config.jwt_secret = DEV_JWT_SECRET.to_string();
            } else {
                return Err(ConfigError::MissingRequired("jwt_secret".to_string()));
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt_secret".to_string()));
        }
        if self.token_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("token_lifetime_secs".to_string()));
        }
        if self.vat_bps > 10_000 {
            return Err(ConfigError::InvalidValue("vat_bps".to_string()));
        }
        if self.utc_offset_minutes.abs() > 14 * 60 {
            return Err(ConfigError::InvalidValue("utc_offset_minutes".to_string()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn vat(&self) -> TaxRate {
        TaxRate::from_bps(self.vat_bps)
    }

    pub fn checkout_policy(&self) -> CheckoutPolicy {
        CheckoutPolicy {
            vat: self.vat(),
            allow_negative_stock: self.allow_negative_stock,
        }
    }

    /// The shops' current local day.
    pub fn today(&self, now: DateTime<Utc>) -> Period {
        Period::local_today(now, self.utc_offset_minutes)
    }

    /// Receipt header of a vendor.
    pub fn shop_info(&self, tenant: &Tenant) -> ShopInfo {
        ShopInfo {
            name: tenant.name.clone(),
            address: self.shop_address.clone(),
            phone: self.shop_phone.clone(),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.tenant_db_dir, PathBuf::from("tenant_dbs"));
        assert_eq!(config.vat_bps, 1300);
        assert_eq!(config.currency_symbol, "Rs.");
        assert_eq!(config.currency_code, "NPR");
        assert!(config.allow_negative_stock);
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ServerConfig {
            jwt_secret: "secret".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let missing_secret = ServerConfig::default();
        assert!(matches!(
            missing_secret.validate(),
            Err(ConfigError::MissingRequired(_))
        ));

        let bad_vat = ServerConfig {
            vat_bps: 10_001,
            ..config.clone()
        };
        assert!(matches!(bad_vat.validate(), Err(ConfigError::InvalidValue(f)) if f == "vat_bps"));

        let bad_lifetime = ServerConfig {
            token_lifetime_secs: 0,
            ..config
        };
        assert!(bad_lifetime.validate().is_err());
    }
}
