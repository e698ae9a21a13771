//! Configuration module for iuran-service.

use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Default lookback for arrears since handover: twenty years of months.
pub const DEFAULT_ARREARS_MAX_MONTHS: u32 = 240;

#[derive(Debug, Clone)]
pub struct IuranConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub dues: DuesConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct DuesConfig {
    /// Cap on months counted toward arrears; 0 disables the cap.
    pub arrears_max_months: u32,
    /// Accept tariffs whose validity overlaps another of the same scope and type.
    pub tariff_allow_overlap: bool,
}

impl Default for DuesConfig {
    fn default() -> Self {
        Self {
            arrears_max_months: DEFAULT_ARREARS_MAX_MONTHS,
            tariff_allow_overlap: false,
        }
    }
}

impl IuranConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "iuran-service".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: parse_var("DATABASE_MIN_CONNECTIONS", 2)?,
            },
            dues: DuesConfig {
                arrears_max_months: parse_var("ARREARS_MAX_MONTHS", DEFAULT_ARREARS_MAX_MONTHS)?,
                tariff_allow_overlap: parse_var("TARIFF_ALLOW_OVERLAP", false)?,
            },
        })
    }
}

/// Read an optional variable, falling back to `default` when unset. A value that is set
/// but does not parse is a configuration error rather than a silent default.
fn parse_var<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", name, raw, e))
        }),
        Err(_) => Ok(default),
    }
}
