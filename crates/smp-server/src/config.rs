//! Server configuration from environment variables

use std::collections::HashMap;
use std::env;

use thiserror::Error;
use tracing::Level;

/// Longest audit retention accepted, about a century
pub const MAX_AUDIT_RETENTION_DAYS: u32 = 36_500;

/// Invalid or missing configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Policy flags of the in-memory development network
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevNetworkSettings {
    pub directory_requires_sml: bool,
    pub locator_requires_smp_registration: bool,
    pub locator_requires_cert_registration: bool,
}

/// Settings of the server binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Admin API port
    pub port: u16,
    pub log_level: Level,
    /// Secret the key pair encryption key is derived from
    pub master_key: String,
    /// PostgreSQL connection string; in-memory storage when absent
    pub database_url: Option<String>,
    /// Days audit records are kept
    pub audit_retention_days: u32,
    /// Seconds between checks for due certificate activations
    pub rotation_check_secs: u64,
    /// In-memory locator and directory services, when enabled
    pub dev_network: Option<DevNetworkSettings>,
}

impl ServerSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Read settings from a variable map
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        let port = parse(get("SMP_PORT"), "SMP_PORT", 8080u16)?;
        let log_level = parse(get("SMP_LOG_LEVEL"), "SMP_LOG_LEVEL", Level::INFO)?;
        let master_key = get("SMP_MASTER_KEY")
            .ok_or(ConfigError::Missing("SMP_MASTER_KEY"))?
            .to_string();
        let database_url = get("SMP_DATABASE_URL").map(str::to_string);
        let audit_retention_days = parse(get("SMP_AUDIT_RETENTION_DAYS"), "SMP_AUDIT_RETENTION_DAYS", 30u32)?;
        if audit_retention_days > MAX_AUDIT_RETENTION_DAYS {
            return Err(ConfigError::Invalid {
                name: "SMP_AUDIT_RETENTION_DAYS",
                value: audit_retention_days.to_string(),
                reason: format!("must not exceed {}", MAX_AUDIT_RETENTION_DAYS),
            });
        }
        let rotation_check_secs = parse(get("SMP_ROTATION_CHECK_SECS"), "SMP_ROTATION_CHECK_SECS", 3600u64)?;
        if rotation_check_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "SMP_ROTATION_CHECK_SECS",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }

        let dev_network = if flag(get("SMP_DEV_NETWORK"), "SMP_DEV_NETWORK")? {
            Some(DevNetworkSettings {
                directory_requires_sml: flag(get("SMP_DIRECTORY_REQUIRES_SML"), "SMP_DIRECTORY_REQUIRES_SML")?,
                locator_requires_smp_registration: flag(
                    get("SMP_LOCATOR_REQUIRES_SMP_REGISTRATION"),
                    "SMP_LOCATOR_REQUIRES_SMP_REGISTRATION",
                )?,
                locator_requires_cert_registration: flag(
                    get("SMP_LOCATOR_REQUIRES_CERT_REGISTRATION"),
                    "SMP_LOCATOR_REQUIRES_CERT_REGISTRATION",
                )?,
            })
        } else {
            None
        };

        Ok(Self {
            port,
            log_level,
            master_key,
            database_url,
            audit_retention_days,
            rotation_check_secs,
            dev_network,
        })
    }
}

fn parse<T>(value: Option<&str>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: v.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn flag(value: Option<&str>, name: &'static str) -> Result<bool, ConfigError> {
    match value.map(str::to_ascii_lowercase).as_deref() {
        None | Some("false") | Some("0") | Some("no") => Ok(false),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some(other) => Err(ConfigError::Invalid {
            name,
            value: other.to_string(),
            reason: "expected true or false".into(),
        }),
    }
}
