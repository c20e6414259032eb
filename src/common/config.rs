use std::time::Duration;

use crate::common::ConfigError;
use crate::models::KeyShape;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 3;

/// Process configuration, read once at startup and passed down explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Supported locale codes. Empty means localization is off.
    pub locales: Vec<String>,
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let bind_addr = lookup("BIND_ADDR")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let max_connections = match lookup("PAGEBUILDER_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid {
                    key: "PAGEBUILDER_MAX_CONNECTIONS",
                    value: raw,
                })?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let acquire_timeout = match lookup("PAGEBUILDER_ACQUIRE_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid {
                    key: "PAGEBUILDER_ACQUIRE_TIMEOUT_SECS",
                    value: raw,
                })?,
            None => Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        };

        let mut locales: Vec<String> = Vec::new();
        if let Some(raw) = lookup("PAGEBUILDER_LOCALES") {
            for code in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                // Locale codes become key segments, so they cannot carry the separator.
                if code.contains('_') {
                    return Err(ConfigError::Invalid {
                        key: "PAGEBUILDER_LOCALES",
                        value: raw.clone(),
                    });
                }
                if !locales.iter().any(|l| l == code) {
                    locales.push(code.to_string());
                }
            }
        }

        Ok(Self {
            database_url,
            bind_addr,
            max_connections,
            acquire_timeout,
            locales,
        })
    }

    pub fn key_shape(&self) -> KeyShape {
        KeyShape {
            localized: !self.locales.is_empty(),
        }
    }

    /// Locale used when a request does not name one; `""` when localization is off.
    pub fn default_locale(&self) -> &str {
        self.locales.first().map(String::as_str).unwrap_or("")
    }
}
