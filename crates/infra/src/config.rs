//! Process configuration, read once at startup.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use paybook_vault::{Vault, VaultError};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_GATEWAY_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// Deployment settings.
///
/// `database_url` selects the Postgres store; without it the service runs on the
/// in-memory store (dev/test only, nothing survives a restart).
#[derive(Clone)]
pub struct Settings {
    pub encryption_key: String,
    pub jwt_secret: String,
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    /// Externally reachable base URL, used to build processor callback URLs.
    pub public_url: String,
    pub gateway_timeout: Duration,
}

impl core::fmt::Debug for Settings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Settings")
            .field("database", &self.database_url.as_ref().map(|_| "<set>"))
            .field("bind_addr", &self.bind_addr)
            .field("public_url", &self.public_url)
            .field("gateway_timeout", &self.gateway_timeout)
            .finish_non_exhaustive()
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Settings::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let encryption_key = var("PAYBOOK_ENCRYPTION_KEY").ok_or(ConfigError::Missing("PAYBOOK_ENCRYPTION_KEY"))?;
        let jwt_secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let bind_addr = var("PAYBOOK_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                name: "PAYBOOK_BIND_ADDR",
                reason: e.to_string(),
            })?;

        let public_url = var("PAYBOOK_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://{bind_addr}"))
            .trim_end_matches('/')
            .to_string();

        let timeout_ms = match var("PAYBOOK_GATEWAY_TIMEOUT_MS") {
            Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                name: "PAYBOOK_GATEWAY_TIMEOUT_MS",
                reason: e.to_string(),
            })?,
            None => DEFAULT_GATEWAY_TIMEOUT_MS,
        };

        Ok(Self {
            encryption_key,
            jwt_secret,
            database_url: var("DATABASE_URL"),
            bind_addr,
            public_url,
            gateway_timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// Build the process-wide vault. Fails fast on a malformed key.
    pub fn vault(&self) -> Result<Vault, ConfigError> {
        Ok(Vault::from_hex_key(&self.encryption_key)?)
    }
}
