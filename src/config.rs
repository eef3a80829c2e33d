//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;
use std::time::Duration;

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `ENCRYPTION_KEY` (required to serve): passphrase the encryption key is derived from
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `DATABASE_MAX_CONNECTIONS` (optional): pool upper bound, defaults to 20
/// - `DATABASE_MIN_CONNECTIONS` (optional): idle connections kept open, defaults to 0
/// - `DATABASE_ACQUIRE_TIMEOUT_SECS` (optional): how long a query waits for a connection, defaults to 2
/// - `DATABASE_IDLE_TIMEOUT_SECS` (optional): idle connection lifetime, defaults to 30
/// - `API_KEY_BCRYPT_COST` (optional): bcrypt work factor for new keys, defaults to 12
/// - `API_KEY_MAX_CANDIDATES` (optional): most stored keys one request is checked against, defaults to 10
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    /// Kept optional here so a missing value is reported as a
    /// [`ConfigError::MissingEncryptionKey`] instead of a generic parse error.
    #[serde(default)]
    pub encryption_key: Option<String>,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,

    #[serde(default)]
    pub database_min_connections: u32,

    #[serde(default = "default_acquire_timeout_secs")]
    pub database_acquire_timeout_secs: u64,

    #[serde(default = "default_idle_timeout_secs")]
    pub database_idle_timeout_secs: u64,

    #[serde(default = "default_bcrypt_cost")]
    pub api_key_bcrypt_cost: u32,

    /// Every key of a tenant shares its lookup prefix, so this bounds the
    /// bcrypt work a single presented key can cause.
    #[serde(default = "default_max_candidates")]
    pub api_key_max_candidates: u32,
}

/// Errors that abort startup.
///
/// The service never falls back to running without encryption.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read environment: {0}")]
    Env(#[from] envy::Error),

    #[error("ENCRYPTION_KEY environment variable is required")]
    MissingEncryptionKey,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("API_KEY_BCRYPT_COST must be between {min} and {max}, got {got}")]
    BcryptCost { min: u32, max: u32, got: u32 },

    #[error("API_KEY_MAX_CANDIDATES must be at least 1")]
    MaxCandidates,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_max_connections() -> u32 {
    20
}

fn default_acquire_timeout_secs() -> u64 {
    2
}

fn default_idle_timeout_secs() -> u64 {
    30
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_max_candidates() -> u32 {
    10
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    /// - The bcrypt cost is outside the range bcrypt accepts
    pub fn from_env() -> Result<Self, ConfigError> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        let config = envy::from_env::<Config>()?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        const MIN_COST: u32 = 4;
        const MAX_COST: u32 = 31;

        if !(MIN_COST..=MAX_COST).contains(&self.api_key_bcrypt_cost) {
            return Err(ConfigError::BcryptCost {
                min: MIN_COST,
                max: MAX_COST,
                got: self.api_key_bcrypt_cost,
            });
        }
        if self.api_key_max_candidates == 0 {
            return Err(ConfigError::MaxCandidates);
        }
        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.database_acquire_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.database_idle_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(vars: &[(&str, &str)]) -> Result<Config, envy::Error> {
        envy::from_iter(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn applies_defaults() {
        let config = parse(&[("DATABASE_URL", "postgres://localhost/auth")]).unwrap();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.database_max_connections, 20);
        assert_eq!(config.database_min_connections, 0);
        assert_eq!(config.acquire_timeout(), Duration::from_secs(2));
        assert_eq!(config.idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.api_key_bcrypt_cost, 12);
        assert_eq!(config.api_key_max_candidates, 10);
        assert!(config.encryption_key.is_none());
    }

    #[test]
    fn missing_database_url_is_an_error() {
        assert!(parse(&[("ENCRYPTION_KEY", "x")]).is_err());
    }

    #[test]
    fn rejects_out_of_range_bcrypt_cost() {
        let config = parse(&[
            ("DATABASE_URL", "postgres://localhost/auth"),
            ("API_KEY_BCRYPT_COST", "3"),
        ])
        .unwrap();

        assert!(matches!(
            config.check(),
            Err(ConfigError::BcryptCost { got: 3, .. })
        ));
    }

    #[test]
    fn rejects_zero_max_candidates() {
        let config = parse(&[
            ("DATABASE_URL", "postgres://localhost/auth"),
            ("API_KEY_MAX_CANDIDATES", "0"),
        ])
        .unwrap();

        assert!(matches!(config.check(), Err(ConfigError::MaxCandidates)));
    }
}
