//! Server settings
//!
//! Values come from the process environment, with a local `.env` file loaded
//! first. Nothing is required unless the channel token fetch is enabled by
//! setting `KEYPATH`.

use crate::services::channel_token::{DEFAULT_AUDIENCE, DEFAULT_TOKEN_URL};
use crate::services::TokenSettings;
use crate::storage::StorageKind;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub storage: StorageKind,
    pub database_path: String,
    pub static_dir: PathBuf,
    /// `None` when no key file is configured
    pub token: Option<TokenSettings>,
}

/// Flat view of the environment, keys lowercased by the `config` crate
#[derive(Debug, Deserialize)]
struct RawConfig {
    port: u16,
    host: String,
    storage: String,
    database_path: String,
    static_dir: String,
    keypath: Option<String>,
    chid: Option<String>,
    expjwt: i64,
    expacc: i64,
    token_url: String,
}

impl Config {
    /// Load `.env` (if present) and read the environment.
    pub fn load() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => info!("Loaded environment file: {}", path.display()),
            Err(e) if e.not_found() => info!("No .env file found, using process environment"),
            Err(e) => return Err(e).context("Failed to read .env file"),
        }

        Self::from_environment(config::Environment::default())
    }

    pub fn from_environment(env: config::Environment) -> Result<Self> {
        let raw: RawConfig = config::Config::builder()
            .set_default("port", 1323)?
            .set_default("host", "0.0.0.0")?
            .set_default("storage", "sqlite")?
            .set_default("database_path", "./cars.db")?
            .set_default("static_dir", "static")?
            .set_default("expjwt", 30)?
            .set_default("expacc", 30)?
            .set_default("token_url", DEFAULT_TOKEN_URL)?
            // Values stay strings; numeric fields are converted on deserialize
            .add_source(env)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        let storage = raw.storage.parse()?;

        let token = match raw.keypath.filter(|p| !p.trim().is_empty()) {
            Some(key_path) => {
                let channel_id = raw
                    .chid
                    .filter(|c| !c.trim().is_empty())
                    .context("CHID must be set when KEYPATH is set")?;
                Some(TokenSettings {
                    key_path: PathBuf::from(key_path),
                    channel_id,
                    jwt_ttl_minutes: raw.expjwt,
                    access_token_ttl_days: raw.expacc,
                    endpoint: raw.token_url,
                    audience: DEFAULT_AUDIENCE.to_string(),
                })
            }
            None => {
                warn!("KEYPATH not set, channel access token will not be fetched");
                None
            }
        };

        Ok(Self {
            bind_address: format!("{}:{}", raw.host, raw.port),
            storage,
            database_path: raw.database_path,
            static_dir: PathBuf::from(raw.static_dir),
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::default().source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_environment(env(&[])).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:1323");
        assert_eq!(config.storage, StorageKind::Sqlite);
        assert_eq!(config.database_path, "./cars.db");
        assert!(config.token.is_none());
    }

    #[test]
    fn test_token_settings_from_env() {
        let config = Config::from_environment(env(&[
            ("PORT", "8080"),
            ("STORAGE", "memory"),
            ("KEYPATH", "/etc/carlot/private.key"),
            ("CHID", "1234567890"),
            ("EXPJWT", "15"),
            ("EXPACC", "7"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.storage, StorageKind::Memory);

        let token = config.token.unwrap();
        assert_eq!(token.key_path, PathBuf::from("/etc/carlot/private.key"));
        assert_eq!(token.channel_id, "1234567890");
        assert_eq!(token.jwt_ttl_minutes, 15);
        assert_eq!(token.access_token_ttl_days, 7);
        assert_eq!(token.endpoint, DEFAULT_TOKEN_URL);
    }

    #[test]
    fn test_channel_id_keeps_leading_zero() {
        let config = Config::from_environment(env(&[
            ("KEYPATH", "private.key"),
            ("CHID", "0123456789"),
        ]))
        .unwrap();

        assert_eq!(config.token.unwrap().channel_id, "0123456789");
    }

    #[test]
    fn test_keypath_requires_channel_id() {
        let result = Config::from_environment(env(&[("KEYPATH", "private.key")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_storage_is_rejected() {
        assert!(Config::from_environment(env(&[("STORAGE", "postgres")])).is_err());
    }
}
