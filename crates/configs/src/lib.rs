//! # configs
//!
//! Layered settings: built-in defaults, then an optional `config/default.toml`
//! (or the file named by `THREAD_TREE_CONFIG`), then `THREAD_TREE__*`
//! environment variables. A `.env` file is loaded into the environment first.
//!
//! ```text
//! THREAD_TREE__DATABASE__BACKEND=sqlite
//! THREAD_TREE__DATABASE__URL=sqlite://forum.db
//! THREAD_TREE__SERVICE__DETACH_FROM_SURVIVING_PARENT=true
//! THREAD_TREE__LOG__JSON=true
//! ```

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Memory,
    Sqlite,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub backend: Backend,
    /// Connection URL; may carry credentials, so it is never logged.
    pub url: SecretString,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct ServiceSettings {
    pub detach_from_surviving_parent: bool,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    /// An `EnvFilter` directive, e.g. `info,services=debug`.
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub service: ServiceSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Loads settings from `.env`, the config file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        let file = std::env::var("THREAD_TREE_CONFIG").unwrap_or_else(|_| "config/default".into());
        Self::from_sources(Some(&file), Environment::with_prefix("THREAD_TREE").separator("__"))
    }

    /// Builds settings from an optional file and an environment source.
    pub fn from_sources(file: Option<&str>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("database.backend", "memory")?
            .set_default("database.url", "sqlite::memory:")?
            .set_default("database.max_connections", 5)?
            .set_default("service.detach_from_surviving_parent", false)?
            .set_default("log.filter", "info")?
            .set_default("log.json", false)?;
        if let Some(file) = file {
            builder = builder.add_source(File::with_name(file).required(false));
        }

        let settings: Settings = builder.add_source(env).build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid("database.max_connections must be positive".into()));
        }
        Ok(())
    }
}
