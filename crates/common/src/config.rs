//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Voting engine configuration.
    #[serde(default)]
    pub voting: VotingConfig,
    /// Listing (pagination) configuration.
    #[serde(default)]
    pub listing: ListingConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Voting engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VotingConfig {
    /// How many times a cast that lost a race is re-read and re-applied
    /// before the conflict is surfaced to the caller.
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
}

/// Listing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    /// Page size used when the caller gives none.
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    /// Largest page size a caller may request.
    #[serde(default = "default_max_limit")]
    pub max_limit: u64,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            conflict_retries: default_conflict_retries(),
        }
    }
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_conflict_retries() -> u32 {
    1
}

const fn default_limit() -> u64 {
    10
}

const fn default_max_limit() -> u64 {
    100
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `FORUM_ENV`)
    /// 3. Environment variables with `FORUM_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("FORUM_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("FORUM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("FORUM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Configuration for the given database URL with every other setting at its default.
    #[must_use]
    pub fn with_database_url(url: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig {
                url: url.into(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
            },
            voting: VotingConfig::default(),
            listing: ListingConfig::default(),
        }
    }
}
