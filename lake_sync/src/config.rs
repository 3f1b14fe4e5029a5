//! Pipeline configuration (TOML).
//!
//! ```toml
//! lake_root = "/data/lake"
//! state_db  = "/data/lake/state.db"
//!
//! [api]
//! requests_per_minute = 10
//!
//! [retry]
//! max_attempts  = 3
//! base_delay_ms = 1000
//!
//! [endpoints.leagues]
//! season = 2025
//! league = 39
//! ```
//!
//! Every section is optional except the two paths; omitted sections fall
//! back to the defaults above. Per-entity `[endpoints.<code>]` tables
//! override the fetch parameters for that entity (fixtures default to
//! yesterday's UTC date when not configured).

use std::path::{Path, PathBuf};

use football_ingestor::models::fetch_params::FetchParams;
use football_ingestor::providers::api_football::DEFAULT_BASE_URL;
use indexmap::IndexMap;
use serde::Deserialize;
use shared_utils::config::ConfigError;

use crate::mapping::MappingCatalog;
use crate::models::EntityType;

/// Upstream API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Base URL of the API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key.
    #[serde(default = "default_key_env")]
    pub key_env: String,
    /// Client-side request budget per minute.
    #[serde(default = "default_rpm")]
    pub requests_per_minute: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: default_base_url(),
            key_env: default_key_env(),
            requests_per_minute: default_rpm(),
        }
    }
}

/// Backoff policy for retryable fetch failures.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total fetch attempts before an entity run fails.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff delay; doubles per attempt unless the upstream sent a
    /// longer hint.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_key_env() -> String {
    "API_FOOTBALL_KEY".to_string()
}
fn default_rpm() -> u32 {
    10
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1_000
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Lake directory root (bronze/silver/gold land under it).
    pub lake_root: PathBuf,
    /// Path of the SQLite state database.
    pub state_db: PathBuf,
    /// Upstream API settings.
    #[serde(default)]
    pub api: ApiConfig,
    /// Fetch retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Per-entity fetch parameter overrides, keyed by entity code.
    #[serde(default)]
    pub endpoints: IndexMap<String, FetchParams>,
    /// Optional mapping-catalog override; built-in rules when absent.
    #[serde(default)]
    pub mapping_file: Option<PathBuf>,
}

impl PipelineConfig {
    /// Reads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Parses and validates configuration text; `path` is used for error
    /// reporting only.
    pub fn from_toml_str(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let cfg: PipelineConfig = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        cfg.validate(path)?;
        Ok(cfg)
    }

    fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let parse_err = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };
        if self.api.requests_per_minute == 0 {
            return Err(parse_err("api.requests_per_minute must be >= 1".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(parse_err("retry.max_attempts must be >= 1".into()));
        }
        for code in self.endpoints.keys() {
            if EntityType::parse(code).is_none() {
                return Err(parse_err(format!("unknown entity code in [endpoints]: {code}")));
            }
        }
        Ok(())
    }

    /// Configured fetch parameters for an entity, if any.
    pub fn params_for(&self, entity: EntityType) -> Option<&FetchParams> {
        self.endpoints.get(entity.code())
    }

    /// Loads the mapping catalog: the `mapping_file` override when set,
    /// otherwise the built-in rules.
    pub fn mapping(&self) -> anyhow::Result<MappingCatalog> {
        match &self.mapping_file {
            Some(path) => MappingCatalog::load_path(path),
            None => Ok(MappingCatalog::builtin()),
        }
    }
}
