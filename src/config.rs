//! Configuration management for db-parity.
//!
//! Handles loading configuration from a TOML file, with named data sources
//! and comparison defaults.

use crate::compare::{ClassifierKind, CompareMode, FailurePolicy};
use crate::db::DatabaseBackend;
use crate::error::{ParityError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use url::Url;

/// Main configuration structure for db-parity.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Named data sources.
    #[serde(default)]
    pub sources: HashMap<String, SourceConfig>,

    /// Comparison defaults.
    #[serde(default)]
    pub compare: CompareConfig,
}

/// Comparison defaults, overridable from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareConfig {
    #[serde(default)]
    pub mode: CompareMode,

    /// What two failed executions must share to agree.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default)]
    pub classifier: ClassifierKind,

    /// Per-side read capacity. Unbounded when absent.
    pub max_rows: Option<usize>,
}

/// A data source reachable through a connection URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Connection URL (`postgres://`, `mysql://` or `sqlite:`).
    pub url: String,

    /// Pool size for this source.
    pub max_connections: Option<u32>,
}

impl SourceConfig {
    /// Creates a source from a connection URL, checking the scheme.
    pub fn from_url(url: &str) -> Result<Self> {
        DatabaseBackend::from_url(url)?;
        Ok(Self {
            url: url.to_string(),
            max_connections: None,
        })
    }

    pub fn backend(&self) -> Result<DatabaseBackend> {
        DatabaseBackend::from_url(&self.url)
    }

    /// Returns the URL with any password masked, for logs and reports.
    pub fn display_string(&self) -> String {
        match Url::parse(&self.url) {
            Ok(mut url) if url.password().is_some() => {
                // Only fails for URLs that cannot carry credentials.
                let _ = url.set_password(Some("****"));
                url.to_string()
            }
            Ok(_) => self.url.clone(),
            Err(_) => "<invalid url>".to_string(),
        }
    }
}

/// Returns true if `reference` is a connection URL rather than a source name.
pub fn is_connection_url(reference: &str) -> bool {
    reference.contains("://") || reference.starts_with("sqlite:")
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("db-parity")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ParityError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ParityError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Resolves a command-line source reference: either a connection URL or
    /// the name of a configured source.
    pub fn resolve_source(&self, reference: &str) -> Result<SourceConfig> {
        if is_connection_url(reference) {
            return SourceConfig::from_url(reference);
        }
        self.sources.get(reference).cloned().ok_or_else(|| {
            ParityError::config(format!(
                "Unknown source '{reference}'. Use a connection URL or a name from [sources]"
            ))
        })
    }
}
