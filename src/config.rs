//! Catalog configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CatalogError, Result};

/// Default mount point of the catalog's routes.
pub const DEFAULT_URL_PREFIX: &str = "/privlib";

/// Default database file name, relative to the working directory.
pub const DEFAULT_DATABASE: &str = "privlib.db";

pub const ENV_DATABASE: &str = "PRIVLIB_DATABASE";
pub const ENV_URL_PREFIX: &str = "PRIVLIB_URL_PREFIX";

/// Where the catalog keeps its data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "path")]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// `":memory:"` selects an in-memory database, anything else is a path.
    pub fn parse(raw: &str) -> Self {
        if raw == ":memory:" {
            DatabaseLocation::Memory
        } else {
            DatabaseLocation::File(PathBuf::from(raw))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogConfig {
    pub database: DatabaseLocation,
    /// Prefix for URLs built by [`crate::urls`], without a trailing slash.
    pub url_prefix: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database: DatabaseLocation::File(PathBuf::from(DEFAULT_DATABASE)),
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
        }
    }
}

impl CatalogConfig {
    pub fn in_memory() -> Self {
        Self::default().with_database(DatabaseLocation::Memory)
    }

    pub fn with_database(mut self, database: DatabaseLocation) -> Self {
        self.database = database;
        self
    }

    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    /// Reads a JSON config file. Missing keys fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: CatalogConfig = serde_json::from_str(&raw)?;
        config.validated()
    }

    /// Defaults overridden by `PRIVLIB_DATABASE` and `PRIVLIB_URL_PREFIX`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_DATABASE) {
            config.database = DatabaseLocation::parse(&raw);
        }
        if let Some(prefix) = lookup(ENV_URL_PREFIX) {
            config.url_prefix = prefix;
        }
        config.validated()
    }

    /// Normalizes the URL prefix and rejects unusable settings.
    pub(crate) fn validated(mut self) -> Result<Self> {
        let trimmed = self.url_prefix.trim_end_matches('/');
        if !trimmed.is_empty() && !trimmed.starts_with('/') {
            return Err(CatalogError::Config(format!(
                "url prefix must start with '/': {}",
                self.url_prefix
            )));
        }
        self.url_prefix = trimmed.to_string();
        if let DatabaseLocation::File(path) = &self.database {
            if path.as_os_str().is_empty() {
                return Err(CatalogError::Config("database path is empty".to_string()));
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = CatalogConfig::default();
        assert_eq!(config.url_prefix, "/privlib");
        assert_eq!(
            config.database,
            DatabaseLocation::File(PathBuf::from("privlib.db"))
        );
    }

    #[test]
    fn reads_partial_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"database": {{"kind": "file", "path": "/var/lib/privlib.db"}}}}"#
        )
        .unwrap();

        let config = CatalogConfig::from_json_file(file.path()).unwrap();
        assert_eq!(
            config.database,
            DatabaseLocation::File(PathBuf::from("/var/lib/privlib.db"))
        );
        assert_eq!(config.url_prefix, DEFAULT_URL_PREFIX);
    }

    #[test]
    fn env_overrides() {
        let vars: HashMap<&str, &str> = [(ENV_DATABASE, ":memory:"), (ENV_URL_PREFIX, "/lib/")]
            .into_iter()
            .collect();
        let config =
            CatalogConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(config.database, DatabaseLocation::Memory);
        assert_eq!(config.url_prefix, "/lib");
    }

    #[test]
    fn rejects_relative_prefix() {
        let err = CatalogConfig::default()
            .with_url_prefix("privlib")
            .validated()
            .unwrap_err();
        assert!(matches!(err, CatalogError::Config(_)));
    }
}
