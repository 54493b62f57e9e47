/// Configuration module for wikivec.
///
/// Handles loading, validating, and providing default configuration values.
/// Connection settings can be overridden from the standard libpq and OpenAI
/// environment variables.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::TableName;
use crate::db::models::VectorColumn;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "wikivec.json";

// ── Default value functions ──────────────────────────────────────────

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_dbname() -> String {
    "postgres".to_string()
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "text-embedding-ada-002".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> usize {
    5
}

fn default_dataset_url() -> String {
    "https://cdn.openai.com/API/examples/data/vector_database_wikipedia_articles_embedded.zip"
        .to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_archive_name() -> String {
    "vector_database_wikipedia_articles_embedded.zip".to_string()
}

fn default_csv_name() -> String {
    "vector_database_wikipedia_articles_embedded.csv".to_string()
}

fn default_lists() -> u32 {
    1000
}

fn default_m() -> u32 {
    16
}

fn default_ef_construction() -> u32 {
    64
}

fn default_table() -> String {
    "public.articles".to_string()
}

fn default_dimensions() -> usize {
    1536
}

fn default_search_top_k() -> usize {
    20
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub openai: OpenAiConfig,

    #[serde(default)]
    pub dataset: DatasetConfig,

    #[serde(default)]
    pub index: IndexConfig,

    /// Target table, optionally schema-qualified.
    #[serde(default = "default_table")]
    pub table: String,

    /// Length of every stored and queried embedding.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_dbname")]
    pub dbname: String,

    #[serde(default = "default_user")]
    pub user: String,

    /// Never written back by [`Config::save`].
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    #[serde(default)]
    pub sslmode: SslMode,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
}

impl std::str::FromStr for SslMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "prefer" | "allow" => Ok(Self::Prefer),
            "require" | "verify-ca" | "verify-full" => Ok(Self::Require),
            other => anyhow::bail!("unknown sslmode: {other}"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OpenAiConfig {
    /// Never written back by [`Config::save`].
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first request; `0` sends exactly once.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_url")]
    pub url: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_archive_name")]
    pub archive_name: String,

    /// Name of the CSV member inside the archive.
    #[serde(default = "default_csv_name")]
    pub csv_name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IndexMethod {
    #[default]
    Ivfflat,
    Hnsw,
}

impl IndexMethod {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Ivfflat => "ivfflat",
            Self::Hnsw => "hnsw",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexConfig {
    #[serde(default)]
    pub method: IndexMethod,

    /// ivfflat only.
    #[serde(default = "default_lists")]
    pub lists: u32,

    /// hnsw only.
    #[serde(default = "default_m")]
    pub m: u32,

    /// hnsw only.
    #[serde(default = "default_ef_construction")]
    pub ef_construction: u32,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            openai: OpenAiConfig::default(),
            dataset: DatasetConfig::default(),
            index: IndexConfig::default(),
            table: default_table(),
            dimensions: default_dimensions(),
            search_top_k: default_search_top_k(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dbname: default_dbname(),
            user: default_user(),
            password: None,
            sslmode: SslMode::default(),
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            url: default_dataset_url(),
            data_dir: default_data_dir(),
            archive_name: default_archive_name(),
            csv_name: default_csv_name(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            method: IndexMethod::default(),
            lists: default_lists(),
            m: default_m(),
            ef_construction: default_ef_construction(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to [`DEFAULT_CONFIG_PATH`].
    /// If the file does not exist, returns a default config and generates a
    /// template file for the default path.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file. Secrets are skipped.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    ///
    /// Recognised: `PGHOST`, `PGPORT`, `PGDATABASE`, `PGUSER`, `PGPASSWORD`,
    /// `PGSSLMODE`, `OPENAI_API_KEY`, `OPENAI_BASE_URL`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("PGHOST") {
            self.database.host = host;
        }
        if let Some(port) = get("PGPORT") {
            match port.trim().parse() {
                Ok(p) => self.database.port = p,
                Err(e) => warn!("Ignoring PGPORT={port}: {e}"),
            }
        }
        if let Some(dbname) = get("PGDATABASE") {
            self.database.dbname = dbname;
        }
        if let Some(user) = get("PGUSER") {
            self.database.user = user;
        }
        if let Some(password) = get("PGPASSWORD") {
            self.database.password = Some(password);
        }
        if let Some(mode) = get("PGSSLMODE") {
            match mode.parse() {
                Ok(m) => self.database.sslmode = m,
                Err(e) => warn!("Ignoring PGSSLMODE: {e}"),
            }
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.openai.base_url = url;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.dimensions > 0, "dimensions must be positive");
        anyhow::ensure!(self.search_top_k > 0, "search_top_k must be positive");
        anyhow::ensure!(self.database.port > 0, "database.port must be positive");
        anyhow::ensure!(
            !self.database.host.trim().is_empty(),
            "database.host must not be empty"
        );
        anyhow::ensure!(
            !self.database.dbname.trim().is_empty(),
            "database.dbname must not be empty"
        );
        anyhow::ensure!(
            !self.database.user.trim().is_empty(),
            "database.user must not be empty"
        );
        anyhow::ensure!(
            !self.openai.model.trim().is_empty(),
            "openai.model must not be empty"
        );
        anyhow::ensure!(self.index.lists > 0, "index.lists must be positive");
        anyhow::ensure!(self.index.m > 0, "index.m must be positive");
        anyhow::ensure!(
            self.index.ef_construction > 0,
            "index.ef_construction must be positive"
        );
        let table = self.table_name()?;
        for column in VectorColumn::ALL {
            table
                .index_name(column.column_name(), self.index.method.as_sql())
                .context("table name too long for its index names")?;
        }
        Ok(())
    }

    /// Parse the configured table into a validated identifier.
    pub fn table_name(&self) -> Result<TableName> {
        TableName::parse(&self.table).context("invalid table name in config")
    }
}

impl DatasetConfig {
    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.archive_name)
    }

    #[must_use]
    pub fn csv_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.csv_name)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.sslmode, SslMode::Prefer);
        assert_eq!(config.dimensions, 1536);
        assert_eq!(config.search_top_k, 20);
        assert_eq!(config.table, "public.articles");
        assert_eq!(config.index.method, IndexMethod::Ivfflat);
        assert_eq!(config.index.lists, 1000);
        assert_eq!(config.openai.model, "text-embedding-ada-002");
        assert!(config.openai.api_key.is_none());
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"dimensions": 8, "database": {"host": "db.example.com"}, "index": {"method": "hnsw"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.dimensions, 8);
        assert_eq!(config.database.host, "db.example.com");
        assert_eq!(config.index.method, IndexMethod::Hnsw);
        // Other fields should have defaults
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.index.m, 16);
        assert_eq!(config.search_top_k, 20);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.dimensions, 1536);
        // Only the default path gets a template
        assert!(!path.exists());
    }

    #[test]
    fn test_load_invalid_json_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.table, "public.articles");
    }

    #[test]
    fn test_save_skips_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let mut config = Config::default();
        config.database.password = Some("hunter2".to_string());
        config.openai.api_key = Some("sk-secret".to_string());
        config.save(path.to_str().unwrap()).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("hunter2"));
        assert!(!written.contains("sk-secret"));

        let reloaded = Config::load(path.to_str().unwrap()).unwrap();
        assert!(reloaded.database.password.is_none());
        assert_eq!(reloaded.database.host, "localhost");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("PGHOST", "pg.internal"),
            ("PGPORT", "6543"),
            ("PGDATABASE", "wiki"),
            ("PGUSER", "loader"),
            ("PGPASSWORD", "pw"),
            ("PGSSLMODE", "require"),
            ("OPENAI_API_KEY", "sk-test"),
        ]));
        assert_eq!(config.database.host, "pg.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.dbname, "wiki");
        assert_eq!(config.database.user, "loader");
        assert_eq!(config.database.password.as_deref(), Some("pw"));
        assert_eq!(config.database.sslmode, SslMode::Require);
        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_env_bad_port_and_empty_values_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[("PGPORT", "not-a-port"), ("PGHOST", "  ")]));
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.host, "localhost");
    }

    #[test]
    fn test_validate_ok() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_dimensions() {
        let mut config = Config::default();
        config.dimensions = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_table() {
        let mut config = Config::default();
        config.table = "articles; DROP TABLE users".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_table_too_long_for_index_names() {
        let mut config = Config::default();
        config.table = format!("public.{}", "a".repeat(50));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sslmode_parse() {
        assert_eq!("disable".parse::<SslMode>().unwrap(), SslMode::Disable);
        assert_eq!("verify-full".parse::<SslMode>().unwrap(), SslMode::Require);
        assert!("sometimes".parse::<SslMode>().is_err());
    }

    #[test]
    fn test_dataset_paths() {
        let dataset = DatasetConfig {
            data_dir: "/tmp/wiki".to_string(),
            ..DatasetConfig::default()
        };
        assert_eq!(
            dataset.csv_path(),
            PathBuf::from("/tmp/wiki/vector_database_wikipedia_articles_embedded.csv")
        );
        assert!(dataset.archive_path().to_string_lossy().ends_with(".zip"));
    }
}
