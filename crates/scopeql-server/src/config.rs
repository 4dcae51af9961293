//! Configuration system for the scopeql server
//!
//! Loads configuration from:
//! 1. config.yaml - operational settings (port, model, limits, logging)
//! 2. .env file - secrets (API keys)
//!
//! Environment variables always override config.yaml values.

use scopeql_duck::StoreOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Completion service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Any OpenAI-compatible endpoint
    pub base_url: String,
    pub model: String,
    /// Ceiling for one completion call
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".to_string(),
            model: "deepseek-chat".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Result explainer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
    /// Rows included in the explanation prompt
    pub max_rows: usize,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 15,
            max_rows: 50,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the DuckDB file holding every tenant schema
    pub path: String,
    pub statement_timeout_ms: u64,
    pub max_rows: usize,
    /// DuckDB memory_limit, e.g. "1GB"
    pub memory_limit: Option<String>,
    pub allow_external_access: bool,
    /// Dialect name used in prompts
    pub dialect: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/shop.duckdb".to_string(),
            statement_timeout_ms: 10_000,
            max_rows: 10_000,
            memory_limit: None,
            allow_external_access: false,
            dialect: "DuckDB".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaCacheConfig {
    pub enabled: bool,
}

impl Default for SchemaCacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Audit log configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// JSONL file; no audit log when unset
    pub path: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub explain: ExplainConfig,
    pub database: DatabaseConfig,
    pub schema_cache: SchemaCacheConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file means defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            return Self::load(path);
        }
        let mut config = Config::default();
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse YAML only, without looking at the environment
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("SCOPEQL_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse("SCOPEQL_SERVER_PORT") {
            self.server.port = port;
        }

        if let Ok(url) = std::env::var("SCOPEQL_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("SCOPEQL_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(secs) = env_parse("SCOPEQL_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = secs;
        }
        if let Some(enabled) = env_parse("SCOPEQL_EXPLAIN_ENABLED") {
            self.explain.enabled = enabled;
        }

        if let Ok(path) = std::env::var("SCOPEQL_DATABASE_PATH") {
            self.database.path = path;
        }
        if let Some(ms) = env_parse("SCOPEQL_STATEMENT_TIMEOUT_MS") {
            self.database.statement_timeout_ms = ms;
        }
        if let Some(rows) = env_parse("SCOPEQL_MAX_ROWS") {
            self.database.max_rows = rows;
        }
        if let Some(enabled) = env_parse("SCOPEQL_SCHEMA_CACHE") {
            self.schema_cache.enabled = enabled;
        }
        if let Ok(path) = std::env::var("SCOPEQL_AUDIT_PATH") {
            self.audit.path = Some(path);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }
    }

    /// Get the completion API key from environment (must be in .env)
    pub fn get_llm_api_key() -> Result<String, ConfigError> {
        ["SCOPEQL_LLM_API_KEY", "DEEPSEEK_API_KEY", "OPENAI_API_KEY"]
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
            .ok_or_else(|| ConfigError::MissingEnvVar("SCOPEQL_LLM_API_KEY".to_string()))
    }

    /// Limits handed to the DuckDB store; zero disables a limit
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            statement_timeout: Some(self.database.statement_timeout_ms)
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            max_rows: Some(self.database.max_rows).filter(|rows| *rows > 0),
            memory_limit: self.database.memory_limit.clone(),
            allow_external_access: self.database.allow_external_access,
        }
    }
}
