//! Configuration loading, validation, and management for hrcounsel.
//!
//! Loads configuration from `~/.hrcounsel/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use hrcounsel_core::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.hrcounsel/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider used for both completions and embeddings unless overridden
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Answer generation settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Embedding settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Retrieval limits and thresholds
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Per-call timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Knowledge and conversation storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Bearer credential settings
    #[serde(default)]
    pub auth: AuthConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("generation", &self.generation)
            .field("embedding", &self.embedding)
            .field("retrieval", &self.retrieval)
            .field("timeouts", &self.timeouts)
            .field("storage", &self.storage)
            .field("gateway", &self.gateway)
            .field("auth", &self.auth)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &redact(&self.token_secret))
            .field("tokens", &format!("[{} configured]", self.tokens.len()))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_model")]
    pub model: String,

    /// Kept low so answers stay close to the cited text
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    800
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name; falls back to `default_provider`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector length of the knowledge base; mismatching embeddings are rejected
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".into()
}
fn default_dimension() -> usize {
    1536
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: default_embedding_model(),
            dimension: default_dimension(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Minimum cosine similarity for a knowledge chunk to be used
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f32,

    #[serde(default = "default_knowledge_limit")]
    pub knowledge_limit: usize,

    /// Messages of the live session loaded as short-term memory
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default = "default_summary_limit")]
    pub summary_limit: usize,

    /// Messages from other sessions found by similarity
    #[serde(default = "default_related_limit")]
    pub related_limit: usize,

    /// History messages replayed as chat turns to the model
    #[serde(default = "default_replay_limit")]
    pub replay_limit: usize,

    /// Estimated-token budget of the rendered context block
    #[serde(default = "default_context_token_budget")]
    pub context_token_budget: usize,

    #[serde(default = "default_max_question_chars")]
    pub max_question_chars: usize,
}

fn default_threshold() -> f32 {
    0.70
}
fn default_knowledge_limit() -> usize {
    5
}
fn default_history_limit() -> usize {
    10
}
fn default_summary_limit() -> usize {
    3
}
fn default_related_limit() -> usize {
    3
}
fn default_replay_limit() -> usize {
    10
}
fn default_context_token_budget() -> usize {
    3000
}
fn default_max_question_chars() -> usize {
    4000
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_threshold(),
            knowledge_limit: default_knowledge_limit(),
            history_limit: default_history_limit(),
            summary_limit: default_summary_limit(),
            related_limit: default_related_limit(),
            replay_limit: default_replay_limit(),
            context_token_budget: default_context_token_budget(),
            max_question_chars: default_max_question_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_embedding_secs")]
    pub embedding_secs: u64,

    #[serde(default = "default_knowledge_secs")]
    pub knowledge_secs: u64,

    /// Conversation log and summary reads
    #[serde(default = "default_store_secs")]
    pub store_secs: u64,

    #[serde(default = "default_synthesis_secs")]
    pub synthesis_secs: u64,
}

fn default_embedding_secs() -> u64 {
    15
}
fn default_knowledge_secs() -> u64 {
    10
}
fn default_store_secs() -> u64 {
    5
}
fn default_synthesis_secs() -> u64 {
    60
}

impl TimeoutConfig {
    pub fn embedding(&self) -> Duration {
        Duration::from_secs(self.embedding_secs)
    }

    pub fn knowledge(&self) -> Duration {
        Duration::from_secs(self.knowledge_secs)
    }

    pub fn store(&self) -> Duration {
        Duration::from_secs(self.store_secs)
    }

    pub fn synthesis(&self) -> Duration {
        Duration::from_secs(self.synthesis_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embedding_secs: default_embedding_secs(),
            knowledge_secs: default_knowledge_secs(),
            store_secs: default_store_secs(),
            synthesis_secs: default_synthesis_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// "sqlite" or "memory"
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// SQLite database file; defaults to `~/.hrcounsel/hrcounsel.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

fn default_storage_backend() -> String {
    "sqlite".into()
}

impl StorageConfig {
    /// Connection string for the SQLite backend.
    pub fn database_url(&self) -> String {
        match &self.path {
            Some(p) if p.starts_with("sqlite:") => p.clone(),
            Some(p) => format!("sqlite://{p}"),
            None => format!(
                "sqlite://{}",
                AppConfig::config_dir().join("hrcounsel.db").display()
            ),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Allowed CORS origins. Empty = same-origin only.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Requests per minute per credential
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_port() -> u16 {
    8787
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_rate_limit() -> u32 {
    60
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: vec![],
            rate_limit_per_minute: default_rate_limit(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret for HMAC-signed bearer tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<String>,

    /// Long-lived tokens issued out of band
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tokens: Vec<StaticTokenConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticTokenConfig {
    pub token: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.hrcounsel/config.toml).
    ///
    /// Environment overrides:
    /// - `HRCOUNSEL_API_KEY`, then `OPENAI_API_KEY` (when no key is configured)
    /// - `HRCOUNSEL_MODEL`
    /// - `HRCOUNSEL_TOKEN_SECRET`
    /// - `HRCOUNSEL_DATABASE`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = var("HRCOUNSEL_API_KEY").or_else(|| var("OPENAI_API_KEY"));
        }
        if let Some(model) = var("HRCOUNSEL_MODEL") {
            self.generation.model = model;
        }
        if let Some(secret) = var("HRCOUNSEL_TOKEN_SECRET") {
            self.auth.token_secret = Some(secret);
        }
        if let Some(path) = var("HRCOUNSEL_DATABASE") {
            self.storage.path = Some(path);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".hrcounsel")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.generation.temperature) {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 1.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.retrieval.similarity_threshold) {
            return Err(ConfigError::ValidationError(
                "retrieval.similarity_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.retrieval.knowledge_limit == 0 || self.retrieval.max_question_chars == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.knowledge_limit and retrieval.max_question_chars must be > 0".into(),
            ));
        }

        if self.embedding.dimension == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimension must be > 0".into(),
            ));
        }

        if self.generation.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "generation.max_tokens must be > 0".into(),
            ));
        }

        match self.storage.backend.as_str() {
            "sqlite" | "memory" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "storage.backend must be 'sqlite' or 'memory', got '{other}'"
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Name of the provider used for embeddings.
    pub fn embedding_provider(&self) -> &str {
        self.embedding
            .provider
            .as_deref()
            .unwrap_or(&self.default_provider)
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            generation: GenerationConfig::default(),
            embedding: EmbeddingConfig::default(),
            retrieval: RetrievalConfig::default(),
            timeouts: TimeoutConfig::default(),
            storage: StorageConfig::default(),
            gateway: GatewayConfig::default(),
            auth: AuthConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
