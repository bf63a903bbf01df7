//! Configuration management for Lumen.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults
//! - Config file (`.lumen/config.yaml`, or `LUMEN_CONFIG`)
//! - Environment variables (`LUMEN_*`)
//! - Command-line flags (see [`ConfigOverrides`])

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the LLM factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["openai", "ollama", "mock"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .lumen/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Active LLM provider ("openai", "ollama", "mock")
    pub provider: String,

    /// Model identifier used for classification, extraction and replies
    pub model: String,

    /// API key for the LLM provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Path to the JSONL product catalog, relative to the workspace unless absolute
    pub catalog_path: PathBuf,

    /// Infer the record schema from the catalog file instead of using the built-in one
    pub infer_schema: bool,

    /// Language the assistant replies in
    pub language: String,

    /// Retries for a failed structured extraction call
    pub max_retries: u32,

    /// Sampling temperature for the reply; extraction calls always run at 0
    pub temperature: f32,

    /// Timeout in seconds for a single model request
    pub timeout_secs: u64,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    OpenAI {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            Self::OpenAI { model, .. } | Self::Ollama { model, .. } => model,
        }
    }

    /// Endpoint override, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::OpenAI { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    catalog: Option<CatalogConfig>,
    agent: Option<AgentConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogConfig {
    path: Option<String>,
    #[serde(rename = "inferSchema")]
    infer_schema: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AgentConfig {
    language: Option<String>,
    #[serde(rename = "maxRetries")]
    max_retries: Option<u32>,
    temperature: Option<f32>,
    #[serde(rename = "timeoutSecs")]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

/// Command-line values that take precedence over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub workspace: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub catalog: Option<PathBuf>,
    pub log_level: Option<String>,
    pub infer_schema: bool,
    pub verbose: bool,
    pub no_color: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            catalog_path: PathBuf::from("data/illuminants.jsonl"),
            infer_schema: false,
            language: "Deutsch".to_string(),
            max_retries: 2,
            temperature: 0.0,
            timeout_secs: 60,
            llm: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, the config file and defaults.
    ///
    /// Environment variables:
    /// - `LUMEN_WORKSPACE`: Override workspace path
    /// - `LUMEN_CONFIG`: Path to config file
    /// - `LUMEN_PROVIDER`: LLM provider
    /// - `LUMEN_MODEL`: Model identifier
    /// - `LUMEN_API_KEY`: API key
    /// - `LUMEN_CATALOG`: Catalog JSONL path
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use lumen_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Catalog: {:?}", config.catalog_file());
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("LUMEN_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("LUMEN_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.lumen_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("LUMEN_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("LUMEN_MODEL") {
            config.model = model;
        }

        if let Ok(catalog) = std::env::var("LUMEN_CATALOG") {
            config.catalog_path = PathBuf::from(catalog);
        }

        config.api_key = std::env::var("LUMEN_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    pub fn merge_yaml(self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self;

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(catalog) = config_file.catalog {
            if let Some(path) = catalog.path {
                result.catalog_path = PathBuf::from(path);
            }
            if let Some(infer) = catalog.infer_schema {
                result.infer_schema = infer;
            }
        }

        if let Some(agent) = config_file.agent {
            if let Some(language) = agent.language {
                result.language = language;
            }
            if let Some(max_retries) = agent.max_retries {
                result.max_retries = max_retries;
            }
            if let Some(temperature) = agent.temperature {
                result.temperature = temperature;
            }
            if let Some(timeout) = agent.timeout_secs {
                result.timeout_secs = timeout;
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
                if let ProviderConfig::Ollama {
                    timeout: Some(timeout),
                    ..
                } = provider_config
                {
                    result.timeout_secs = *timeout;
                }
            }

            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(workspace) = overrides.workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = overrides.config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = overrides.provider {
            self.provider = provider;
        }

        if let Some(model) = overrides.model {
            self.model = model;
        }

        if let Some(catalog) = overrides.catalog {
            self.catalog_path = catalog;
        }

        if let Some(log_level) = overrides.log_level {
            self.log_level = Some(log_level);
        }

        if overrides.infer_schema {
            self.infer_schema = true;
        }

        if overrides.verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if overrides.no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .lumen directory.
    pub fn lumen_dir(&self) -> PathBuf {
        self.workspace.join(".lumen")
    }

    /// Absolute path of the catalog file.
    pub fn catalog_file(&self) -> PathBuf {
        if self.catalog_path.is_absolute() {
            self.catalog_path.clone()
        } else {
            self.workspace.join(&self.catalog_path)
        }
    }

    /// Get a provider's configuration block, if the config file declared one.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Endpoint override for a provider.
    pub fn resolve_endpoint(&self, provider: &str) -> Option<String> {
        self.get_provider_config(provider)
            .and_then(|pc| pc.endpoint())
            .map(str::to_string)
    }

    /// Resolve the API key for a provider.
    ///
    /// `LUMEN_API_KEY` wins, then the provider's `apiKeyEnv`, then
    /// `OPENAI_API_KEY` for the openai provider.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        if let Some(ProviderConfig::OpenAI { api_key_env, .. }) = self.get_provider_config(provider)
        {
            return std::env::var(api_key_env).ok();
        }

        if provider == "openai" {
            return std::env::var("OPENAI_API_KEY").ok();
        }

        None
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.as_str();

        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider == "openai" && self.resolve_api_key(provider).is_none() {
            let env_var = match self.get_provider_config(provider) {
                Some(ProviderConfig::OpenAI { api_key_env, .. }) => api_key_env.as_str(),
                _ => "OPENAI_API_KEY",
            };
            return Err(AppError::Config(format!(
                "API key not found in environment variable: {}",
                env_var
            )));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AppError::Config(format!(
                "Temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }

        Ok(())
    }
}
