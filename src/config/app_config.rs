use serde::Deserialize;

use crate::domain::rag::{DEFAULT_INVENTORY_LIMIT, DEFAULT_MAX_TERMS, DEFAULT_NORMALIZATION_LIMIT};
use crate::infrastructure::clinical::DEFAULT_OPENFDA_BASE_URL;
use crate::infrastructure::compiler::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::infrastructure::llm::DEFAULT_OPENAI_BASE_URL;
use crate::infrastructure::normalization::DEFAULT_RXNAV_BASE_URL;
use crate::infrastructure::observability::MetricsConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub inventory: InventoryConfig,
    pub normalization: NormalizationConfig,
    pub clinical: ClinicalConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Inventory database; without a URL the in-memory catalog is used
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub max_results: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_results: usize,
    pub max_terms: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClinicalConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub label_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: 60,
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_INVENTORY_LIMIT,
        }
    }
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_RXNAV_BASE_URL.to_string(),
            timeout_secs: 10,
            max_results: DEFAULT_NORMALIZATION_LIMIT,
            max_terms: DEFAULT_MAX_TERMS,
        }
    }
}

impl Default for ClinicalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENFDA_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 15,
            label_limit: 5,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app: Self = config.try_deserialize()?;
        app.apply_env_fallbacks(|key| std::env::var(key).ok());
        Ok(app)
    }

    /// Fill unset values from the well-known provider variables
    fn apply_env_fallbacks(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.database.url.is_none() {
            self.database.url = lookup("DATABASE_URL");
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = lookup("OPENAI_API_KEY");
        }
        if self.llm.base_url == DEFAULT_OPENAI_BASE_URL {
            if let Some(url) = lookup("OPENAI_BASE_URL") {
                self.llm.base_url = url;
            }
        }
        if self.clinical.api_key.is_none() {
            self.clinical.api_key = lookup("OPENFDA_API_KEY");
        }
    }
}
