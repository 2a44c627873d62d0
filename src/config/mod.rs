//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, ClinicalConfig, DatabaseConfig, InventoryConfig, LlmConfig, LogFormat,
    LoggingConfig, NormalizationConfig, ServerConfig,
};
