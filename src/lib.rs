//! Pharmacy medication assistant
//!
//! Answers staff questions about medications by combining:
//! - the pharmacy's own product inventory (PostgreSQL)
//! - RxNorm drug name normalization (NLM RxNav)
//! - openFDA drug label data
//!
//! and compiling the gathered context into a single answer with an LLM.

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use api::state::AppState;
use domain::rag::RegexClinicalExtractor;
use domain::{ClinicalRetriever, InventoryRetriever, LlmProvider, NormalizationRetriever};
use infrastructure::{
    clinical::OpenFdaClinicalRetriever,
    compiler::{ChainSettings, ResponseCompiler},
    http::HttpClient,
    inventory::{InMemoryInventoryRetriever, PostgresInventoryRetriever},
    llm::OpenAiProvider,
    normalization::RxNavNormalizationRetriever,
    rag::RagOrchestrator,
};
use tracing::{info, warn};

/// Build every client once and wire them into the orchestrator
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let (inventory, database_configured) = create_inventory(config).await?;

    let rxnav_client = HttpClient::with_timeout(Duration::from_secs(config.normalization.timeout_secs))?;
    let normalization: Arc<dyn NormalizationRetriever> = Arc::new(
        RxNavNormalizationRetriever::with_base_url(rxnav_client, &config.normalization.base_url)
            .with_timeout(Duration::from_secs(config.normalization.timeout_secs))
            .with_max_results(config.normalization.max_results)
            .with_max_terms(config.normalization.max_terms),
    );

    let openfda_client = HttpClient::with_timeout(Duration::from_secs(config.clinical.timeout_secs))?;
    let clinical: Arc<dyn ClinicalRetriever> = Arc::new(
        OpenFdaClinicalRetriever::with_base_url(openfda_client, &config.clinical.base_url)
            .with_extractor(Box::new(RegexClinicalExtractor::new()))
            .with_api_key(config.clinical.api_key.clone())
            .with_timeout(Duration::from_secs(config.clinical.timeout_secs))
            .with_label_limit(config.clinical.label_limit),
    );

    if config.llm.api_key.is_none() {
        warn!("No LLM API key configured; requests are sent without authorization");
    }
    let llm_client = HttpClient::with_timeout(Duration::from_secs(config.llm.timeout_secs))?;
    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::with_base_url(
        llm_client,
        config.llm.api_key.clone(),
        &config.llm.base_url,
    ));

    let compiler = ResponseCompiler::new(
        provider,
        ChainSettings {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        },
    );

    let orchestrator = RagOrchestrator::new(inventory, normalization, clinical, compiler)
        .with_inventory_limit(config.inventory.max_results)
        .with_normalization_limit(config.normalization.max_results);

    info!(
        database = database_configured,
        model = %config.llm.model,
        "Application state initialized"
    );

    Ok(AppState::new(orchestrator, database_configured))
}

async fn create_inventory(config: &AppConfig) -> anyhow::Result<(Arc<dyn InventoryRetriever>, bool)> {
    match config.database.url.as_deref() {
        Some(url) => {
            let retriever =
                PostgresInventoryRetriever::connect(url, config.database.max_connections).await?;
            info!(max_connections = config.database.max_connections, "Connected to inventory database");
            Ok((Arc::new(retriever), true))
        }
        None => {
            warn!("DATABASE_URL not set, using an empty in-memory inventory");
            Ok((Arc::new(InMemoryInventoryRetriever::default()), false))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_app_state_without_database() {
        let state = create_app_state(&AppConfig::default()).await.unwrap();

        assert!(!state.database_configured);
        assert!(state.orchestrator.inventory().ping().await.is_ok());
    }
}
