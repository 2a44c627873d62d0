//! Response compiler: intent-specific prompt chains over an LLM provider

mod chain;
mod format;
mod sanitize;
mod templates;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, error, info};

pub use chain::{ChainSettings, PromptChain, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
pub use format::{footer, DISCLAIMER, FOOTER_HEADER, NO_SOURCES_LINE};
pub use sanitize::sanitize_response;

use crate::domain::rag::{IntentType, RetrievalContext};
use crate::domain::{DomainError, LlmProvider, TemplateError};
use crate::infrastructure::observability::{record_llm_request, LlmRequestMetricParams};

/// Returned verbatim whenever compilation fails
pub const APOLOGY_RESPONSE: &str = "I'm sorry, I was unable to prepare an answer to your question \
     right now. Please try again shortly, or consult a pharmacist directly.";

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Llm(#[from] DomainError),

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// Turns a filled retrieval context into the final answer text
#[derive(Debug)]
pub struct ResponseCompiler {
    provider: Arc<dyn LlmProvider>,
    dosage: PromptChain,
    usage: PromptChain,
    side_effects: PromptChain,
    general: PromptChain,
}

impl ResponseCompiler {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: ChainSettings) -> Self {
        let chain = |name: &'static str, (system, human): (String, String)| {
            PromptChain::new(name, system, human, settings.clone())
        };

        Self {
            dosage: chain("dosage", templates::dosage()),
            usage: chain("usage", templates::usage()),
            side_effects: chain("side-effects", templates::side_effects()),
            general: chain("general", templates::general()),
            provider,
        }
    }

    /// `unknown` shares the general chain
    pub fn chain_for(&self, intent: IntentType) -> &PromptChain {
        match intent {
            IntentType::Dosage => &self.dosage,
            IntentType::Usage => &self.usage,
            IntentType::SideEffects => &self.side_effects,
            IntentType::General | IntentType::Unknown => &self.general,
        }
    }

    /// Human prompt variables, every block rendered as plain text
    pub fn prompt_values(context: &RetrievalContext) -> HashMap<&'static str, String> {
        HashMap::from([
            ("query", context.query.text.clone()),
            (
                "drug_name",
                context
                    .primary_drug_name()
                    .unwrap_or("not identified")
                    .to_string(),
            ),
            ("inventory", format::inventory_block(&context.inventory_matches)),
            (
                "normalization",
                format::normalization_block(&context.normalization_results),
            ),
            ("clinical", format::clinical_block(&context.clinical_data)),
            ("missing", format::missing_block(context)),
        ])
    }

    /// Never fails: any error yields [`APOLOGY_RESPONSE`]
    pub async fn compile(&self, context: &RetrievalContext) -> String {
        match self.compile_body(context).await {
            Ok(body) => format!("{}\n\n{}", body, footer(context)),
            Err(e) => {
                error!(query_id = %context.query.id, error = %e, "Response compilation failed");
                APOLOGY_RESPONSE.to_string()
            }
        }
    }

    async fn compile_body(&self, context: &RetrievalContext) -> Result<String, CompileError> {
        let intent = context.intent.intent_type();

        if context.has_no_data() {
            info!(query_id = %context.query.id, intent = %intent, "No retrieval data, skipping LLM");
            return Ok(format::unavailable_body(intent, context.primary_drug_name()));
        }

        let chain = self.chain_for(intent);
        let request = chain.build_request(&Self::prompt_values(context))?;

        let model = chain.settings().model.as_str();
        let start = Instant::now();
        let result = self.provider.chat(model, request).await;

        let usage = result.as_ref().ok().and_then(|r| r.usage.clone());
        record_llm_request(LlmRequestMetricParams {
            provider: self.provider.provider_name(),
            model,
            duration: start.elapsed(),
            success: result.is_ok(),
            input_tokens: usage.as_ref().map(|u| u64::from(u.prompt_tokens)),
            output_tokens: usage.as_ref().map(|u| u64::from(u.completion_tokens)),
        });

        let response = result?;
        debug!(
            query_id = %context.query.id,
            chain = chain.name(),
            chars = response.content().len(),
            "LLM response received"
        );

        let body = sanitize_response(response.content());
        if body.is_empty() {
            return Err(CompileError::EmptyResponse);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::MockLlmProvider;
    use crate::domain::rag::{InventoryMatch, IntentDetector, Query};

    fn context(text: &str) -> RetrievalContext {
        RetrievalContext::new(Query::new(text), IntentDetector::new().detect(text))
    }

    fn compiler(provider: MockLlmProvider) -> (ResponseCompiler, Arc<MockLlmProvider>) {
        let provider = Arc::new(provider);
        let compiler = ResponseCompiler::new(provider.clone(), ChainSettings::default());
        (compiler, provider)
    }

    #[test]
    fn test_chain_selection() {
        let (compiler, _) = compiler(MockLlmProvider::new("mock"));

        assert_eq!(compiler.chain_for(IntentType::Dosage).name(), "dosage");
        assert_eq!(compiler.chain_for(IntentType::SideEffects).name(), "side-effects");
        assert_eq!(compiler.chain_for(IntentType::Unknown).name(), "general");
    }

    #[test]
    fn test_every_chain_accepts_prompt_values() {
        let (compiler, _) = compiler(MockLlmProvider::new("mock"));
        let ctx = context("dose of ibuprofen");
        let lookup = ResponseCompiler::prompt_values(&ctx);

        for intent in [
            IntentType::Dosage,
            IntentType::Usage,
            IntentType::SideEffects,
            IntentType::General,
        ] {
            let chain = compiler.chain_for(intent);
            assert!(chain.build_request(&lookup).is_ok(), "chain {}", chain.name());
            for variable in chain.human_template().variables() {
                assert!(lookup.contains_key(variable.name.as_str()));
            }
        }
    }

    #[tokio::test]
    async fn test_no_data_skips_llm() {
        let (compiler, provider) = compiler(MockLlmProvider::new("mock").with_reply("unused"));
        let ctx = context("dosage for paracetamol");

        let response = compiler.compile(&ctx).await;

        assert!(response.starts_with("Dosage information for paracetamol is unavailable."));
        assert!(response.contains(NO_SOURCES_LINE));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_compile_sanitizes_and_appends_footer() {
        let (compiler, provider) = compiler(MockLlmProvider::new("mock").with_reply(
            "**Clinical Information:**\nAdvil is in stock.\n\nSources:\n- openFDA",
        ));
        let mut ctx = context("is advil in stock");
        ctx.inventory_matches.push(InventoryMatch::new("1", "Advil 200mg", 4));

        let response = compiler.compile(&ctx).await;

        assert!(response.starts_with("Advil is in stock.\n\nClinical Data Sources:\n"));
        assert!(response.contains("Pharmacy Inventory (1 matching product)"));
        assert!(!response.contains("Clinical Information:"));
        assert_eq!(response.matches("Sources:").count(), 1);

        let request = &provider.requests()[0];
        assert_eq!(request.temperature, Some(0.1));
        assert!(request.messages[1].content.contains("Advil 200mg"));
    }

    #[tokio::test]
    async fn test_llm_failure_returns_apology() {
        let (compiler, _) = compiler(MockLlmProvider::new("mock").with_error("upstream 500"));
        let mut ctx = context("side effects of ibuprofen");
        ctx.inventory_matches.push(InventoryMatch::new("1", "Ibuprofen 200mg", 10));

        assert_eq!(compiler.compile(&ctx).await, APOLOGY_RESPONSE);
    }

    #[tokio::test]
    async fn test_empty_llm_output_returns_apology() {
        let (compiler, _) = compiler(MockLlmProvider::new("mock").with_reply("Sources: none"));
        let mut ctx = context("uses of metformin");
        ctx.inventory_matches.push(InventoryMatch::new("1", "Metformin 500mg", 10));

        assert_eq!(compiler.compile(&ctx).await, APOLOGY_RESPONSE);
    }
}
