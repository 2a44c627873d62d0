//! Per-request retrieval context and the answer returned to callers

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    ClinicalData, DetectedIntent, InventoryMatch, NormalizationResult, Query, StageError,
};

/// Accumulated stage outputs for a single query
///
/// Owned by the orchestrator for the lifetime of one request. Each stage
/// fills its own field; only the orchestrator pushes to `errors`.
#[derive(Debug, Clone)]
pub struct RetrievalContext {
    pub query: Query,
    pub intent: DetectedIntent,
    pub inventory_matches: Vec<InventoryMatch>,
    pub normalization_results: Vec<NormalizationResult>,
    pub clinical_data: Vec<ClinicalData>,
    pub errors: Vec<StageError>,
}

impl RetrievalContext {
    pub fn new(query: Query, intent: DetectedIntent) -> Self {
        Self {
            query,
            intent,
            inventory_matches: Vec::new(),
            normalization_results: Vec::new(),
            clinical_data: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// True when no stage contributed anything
    pub fn has_no_data(&self) -> bool {
        self.inventory_matches.is_empty()
            && self.normalization_results.is_empty()
            && self.clinical_data.is_empty()
    }

    /// Best available drug name: canonical concept, then detected name
    pub fn primary_drug_name(&self) -> Option<&str> {
        self.normalization_results
            .first()
            .map(|r| r.canonical_name.as_str())
            .or_else(|| self.intent.has_drug_name().then(|| self.intent.drug_name()))
    }

    /// Names of the sources that contributed data
    pub fn sources(&self) -> Vec<String> {
        let mut sources = Vec::new();
        if !self.inventory_matches.is_empty() {
            sources.push("inventory".to_string());
        }
        if !self.normalization_results.is_empty() {
            sources.push("rxnorm".to_string());
        }
        for data in &self.clinical_data {
            if !sources.contains(&data.source) {
                sources.push(data.source.clone());
            }
        }
        sources
    }
}

/// Final result of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    pub query_id: Uuid,
    pub response: String,
    pub intent: DetectedIntent,
    pub sources: Vec<String>,
    pub errors: Vec<StageError>,
}

impl RagAnswer {
    pub fn from_context(context: RetrievalContext, response: String) -> Self {
        let sources = context.sources();
        Self {
            query_id: context.query.id,
            response,
            intent: context.intent,
            sources,
            errors: context.errors,
        }
    }
}
