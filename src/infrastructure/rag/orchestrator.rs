use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::domain::rag::{
    candidate_terms, dedupe_by_code, ClinicalRetriever, IntentDetector, InventoryMatch,
    InventoryRetriever, NormalizationResult, NormalizationRetriever, Query, RagAnswer,
    RetrievalContext, Stage, StageError, DEFAULT_INVENTORY_LIMIT, DEFAULT_MAX_TERMS,
    DEFAULT_NORMALIZATION_LIMIT,
};
use crate::infrastructure::compiler::{ResponseCompiler, APOLOGY_RESPONSE};
use crate::infrastructure::observability::{record_query, record_stage};

/// Runs the five pipeline stages for one query at a time
///
/// Stage failures never abort the run: the error is recorded on the context,
/// the stage contributes nothing, and the next stage proceeds.
#[derive(Clone)]
pub struct RagOrchestrator {
    detector: IntentDetector,
    inventory: Arc<dyn InventoryRetriever>,
    normalization: Arc<dyn NormalizationRetriever>,
    clinical: Arc<dyn ClinicalRetriever>,
    compiler: Arc<ResponseCompiler>,
    inventory_limit: usize,
    normalization_limit: usize,
}

impl std::fmt::Debug for RagOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagOrchestrator")
            .field("inventory_limit", &self.inventory_limit)
            .field("normalization_limit", &self.normalization_limit)
            .finish_non_exhaustive()
    }
}

impl RagOrchestrator {
    pub fn new(
        inventory: Arc<dyn InventoryRetriever>,
        normalization: Arc<dyn NormalizationRetriever>,
        clinical: Arc<dyn ClinicalRetriever>,
        compiler: ResponseCompiler,
    ) -> Self {
        Self {
            detector: IntentDetector::new(),
            inventory,
            normalization,
            clinical,
            compiler: Arc::new(compiler),
            inventory_limit: DEFAULT_INVENTORY_LIMIT,
            normalization_limit: DEFAULT_NORMALIZATION_LIMIT,
        }
    }

    pub fn with_inventory_limit(mut self, limit: usize) -> Self {
        self.inventory_limit = limit;
        self
    }

    pub fn with_normalization_limit(mut self, limit: usize) -> Self {
        self.normalization_limit = limit;
        self
    }

    pub fn inventory(&self) -> &Arc<dyn InventoryRetriever> {
        &self.inventory
    }

    pub async fn answer(&self, query: Query) -> RagAnswer {
        let start = Instant::now();

        // Step 1: intent
        let intent = self.detector.detect(&query.text);
        record_query(intent.intent_type());
        let mut context = RetrievalContext::new(query, intent);

        info!(
            query_id = %context.query.id,
            intent = %context.intent.intent_type(),
            drug = %context.intent.drug_name(),
            confidence = context.intent.confidence(),
            "Processing query"
        );

        // Steps 2 and 3: inventory and normalization
        if context.intent.has_drug_name() {
            self.gather_names(&mut context).await;
        } else {
            debug!(query_id = %context.query.id, "No drug name detected, skipping inventory and normalization");
        }

        // Step 4: clinical labels
        let clinical = timed(
            Stage::Clinical,
            self.clinical.retrieve(&context.intent, &context),
        )
        .await;
        context.clinical_data = absorb(&mut context.errors, clinical);

        // Step 5: compilation
        let compile_start = Instant::now();
        let response = self.compiler.compile(&context).await;
        let compiled = response != APOLOGY_RESPONSE;
        record_stage(Stage::Compilation, compile_start.elapsed(), compiled);
        if !compiled {
            context
                .errors
                .push(StageError::new(Stage::Compilation, "response compilation failed"));
        }

        info!(
            query_id = %context.query.id,
            inventory = context.inventory_matches.len(),
            normalization = context.normalization_results.len(),
            clinical = context.clinical_data.len(),
            errors = context.errors.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Query answered"
        );

        RagAnswer::from_context(context, response)
    }

    async fn gather_names(&self, context: &mut RetrievalContext) {
        let drug = context.intent.drug_name().to_string();
        let terms = vec![drug.clone()];

        let (inventory, normalization) = tokio::join!(
            timed(
                Stage::Inventory,
                self.inventory.retrieve(&drug, self.inventory_limit)
            ),
            timed(Stage::Normalization, self.normalization.normalize(&terms)),
        );

        context.inventory_matches = absorb(&mut context.errors, inventory);
        let mut results = absorb(&mut context.errors, normalization);

        let extra = uncovered_names(&drug, &context.inventory_matches, &results);
        if !extra.is_empty() {
            debug!(query_id = %context.query.id, terms = ?extra, "Normalizing inventory-derived names");
            let second = timed(Stage::Normalization, self.normalization.normalize(&extra)).await;
            results.extend(absorb(&mut context.errors, second));
        }

        context.normalization_results = dedupe_by_code(results, self.normalization_limit);
    }
}

/// Generic and brand names from inventory that the first normalization pass did not cover
fn uncovered_names(
    drug: &str,
    matches: &[InventoryMatch],
    results: &[NormalizationResult],
) -> Vec<String> {
    let covered = |name: &str| {
        name.eq_ignore_ascii_case(drug)
            || results.iter().any(|r| {
                r.matched_term.eq_ignore_ascii_case(name) || r.canonical_name.eq_ignore_ascii_case(name)
            })
    };

    candidate_terms(
        matches
            .iter()
            .flat_map(InventoryMatch::alternative_names)
            .filter(|name| !covered(name)),
        DEFAULT_MAX_TERMS,
    )
}

async fn timed<T, F>(stage: Stage, future: F) -> Result<T, StageError>
where
    F: Future<Output = Result<T, StageError>>,
{
    let start = Instant::now();
    let result = future.await;
    record_stage(stage, start.elapsed(), result.is_ok());
    result
}

fn absorb<T: Default>(errors: &mut Vec<StageError>, result: Result<T, StageError>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(stage = %e.stage, error = %e.message, "Stage failed, continuing without its output");
            errors.push(e);
            T::default()
        }
    }
}
