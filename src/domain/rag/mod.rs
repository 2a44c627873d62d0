//! Medication question pipeline: stage contracts and pure heuristics

mod clinical;
mod context;
mod error;
pub mod extraction;
mod intent;
mod inventory;
mod normalization;
mod query;

pub use clinical::{
    ClinicalData, ClinicalRetriever, ClinicalSections, DosageInfo, SideEffectInfo, UsageInfo,
};
pub use context::{RagAnswer, RetrievalContext};
pub use error::{Stage, StageError};
pub use extraction::{ClinicalExtractor, RegexClinicalExtractor};
pub use intent::{DetectedIntent, IntentDetector, IntentType, LOW_CONFIDENCE_THRESHOLD};
pub use inventory::{
    fuzzy_words, match_tier, matches_term, InventoryMatch, InventoryRetriever, MatchTier,
    DEFAULT_INVENTORY_LIMIT,
};
pub use normalization::{
    candidate_terms, confidence_score, dedupe_by_code, term_type_bonus, NormalizationResult,
    NormalizationRetriever, NormalizationStrategy, DEFAULT_MAX_TERMS, DEFAULT_NORMALIZATION_LIMIT,
};
pub use query::Query;

#[cfg(test)]
pub use clinical::MockClinicalRetriever;
#[cfg(test)]
pub use inventory::MockInventoryRetriever;
#[cfg(test)]
pub use normalization::MockNormalizationRetriever;
