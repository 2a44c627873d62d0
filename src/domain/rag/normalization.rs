//! Drug name normalization to canonical RxNorm concepts

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use super::StageError;

pub const DEFAULT_NORMALIZATION_LIMIT: usize = 5;
pub const DEFAULT_MAX_TERMS: usize = 4;
const MIN_TERM_LEN: usize = 3;
const MAX_TERM_LEN: usize = 100;

/// Lookup tier that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationStrategy {
    Exact,
    Approximate,
    Spelling,
}

/// A canonical concept for a free-text drug name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationResult {
    pub canonical_code: String,
    pub canonical_name: String,
    pub synonyms: Vec<String>,
    pub term_type: String,
    pub confidence_score: f32,
    pub matched_term: String,
    pub strategy: NormalizationStrategy,
}

impl NormalizationResult {
    /// Ingredient-level concept (IN, PIN, MIN)
    pub fn is_ingredient(&self) -> bool {
        matches!(self.term_type.as_str(), "IN" | "PIN" | "MIN")
    }
}

/// Term-type bonus: ingredients over clinical drugs over brand/pack concepts
pub fn term_type_bonus(term_type: &str) -> f32 {
    match term_type {
        "IN" | "PIN" | "MIN" => 0.1,
        "SCD" | "SCDC" | "SCDF" | "SCDG" => 0.05,
        _ => 0.0,
    }
}

/// Combine the tier base with the upstream score (approximate tier only) and the TTY bonus
pub fn confidence_score(strategy: NormalizationStrategy, api_score: Option<f32>, term_type: &str) -> f32 {
    let base = match strategy {
        NormalizationStrategy::Exact => 0.9,
        NormalizationStrategy::Spelling => 0.7,
        NormalizationStrategy::Approximate => match api_score {
            Some(score) => score.clamp(0.0, 100.0) / 100.0 * 0.8,
            None => 0.6,
        },
    };

    (base + term_type_bonus(term_type)).clamp(0.0, 1.0)
}

/// Trim, length-filter and case-insensitively deduplicate candidate terms, keeping order
pub fn candidate_terms<'a>(terms: impl IntoIterator<Item = &'a str>, max_terms: usize) -> Vec<String> {
    let mut seen = HashSet::new();

    terms
        .into_iter()
        .map(str::trim)
        .filter(|t| (MIN_TERM_LEN..=MAX_TERM_LEN).contains(&t.chars().count()))
        .filter(|t| seen.insert(t.to_lowercase()))
        .take(max_terms)
        .map(str::to_string)
        .collect()
}

/// One result per canonical code (highest confidence wins), best first, capped
pub fn dedupe_by_code(results: Vec<NormalizationResult>, limit: usize) -> Vec<NormalizationResult> {
    let mut best: HashMap<String, NormalizationResult> = HashMap::new();

    for result in results {
        match best.get(&result.canonical_code) {
            Some(existing) if existing.confidence_score >= result.confidence_score => {}
            _ => {
                best.insert(result.canonical_code.clone(), result);
            }
        }
    }

    let mut deduped: Vec<NormalizationResult> = best.into_values().collect();
    deduped.sort_by(|a, b| {
        b.confidence_score
            .total_cmp(&a.confidence_score)
            .then_with(|| a.canonical_code.cmp(&b.canonical_code))
    });
    deduped.truncate(limit);
    deduped
}

/// Stage 3: terminology service lookup
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NormalizationRetriever: Send + Sync {
    /// Canonical concepts for the given candidate terms, deduplicated by code
    async fn normalize(&self, terms: &[String]) -> Result<Vec<NormalizationResult>, StageError>;
}
