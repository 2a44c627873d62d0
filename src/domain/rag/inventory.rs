//! Local product catalog matches

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use super::StageError;
use crate::domain::DomainError;

/// Default cap on inventory rows returned for one query
pub const DEFAULT_INVENTORY_LIMIT: usize = 10;

/// Snapshot of one catalog row at query time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryMatch {
    pub id: String,
    pub name: String,
    pub generic_name: Option<String>,
    pub brand: Option<String>,
    pub category: String,
    pub in_stock: bool,
    pub quantity: i32,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub dosage_form: Option<String>,
    pub unit: Option<String>,
    pub supplier: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub min_stock_level: Option<i32>,
}

impl InventoryMatch {
    pub fn new(id: impl Into<String>, name: impl Into<String>, quantity: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            generic_name: None,
            brand: None,
            category: "Uncategorized".to_string(),
            in_stock: quantity > 0,
            quantity,
            price: None,
            description: None,
            dosage_form: None,
            unit: None,
            supplier: None,
            expiry_date: None,
            min_stock_level: None,
        }
    }

    pub fn with_generic_name(mut self, generic_name: impl Into<String>) -> Self {
        self.generic_name = Some(generic_name.into());
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_dosage_form(mut self, form: impl Into<String>) -> Self {
        self.dosage_form = Some(form.into());
        self
    }

    pub fn with_min_stock_level(mut self, level: i32) -> Self {
        self.min_stock_level = Some(level);
        self
    }

    /// At or below the configured reorder level
    pub fn low_stock(&self) -> bool {
        self.min_stock_level.is_some_and(|level| self.quantity <= level)
    }

    /// Generic name first, then brand; blanks skipped
    pub fn alternative_names(&self) -> impl Iterator<Item = &str> {
        [self.generic_name.as_deref(), self.brand.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// Ranking tier of a catalog row against the search term (lower ranks first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    ExactName = 1,
    ExactGeneric = 2,
    ExactBrand = 3,
    Partial = 4,
}

pub fn match_tier(term: &str, item: &InventoryMatch) -> MatchTier {
    let eq = |value: Option<&str>| {
        value.is_some_and(|v| v.trim().eq_ignore_ascii_case(term.trim()))
    };

    if eq(Some(item.name.as_str())) {
        MatchTier::ExactName
    } else if eq(item.generic_name.as_deref()) {
        MatchTier::ExactGeneric
    } else if eq(item.brand.as_deref()) {
        MatchTier::ExactBrand
    } else {
        MatchTier::Partial
    }
}

/// Extra per-word terms, only when the term has two or more words longer than 2 chars
pub fn fuzzy_words(term: &str) -> Vec<String> {
    let words: Vec<String> = term
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect();

    if words.len() >= 2 { words } else { Vec::new() }
}

/// Case-insensitive containment over name, generic name and brand, plus fuzzy words
pub fn matches_term(term: &str, item: &InventoryMatch) -> bool {
    let needle = term.trim().to_lowercase();
    let haystacks: Vec<String> = [
        Some(item.name.as_str()),
        item.generic_name.as_deref(),
        item.brand.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::to_lowercase)
    .collect();

    let contains = |n: &str| haystacks.iter().any(|h| h.contains(n));

    contains(needle.as_str()) || fuzzy_words(term).iter().any(|w| contains(w.as_str()))
}

/// Stage 2: product catalog lookup
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InventoryRetriever: Send + Sync {
    /// Ranked catalog rows for a candidate drug name, at most `limit`
    async fn retrieve(&self, term: &str, limit: usize) -> Result<Vec<InventoryMatch>, StageError>;

    /// Connectivity probe used by the readiness endpoint
    async fn ping(&self) -> Result<(), DomainError>;
}
