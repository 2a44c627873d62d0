use async_trait::async_trait;
use std::sync::RwLock;
use tracing::debug;

use crate::domain::rag::{
    match_tier, matches_term, InventoryMatch, InventoryRetriever, Stage, StageError,
};
use crate::domain::DomainError;

/// Catalog held in memory; same matching and ranking rules as the SQL search
#[derive(Debug, Default)]
pub struct InMemoryInventoryRetriever {
    products: RwLock<Vec<InventoryMatch>>,
}

impl InMemoryInventoryRetriever {
    pub fn new(products: Vec<InventoryMatch>) -> Self {
        Self {
            products: RwLock::new(products),
        }
    }

    pub fn insert(&self, product: InventoryMatch) -> Result<(), DomainError> {
        self.products
            .write()
            .map_err(|e| DomainError::internal(format!("Lock error: {}", e)))?
            .push(product);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.products.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl InventoryRetriever for InMemoryInventoryRetriever {
    async fn retrieve(&self, term: &str, limit: usize) -> Result<Vec<InventoryMatch>, StageError> {
        let term = term.trim();
        if term.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let products = self
            .products
            .read()
            .map_err(|e| StageError::new(Stage::Inventory, format!("Lock error: {}", e)))?;

        let mut matches: Vec<InventoryMatch> = products
            .iter()
            .filter(|p| matches_term(term, p))
            .cloned()
            .collect();

        matches.sort_by(|a, b| {
            match_tier(term, a)
                .cmp(&match_tier(term, b))
                .then_with(|| b.in_stock.cmp(&a.in_stock))
                .then_with(|| a.name.cmp(&b.name))
        });
        matches.truncate(limit);

        debug!(term = %term, rows = matches.len(), "In-memory inventory search complete");
        Ok(matches)
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
