//! Application state for shared services

use std::sync::Arc;

use crate::infrastructure::rag::RagOrchestrator;

/// Shared across handlers; every client inside is constructed once at bootstrap
#[derive(Clone, Debug)]
pub struct AppState {
    pub orchestrator: Arc<RagOrchestrator>,
    /// Whether inventory is backed by PostgreSQL rather than the in-memory catalog
    pub database_configured: bool,
}

impl AppState {
    pub fn new(orchestrator: RagOrchestrator, database_configured: bool) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            database_configured,
        }
    }
}
