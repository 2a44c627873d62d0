//! Query pipeline orchestration

mod orchestrator;

pub use orchestrator::RagOrchestrator;
