//! Domain layer - Core business logic and entities

pub mod error;
pub mod llm;
pub mod prompt;
pub mod rag;

pub use error::DomainError;
pub use llm::{
    FinishReason, LlmProvider, LlmRequest, LlmRequestBuilder, LlmResponse, Message, MessageRole,
    Usage,
};
pub use prompt::{PromptTemplate, PromptVariable, TemplateError};
pub use rag::{
    ClinicalData, ClinicalRetriever, DetectedIntent, IntentDetector, IntentType, InventoryMatch,
    InventoryRetriever, NormalizationResult, NormalizationRetriever, Query, RagAnswer,
    RetrievalContext, Stage, StageError,
};
