//! Infrastructure layer - External service implementations

pub mod clinical;
pub mod compiler;
pub mod http;
pub mod inventory;
pub mod llm;
pub mod logging;
pub mod normalization;
pub mod observability;
pub mod rag;
