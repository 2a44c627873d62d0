//! Request/response types for the HTTP API

pub mod error;
pub mod json;
pub mod query;

pub use error::{ApiError, ApiErrorDetail, ApiErrorResponse, ApiErrorType};
pub use json::Json;
pub use query::{QueryRequest, QueryResponse, MAX_QUERY_CHARS};
