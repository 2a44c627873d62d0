//! `POST /v1/rag/query` bodies

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::{DetectedIntent, RagAnswer, StageError};

pub const MAX_QUERY_CHARS: usize = 1000;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QueryRequest {
    #[validate(
        length(min = 1, max = 1000, message = "Query must be between 1 and 1000 characters"),
        custom(function = "not_blank")
    )]
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some("Query must not be blank".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query_id: Uuid,
    pub response: String,
    pub intent: DetectedIntent,
    pub sources: Vec<String>,
    pub errors: Vec<StageError>,
}

impl From<RagAnswer> for QueryResponse {
    fn from(answer: RagAnswer) -> Self {
        Self {
            query_id: answer.query_id,
            response: answer.response,
            intent: answer.intent,
            sources: answer.sources,
            errors: answer.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(query: &str) -> QueryRequest {
        QueryRequest {
            query: query.to_string(),
            user_id: None,
        }
    }

    #[test]
    fn test_validation_bounds() {
        assert!(request("dose of ibuprofen").validate().is_ok());
        assert!(request("").validate().is_err());
        assert!(request("   ").validate().is_err());
        assert!(request(&"a".repeat(MAX_QUERY_CHARS)).validate().is_ok());
        assert!(request(&"a".repeat(MAX_QUERY_CHARS + 1)).validate().is_err());
    }
}
