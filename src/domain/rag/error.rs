use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DomainError;

/// Pipeline stage identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Intent,
    Inventory,
    Normalization,
    Clinical,
    Compilation,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intent => "intent",
            Self::Inventory => "inventory",
            Self::Normalization => "normalization",
            Self::Clinical => "clinical",
            Self::Compilation => "compilation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal failure of a single pipeline stage
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{stage} stage failed: {message}")]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
}

impl StageError {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }

    pub fn from_domain(stage: Stage, error: &DomainError) -> Self {
        Self::new(stage, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_display() {
        let err = StageError::new(Stage::Clinical, "HTTP 500");
        assert_eq!(err.to_string(), "clinical stage failed: HTTP 500");
    }

    #[test]
    fn test_stage_error_from_domain() {
        let err = StageError::from_domain(Stage::Inventory, &DomainError::storage("pool closed"));
        assert_eq!(err.stage, Stage::Inventory);
        assert_eq!(err.message, "Storage error: pool closed");
    }

    #[test]
    fn test_stage_serialization() {
        let err = StageError::new(Stage::Normalization, "timeout");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["stage"], "normalization");
        assert_eq!(json["message"], "timeout");
    }
}
