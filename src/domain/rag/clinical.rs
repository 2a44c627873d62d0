//! Clinical label data gathered for a query

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use super::{DetectedIntent, RetrievalContext, StageError};

/// Dosage fields mined from a label's dosage-and-administration text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DosageInfo {
    pub adult: Option<String>,
    pub child: Option<String>,
    pub frequency: Option<String>,
    pub max_daily: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageInfo {
    pub indications: Vec<String>,
    pub purpose: Option<String>,
    pub contraindications: Vec<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideEffectInfo {
    pub common: Vec<String>,
    pub serious: Vec<String>,
    pub summary: Option<String>,
}

/// Only sections relevant to the detected intent are ever populated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalSections {
    pub dosage: Option<DosageInfo>,
    pub usage: Option<UsageInfo>,
    pub side_effects: Option<SideEffectInfo>,
}

/// One record per successfully queried label source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalData {
    pub canonical_code: Option<String>,
    pub drug_name: String,
    pub sections: ClinicalSections,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub dosage_form: Option<String>,
    pub prescription_only: bool,
}

impl ClinicalData {
    pub fn new(drug_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            canonical_code: None,
            drug_name: drug_name.into(),
            sections: ClinicalSections::default(),
            source: source.into(),
            fetched_at: Utc::now(),
            dosage_form: None,
            prescription_only: false,
        }
    }

    pub fn with_sections(mut self, sections: ClinicalSections) -> Self {
        self.sections = sections;
        self
    }
}

/// Stage 4: drug label lookup and extraction
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClinicalRetriever: Send + Sync {
    /// Label-derived data for the intent's drug, using earlier stages' output
    async fn retrieve(
        &self,
        intent: &DetectedIntent,
        context: &RetrievalContext,
    ) -> Result<Vec<ClinicalData>, StageError>;
}
