use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::rag::extraction::{
    gate_prescription_dosage, is_presumed_otc, otc_from_product_type,
};
use crate::domain::rag::{
    ClinicalData, ClinicalExtractor, ClinicalRetriever, ClinicalSections, DetectedIntent,
    InventoryMatch, RegexClinicalExtractor, RetrievalContext, Stage, StageError,
};
use crate::domain::DomainError;
use crate::infrastructure::http::HttpClientTrait;

pub const DEFAULT_OPENFDA_BASE_URL: &str = "https://api.fda.gov";
pub const OPENFDA_SOURCE: &str = "openfda";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_LABEL_LIMIT: usize = 5;
const MAX_TERMS: usize = 3;
const MAX_INVENTORY_TERMS: usize = 2;

/// Inventory name keyword to the openFDA dosage form word it implies
static DOSAGE_FORMS: &[(&str, &str)] = &[
    ("tablet", "tablet"),
    ("tab", "tablet"),
    ("caplet", "tablet"),
    ("capsule", "capsule"),
    ("cap", "capsule"),
    ("softgel", "capsule"),
    ("syrup", "syrup"),
    ("suspension", "suspension"),
    ("solution", "solution"),
    ("liquid", "solution"),
    ("elixir", "elixir"),
    ("drops", "solution"),
    ("cream", "cream"),
    ("ointment", "ointment"),
    ("gel", "gel"),
    ("lotion", "lotion"),
    ("injection", "injection"),
    ("spray", "spray"),
    ("inhaler", "aerosol"),
    ("patch", "patch"),
    ("suppository", "suppository"),
    ("lozenge", "lozenge"),
    ("powder", "powder"),
];

static STRENGTH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(mg|mcg|µg|g|ml|iu|%)(?:\b|$)").unwrap()
});

static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]+").unwrap());

/// Dosage form implied by a product name, e.g. "Panadol 500mg Tablets" -> "tablet"
pub fn infer_dosage_form(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    WORD_PATTERN.find_iter(&lower).find_map(|word| {
        let word = word.as_str();
        let singular = word.strip_suffix('s').unwrap_or(word);
        DOSAGE_FORMS
            .iter()
            .find(|(keyword, _)| *keyword == word || *keyword == singular)
            .map(|(_, form)| *form)
    })
}

/// Strength in compact form, e.g. "Amoxil 500 mg" -> "500mg"
pub fn infer_strength(text: &str) -> Option<String> {
    STRENGTH_PATTERN
        .captures(text)
        .map(|cap| format!("{}{}", &cap[1], cap[2].to_lowercase()))
}

/// Label text spells strengths with a space, e.g. "500mg" -> "500 mg"
fn strength_phrase(strength: &str) -> String {
    match strength.find(|c: char| !(c.is_ascii_digit() || c == '.')) {
        Some(split) if split > 0 && !strength.ends_with('%') => format!("{} {}", &strength[..split], &strength[split..]),
        _ => strength.to_string(),
    }
}

/// Boolean label search: name match, optionally narrowed by form and strength
pub fn label_search(term: &str, form: Option<&str>, strength: Option<&str>) -> String {
    let mut search = format!("(openfda.generic_name:\"{term}\" OR openfda.brand_name:\"{term}\")");
    if let Some(form) = form {
        search.push_str(&format!(" AND openfda.dosage_form:\"{}\"", form.to_uppercase()));
    }
    if let Some(strength) = strength {
        search.push_str(&format!(" AND active_ingredient:\"{}\"", strength_phrase(strength)));
    }
    search
}

/// Label search terms: canonical names (or the detected name), then catalog names
pub fn clinical_terms(intent: &DetectedIntent, context: &RetrievalContext) -> Vec<String> {
    let mut primary: Vec<&str> = context
        .normalization_results
        .iter()
        .map(|r| r.canonical_name.as_str())
        .collect();
    if primary.is_empty() && intent.has_drug_name() {
        primary.push(intent.drug_name());
    }

    let inventory = context
        .inventory_matches
        .iter()
        .flat_map(InventoryMatch::alternative_names)
        .take(MAX_INVENTORY_TERMS);

    let mut seen = HashSet::new();
    primary
        .into_iter()
        .chain(inventory)
        .map(|t| t.trim().replace('"', ""))
        .filter(|t| !t.is_empty() && seen.insert(t.to_lowercase()))
        .take(MAX_TERMS)
        .collect()
}

/// Drug label retrieval from the openFDA label endpoint
pub struct OpenFdaClinicalRetriever<C: HttpClientTrait> {
    client: C,
    extractor: Box<dyn ClinicalExtractor>,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    label_limit: usize,
}

impl<C: HttpClientTrait> std::fmt::Debug for OpenFdaClinicalRetriever<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenFdaClinicalRetriever")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("label_limit", &self.label_limit)
            .finish()
    }
}

impl<C: HttpClientTrait> OpenFdaClinicalRetriever<C> {
    pub fn new(client: C) -> Self {
        Self::with_base_url(client, DEFAULT_OPENFDA_BASE_URL)
    }

    pub fn with_base_url(client: C, base_url: impl Into<String>) -> Self {
        Self {
            client,
            extractor: Box::new(RegexClinicalExtractor::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            label_limit: DEFAULT_LABEL_LIMIT,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_label_limit(mut self, label_limit: usize) -> Self {
        self.label_limit = label_limit.max(1);
        self
    }

    pub fn with_extractor(mut self, extractor: Box<dyn ClinicalExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    fn label_url(
        &self,
        term: &str,
        form: Option<&str>,
        strength: Option<&str>,
    ) -> Result<String, DomainError> {
        let search = label_search(term, form, strength);
        let limit = self.label_limit.to_string();
        let mut params = vec![("search", search.as_str()), ("limit", limit.as_str())];
        if let Some(ref key) = self.api_key {
            params.push(("api_key", key.as_str()));
        }

        reqwest::Url::parse_with_params(&format!("{}/drug/label.json", self.base_url), &params)
            .map(|url| url.to_string())
            .map_err(|e| DomainError::configuration(format!("Invalid openFDA URL: {}", e)))
    }

    /// Labels for a term, narrowed by form and strength when either is known.
    /// A narrowed search that finds nothing is retried once without the filters.
    async fn fetch_labels(
        &self,
        term: &str,
        form: Option<&str>,
        strength: Option<&str>,
    ) -> Result<Vec<LabelDocument>, DomainError> {
        if form.is_some() || strength.is_some() {
            let labels = self.search_labels(&self.label_url(term, form, strength)?).await?;
            if !labels.is_empty() {
                return Ok(labels);
            }
            debug!(term = %term, "Narrowed label search found nothing, retrying by name only");
        }

        self.search_labels(&self.label_url(term, None, None)?).await
    }

    /// One label search; a 404 is "no label", not a failure
    async fn search_labels(&self, url: &str) -> Result<Vec<LabelDocument>, DomainError> {
        let result = tokio::time::timeout(self.timeout, self.client.get_json(url, vec![]))
            .await
            .map_err(|_| DomainError::timeout("openfda", self.timeout.as_secs()))?;

        let json = match result {
            Ok(json) => json,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let response: LabelResponse = serde_json::from_value(json).map_err(|e| {
            DomainError::provider("openfda", format!("Unexpected label response: {}", e))
        })?;
        Ok(response.results)
    }

    fn build_record(
        &self,
        term: &str,
        label: &LabelDocument,
        intent: &DetectedIntent,
        context: &RetrievalContext,
        inferred_form: Option<&str>,
    ) -> ClinicalData {
        let intent_type = intent.intent_type();
        let prescription_only = match otc_from_product_type(&label.openfda.product_type) {
            Some(otc) => !otc,
            None => {
                let mut names: Vec<&str> = vec![term];
                names.extend(label.openfda.generic_name.iter().map(String::as_str));
                names.extend(label.openfda.brand_name.iter().map(String::as_str));
                !is_presumed_otc(&names)
            }
        };

        let mut sections = ClinicalSections::default();

        if intent_type.wants_dosage() {
            let text = join_fields(&[&label.dosage_and_administration, &label.directions]);
            sections.dosage = self.extractor.extract_dosage(&text).map(|dosage| {
                if prescription_only {
                    gate_prescription_dosage(dosage)
                } else {
                    dosage
                }
            });
        }

        if intent_type.wants_usage() {
            let indications = join_fields(&[&label.indications_and_usage, &label.purpose]);
            let contraindications = join_fields(&[&label.contraindications, &label.do_not_use]);
            sections.usage = self.extractor.extract_usage(&indications, &contraindications);
        }

        if intent_type.wants_side_effects() {
            let adverse = join_fields(&[&label.adverse_reactions]);
            let warnings = join_fields(&[
                &label.boxed_warning,
                &label.warnings_and_cautions,
                &label.warnings,
                &label.stop_use,
            ]);
            sections.side_effects = self.extractor.extract_side_effects(&adverse, &warnings);
        }

        let canonical_code = context
            .normalization_results
            .first()
            .map(|r| r.canonical_code.clone())
            .or_else(|| label.openfda.rxcui.first().cloned());
        let drug_name = label
            .openfda
            .generic_name
            .first()
            .map(|n| n.to_lowercase())
            .unwrap_or_else(|| term.to_string());
        let dosage_form = label
            .openfda
            .dosage_form
            .first()
            .map(|f| f.to_lowercase())
            .or_else(|| inferred_form.map(str::to_string));

        let mut record = ClinicalData::new(drug_name, OPENFDA_SOURCE).with_sections(sections);
        record.canonical_code = canonical_code;
        record.dosage_form = dosage_form;
        record.prescription_only = prescription_only;
        record
    }
}

/// Dosage form match first, then strength match, else the first label
fn select_label<'a>(
    labels: &'a [LabelDocument],
    form: Option<&str>,
    strength: Option<&str>,
) -> Option<&'a LabelDocument> {
    form.and_then(|form| labels.iter().find(|l| l.has_dosage_form(form)))
        .or_else(|| strength.and_then(|s| labels.iter().find(|l| l.has_strength(s))))
        .or_else(|| labels.first())
}

fn join_fields(fields: &[&Vec<String>]) -> String {
    fields
        .iter()
        .flat_map(|f| f.iter())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl<C: HttpClientTrait> ClinicalRetriever for OpenFdaClinicalRetriever<C> {
    async fn retrieve(
        &self,
        intent: &DetectedIntent,
        context: &RetrievalContext,
    ) -> Result<Vec<ClinicalData>, StageError> {
        let terms = clinical_terms(intent, context);
        if terms.is_empty() {
            debug!("No clinical search terms, skipping label lookup");
            return Ok(Vec::new());
        }

        let best_match = context.inventory_matches.first();
        let inferred_form = best_match.and_then(|m| {
            m.dosage_form
                .as_deref()
                .and_then(infer_dosage_form)
                .or_else(|| infer_dosage_form(&m.name))
        });
        let strength = best_match.and_then(|m| infer_strength(&m.name));

        let mut failures: Vec<DomainError> = Vec::new();
        for term in &terms {
            match self
                .fetch_labels(term, inferred_form, strength.as_deref())
                .await
            {
                Ok(labels) => {
                    let Some(label) = select_label(&labels, inferred_form, strength.as_deref())
                    else {
                        debug!(term = %term, "No openFDA label for term");
                        continue;
                    };

                    let record = self.build_record(term, label, intent, context, inferred_form);
                    info!(
                        term = %term,
                        labels = labels.len(),
                        prescription_only = record.prescription_only,
                        "openFDA label retrieved"
                    );
                    return Ok(vec![record]);
                }
                Err(e) => {
                    warn!(term = %term, error = %e, "openFDA label lookup failed");
                    failures.push(e);
                }
            }
        }

        if failures.len() == terms.len() {
            if let Some(last) = failures.last() {
                return Err(StageError::from_domain(Stage::Clinical, last));
            }
        }

        Ok(Vec::new())
    }
}

// openFDA label types

#[derive(Debug, Deserialize)]
struct LabelResponse {
    #[serde(default)]
    results: Vec<LabelDocument>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LabelDocument {
    openfda: OpenFdaFields,
    dosage_and_administration: Vec<String>,
    directions: Vec<String>,
    indications_and_usage: Vec<String>,
    purpose: Vec<String>,
    contraindications: Vec<String>,
    do_not_use: Vec<String>,
    adverse_reactions: Vec<String>,
    boxed_warning: Vec<String>,
    warnings_and_cautions: Vec<String>,
    warnings: Vec<String>,
    stop_use: Vec<String>,
    active_ingredient: Vec<String>,
    package_label_principal_display_panel: Vec<String>,
    spl_product_data_elements: Vec<String>,
}

impl LabelDocument {
    fn has_dosage_form(&self, form: &str) -> bool {
        let form = form.to_lowercase();
        self.openfda
            .dosage_form
            .iter()
            .chain(self.spl_product_data_elements.iter())
            .any(|f| f.to_lowercase().contains(&form))
    }

    fn has_strength(&self, strength: &str) -> bool {
        self.active_ingredient
            .iter()
            .chain(self.package_label_principal_display_panel.iter())
            .chain(self.spl_product_data_elements.iter())
            .any(|text| {
                let compact: String = text
                    .to_lowercase()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                compact.contains(strength)
            })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OpenFdaFields {
    generic_name: Vec<String>,
    brand_name: Vec<String>,
    product_type: Vec<String>,
    dosage_form: Vec<String>,
    rxcui: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rag::extraction::PRESCRIPTION_DOSAGE_NOTICE;
    use crate::domain::rag::{
        DosageInfo, IntentType, NormalizationResult, NormalizationStrategy, Query,
        SideEffectInfo, UsageInfo,
    };
    use crate::infrastructure::http::MockHttpClient;
    use serde_json::json;

    fn detected(intent_type: IntentType, drug: &str) -> DetectedIntent {
        DetectedIntent::new(intent_type, drug, 0.8, format!("question about {drug}"))
    }

    fn context_for(intent: &DetectedIntent) -> RetrievalContext {
        RetrievalContext::new(Query::new(intent.raw_query()), intent.clone())
    }

    fn ibuprofen_label() -> serde_json::Value {
        json!({
            "openfda": {
                "generic_name": ["IBUPROFEN"],
                "brand_name": ["Advil"],
                "product_type": ["HUMAN OTC DRUG"],
                "rxcui": ["310965"]
            },
            "dosage_and_administration": [
                "Directions adults and children 12 years and over: take 1 tablet every 4 to 6 hours while symptoms persist. do not exceed 6 tablets in 24 hours."
            ],
            "indications_and_usage": ["Uses temporarily relieves minor aches • headache • toothache"],
            "adverse_reactions": ["The most common adverse reactions are nausea, heartburn and dizziness."],
            "warnings": ["Allergy alert: ibuprofen may cause a severe allergic reaction."]
        })
    }

    fn retriever_with(term: &str, body: serde_json::Value) -> OpenFdaClinicalRetriever<MockHttpClient> {
        let urls = OpenFdaClinicalRetriever::new(MockHttpClient::new());
        let url = urls.label_url(term, None, None).unwrap();
        OpenFdaClinicalRetriever::new(MockHttpClient::new().with_response(url, body))
    }

    #[test]
    fn test_label_url_encodes_search() {
        let retriever = OpenFdaClinicalRetriever::new(MockHttpClient::new())
            .with_api_key(Some("fda-key".to_string()));
        let url = retriever.label_url("ibuprofen", None, None).unwrap();

        assert!(url.starts_with("https://api.fda.gov/drug/label.json?search="));
        assert!(url.contains("openfda.generic_name%3A%22ibuprofen%22+OR+openfda.brand_name%3A%22ibuprofen%22"));
        assert!(url.contains("&limit=5"));
        assert!(url.ends_with("&api_key=fda-key"));
        assert!(!url.contains("dosage_form"));
    }

    #[test]
    fn test_label_search_narrowed_by_form_and_strength() {
        assert_eq!(
            label_search("ibuprofen", Some("tablet"), Some("400mg")),
            "(openfda.generic_name:\"ibuprofen\" OR openfda.brand_name:\"ibuprofen\") \
             AND openfda.dosage_form:\"TABLET\" AND active_ingredient:\"400 mg\""
        );
        assert_eq!(
            label_search("hydrocortisone", Some("cream"), None),
            "(openfda.generic_name:\"hydrocortisone\" OR openfda.brand_name:\"hydrocortisone\") \
             AND openfda.dosage_form:\"CREAM\""
        );
        assert!(label_search("calpol", None, Some("120mg")).ends_with("active_ingredient:\"120 mg\""));
        assert!(label_search("hydrocortisone", None, Some("1%")).ends_with("active_ingredient:\"1%\""));

        let url = OpenFdaClinicalRetriever::new(MockHttpClient::new())
            .label_url("ibuprofen", Some("tablet"), Some("400mg"))
            .unwrap();
        assert!(url.contains("+AND+openfda.dosage_form%3A%22TABLET%22+AND+active_ingredient%3A%22400+mg%22"));
    }

    #[test]
    fn test_infer_form_and_strength() {
        assert_eq!(infer_dosage_form("Panadol 500mg Tablets"), Some("tablet"));
        assert_eq!(infer_dosage_form("Amoxil 250 mg Caps"), Some("capsule"));
        assert_eq!(infer_dosage_form("Hydrocortisone Cream 1%"), Some("cream"));
        assert_eq!(infer_dosage_form("Ibuprofen"), None);

        assert_eq!(infer_strength("Amoxil 500 MG capsules").as_deref(), Some("500mg"));
        assert_eq!(infer_strength("Calpol 120mg/5ml").as_deref(), Some("120mg"));
        assert_eq!(infer_strength("Vitamin C"), None);
    }

    #[test]
    fn test_clinical_terms_order_and_cap() {
        let intent = detected(IntentType::Dosage, "advil");
        let mut context = context_for(&intent);
        context.normalization_results.push(NormalizationResult {
            canonical_code: "5640".to_string(),
            canonical_name: "ibuprofen".to_string(),
            synonyms: vec![],
            term_type: "IN".to_string(),
            confidence_score: 1.0,
            matched_term: "advil".to_string(),
            strategy: NormalizationStrategy::Exact,
        });
        context.inventory_matches.push(
            InventoryMatch::new("1", "Advil 200mg Tablets", 10)
                .with_generic_name("Ibuprofen")
                .with_brand("Advil"),
        );
        context
            .inventory_matches
            .push(InventoryMatch::new("2", "Motrin", 4).with_brand("Motrin IB"));

        assert_eq!(clinical_terms(&intent, &context), vec!["ibuprofen", "Advil"]);
    }

    #[test]
    fn test_clinical_terms_fall_back_to_intent() {
        let intent = detected(IntentType::Usage, "metformin");
        assert_eq!(clinical_terms(&intent, &context_for(&intent)), vec!["metformin"]);

        let empty = DetectedIntent::new(IntentType::Unknown, "", 0.1, "hello");
        assert!(clinical_terms(&empty, &context_for(&empty)).is_empty());
    }

    #[tokio::test]
    async fn test_dosage_intent_populates_only_dosage() {
        let retriever = retriever_with("ibuprofen", json!({"results": [ibuprofen_label()]}));
        let intent = detected(IntentType::Dosage, "ibuprofen");

        let records = retriever.retrieve(&intent, &context_for(&intent)).await.unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.drug_name, "ibuprofen");
        assert_eq!(record.source, OPENFDA_SOURCE);
        assert_eq!(record.canonical_code.as_deref(), Some("310965"));
        assert!(!record.prescription_only);
        let dosage = record.sections.dosage.as_ref().unwrap();
        assert_eq!(dosage.frequency.as_deref(), Some("every 4 to 6 hours"));
        assert!(record.sections.usage.is_none());
        assert!(record.sections.side_effects.is_none());
    }

    #[tokio::test]
    async fn test_side_effect_intent_populates_only_side_effects() {
        let retriever = retriever_with("ibuprofen", json!({"results": [ibuprofen_label()]}));
        let intent = detected(IntentType::SideEffects, "ibuprofen");

        let records = retriever.retrieve(&intent, &context_for(&intent)).await.unwrap();

        let sections = &records[0].sections;
        assert!(sections.dosage.is_none());
        assert!(sections.usage.is_none());
        let effects = sections.side_effects.as_ref().unwrap();
        assert_eq!(effects.common, vec!["nausea", "heartburn", "dizziness"]);
    }

    #[tokio::test]
    async fn test_general_intent_attempts_all_sections() {
        let retriever = retriever_with("ibuprofen", json!({"results": [ibuprofen_label()]}));
        let intent = detected(IntentType::General, "ibuprofen");

        let records = retriever.retrieve(&intent, &context_for(&intent)).await.unwrap();

        let sections = &records[0].sections;
        assert!(sections.dosage.is_some());
        assert!(sections.usage.is_some());
        assert!(sections.side_effects.is_some());
    }

    struct FixedExtractor;

    impl ClinicalExtractor for FixedExtractor {
        fn extract_dosage(&self, _dosage_text: &str) -> Option<DosageInfo> {
            None
        }

        fn extract_usage(&self, _indications: &str, _contraindications: &str) -> Option<UsageInfo> {
            Some(UsageInfo {
                purpose: Some("pain reliever".to_string()),
                ..Default::default()
            })
        }

        fn extract_side_effects(&self, _adverse: &str, _warnings: &str) -> Option<SideEffectInfo> {
            None
        }
    }

    #[tokio::test]
    async fn test_custom_extractor_replaces_default() {
        let retriever = retriever_with("ibuprofen", json!({"results": [ibuprofen_label()]}))
            .with_extractor(Box::new(FixedExtractor));
        let intent = detected(IntentType::General, "ibuprofen");

        let records = retriever.retrieve(&intent, &context_for(&intent)).await.unwrap();

        let sections = &records[0].sections;
        assert!(sections.dosage.is_none());
        assert!(sections.side_effects.is_none());
        assert_eq!(
            sections.usage.as_ref().unwrap().purpose.as_deref(),
            Some("pain reliever")
        );
    }

    #[tokio::test]
    async fn test_prescription_label_gates_adult_dosage() {
        let label = json!({
            "openfda": {"generic_name": ["AMOXICILLIN"], "product_type": ["HUMAN PRESCRIPTION DRUG"]},
            "dosage_and_administration": ["Adults: 500 mg every 8 hours. Children: 25 mg/kg/day in divided doses."]
        });
        let retriever = retriever_with("amoxicillin", json!({"results": [label]}));
        let intent = detected(IntentType::Dosage, "amoxicillin");

        let records = retriever.retrieve(&intent, &context_for(&intent)).await.unwrap();

        assert!(records[0].prescription_only);
        let dosage = records[0].sections.dosage.as_ref().unwrap();
        assert_eq!(dosage.adult.as_deref(), Some(PRESCRIPTION_DOSAGE_NOTICE));
        assert_eq!(dosage.frequency.as_deref(), Some("every 8 hours"));
        assert!(dosage.summary.is_none());
        assert!(dosage.max_daily.is_none());
    }

    #[tokio::test]
    async fn test_missing_product_type_uses_otc_list() {
        let label = json!({
            "openfda": {"generic_name": ["AMOXICILLIN"]},
            "dosage_and_administration": ["Adults: 500 mg every 8 hours."]
        });
        let retriever = retriever_with("amoxicillin", json!({"results": [label]}));
        let intent = detected(IntentType::Dosage, "amoxicillin");

        let records = retriever.retrieve(&intent, &context_for(&intent)).await.unwrap();
        assert!(records[0].prescription_only);

        let label = json!({
            "openfda": {"generic_name": ["LORATADINE"]},
            "dosage_and_administration": ["Adults: take 1 tablet daily."]
        });
        let retriever = retriever_with("loratadine", json!({"results": [label]}));
        let intent = detected(IntentType::Dosage, "loratadine");

        let records = retriever.retrieve(&intent, &context_for(&intent)).await.unwrap();
        assert!(!records[0].prescription_only);
        assert_eq!(
            records[0].sections.dosage.as_ref().unwrap().adult.as_deref(),
            Some("take 1 tablet daily")
        );
    }

    #[tokio::test]
    async fn test_not_found_moves_to_next_term() {
        let urls = OpenFdaClinicalRetriever::new(MockHttpClient::new());
        let client = MockHttpClient::new()
            .with_not_found(urls.label_url("tylenol", None, Some("500mg")).unwrap())
            .with_not_found(urls.label_url("tylenol", None, None).unwrap())
            .with_response(
                urls.label_url("Acetaminophen", None, Some("500mg")).unwrap(),
                json!({"results": [{"openfda": {"generic_name": ["ACETAMINOPHEN"]}}]}),
            );
        let retriever = OpenFdaClinicalRetriever::new(client);

        let intent = detected(IntentType::Usage, "tylenol");
        let mut context = context_for(&intent);
        context
            .inventory_matches
            .push(InventoryMatch::new("7", "Tylenol 500mg", 8).with_generic_name("Acetaminophen"));

        let records = retriever.retrieve(&intent, &context).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].drug_name, "acetaminophen");
        assert_eq!(retriever.client.requested_urls().len(), 3);
    }

    #[tokio::test]
    async fn test_all_not_found_is_empty_not_error() {
        let urls = OpenFdaClinicalRetriever::new(MockHttpClient::new());
        let client = MockHttpClient::new().with_not_found(urls.label_url("xyzzy", None, None).unwrap());
        let retriever = OpenFdaClinicalRetriever::new(client);
        let intent = detected(IntentType::Dosage, "xyzzy");

        assert!(retriever.retrieve(&intent, &context_for(&intent)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_terms_failing_is_stage_error() {
        let retriever = OpenFdaClinicalRetriever::new(MockHttpClient::new());
        let intent = detected(IntentType::Dosage, "ibuprofen");

        let err = retriever
            .retrieve(&intent, &context_for(&intent))
            .await
            .unwrap_err();
        assert_eq!(err.stage, Stage::Clinical);
    }

    #[tokio::test]
    async fn test_prefers_label_matching_inventory_form() {
        let capsule = json!({
            "openfda": {"generic_name": ["IBUPROFEN"], "dosage_form": ["CAPSULE, LIQUID FILLED"]},
            "active_ingredient": ["Ibuprofen 200 mg"]
        });
        let tablet = json!({
            "openfda": {"generic_name": ["IBUPROFEN"], "dosage_form": ["TABLET, FILM COATED"]},
            "active_ingredient": ["Ibuprofen 400 mg"]
        });
        let urls = OpenFdaClinicalRetriever::new(MockHttpClient::new());
        let narrowed = urls.label_url("ibuprofen", Some("tablet"), Some("400mg")).unwrap();
        let retriever = OpenFdaClinicalRetriever::new(
            MockHttpClient::new().with_response(narrowed.clone(), json!({"results": [capsule, tablet]})),
        );

        let intent = detected(IntentType::Dosage, "ibuprofen");
        let mut context = context_for(&intent);
        context
            .inventory_matches
            .push(InventoryMatch::new("1", "Ibuprofen 400mg Tablets", 5));

        let records = retriever.retrieve(&intent, &context).await.unwrap();
        assert_eq!(records[0].dosage_form.as_deref(), Some("tablet, film coated"));
        assert_eq!(retriever.client.requested_urls(), vec![narrowed]);
    }

    #[tokio::test]
    async fn test_narrowed_search_falls_back_to_name_only() {
        let urls = OpenFdaClinicalRetriever::new(MockHttpClient::new());
        let narrowed = urls.label_url("ibuprofen", Some("capsule"), Some("200mg")).unwrap();
        let plain = urls.label_url("ibuprofen", None, None).unwrap();

        let intent = detected(IntentType::Dosage, "ibuprofen");
        let mut context = context_for(&intent);
        context
            .inventory_matches
            .push(InventoryMatch::new("1", "Ibuprofen 200mg Capsules", 5));

        for narrowed_client in [
            MockHttpClient::new().with_not_found(narrowed.clone()),
            MockHttpClient::new().with_response(narrowed.clone(), json!({"results": []})),
        ] {
            let retriever = OpenFdaClinicalRetriever::new(
                narrowed_client.with_response(plain.clone(), json!({"results": [ibuprofen_label()]})),
            );

            let records = retriever.retrieve(&intent, &context).await.unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].drug_name, "ibuprofen");
            assert_eq!(retriever.client.requested_urls(), vec![narrowed.clone(), plain.clone()]);
        }
    }

    #[test]
    fn test_select_label_by_strength() {
        let labels = vec![
            LabelDocument {
                active_ingredient: vec!["Paracetamol 250 mg".to_string()],
                ..Default::default()
            },
            LabelDocument {
                active_ingredient: vec!["Paracetamol 500 mg".to_string()],
                ..Default::default()
            },
        ];

        let selected = select_label(&labels, Some("tablet"), Some("500mg")).unwrap();
        assert_eq!(selected.active_ingredient[0], "Paracetamol 500 mg");
        assert!(select_label(&[], None, None).is_none());
    }
}
