use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::rag::{
    candidate_terms, confidence_score, dedupe_by_code, NormalizationResult,
    NormalizationRetriever, NormalizationStrategy, Stage, StageError, DEFAULT_MAX_TERMS,
    DEFAULT_NORMALIZATION_LIMIT,
};
use crate::domain::DomainError;
use crate::infrastructure::http::HttpClientTrait;

pub const DEFAULT_RXNAV_BASE_URL: &str = "https://rxnav.nlm.nih.gov/REST";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const APPROXIMATE_MAX_ENTRIES: usize = 3;
const SPELLING_SUGGESTIONS: usize = 2;
const UNKNOWN_TERM_TYPE: &str = "UNKNOWN";

/// RxNorm normalization through the NLM RxNav REST API
#[derive(Debug)]
pub struct RxNavNormalizationRetriever<C: HttpClientTrait> {
    client: C,
    base_url: String,
    timeout: Duration,
    max_results: usize,
    max_terms: usize,
}

/// Results and failed call count for one candidate term
#[derive(Debug, Default)]
struct TermOutcome {
    results: Vec<NormalizationResult>,
    failures: Vec<DomainError>,
}

impl<C: HttpClientTrait> RxNavNormalizationRetriever<C> {
    pub fn new(client: C) -> Self {
        Self::with_base_url(client, DEFAULT_RXNAV_BASE_URL)
    }

    pub fn with_base_url(client: C, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_results: DEFAULT_NORMALIZATION_LIMIT,
            max_terms: DEFAULT_MAX_TERMS,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_max_terms(mut self, max_terms: usize) -> Self {
        self.max_terms = max_terms;
        self
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<String, DomainError> {
        let raw = format!("{}{}", self.base_url, path);
        let parsed = if params.is_empty() {
            reqwest::Url::parse(&raw)
        } else {
            reqwest::Url::parse_with_params(&raw, params)
        };

        parsed
            .map(|url| url.to_string())
            .map_err(|e| DomainError::configuration(format!("Invalid RxNav URL: {}", e)))
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, DomainError> {
        let json = tokio::time::timeout(self.timeout, self.client.get_json(url, vec![]))
            .await
            .map_err(|_| DomainError::timeout("rxnav", self.timeout.as_secs()))??;

        serde_json::from_value(json)
            .map_err(|e| DomainError::provider("rxnav", format!("Unexpected response shape: {}", e)))
    }

    /// RxCUIs for an exact or normalized name match
    async fn exact_codes(&self, term: &str) -> Result<Vec<String>, DomainError> {
        let url = self.url("/rxcui.json", &[("name", term), ("search", "2")])?;
        let response: RxcuiResponse = self.fetch(&url).await?;
        Ok(response.id_group.rxnorm_id)
    }

    /// Distinct candidate RxCUIs with their upstream scores, best first
    async fn approximate_codes(&self, term: &str) -> Result<Vec<(String, Option<f32>)>, DomainError> {
        let max_entries = APPROXIMATE_MAX_ENTRIES.to_string();
        let url = self.url(
            "/approximateTerm.json",
            &[("term", term), ("maxEntries", max_entries.as_str())],
        )?;
        let response: ApproximateResponse = self.fetch(&url).await?;

        let mut codes: Vec<(String, Option<f32>)> = Vec::new();
        for candidate in response.approximate_group.candidate {
            if candidate.rxcui.is_empty() || codes.iter().any(|(code, _)| *code == candidate.rxcui) {
                continue;
            }
            let score = candidate.score.as_deref().and_then(|s| s.parse::<f32>().ok());
            codes.push((candidate.rxcui, score));
            if codes.len() == APPROXIMATE_MAX_ENTRIES {
                break;
            }
        }
        Ok(codes)
    }

    async fn spelling_suggestions(&self, term: &str) -> Result<Vec<String>, DomainError> {
        let url = self.url("/spellingsuggestions.json", &[("name", term)])?;
        let response: SpellingResponse = self.fetch(&url).await?;

        Ok(response
            .suggestion_group
            .suggestion_list
            .map(|list| list.suggestion)
            .unwrap_or_default()
            .into_iter()
            .take(SPELLING_SUGGESTIONS)
            .collect())
    }

    /// Concept properties; a failed lookup keeps the hit under the searched term
    async fn enrich(
        &self,
        code: String,
        term: &str,
        strategy: NormalizationStrategy,
        api_score: Option<f32>,
    ) -> NormalizationResult {
        let properties = match self.url(&format!("/rxcui/{}/properties.json", code), &[]) {
            Ok(url) => self.fetch::<PropertiesResponse>(&url).await.map(|r| r.properties),
            Err(e) => Err(e),
        };

        let (name, synonyms, tty) = match properties {
            Ok(Some(props)) => {
                let synonyms = props
                    .synonym
                    .filter(|s| !s.trim().is_empty())
                    .into_iter()
                    .collect();
                (props.name, synonyms, props.tty)
            }
            Ok(None) => (term.to_string(), Vec::new(), UNKNOWN_TERM_TYPE.to_string()),
            Err(e) => {
                debug!(rxcui = %code, error = %e, "RxNav property lookup failed");
                (term.to_string(), Vec::new(), UNKNOWN_TERM_TYPE.to_string())
            }
        };

        NormalizationResult {
            confidence_score: confidence_score(strategy, api_score, &tty),
            canonical_code: code,
            canonical_name: name,
            synonyms,
            term_type: tty,
            matched_term: term.to_string(),
            strategy,
        }
    }

    async fn enrich_all(
        &self,
        codes: Vec<(String, Option<f32>)>,
        term: &str,
        strategy: NormalizationStrategy,
    ) -> Vec<NormalizationResult> {
        join_all(
            codes
                .into_iter()
                .map(|(code, score)| self.enrich(code, term, strategy, score)),
        )
        .await
    }

    /// Exact, then approximate, then spelling; the first tier with hits wins
    async fn lookup_term(&self, term: &str) -> TermOutcome {
        let mut outcome = TermOutcome::default();

        match self.exact_codes(term).await {
            Ok(codes) if !codes.is_empty() => {
                let codes = codes.into_iter().map(|c| (c, None)).collect();
                outcome.results = self.enrich_all(codes, term, NormalizationStrategy::Exact).await;
                return outcome;
            }
            Ok(_) => {}
            Err(e) => outcome.failures.push(e),
        }

        match self.approximate_codes(term).await {
            Ok(codes) if !codes.is_empty() => {
                outcome.results = self
                    .enrich_all(codes, term, NormalizationStrategy::Approximate)
                    .await;
                return outcome;
            }
            Ok(_) => {}
            Err(e) => outcome.failures.push(e),
        }

        let suggestions = match self.spelling_suggestions(term).await {
            Ok(suggestions) => suggestions,
            Err(e) => {
                outcome.failures.push(e);
                return outcome;
            }
        };

        for suggestion in suggestions {
            match self.exact_codes(&suggestion).await {
                Ok(codes) if !codes.is_empty() => {
                    let codes = codes.into_iter().map(|c| (c, None)).collect();
                    outcome
                        .results
                        .extend(self.enrich_all(codes, term, NormalizationStrategy::Spelling).await);
                }
                Ok(_) => {}
                Err(e) => outcome.failures.push(e),
            }
        }

        outcome
    }
}

#[async_trait]
impl<C: HttpClientTrait> NormalizationRetriever for RxNavNormalizationRetriever<C> {
    async fn normalize(&self, terms: &[String]) -> Result<Vec<NormalizationResult>, StageError> {
        let terms = candidate_terms(terms.iter().map(String::as_str), self.max_terms);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let outcomes = join_all(terms.iter().map(|term| self.lookup_term(term))).await;

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for (term, outcome) in terms.iter().zip(outcomes) {
            if !outcome.failures.is_empty() {
                warn!(term = %term, failures = outcome.failures.len(), "RxNav lookups failed for term");
            }
            debug!(term = %term, hits = outcome.results.len(), "RxNav term lookup complete");
            results.extend(outcome.results);
            failures.extend(outcome.failures);
        }

        if results.is_empty() {
            if let Some(last) = failures.last() {
                return Err(StageError::new(
                    Stage::Normalization,
                    format!("{} RxNav call(s) failed; last error: {}", failures.len(), last),
                ));
            }
        }

        Ok(dedupe_by_code(results, self.max_results))
    }
}

// RxNav API types

#[derive(Debug, Deserialize)]
struct RxcuiResponse {
    #[serde(rename = "idGroup", default)]
    id_group: IdGroup,
}

#[derive(Debug, Default, Deserialize)]
struct IdGroup {
    #[serde(rename = "rxnormId", default)]
    rxnorm_id: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ApproximateResponse {
    #[serde(rename = "approximateGroup", default)]
    approximate_group: ApproximateGroup,
}

#[derive(Debug, Default, Deserialize)]
struct ApproximateGroup {
    #[serde(default)]
    candidate: Vec<ApproximateCandidate>,
}

#[derive(Debug, Deserialize)]
struct ApproximateCandidate {
    #[serde(default)]
    rxcui: String,
    score: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpellingResponse {
    #[serde(rename = "suggestionGroup", default)]
    suggestion_group: SuggestionGroup,
}

#[derive(Debug, Default, Deserialize)]
struct SuggestionGroup {
    #[serde(rename = "suggestionList")]
    suggestion_list: Option<SuggestionList>,
}

#[derive(Debug, Deserialize)]
struct SuggestionList {
    #[serde(default)]
    suggestion: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PropertiesResponse {
    properties: Option<ConceptProperties>,
}

#[derive(Debug, Deserialize)]
struct ConceptProperties {
    name: String,
    synonym: Option<String>,
    tty: String,
}
