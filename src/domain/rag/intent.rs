//! Keyword-based intent detection
//!
//! Classifies a staff question into one of the intent types and pulls out the
//! most likely drug name. Pure and synchronous; every input yields an intent.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Confidence below which the detector logs a warning
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.4;

/// Kind of medication question being asked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntentType {
    Dosage,
    Usage,
    SideEffects,
    General,
    Unknown,
}

impl IntentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dosage => "dosage",
            Self::Usage => "usage",
            Self::SideEffects => "side-effects",
            Self::General => "general",
            Self::Unknown => "unknown",
        }
    }

    pub fn wants_dosage(&self) -> bool {
        matches!(self, Self::Dosage | Self::General | Self::Unknown)
    }

    pub fn wants_usage(&self) -> bool {
        matches!(self, Self::Usage | Self::General | Self::Unknown)
    }

    pub fn wants_side_effects(&self) -> bool {
        matches!(self, Self::SideEffects | Self::General | Self::Unknown)
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of intent detection; immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedIntent {
    #[serde(rename = "type")]
    intent_type: IntentType,
    drug_name: String,
    confidence: f32,
    raw_query: String,
}

impl DetectedIntent {
    pub fn new(
        intent_type: IntentType,
        drug_name: impl Into<String>,
        confidence: f32,
        raw_query: impl Into<String>,
    ) -> Self {
        Self {
            intent_type,
            drug_name: drug_name.into(),
            confidence: confidence.clamp(0.0, 1.0),
            raw_query: raw_query.into(),
        }
    }

    pub fn intent_type(&self) -> IntentType {
        self.intent_type
    }

    pub fn drug_name(&self) -> &str {
        &self.drug_name
    }

    pub fn has_drug_name(&self) -> bool {
        !self.drug_name.is_empty()
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn raw_query(&self) -> &str {
        &self.raw_query
    }
}

static SIDE_EFFECT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\bside[\s-]?effects?\b",
        r"\badverse\b",
        r"\breactions?\b",
        r"\breact\b",
    ])
});

static DOSAGE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\bdos(?:e|es|age|ages|ing)\b",
        r"\bhow much\b",
        r"\bhow many\b",
        r"\bhow often\b",
        r"\bmax(?:imum)?\b",
        r"\b\d*\s?mg\b",
    ])
});

static USAGE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\bused? for\b",
        r"\buses? of\b",
        r"\bwhat (?:is|are) .+ for\b",
        r"\btreat(?:s|ing|ment)?\b",
        r"\bindicat(?:ion|ions|ed)\b",
        r"\bpurpose\b",
        r"\bwhat does .+ do\b",
    ])
});

static DOSE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)?(?:mg|mcg|g|ml|iu|%)?$").unwrap());

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // question and filler words
        "what", "whats", "is", "are", "was", "the", "of", "for", "a", "an", "how", "should",
        "i", "me", "my", "can", "could", "would", "will", "take", "taking", "taken", "give",
        "giving", "tell", "about", "with", "to", "in", "on", "at", "by", "it", "its", "and",
        "or", "any", "there", "some", "info", "information", "please", "safe", "when", "why",
        "who", "which", "per", "day", "daily", "be", "get", "have", "has", "this", "that",
        "know", "need", "you", "your", "we", "our", "patient", "patients", "customer", "someone",
        "child", "children", "adult", "adults", "kid", "kids", "year", "years", "old", "much",
        "many", "often", "every", "hours", "hour", "times", "if", "from", "do", "does", "did",
        "than", "more", "less", "too",
        // situational qualifiers
        "during", "while", "after", "before", "together", "pregnancy", "pregnant",
        "breastfeeding", "nursing", "elderly",
        // intent vocabulary
        "side", "effect", "effects", "side-effect", "side-effects", "adverse", "reaction",
        "reactions", "react", "dose", "doses", "dosage", "dosages", "dosing", "max",
        "maximum", "used", "use", "uses", "usage", "treat", "treats", "treating", "treatment",
        "indication", "indications", "indicated", "purpose", "common", "serious", "typical",
        "recommended", "usual", "normal",
        // generic product words
        "medicine", "medication", "medications", "drug", "drugs", "pill", "pills", "tablet",
        "tablets", "capsule", "capsules", "syrup", "mg", "mcg", "ml",
    ]
    .into_iter()
    .collect()
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

fn count_hits(patterns: &[Regex], text: &str) -> usize {
    patterns.iter().filter(|p| p.is_match(text)).count()
}

/// Stateless keyword/pattern intent detector
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentDetector;

impl IntentDetector {
    pub fn new() -> Self {
        Self
    }

    /// Classify a query; total over all inputs
    pub fn detect(&self, query: &str) -> DetectedIntent {
        let normalized = normalize(query);

        if normalized.is_empty() {
            warn!("Empty query, intent unknown");
            return DetectedIntent::new(IntentType::Unknown, "", 0.0, query);
        }

        let drug_name = extract_drug_name(&normalized);

        let (intent_type, hits) = [
            (IntentType::SideEffects, count_hits(&SIDE_EFFECT_PATTERNS, &normalized)),
            (IntentType::Dosage, count_hits(&DOSAGE_PATTERNS, &normalized)),
            (IntentType::Usage, count_hits(&USAGE_PATTERNS, &normalized)),
        ]
        .into_iter()
        .find(|(_, hits)| *hits > 0)
        .unwrap_or((IntentType::General, 0));

        let confidence = match (intent_type, drug_name.is_empty()) {
            (IntentType::General, true) => {
                let intent = DetectedIntent::new(IntentType::Unknown, "", 0.1, query);
                warn!(query = %query, "No medication or intent keyword recognised");
                return intent;
            }
            (IntentType::General, false) => 0.5,
            (_, missing_drug) => {
                let base = (0.6 + 0.15 * (hits.saturating_sub(1)) as f32).min(0.95);
                if missing_drug { base / 2.0 } else { base }
            }
        };

        let intent = DetectedIntent::new(intent_type, drug_name, confidence, query);

        if intent.confidence() < LOW_CONFIDENCE_THRESHOLD {
            warn!(
                intent = %intent.intent_type(),
                confidence = intent.confidence(),
                "Low-confidence intent classification"
            );
        } else {
            debug!(
                intent = %intent.intent_type(),
                drug = %intent.drug_name(),
                confidence = intent.confidence(),
                "Intent detected"
            );
        }

        intent
    }
}

/// Lower-case, drop possessives and punctuation (hyphens survive), squash spaces
fn normalize(query: &str) -> String {
    let lowered = query.to_lowercase().replace("'s", "");
    let cleaned: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .map(|t| t.trim_matches(|c| c == '.' || c == '-'))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Longest run of consecutive non-stop-word tokens
fn extract_drug_name(normalized: &str) -> String {
    fn run_len(run: &[&str]) -> usize {
        run.iter().map(|t| t.chars().count()).sum::<usize>() + run.len()
    }

    let mut best: Vec<&str> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for token in normalized.split(' ') {
        if STOP_WORDS.contains(token) || DOSE_TOKEN.is_match(token) {
            if run_len(&current) > run_len(&best) {
                best = std::mem::take(&mut current);
            } else {
                current.clear();
            }
        } else {
            current.push(token);
        }
    }

    if run_len(&current) > run_len(&best) {
        best = current;
    }

    best.join(" ")
}
