//! Heuristic field extraction from free-text drug label sections
//!
//! Label sections are unstructured prose. The extractor pulls the handful of
//! fields the compiler cares about and leaves everything else behind.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{DosageInfo, SideEffectInfo, UsageInfo};

/// Shown instead of adult dosing text for drugs presumed prescription-only
pub const PRESCRIPTION_DOSAGE_NOTICE: &str = "This medication typically requires a prescription. \
     Dosing must be determined by the prescribing healthcare provider; please consult your \
     healthcare provider or pharmacist before use.";

const SUMMARY_MAX_CHARS: usize = 300;
const ITEM_MAX_CHARS: usize = 200;
const MAX_INDICATIONS: usize = 6;
const MAX_CONTRAINDICATIONS: usize = 5;
const MAX_COMMON_EFFECTS: usize = 8;
const MAX_SERIOUS_EFFECTS: usize = 6;

/// Ingredients sold over the counter; used only when the label carries no product type.
/// Hand-maintained and incomplete, so a miss falls back to prescription gating.
static OTC_INGREDIENTS: &[&str] = &[
    "acetaminophen",
    "paracetamol",
    "ibuprofen",
    "naproxen",
    "aspirin",
    "diphenhydramine",
    "loratadine",
    "cetirizine",
    "fexofenadine",
    "chlorpheniramine",
    "dextromethorphan",
    "guaifenesin",
    "pseudoephedrine",
    "phenylephrine",
    "famotidine",
    "omeprazole",
    "ranitidine",
    "calcium carbonate",
    "loperamide",
    "bismuth subsalicylate",
    "simethicone",
    "docusate",
    "bisacodyl",
    "hydrocortisone",
    "clotrimazole",
    "miconazole",
    "bacitracin",
    "neomycin",
    "polymyxin",
    "meclizine",
    "oxymetazoline",
    "menthol",
    "benzocaine",
    "zinc oxide",
    "vitamin",
];

static ADULT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:adult dose|adults?(?:\s+and\s+children\s+\d+\s+years(?:\s+of\s+age)?\s+and\s+(?:over|older))?)[\s:]+([^.!?\n]+)",
    )
    .unwrap()
});

static CHILD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)children\s+(?:under|from|\d+\s+to|\d+\s*-\s*\d+)[^:.]{0,40}:\s*([^.!?\n]+)|(?:pediatric(?:\s+patients)?|children'?s?\s+dose)[\s:]+([^.!?\n]+)",
    )
    .unwrap()
});

static FREQUENCY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(every\s+\d+(?:\s*(?:to|-)\s*\d+)?\s+hours?|(?:once|twice|three times|four times)\s+(?:a\s+)?(?:day|daily)|\d+\s+times\s+(?:a|per)\s+day)",
    )
    .unwrap()
});

static MAX_DAILY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:do not (?:exceed|take more than)|maximum(?:\s+daily)?\s+dose(?:\s+is)?|not to exceed)\s+([^.!?\n]+)",
    )
    .unwrap()
});

static SECTION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:\d+(?:\.\d+)?\s+)?(?:indications?\s*(?:and|&)\s*usage|uses?|contraindications|adverse reactions|warnings|dosage and administration|directions)\b\s*:?\s*",
    )
    .unwrap()
});

static PURPOSE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:indicated (?:for|in)(?: the)?|used (?:to|for))\s+([^.!?\n]+)").unwrap()
});

static CONTRAINDICATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:contraindicated (?:in|with)|do not use(?: if| in| with)?|should not be used (?:in|by))\s*:?\s*([^.!?\n]+)",
    )
    .unwrap()
});

static COMMON_EFFECTS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:most common|common(?:ly reported)?)\s+(?:adverse\s+)?(?:reactions?|side effects?|events?)[^:.]*?(?:are|include[sd]?|were|:)\s*([^.]+)",
    )
    .unwrap()
});

static SERIOUS_EFFECTS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)stop use and ask a doctor if\s*:?\s*([^.!?]+)|allergy alert\s*:\s*([^.!?]+)|(?:serious|severe|life-threatening)[^.]*?(?:including|such as|:)\s*([^.]+)",
    )
    .unwrap()
});

static LIST_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;•■●]|\s+and\s+|\s+or\s+").unwrap());

static BULLET_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"[•■●;\n]|\s-\s").unwrap());

static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Field extraction over label text; swap implementations to change heuristics
pub trait ClinicalExtractor: Send + Sync {
    fn extract_dosage(&self, dosage_text: &str) -> Option<DosageInfo>;

    fn extract_usage(&self, indications: &str, contraindications: &str) -> Option<UsageInfo>;

    fn extract_side_effects(&self, adverse_reactions: &str, warnings: &str) -> Option<SideEffectInfo>;
}

/// Pattern-based extractor tuned for FDA SPL label prose
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexClinicalExtractor;

impl RegexClinicalExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ClinicalExtractor for RegexClinicalExtractor {
    fn extract_dosage(&self, dosage_text: &str) -> Option<DosageInfo> {
        let text = clean(dosage_text);
        if text.is_empty() {
            return None;
        }

        let child = CHILD_PATTERN.captures(&text).and_then(|cap| {
            cap.get(1)
                .or_else(|| cap.get(2))
                .map(|m| m.as_str().trim().to_string())
        });

        Some(DosageInfo {
            adult: first_capture(&ADULT_PATTERN, &text),
            child,
            frequency: first_capture(&FREQUENCY_PATTERN, &text),
            max_daily: first_capture(&MAX_DAILY_PATTERN, &text),
            summary: Some(truncate(&text, SUMMARY_MAX_CHARS)),
        })
    }

    fn extract_usage(&self, indications: &str, contraindications: &str) -> Option<UsageInfo> {
        let indications = clean(indications);
        let contraindications = clean(contraindications);
        if indications.is_empty() && contraindications.is_empty() {
            return None;
        }

        let mut contra_items: Vec<String> = CONTRAINDICATION_PATTERN
            .captures_iter(&contraindications)
            .filter_map(|cap| cap.get(1).map(|m| truncate(m.as_str().trim(), ITEM_MAX_CHARS)))
            .collect();
        if contra_items.is_empty() {
            contra_items = bullet_items(&contraindications);
        }
        contra_items.truncate(MAX_CONTRAINDICATIONS);

        let mut indication_items = bullet_items(&indications);
        indication_items.truncate(MAX_INDICATIONS);

        Some(UsageInfo {
            purpose: first_capture(&PURPOSE_PATTERN, &indications),
            indications: indication_items,
            contraindications: contra_items,
            summary: (!indications.is_empty()).then(|| truncate(&indications, SUMMARY_MAX_CHARS)),
        })
    }

    fn extract_side_effects(&self, adverse_reactions: &str, warnings: &str) -> Option<SideEffectInfo> {
        let adverse = clean(adverse_reactions);
        let warnings = clean(warnings);
        if adverse.is_empty() && warnings.is_empty() {
            return None;
        }

        let mut common = COMMON_EFFECTS_PATTERN
            .captures(&adverse)
            .and_then(|cap| cap.get(1))
            .map(|m| list_items(m.as_str()))
            .unwrap_or_default();
        common.truncate(MAX_COMMON_EFFECTS);

        let mut serious: Vec<String> = Vec::new();
        for source in [&warnings, &adverse] {
            for cap in SERIOUS_EFFECTS_PATTERN.captures_iter(source) {
                let Some(m) = cap.get(1).or_else(|| cap.get(2)).or_else(|| cap.get(3)) else {
                    continue;
                };
                for item in list_items(m.as_str()) {
                    if !serious.iter().any(|s| s.eq_ignore_ascii_case(&item)) {
                        serious.push(item);
                    }
                }
            }
        }
        serious.truncate(MAX_SERIOUS_EFFECTS);

        Some(SideEffectInfo {
            common,
            serious,
            summary: (!adverse.is_empty()).then(|| truncate(&adverse, SUMMARY_MAX_CHARS)),
        })
    }
}

/// Label-declared product type: `Some(true)` for OTC, `Some(false)` for prescription
pub fn otc_from_product_type<S: AsRef<str>>(product_types: &[S]) -> Option<bool> {
    let upper: Vec<String> = product_types
        .iter()
        .map(|t| t.as_ref().to_uppercase())
        .collect();

    if upper.iter().any(|t| t.contains("OTC")) {
        Some(true)
    } else if upper.iter().any(|t| t.contains("PRESCRIPTION")) {
        Some(false)
    } else {
        None
    }
}

/// Fallback OTC check against the ingredient list
pub fn is_presumed_otc<S: AsRef<str>>(names: &[S]) -> bool {
    names.iter().any(|name| {
        let name = name.as_ref().to_lowercase();
        OTC_INGREDIENTS.iter().any(|ingredient| name.contains(ingredient))
    })
}

/// Replace adult dosing with the prescription notice; the daily maximum and
/// the raw label summary are dropped with it
pub fn gate_prescription_dosage(mut dosage: DosageInfo) -> DosageInfo {
    dosage.adult = Some(PRESCRIPTION_DOSAGE_NOTICE.to_string());
    dosage.max_daily = None;
    dosage.summary = None;
    dosage
}

fn first_capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn clean(text: &str) -> String {
    let collapsed = WHITESPACE.replace_all(text.trim(), " ");
    SECTION_HEADER.replace(&collapsed, "").trim().to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// Bullet-separated items, falling back to the first sentences
fn bullet_items(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut items: Vec<String> = BULLET_SEPARATOR
        .split(text)
        .map(str::trim)
        .filter(|s| s.chars().count() > 3)
        .map(|s| truncate(s, ITEM_MAX_CHARS))
        .collect();

    if items.len() <= 1 {
        items = text
            .split_terminator(". ")
            .map(str::trim)
            .filter(|s| s.chars().count() > 3)
            .take(3)
            .map(|s| truncate(s.trim_end_matches('.'), ITEM_MAX_CHARS))
            .collect();
    }

    items
}

/// Comma/conjunction separated short items, parentheticals removed, deduplicated
fn list_items(text: &str) -> Vec<String> {
    let stripped = PARENTHETICAL.replace_all(text, "");
    let mut items: Vec<String> = Vec::new();

    for item in LIST_SEPARATOR.split(&stripped) {
        let item = item.trim().trim_end_matches(['.', ':']).trim();
        let len = item.chars().count();
        if (3..=60).contains(&len) && !items.iter().any(|i| i.eq_ignore_ascii_case(item)) {
            items.push(item.to_string());
        }
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    const OTC_DIRECTIONS: &str = "Directions \
        adults and children 12 years and over: take 1 tablet every 4 to 6 hours while symptoms persist. \
        do not exceed 6 tablets in 24 hours. \
        children under 12 years: ask a doctor";

    #[test]
    fn test_extract_dosage_from_otc_directions() {
        let dosage = RegexClinicalExtractor::new()
            .extract_dosage(OTC_DIRECTIONS)
            .unwrap();

        assert_eq!(
            dosage.adult.as_deref(),
            Some("take 1 tablet every 4 to 6 hours while symptoms persist")
        );
        assert_eq!(dosage.child.as_deref(), Some("ask a doctor"));
        assert_eq!(dosage.frequency.as_deref(), Some("every 4 to 6 hours"));
        assert_eq!(dosage.max_daily.as_deref(), Some("6 tablets in 24 hours"));
        assert!(dosage.summary.is_some());
    }

    #[test]
    fn test_extract_dosage_adult_dose_label() {
        let dosage = RegexClinicalExtractor::new()
            .extract_dosage("Adult dose: 500 mg twice daily. Maximum daily dose is 2000 mg.")
            .unwrap();

        assert_eq!(dosage.adult.as_deref(), Some("500 mg twice daily"));
        assert_eq!(dosage.frequency.as_deref(), Some("twice daily"));
        assert_eq!(dosage.max_daily.as_deref(), Some("2000 mg"));
        assert_eq!(dosage.child, None);
    }

    #[test]
    fn test_extract_dosage_blank_is_none() {
        assert!(RegexClinicalExtractor::new().extract_dosage("   ").is_none());
    }

    #[test]
    fn test_extract_usage() {
        let usage = RegexClinicalExtractor::new()
            .extract_usage(
                "INDICATIONS AND USAGE Metformin is indicated for the treatment of type 2 diabetes mellitus. \
                 It improves glycemic control in adults.",
                "Metformin is contraindicated in patients with severe renal impairment.",
            )
            .unwrap();

        assert_eq!(usage.purpose.as_deref(), Some("treatment of type 2 diabetes mellitus"));
        assert_eq!(usage.indications.len(), 2);
        assert_eq!(
            usage.contraindications,
            vec!["patients with severe renal impairment".to_string()]
        );
    }

    #[test]
    fn test_extract_usage_bullets() {
        let usage = RegexClinicalExtractor::new()
            .extract_usage("Uses temporarily relieves minor aches • headache • toothache • backache", "")
            .unwrap();

        assert_eq!(
            usage.indications,
            vec!["temporarily relieves minor aches", "headache", "toothache", "backache"]
        );
        assert!(usage.contraindications.is_empty());
    }

    #[test]
    fn test_extract_side_effects() {
        let effects = RegexClinicalExtractor::new()
            .extract_side_effects(
                "The most common adverse reactions (incidence > 5%) are nausea, headache, dizziness and diarrhea.",
                "Allergy alert: ibuprofen may cause a severe allergic reaction, especially in people allergic to aspirin. \
                 Stop use and ask a doctor if you experience stomach bleeding or chest pain.",
            )
            .unwrap();

        assert_eq!(effects.common, vec!["nausea", "headache", "dizziness", "diarrhea"]);
        assert!(effects.serious.iter().any(|s| s.contains("severe allergic reaction")));
        assert!(effects.serious.iter().any(|s| s.contains("stomach bleeding")));
    }

    #[test]
    fn test_extract_side_effects_blank_is_none() {
        assert!(RegexClinicalExtractor::new().extract_side_effects("", " ").is_none());
    }

    #[test]
    fn test_otc_from_product_type() {
        assert_eq!(otc_from_product_type(&["HUMAN OTC DRUG"]), Some(true));
        assert_eq!(otc_from_product_type(&["HUMAN PRESCRIPTION DRUG"]), Some(false));
        assert_eq!(otc_from_product_type::<&str>(&[]), None);
    }

    #[test]
    fn test_presumed_otc_list() {
        assert!(is_presumed_otc(&["Ibuprofen"]));
        assert!(is_presumed_otc(&["ACETAMINOPHEN and diphenhydramine"]));
        assert!(!is_presumed_otc(&["Amoxicillin"]));
    }

    #[test]
    fn test_gate_prescription_dosage() {
        let gated = gate_prescription_dosage(DosageInfo {
            adult: Some("500 mg every 8 hours".to_string()),
            frequency: Some("every 8 hours".to_string()),
            max_daily: Some("1500 mg".to_string()),
            summary: Some("Adults: 500 mg every 8 hours.".to_string()),
            ..Default::default()
        });

        assert_eq!(gated.adult.as_deref(), Some(PRESCRIPTION_DOSAGE_NOTICE));
        assert_eq!(gated.frequency.as_deref(), Some("every 8 hours"));
        assert!(gated.max_daily.is_none());
        assert!(gated.summary.is_none());
    }
}
