//! Plain-text rendering of retrieval data for prompts, fallbacks and the footer

use crate::domain::rag::{
    ClinicalData, DosageInfo, InventoryMatch, IntentType, NormalizationResult, RetrievalContext,
    SideEffectInfo, UsageInfo,
};
use crate::infrastructure::clinical::OPENFDA_SOURCE;

pub const FOOTER_HEADER: &str = "Clinical Data Sources:";
pub const NO_SOURCES_LINE: &str = "No external clinical sources contributed to this response";
pub const DISCLAIMER: &str = "This information is intended to support pharmacy professionals \
     and does not replace clinical judgment. Verify against the full product labeling and \
     consult the prescriber or pharmacist in charge when in doubt.";

const BULLET: &str = "\u{2022}";

pub fn inventory_block(matches: &[InventoryMatch]) -> String {
    if matches.is_empty() {
        return "No matching products in pharmacy inventory.".to_string();
    }

    matches
        .iter()
        .map(|item| {
            let mut line = format!("{BULLET} {}", item.name);
            let names: Vec<String> = [
                item.generic_name.as_deref().map(|g| format!("generic: {g}")),
                item.brand.as_deref().map(|b| format!("brand: {b}")),
            ]
            .into_iter()
            .flatten()
            .collect();
            if !names.is_empty() {
                line.push_str(&format!(" ({})", names.join(", ")));
            }

            line.push_str(&format!(" | category: {}", item.category));
            if item.in_stock {
                let unit = item.unit.as_deref().unwrap_or("units");
                line.push_str(&format!(" | in stock: {} {}", item.quantity, unit));
            } else {
                line.push_str(" | out of stock");
            }
            if item.low_stock() {
                line.push_str(" (low stock)");
            }
            if let Some(form) = &item.dosage_form {
                line.push_str(&format!(" | form: {form}"));
            }
            if let Some(price) = item.price {
                line.push_str(&format!(" | price: {price:.2}"));
            }
            if let Some(expiry) = item.expiry_date {
                line.push_str(&format!(" | expires: {expiry}"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn normalization_block(results: &[NormalizationResult]) -> String {
    if results.is_empty() {
        return "No RxNorm concept identified.".to_string();
    }

    results
        .iter()
        .map(|r| {
            let mut line = format!(
                "{BULLET} {} (RxCUI {}, type {}, confidence {:.2})",
                r.canonical_name, r.canonical_code, r.term_type, r.confidence_score
            );
            if !r.synonyms.is_empty() {
                line.push_str(&format!(" | also known as: {}", r.synonyms.join(", ")));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_field(lines: &mut Vec<String>, label: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        lines.push(format!("{label}: {value}"));
    }
}

fn push_list(lines: &mut Vec<String>, label: &str, items: &[String]) {
    if !items.is_empty() {
        lines.push(format!("{label}:"));
        lines.extend(items.iter().map(|i| format!("{BULLET} {i}")));
    }
}

fn dosage_lines(lines: &mut Vec<String>, dosage: &DosageInfo) {
    lines.push("Dosage:".to_string());
    push_field(lines, "Adults", dosage.adult.as_deref());
    push_field(lines, "Children", dosage.child.as_deref());
    push_field(lines, "Frequency", dosage.frequency.as_deref());
    push_field(lines, "Maximum daily", dosage.max_daily.as_deref());
    push_field(lines, "Label text", dosage.summary.as_deref());
}

fn usage_lines(lines: &mut Vec<String>, usage: &UsageInfo) {
    lines.push("Usage:".to_string());
    push_field(lines, "Purpose", usage.purpose.as_deref());
    push_list(lines, "Indications", &usage.indications);
    push_list(lines, "Contraindications", &usage.contraindications);
}

fn side_effect_lines(lines: &mut Vec<String>, effects: &SideEffectInfo) {
    lines.push("Side effects:".to_string());
    push_list(lines, "Common", &effects.common);
    push_list(lines, "Serious", &effects.serious);
    push_field(lines, "Label text", effects.summary.as_deref());
}

pub fn clinical_block(records: &[ClinicalData]) -> String {
    if records.is_empty() {
        return "No clinical label data retrieved.".to_string();
    }

    let mut lines = Vec::new();
    for record in records {
        let availability = if record.prescription_only {
            "prescription only"
        } else {
            "over the counter"
        };
        lines.push(format!("Label for {} ({availability})", record.drug_name));
        push_field(&mut lines, "Dosage form", record.dosage_form.as_deref());

        if let Some(dosage) = &record.sections.dosage {
            dosage_lines(&mut lines, dosage);
        }
        if let Some(usage) = &record.sections.usage {
            usage_lines(&mut lines, usage);
        }
        if let Some(effects) = &record.sections.side_effects {
            side_effect_lines(&mut lines, effects);
        }
    }
    lines.join("\n")
}

/// Sections the intent asked for that no clinical record supplied
pub fn missing_block(context: &RetrievalContext) -> String {
    let intent = context.intent.intent_type();
    let records = &context.clinical_data;
    let mut missing = Vec::new();

    if intent.wants_dosage() && !records.iter().any(|r| r.sections.dosage.is_some()) {
        missing.push("Dosage information is unavailable from the clinical label database.");
    }
    if intent.wants_usage() && !records.iter().any(|r| r.sections.usage.is_some()) {
        missing.push("Usage information is unavailable from the clinical label database.");
    }
    if intent.wants_side_effects() && !records.iter().any(|r| r.sections.side_effects.is_some()) {
        missing.push("Side effect information is unavailable from the clinical label database.");
    }
    if context.inventory_matches.is_empty() {
        missing.push("No matching product was found in pharmacy inventory.");
    }

    if missing.is_empty() {
        "None.".to_string()
    } else {
        missing.join("\n")
    }
}

/// Deterministic answer used when no stage returned any data
pub fn unavailable_body(intent: IntentType, drug_name: Option<&str>) -> String {
    let subject = drug_name.unwrap_or("the requested medication");
    let topic = match intent {
        IntentType::Dosage => "Dosage information",
        IntentType::Usage => "Usage information",
        IntentType::SideEffects => "Side effect information",
        IntentType::General | IntentType::Unknown => "Information",
    };

    format!(
        "{topic} for {subject} is unavailable. No matching pharmacy inventory, RxNorm concept or \
         clinical label data was found. Please check the spelling of the medication name, or \
         consult the product labeling or a pharmacist."
    )
}

fn source_display_name(source: &str) -> String {
    if source == OPENFDA_SOURCE {
        "openFDA Drug Label Database".to_string()
    } else {
        source.to_string()
    }
}

/// Attribution for the sources that actually contributed, plus the disclaimer
pub fn footer(context: &RetrievalContext) -> String {
    let mut sources = Vec::new();

    let count = context.inventory_matches.len();
    if count > 0 {
        let noun = if count == 1 { "product" } else { "products" };
        sources.push(format!("Pharmacy Inventory ({count} matching {noun})"));
    }
    if !context.normalization_results.is_empty() {
        sources.push("RxNorm (NLM RxNav) drug name normalization".to_string());
    }
    for record in &context.clinical_data {
        let name = source_display_name(&record.source);
        if !sources.contains(&name) {
            sources.push(name);
        }
    }
    if sources.is_empty() {
        sources.push(NO_SOURCES_LINE.to_string());
    }

    let bullets: Vec<String> = sources.iter().map(|s| format!("{BULLET} {s}")).collect();
    format!("{FOOTER_HEADER}\n{}\n\n{DISCLAIMER}", bullets.join("\n"))
}
