//! Prompt template parsing and rendering
//!
//! Supports variable syntax: `${var:variable-name:default-value}`
//! - `${var:name}` - Required variable, error if not provided
//! - `${var:name:default}` - Optional variable with default value

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

/// Regex to match variable patterns: ${var:name} or ${var:name:default}
static VARIABLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{var:([a-zA-Z0-9][-_a-zA-Z0-9]*)(?::([^}]*))?\}").unwrap()
});

/// Template processing errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TemplateError {
    #[error("Missing required variable: {name}")]
    MissingVariable { name: String },
}

/// A parsed variable from a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptVariable {
    pub name: String,
    pub default: Option<String>,
}

impl PromptVariable {
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// A parsed prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    content: String,
    variables: Vec<PromptVariable>,
}

impl PromptTemplate {
    /// Parse a template string and extract its variables (first occurrence wins)
    pub fn parse(content: impl Into<String>) -> Self {
        let content = content.into();
        let mut seen = HashSet::new();
        let variables = VARIABLE_PATTERN
            .captures_iter(&content)
            .filter_map(|cap| {
                let name = cap[1].to_string();
                seen.insert(name.clone()).then(|| PromptVariable {
                    name,
                    default: cap.get(2).map(|m| m.as_str().to_string()),
                })
            })
            .collect();

        Self { content, variables }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn variables(&self) -> &[PromptVariable] {
        &self.variables
    }

    /// Render in a single pass so substituted values are never re-expanded
    pub fn render(&self, values: &HashMap<&str, String>) -> Result<String, TemplateError> {
        if let Some(missing) = self
            .variables
            .iter()
            .find(|v| v.is_required() && !values.contains_key(v.name.as_str()))
        {
            return Err(TemplateError::MissingVariable {
                name: missing.name.clone(),
            });
        }

        let rendered = VARIABLE_PATTERN.replace_all(&self.content, |cap: &Captures| {
            values
                .get(&cap[1])
                .cloned()
                .or_else(|| cap.get(2).map(|m| m.as_str().to_string()))
                .unwrap_or_default()
        });

        Ok(rendered.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_no_variables() {
        let template = PromptTemplate::parse("Plain text only.");
        assert!(template.variables().is_empty());
    }

    #[test]
    fn test_parse_required_and_default() {
        let template = PromptTemplate::parse("Q: ${var:query}\nDrug: ${var:drug_name:unknown}");

        assert_eq!(template.variables().len(), 2);
        assert!(template.variables()[0].is_required());
        assert_eq!(template.variables()[1].default.as_deref(), Some("unknown"));
    }

    #[test]
    fn test_parse_duplicate_variables() {
        let template = PromptTemplate::parse("${var:query} and ${var:query} again");
        assert_eq!(template.variables().len(), 1);
    }

    #[test]
    fn test_render_values_and_defaults() {
        let template = PromptTemplate::parse("Question: ${var:query}\nDrug: ${var:drug_name:n/a}");
        let values = HashMap::from([("query", "dose of ibuprofen".to_string())]);

        assert_eq!(
            template.render(&values).unwrap(),
            "Question: dose of ibuprofen\nDrug: n/a"
        );
    }

    #[test]
    fn test_render_missing_required_variable() {
        let template = PromptTemplate::parse("Question: ${var:query}");

        assert_eq!(
            template.render(&HashMap::new()),
            Err(TemplateError::MissingVariable {
                name: "query".to_string()
            })
        );
    }

    #[test]
    fn test_render_does_not_expand_substituted_values() {
        let template = PromptTemplate::parse("${var:a} / ${var:b}");
        let values = HashMap::from([
            ("a", "${var:b}".to_string()),
            ("b", "second".to_string()),
        ]);

        assert_eq!(template.render(&values).unwrap(), "${var:b} / second");
    }
}
