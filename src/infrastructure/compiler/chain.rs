use std::collections::HashMap;

use crate::domain::{LlmRequest, PromptTemplate, TemplateError};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 800;

/// Model settings shared by every chain
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// System template + human template + model settings for one intent
#[derive(Debug, Clone)]
pub struct PromptChain {
    name: &'static str,
    system: PromptTemplate,
    human: PromptTemplate,
    settings: ChainSettings,
}

impl PromptChain {
    pub fn new(
        name: &'static str,
        system: impl Into<String>,
        human: impl Into<String>,
        settings: ChainSettings,
    ) -> Self {
        Self {
            name,
            system: PromptTemplate::parse(system),
            human: PromptTemplate::parse(human),
            settings,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    pub fn human_template(&self) -> &PromptTemplate {
        &self.human
    }

    /// Render both templates into a single chat completion request
    pub fn build_request(&self, values: &HashMap<&str, String>) -> Result<LlmRequest, TemplateError> {
        Ok(LlmRequest::builder()
            .system(self.system.render(values)?)
            .user(self.human.render(values)?)
            .temperature(self.settings.temperature)
            .max_tokens(self.settings.max_tokens)
            .build())
    }
}
