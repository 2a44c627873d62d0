//! Prompt templates used by the response compiler chains

mod template;

pub use template::{PromptTemplate, PromptVariable, TemplateError};
