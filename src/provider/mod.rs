//! Backing text-generation capability
//!
//! The memory pipeline never talks to a model provider directly. It is
//! handed a [`TextGenerator`] and an ordered list of model identifiers, and
//! treats any error from `generate` as a signal to move to the next model.

pub mod openai;

pub use openai::{OpenAiCompatGenerator, ProviderConfig};

use crate::Result;
use async_trait::async_trait;

/// Options passed with every generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl GenerateOptions {
    /// Deterministic settings used by the summarizer. Requests never carry
    /// tool definitions, so generation is tool-free.
    pub fn summarizer() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: Some(1024),
        }
    }
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self::summarizer()
    }
}

/// A backing `generate(model, prompt, options) -> text` call. May fail.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str, options: &GenerateOptions) -> Result<String>;
}
