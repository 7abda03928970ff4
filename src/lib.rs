//! Chat Memory - conversation memory pipeline for LLM chat
//!
//! Decides, per incoming chat turn, whether prior conversation should be
//! summarized and how:
//! - Detect transcript language and factual density (salience)
//! - Summarize into structured memory (facts, decisions, open items) or a
//!   plain narrative, walking an ordered chain of backing models
//! - Weight recent facts, render a system-prompt block and a compact brief
//! - Compact the raw message window sent alongside the memory
//!
//! Every step degrades instead of failing: the pipeline always returns a
//! usable [`PipelineDecision`].

pub mod config;
pub mod detect;
pub mod memory;
pub mod pipeline;
pub mod provider;
pub mod sanitize;
pub mod transcript;

pub use config::{AppConfig, ModelChain, PipelineConfig};
pub use detect::{Detector, Language, LanguageDetector, SalienceMeasurement, SalienceScorer};
pub use memory::{
    apply_recency, compact_window, pick_tier, render_brief, render_prompt_block, StructuredMemory,
    Summarizer, SummaryTier,
};
pub use pipeline::{MemoryPipeline, MemoryPreview, MemoryStrategy, PipelineDecision};
pub use provider::{GenerateOptions, TextGenerator};
pub use sanitize::sanitize;
pub use transcript::{Role, Turn};

/// Result type for chat-memory operations
pub type Result<T> = std::result::Result<T, MemoryError>;

/// Errors that can occur inside the memory pipeline.
///
/// None of these reach the end caller of [`MemoryPipeline::run`]; they drive
/// the fallback chain.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("Generation failed on model '{model}': {message}")]
    Generation { model: String, message: String },

    #[error("Model '{model}' returned empty output")]
    EmptyOutput { model: String },

    #[error("All {attempts} backing models failed")]
    Exhausted { attempts: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
