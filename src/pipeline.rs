//! Per-turn memory decision pipeline
//!
//! conversational view -> measure -> gate -> structured summary
//! (or plain fallback) -> recency + render -> window compaction.
//!
//! [`MemoryPipeline::run`] never fails. Each failure drops to the next
//! simpler behavior and the worst case is "no memory, window compacted".

use crate::config::PipelineConfig;
use crate::detect::{Detector, Language, SalienceMeasurement};
use crate::memory::{
    apply_recency, compact_window, pick_tier, render_brief, render_prompt_block, Summarizer,
    SummaryTier, DEFAULT_BRIEF_ITEMS,
};
use crate::transcript::{conversational_view, Turn};
use crate::{MemoryError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// Turns of the conversational view used for recency weighting
const RECENCY_TURNS: usize = 3;

static INFORMAL_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(jokes?|lol|haha|funny|joking)\b").unwrap());

static META_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(meta|technical|internal)\b").unwrap());

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Which path produced the memory in a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStrategy {
    /// Memory augmentation switched off by configuration
    Disabled,
    /// Gated out: too few turns, or neither tokens nor salience high enough
    Skipped,
    Structured,
    PlainFallback,
    /// Both summarization paths failed; no memory injected
    Unavailable,
}

impl MemoryStrategy {
    /// Whether a memory block was appended to the system prompt
    pub fn injects_memory(&self) -> bool {
        matches!(self, Self::Structured | Self::PlainFallback)
    }
}

impl std::fmt::Display for MemoryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Skipped => write!(f, "skipped"),
            Self::Structured => write!(f, "structured"),
            Self::PlainFallback => write!(f, "plain_fallback"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Output of one pipeline invocation, handed to the model caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDecision {
    pub should_summarize: bool,
    pub tier: SummaryTier,
    pub strategy: MemoryStrategy,
    pub measurement: SalienceMeasurement,
    pub augmented_system_prompt: String,
    pub compacted_window: Vec<Turn>,
    /// Empty when no memory was produced
    pub memory_brief: String,
}

/// Plain-summary preview of a transcript, for debugging memory quality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPreview {
    pub memory: Option<String>,
    pub turns: usize,
    pub min_turns_required: usize,
}

/// Memory produced by one of the summarization paths
struct MemoryOutcome {
    strategy: MemoryStrategy,
    block: String,
    brief: String,
}

/// Remove informal and meta leakage words, collapse whitespace
fn filter_plain_summary(summary: &str) -> String {
    let without_informal = INFORMAL_MARKERS.replace_all(summary, "");
    let without_meta = META_MARKERS.replace_all(&without_informal, "");
    WHITESPACE_RUN.replace_all(&without_meta, " ").trim().to_string()
}

/// `Summary: <first clause>` in the conversation language
fn plain_brief(filtered: &str, language: Language) -> String {
    let label = match language {
        Language::English => "Summary",
        Language::Spanish => "Resumen",
    };
    let first_clause = filtered
        .split('.')
        .next()
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .unwrap_or(filtered);
    format!("{label}: {first_clause}")
}

/// Decides per chat turn whether and how to inject conversation memory
pub struct MemoryPipeline {
    summarizer: Summarizer,
    detector: Detector,
    config: PipelineConfig,
}

impl MemoryPipeline {
    pub fn new(summarizer: Summarizer, config: PipelineConfig) -> Self {
        Self {
            summarizer,
            detector: Detector::default(),
            config,
        }
    }

    /// Swap the language/salience strategies
    pub fn with_detector(mut self, detector: Detector) -> Self {
        self.detector = detector;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn summarizer(&self) -> &Summarizer {
        &self.summarizer
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Turn-count floor AND (token volume OR salience)
    pub fn passes_gate(&self, turn_count: usize, measurement: &SalienceMeasurement) -> bool {
        self.config.passes_gate(turn_count, measurement)
    }

    /// Run the pipeline over the full transcript-so-far (newest turn last)
    pub async fn run(&self, transcript: &[Turn], base_prompt: &str) -> PipelineDecision {
        let view = conversational_view(transcript);
        let measurement = self.detector.measure(&view);
        let tier = pick_tier(measurement.approx_token_count);
        let should_summarize = self.config.enabled && self.passes_gate(view.len(), &measurement);

        let unmodified = |strategy: MemoryStrategy| PipelineDecision {
            should_summarize,
            tier,
            strategy,
            measurement: measurement.clone(),
            augmented_system_prompt: base_prompt.to_string(),
            compacted_window: transcript.to_vec(),
            memory_brief: String::new(),
        };

        if !self.config.enabled {
            debug!("[memory] Memory slice disabled");
            return unmodified(MemoryStrategy::Disabled);
        }

        if !should_summarize {
            debug!(
                "[memory] Gated out: turns={} (min {}), tokens~{:.0} (min {}), salience={} (min {})",
                view.len(),
                self.config.min_turns,
                measurement.approx_token_count,
                self.config.min_tokens,
                measurement.salience_score,
                self.config.min_salience
            );
            return unmodified(MemoryStrategy::Skipped);
        }

        let language = measurement.detected_language;
        let outcome = match self.structured_memory(&view, language).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("[memory] Structured summarizer failed, falling back to plain summary: {}", e);
                match self.plain_memory(&view, tier, language).await {
                    Ok(outcome) => Some(outcome),
                    Err(e) => {
                        warn!("[memory] Fallback summarizer also failed: {}", e);
                        None
                    }
                }
            }
        };

        let compacted_window =
            compact_window(transcript, measurement.approx_token_count, self.config.max_window_size).to_vec();

        let (strategy, augmented_system_prompt, memory_brief) = match outcome {
            Some(outcome) => (
                outcome.strategy,
                format!("{}{}", base_prompt, outcome.block),
                outcome.brief,
            ),
            None => (MemoryStrategy::Unavailable, base_prompt.to_string(), String::new()),
        };

        info!(
            "[memory] strategy={} tier={} language={} window={}/{}",
            strategy,
            tier,
            language,
            compacted_window.len(),
            transcript.len()
        );

        PipelineDecision {
            should_summarize,
            tier,
            strategy,
            measurement,
            augmented_system_prompt,
            compacted_window,
            memory_brief,
        }
    }

    async fn structured_memory(&self, view: &[Turn], language: Language) -> Result<MemoryOutcome> {
        let memory = self.summarizer.try_summarize_structured(view, language).await?;

        let start = view.len().saturating_sub(RECENCY_TURNS);
        let enhanced = apply_recency(&memory, &view[start..]);

        debug!(
            "[memory] Extracted {} facts, {} decisions, {} open items. Confidence: {:.2}",
            enhanced.facts.len(),
            enhanced.decisions.len(),
            enhanced.open_items.len(),
            enhanced.metadata.confidence
        );

        Ok(MemoryOutcome {
            strategy: MemoryStrategy::Structured,
            block: format!("\n\n{}", render_prompt_block(&enhanced)),
            brief: render_brief(&enhanced, DEFAULT_BRIEF_ITEMS),
        })
    }

    async fn plain_memory(&self, view: &[Turn], tier: SummaryTier, language: Language) -> Result<MemoryOutcome> {
        let summary = self.summarizer.try_summarize_plain(view, tier, language).await?;
        let filtered = filter_plain_summary(&summary);
        if filtered.is_empty() {
            return Err(MemoryError::EmptyOutput {
                model: "plain summary after filtering".to_string(),
            });
        }

        Ok(MemoryOutcome {
            strategy: MemoryStrategy::PlainFallback,
            block: format!("\n[MEMORY]\n{filtered}"),
            brief: plain_brief(&filtered, language),
        })
    }

    /// Medium-tier plain summary, or `None` below the turn floor
    pub async fn preview(&self, transcript: &[Turn]) -> MemoryPreview {
        let view = conversational_view(transcript);
        let min_turns_required = self.config.min_turns;

        if view.len() < min_turns_required {
            return MemoryPreview {
                memory: None,
                turns: view.len(),
                min_turns_required,
            };
        }

        let language = self.detector.detect_language(&view);
        let memory = self.summarizer.summarize_plain(&view, SummaryTier::Medium, language).await;

        MemoryPreview {
            memory: Some(memory),
            turns: view.len(),
            min_turns_required,
        }
    }
}

/// One-shot pipeline run with the default detector
pub async fn run_memory_pipeline(
    transcript: &[Turn],
    base_prompt: &str,
    summarizer: Summarizer,
    config: PipelineConfig,
) -> PipelineDecision {
    MemoryPipeline::new(summarizer, config).run(transcript, base_prompt).await
}
