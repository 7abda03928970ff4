//! Summarizer: plain narrative and structured memory from a transcript
//!
//! Every call walks the [`ModelChain`] in order. A failed or empty attempt is
//! logged and the next model is tried; nothing is retried against the same
//! model here (transport retries belong to the generator).
//!
//! `try_*` methods report exhaustion as an error so the pipeline can choose
//! its own fallback. The plain `summarize_*` methods never fail.

use super::parser::{extract_pattern_facts, merge_facts, parse_structured_output};
use super::tier::SummaryTier;
use super::types::{Clock, MemoryMetadata, StructuredMemory, SystemClock};
use crate::config::ModelChain;
use crate::detect::Language;
use crate::provider::{GenerateOptions, TextGenerator};
use crate::transcript::{render_dialogue, Turn};
use crate::{MemoryError, Result};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

/// Rendered dialogue is cut to this many characters before prompting
pub const MAX_TRANSCRIPT_CHARS: usize = 12_000;

/// Confidence of the pattern-only structured fallback
pub const DEGRADED_CONFIDENCE: f64 = 0.5;

/// Sentences kept when a plain summary leaks list or JSON structure
const LEAKAGE_FALLBACK_SENTENCES: usize = 3;

/// Fixed summary when every backing model failed
pub fn placeholder_plain_summary(language: Language) -> &'static str {
    match language {
        Language::English => "The conversation includes several important topics that the user mentioned.",
        Language::Spanish => "La conversación incluye varios temas importantes que el usuario mencionó.",
    }
}

fn build_plain_prompt(dialogue: &str, tier: SummaryTier, language: Language) -> String {
    let guide = tier.sentence_guide(language);
    let instructions = match language {
        Language::English => [
            "You are a conversation summarizer.".to_string(),
            format!("Rewrite the dialogue so far into {guide} that preserve:"),
            "- Key people, names, relationships".to_string(),
            "- Important facts (ages, places, events)".to_string(),
            "- Emotional tone and ongoing concerns".to_string(),
            "- Open threads or pending questions".to_string(),
            "Keep it compact, fluent, and natural. No lists, no bullets, no JSON. Just plain sentences.".to_string(),
        ],
        Language::Spanish => [
            "Eres un resumidor de conversaciones.".to_string(),
            format!("Reescribe el diálogo hasta ahora en {guide} que preserven:"),
            "- Personas clave, nombres, relaciones".to_string(),
            "- Hechos importantes (edades, lugares, eventos)".to_string(),
            "- Tono emocional y preocupaciones continuas".to_string(),
            "- Temas abiertos o preguntas pendientes".to_string(),
            "Manténlo compacto, fluido y natural. Sin listas, sin viñetas, sin JSON. Solo oraciones simples.".to_string(),
        ],
    };

    format!(
        "{}\n\nConversation (oldest first, newest last):\n{}",
        instructions.join("\n"),
        dialogue
    )
}

fn build_structured_prompt(dialogue: &str, language: Language) -> String {
    let (title, summary, facts, decisions, open_items, content_filter, format_note) = match language {
        Language::English => (
            "Extract Structured Memory from Conversation (Facts Only)",
            "Provide a concise 1-2 sentence summary of the main conversation topics and key user information.",
            "Extract ONLY user-provided facts about themselves (name, profession, family, location, preferences). DO NOT include creative fiction, hypothetical scenarios, or AI-generated stories.",
            "List key actions taken (documents created, tasks completed) and user requests fulfilled.",
            "Identify pending user questions, unresolved requests, or incomplete tasks.",
            "IMPORTANT: Distinguish between REAL user information vs creative/AI-generated content. Only include verified user facts, not fictional narratives.",
            "Output in clear sections with bullet points. Focus on real user details and conversation outcomes.",
        ),
        Language::Spanish => (
            "Extraer Memoria Estructurada de la Conversación (Solo Hechos)",
            "Proporciona un resumen conciso de 1-2 oraciones de los temas principales de conversación e información clave del usuario.",
            "Extrae SOLO hechos proporcionados por el usuario sobre sí mismo (nombre, profesión, familia, ubicación, preferencias). NO incluyas ficción creativa, escenarios hipotéticos, o historias generadas por IA.",
            "Lista acciones clave tomadas (documentos creados, tareas completadas) y solicitudes del usuario cumplidas.",
            "Identifica preguntas pendientes del usuario, solicitudes sin resolver, o tareas incompletas.",
            "IMPORTANTE: Distingue entre información REAL del usuario vs contenido creativo/generado por IA. Incluye solo hechos verificados del usuario, no narrativas ficticias.",
            "Salida en secciones claras con viñetas. Enfócate en detalles reales del usuario y resultados de conversación.",
        ),
    };

    format!(
        r#"{title}

INSTRUCTIONS:
1. {summary}
2. {facts}
3. {decisions}
4. {open_items}

{content_filter}

{format_note}

OUTPUT FORMAT:
SUMMARY: {{brief summary}}

FACTS:
• {{real user fact 1}}
• {{real user fact 2}}

DECISIONS:
• {{action taken 1}}
• {{task completed 1}}

OPEN ITEMS:
• {{pending item 1}}

Conversation:
{dialogue}"#
    )
}

/// Whether a plain summary leaked list or JSON structure
fn has_structural_leakage(text: &str) -> bool {
    text.contains('{') || text.contains('}') || text.contains('•') || text.contains("- ")
}

/// A period followed by any whitespace, newlines included
static SENTENCE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.\s+").unwrap());

/// Keep the first few sentences and close with a period
fn truncate_to_sentences(text: &str, max_sentences: usize) -> String {
    let kept = SENTENCE_BREAK
        .split(text)
        .take(max_sentences)
        .collect::<Vec<_>>()
        .join(". ");
    format!("{}.", kept.trim_end_matches('.'))
}

/// Validate plain-summary output, truncating on structural leakage
fn guard_plain_output(text: &str) -> String {
    if has_structural_leakage(text) {
        debug!("Plain summary leaked structure, truncating to first sentences");
        truncate_to_sentences(text, LEAKAGE_FALLBACK_SENTENCES)
    } else {
        text.to_string()
    }
}

/// Summarizes transcripts through an injected generator and model chain
#[derive(Clone)]
pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
    models: ModelChain,
    clock: Arc<dyn Clock>,
    options: GenerateOptions,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn TextGenerator>, models: ModelChain) -> Self {
        Self {
            generator,
            models,
            clock: Arc::new(SystemClock),
            options: GenerateOptions::summarizer(),
        }
    }

    /// Replace the time source used for `extracted_at`
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn models(&self) -> &ModelChain {
        &self.models
    }

    /// Walk the model chain until one returns non-empty text
    async fn generate_with_fallback(&self, prompt: &str, purpose: &str) -> Result<(String, String)> {
        for (index, model) in self.models.iter().enumerate() {
            if index > 0 {
                info!("[summarizer] Trying fallback model {} for {}", model, purpose);
            }
            match self.generator.generate(model, prompt, &self.options).await {
                Ok(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        warn!(
                            "[summarizer] {}",
                            MemoryError::EmptyOutput {
                                model: model.to_string()
                            }
                        );
                        continue;
                    }
                    if index > 0 {
                        info!("[summarizer] Fallback model {} succeeded", model);
                    }
                    return Ok((model.to_string(), text.to_string()));
                }
                Err(e) => {
                    warn!("[summarizer] {} with model {} failed: {}", purpose, model, e);
                }
            }
        }

        Err(MemoryError::Exhausted {
            attempts: self.models.len(),
        })
    }

    /// Plain narrative summary, or an error once every model failed
    pub async fn try_summarize_plain(
        &self,
        transcript: &[Turn],
        tier: SummaryTier,
        language: Language,
    ) -> Result<String> {
        let dialogue = render_dialogue(transcript, language, MAX_TRANSCRIPT_CHARS);
        let prompt = build_plain_prompt(&dialogue, tier, language);
        let (model, text) = self.generate_with_fallback(&prompt, "plain summary").await?;
        debug!("[summarizer] Plain {} summary from {}: {} chars", tier, model, text.len());
        Ok(guard_plain_output(&text))
    }

    /// Plain narrative summary; falls back to a fixed placeholder sentence
    pub async fn summarize_plain(&self, transcript: &[Turn], tier: SummaryTier, language: Language) -> String {
        match self.try_summarize_plain(transcript, tier, language).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("[summarizer] {}; using placeholder summary", e);
                placeholder_plain_summary(language).to_string()
            }
        }
    }

    /// Structured memory parsed from model output, merged with pattern
    /// facts. Errors only when every model failed.
    pub async fn try_summarize_structured(&self, transcript: &[Turn], language: Language) -> Result<StructuredMemory> {
        let dialogue = render_dialogue(transcript, language, MAX_TRANSCRIPT_CHARS);
        let prompt = build_structured_prompt(&dialogue, language);
        let (model, text) = self.generate_with_fallback(&prompt, "structured summary").await?;

        let mut memory = parse_structured_output(&text, language, self.clock.now());
        merge_facts(&mut memory.facts, extract_pattern_facts(transcript, language));

        debug!(
            "[summarizer] Structured memory from {}: {} facts, {} decisions, {} open items",
            model,
            memory.facts.len(),
            memory.decisions.len(),
            memory.open_items.len()
        );
        Ok(memory)
    }

    /// Structured memory; on total failure degrades to pattern facts plus a
    /// short plain summary at [`DEGRADED_CONFIDENCE`].
    pub async fn summarize_structured(&self, transcript: &[Turn], language: Language) -> StructuredMemory {
        match self.try_summarize_structured(transcript, language).await {
            Ok(memory) => memory,
            Err(e) => {
                warn!("[summarizer] Structured summary failed: {}; using pattern extraction", e);
                self.degraded_structured(transcript, language).await
            }
        }
    }

    async fn degraded_structured(&self, transcript: &[Turn], language: Language) -> StructuredMemory {
        let facts = extract_pattern_facts(transcript, language);
        let summary = self.summarize_plain(transcript, SummaryTier::Short, language).await;

        StructuredMemory {
            summary,
            facts,
            decisions: Vec::new(),
            open_items: Vec::new(),
            metadata: MemoryMetadata {
                confidence: DEGRADED_CONFIDENCE,
                language,
                extracted_at: self.clock.now(),
            },
        }
    }
}
