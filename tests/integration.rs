//! Integration tests for the conversation memory pipeline

use async_trait::async_trait;
use chat_memory::config::{AppConfig, ModelChain, PipelineConfig};
use chat_memory::detect::{Detector, Language};
use chat_memory::memory::{
    apply_recency, compact_window, pick_tier, placeholder_plain_summary, Clock, StructuredMemory,
    Summarizer, SummaryTier, RECENT_TAG,
};
use chat_memory::provider::{GenerateOptions, TextGenerator};
use chat_memory::transcript::{conversational_view, Role, Turn};
use chat_memory::{sanitize, MemoryError, MemoryPipeline, MemoryStrategy, Result};
use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

type Reply = Box<dyn Fn(&str, &str) -> Result<String> + Send + Sync>;

/// Generator driven by a closure over (model, prompt); records every call
struct FakeGenerator {
    reply: Reply,
    calls: Mutex<Vec<(String, bool)>>,
}

impl FakeGenerator {
    fn new(reply: impl Fn(&str, &str) -> Result<String> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            reply: Box::new(reply),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Answers plain prompts with `text`, rejects structured ones
    fn plain_only(text: &'static str) -> Arc<Self> {
        Self::new(move |model, prompt| {
            if is_structured(prompt) {
                Err(unavailable(model))
            } else {
                Ok(text.to_string())
            }
        })
    }

    fn failing() -> Arc<Self> {
        Self::new(|model, _| Err(unavailable(model)))
    }

    /// (model, was_structured_prompt) for every call, in order
    fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, model: &str, prompt: &str, options: &GenerateOptions) -> Result<String> {
        assert_eq!(options, &GenerateOptions::summarizer());
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), is_structured(prompt)));
        (self.reply)(model, prompt)
    }
}

fn is_structured(prompt: &str) -> bool {
    prompt.contains("OPEN ITEMS:")
}

fn unavailable(model: &str) -> MemoryError {
    MemoryError::Generation {
        model: model.to_string(),
        message: "service unavailable".to_string(),
    }
}

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

fn summarizer(generator: Arc<FakeGenerator>) -> Summarizer {
    Summarizer::new(generator, ModelChain::default()).with_clock(Arc::new(FixedClock(fixed_time())))
}

fn pipeline(generator: Arc<FakeGenerator>) -> MemoryPipeline {
    MemoryPipeline::new(summarizer(generator), PipelineConfig::default())
}

/// Six English turns, roughly 600 characters
fn party_planning() -> Vec<Turn> {
    vec![
        Turn::user("Hi, my name is Daniel Brooks and I am planning a birthday party for my daughter Emma next month."),
        Turn::assistant("That sounds lovely. How many guests are you expecting, and do you already have a venue in mind?"),
        Turn::user("Around 25 kids and 10 parents. We were thinking about the community hall on Oak Street downtown."),
        Turn::assistant("The community hall is a good choice. Their weekend rate is usually close to $300 for four hours."),
        Turn::user("That fits the budget. We should decide on the cake flavor and the theme before booking anything."),
        Turn::assistant("Chocolate is always popular with kids. A superhero or princess theme could work well for Emma."),
    ]
}

fn meeting_prep_es() -> Vec<Turn> {
    vec![
        Turn::user("Hola, me llamo Lucía García y tengo una reunión muy importante el 15 de marzo."),
        Turn::assistant("Perfecto, ¿qué necesitas preparar para la reunión?"),
        Turn::user("Necesito una presentación con los números del año pasado y el presupuesto de la empresa."),
        Turn::assistant("Bien, puedo ayudarte con la estructura de la presentación."),
        Turn::user("Gracias, también tengo que decidir quién va a presentar la parte financiera."),
    ]
}

/// Below the turn floor nothing is summarized and the window is untouched
#[tokio::test]
async fn test_short_transcript_is_left_unmodified() {
    let generator = FakeGenerator::plain_only("unused");
    let pipeline = pipeline(generator.clone());
    let transcript = party_planning()[..4].to_vec();

    let decision = pipeline.run(&transcript, "You are a helpful assistant.").await;

    assert!(!decision.should_summarize);
    assert_eq!(decision.strategy, MemoryStrategy::Skipped);
    assert_eq!(decision.augmented_system_prompt, "You are a helpful assistant.");
    assert_eq!(decision.compacted_window, transcript);
    assert_eq!(decision.memory_brief, "");
    assert!(generator.calls().is_empty());
}

/// Every model rejects the structured prompt, so a short plain summary is injected
#[tokio::test]
async fn test_structured_failure_falls_back_to_short_plain_summary() {
    let generator = FakeGenerator::plain_only("Daniel is planning Emma's birthday party at the community hall. Cake and theme are still open.");
    let pipeline = pipeline(generator.clone());
    let transcript = party_planning();

    let decision = pipeline.run(&transcript, "BASE").await;

    let chars = decision.measurement.char_count;
    assert!((550..=650).contains(&chars), "unexpected size {chars}");
    assert_eq!(decision.measurement.detected_language, Language::English);
    assert!(decision.should_summarize);
    assert_eq!(decision.strategy, MemoryStrategy::PlainFallback);
    assert_eq!(decision.tier, SummaryTier::Short);
    assert!(decision.memory_brief.starts_with("Summary:"));
    assert_eq!(
        decision.memory_brief,
        "Summary: Daniel is planning Emma's birthday party at the community hall"
    );
    assert!(decision.augmented_system_prompt.starts_with("BASE\n[MEMORY]\nDaniel is planning"));
    assert_eq!(decision.compacted_window.len(), 4);
    assert_eq!(decision.compacted_window, transcript[2..].to_vec());

    // every model refused the structured prompt before the plain one ran
    let calls = generator.calls();
    let structured: Vec<&str> = calls.iter().filter(|(_, s)| *s).map(|(m, _)| m.as_str()).collect();
    assert_eq!(
        structured,
        vec!["summarizer-model", "chat-model", "chat-model-reasoning", "artifact-model"]
    );
    assert_eq!(calls.last(), Some(&("summarizer-model".to_string(), false)));
}

/// Spanish transcripts get a Spanish brief label
#[tokio::test]
async fn test_spanish_plain_fallback_brief() {
    let generator = FakeGenerator::plain_only("Lucía prepara una reunión el 15 de marzo. Falta decidir quién presenta.");
    let decision = pipeline(generator).run(&meeting_prep_es(), "BASE").await;

    assert_eq!(decision.measurement.detected_language, Language::Spanish);
    assert_eq!(decision.strategy, MemoryStrategy::PlainFallback);
    assert_eq!(decision.memory_brief, "Resumen: Lucía prepara una reunión el 15 de marzo");
}

/// Structured output is parsed, recency-tagged, merged with pattern facts and rendered
#[tokio::test]
async fn test_structured_memory_end_to_end() {
    let generator = FakeGenerator::new(|_, prompt| {
        assert!(prompt.contains("User: Hi, my name is Daniel Brooks"));
        Ok("SUMMARY: Daniel is planning a birthday party.\n\nFACTS:\n• Daughter is named Emma\n• Party is planned for March 2025\n\nDECISIONS:\n• Chose the community hall\n\nOPEN ITEMS:\n• What cake flavor to order".to_string())
    });
    let decision = pipeline(generator.clone()).run(&party_planning(), "BASE").await;

    assert_eq!(decision.strategy, MemoryStrategy::Structured);
    assert_eq!(generator.calls().len(), 1);

    let prompt = &decision.augmented_system_prompt;
    assert!(prompt.starts_with("BASE\n\n[MEMORY SUMMARY]\nDaniel is planning a birthday party.\n\n[KEY FACTS]\n"));
    assert!(prompt.contains(&format!("• {RECENT_TAG} Daughter is named Emma")));
    assert!(prompt.contains("\n\n[KEY DECISIONS]\n• Chose the community hall"));
    assert!(prompt.contains("\n\n[OPEN ITEMS]\n• What cake flavor to order"));
    assert!(prompt.contains("• Name: Daniel Brooks"));

    assert!(decision
        .memory_brief
        .starts_with("Summary: Daniel is planning a birthday party.. Key facts: [RECENT] Daughter is named Emma; Party is planned for March 2025"));
    assert!(decision.memory_brief.ends_with("Pending: What cake flavor to order"));
    assert_eq!(decision.compacted_window.len(), 4);
}

/// Total model failure still returns a decision with a compacted window
#[tokio::test]
async fn test_total_failure_never_aborts() {
    let generator = FakeGenerator::failing();
    let transcript = party_planning();
    let decision = pipeline(generator.clone()).run(&transcript, "BASE").await;

    assert!(decision.should_summarize);
    assert_eq!(decision.strategy, MemoryStrategy::Unavailable);
    assert_eq!(decision.augmented_system_prompt, "BASE");
    assert_eq!(decision.memory_brief, "");
    assert_eq!(decision.compacted_window.len(), 4);
    // four structured attempts, then four plain attempts
    assert_eq!(generator.calls().len(), 8);
}

/// `MEMORY_SLICE=0` turns the pipeline into a pass-through
#[tokio::test]
async fn test_disabled_by_env_knob() {
    let config = PipelineConfig::default().with_lookup(|key| (key == "MEMORY_SLICE").then(|| "0".to_string()));
    let generator = FakeGenerator::plain_only("unused");
    let pipeline = MemoryPipeline::new(summarizer(generator.clone()), config);

    let decision = pipeline.run(&party_planning(), "BASE").await;
    assert_eq!(decision.strategy, MemoryStrategy::Disabled);
    assert_eq!(decision.compacted_window.len(), 6);
    assert!(generator.calls().is_empty());
}

/// System and tool turns do not count toward the turn floor
#[tokio::test]
async fn test_non_dialogue_roles_ignored_for_gating() {
    let mut transcript = party_planning()[..4].to_vec();
    transcript.insert(0, Turn::new(Role::System, "System instructions"));
    transcript.push(Turn::new(Role::Tool, "{\"weather\": \"sunny\"}"));
    transcript.push(Turn::assistant("Reasoned about the request\n"));

    let decision = pipeline(FakeGenerator::plain_only("unused")).run(&transcript, "BASE").await;
    assert_eq!(decision.strategy, MemoryStrategy::Skipped);
    assert_eq!(decision.compacted_window, transcript);
}

/// Concurrent runs on one pipeline share no state
#[tokio::test]
async fn test_concurrent_invocations_are_independent() {
    let pipeline = pipeline(FakeGenerator::plain_only("A party is being planned."));
    let long = party_planning();
    let short = party_planning()[..2].to_vec();

    let (a, b) = tokio::join!(pipeline.run(&long, "A"), pipeline.run(&short, "B"));
    assert_eq!(a.strategy, MemoryStrategy::PlainFallback);
    assert_eq!(b.strategy, MemoryStrategy::Skipped);
    assert_eq!(b.augmented_system_prompt, "B");
}

/// Preview returns a medium summary only past the turn floor
#[tokio::test]
async fn test_preview() {
    let generator = FakeGenerator::plain_only("Daniel is planning a party.");
    let pipeline = pipeline(generator.clone());

    let preview = pipeline.preview(&party_planning()).await;
    assert_eq!(preview.memory.as_deref(), Some("Daniel is planning a party."));
    assert_eq!(preview.turns, 6);
    assert_eq!(preview.min_turns_required, 5);

    let preview = pipeline.preview(&party_planning()[..3]).await;
    assert_eq!(preview.memory, None);
    assert_eq!(preview.turns, 3);
}

/// Self-narration lines are removed
#[test]
fn test_sanitize_drops_self_narration() {
    assert_eq!(sanitize("Reasoned: let's see\nHello world"), "Hello world");
}

/// Sanitizing sanitized text changes nothing
#[test]
fn test_sanitize_idempotent() {
    let samples = [
        "",
        "Hello   world",
        "<think>hidden</think>Visible answer",
        "[REASONING]x[/REASONING] text\n\n\nmore",
        "We need to respond politely\nSure thing!",
        "Ａｎｓｗｅｒ：　“quoted”\u{200B}",
        "<thi<think>nk>nested",
        "User says hi\nAssistant replies\nReal content",
        "[CHAIN  OF THOUGHT] hi",
        "[chain\tof thought]\nProbably\n[/CHAIN OF\u{00A0}THOUGHT] done",
    ];
    for sample in samples {
        let once = sanitize(sample);
        assert_eq!(sanitize(&once), once, "not idempotent for {sample:?}");
    }
}

/// Labeled sections become structured memory stamped by the injected clock
#[test]
fn test_parse_structured_scenario() {
    let generator = FakeGenerator::new(|_, _| {
        Ok("SUMMARY: Brief chat.\nFACTS:\n• Name: Maria\n• Date: 12/05/2020".to_string())
    });
    let transcript = vec![
        Turn::user("I met Maria Lopez on 12/05/2020."),
        Turn::assistant("Good to know."),
    ];

    let memory: StructuredMemory =
        tokio_test::block_on(summarizer(generator).summarize_structured(&transcript, Language::English));

    assert_eq!(memory.summary, "Brief chat.");
    assert_eq!(&memory.facts[..2], &["Name: Maria".to_string(), "Date: 12/05/2020".to_string()]);
    assert!(memory.decisions.is_empty());
    assert!(memory.open_items.is_empty());
    assert_eq!(memory.metadata.extracted_at, fixed_time());
}

/// Plain summarization falls back to the localized placeholder
#[test]
fn test_summarize_plain_placeholder_on_total_failure() {
    let summary = tokio_test::block_on(summarizer(FakeGenerator::failing()).summarize_plain(
        &party_planning(),
        SummaryTier::Medium,
        Language::English,
    ));
    assert_eq!(summary, placeholder_plain_summary(Language::English));
}

/// Language detection gives the same answer on every call
#[test]
fn test_language_detection_is_deterministic() {
    let detector = Detector::default();
    for transcript in [party_planning(), meeting_prep_es(), vec![]] {
        let view = conversational_view(&transcript);
        let first = detector.detect_language(&view);
        for _ in 0..5 {
            assert_eq!(detector.detect_language(&view), first);
        }
    }
    assert_eq!(detector.detect_language(&[]), Language::English);
}

/// Tier thresholds sit at 500 and 1000 tokens
#[test]
fn test_tier_boundaries() {
    assert_eq!(pick_tier(499.0), SummaryTier::Short);
    assert_eq!(pick_tier(500.0), SummaryTier::Medium);
    assert_eq!(pick_tier(999.0), SummaryTier::Medium);
    assert_eq!(pick_tier(1000.0), SummaryTier::Long);
}

/// Window size is monotonic in tokens and bounded by transcript length and max
#[test]
fn test_compact_window_bounds() {
    for len in 0..15usize {
        let transcript: Vec<Turn> = (0..len).map(|i| Turn::user(format!("turn {i}"))).collect();
        let mut previous = 0;
        for tokens in (0..8000).step_by(125) {
            let size = compact_window(&transcript, tokens as f64, 10).len();
            assert!(size >= previous);
            assert!(size <= len.min(10));
            assert!(size >= len.min(4));
            previous = size;
        }
    }
}

/// Recency tagging is idempotent and confidence never drops
#[test]
fn test_recency_is_idempotent_and_never_lowers_confidence() {
    let generator = FakeGenerator::new(|_, _| Ok("SUMMARY: Party.\nFACTS:\n• Party theme is superhero".to_string()));
    let memory = tokio_test::block_on(summarizer(generator).summarize_structured(&party_planning(), Language::English));

    let recent = &party_planning()[3..];
    let once = apply_recency(&memory, recent);
    let twice = apply_recency(&once, recent);

    assert_eq!(once.facts[0], "[RECENT] Party theme is superhero");
    assert_eq!(twice.facts, once.facts);
    assert!(once.metadata.confidence >= memory.metadata.confidence);
    assert!(twice.metadata.confidence >= once.metadata.confidence);
    assert!(twice.metadata.confidence <= 1.0);
}

/// Config file values load, and environment knobs override them
#[tokio::test]
async fn test_config_file_loading() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    tokio::fs::write(
        &path,
        r#"
[memory]
min_turns = 2

[summarizer]
model = "chat-model"
fallback_models = []
"#,
    )
    .await
    .unwrap();

    let mut config = AppConfig::from_file(&path).await.unwrap();
    config.apply_lookup(|_| None);
    assert_eq!(config.pipeline.min_turns, 2);
    assert_eq!(config.pipeline.max_window_size, 10);
    assert_eq!(config.models.iter().collect::<Vec<_>>(), vec!["chat-model"]);

    config.apply_lookup(|key| (key == "SUMMARIZER_MODEL_ID").then(|| "local/llama".to_string()));
    assert_eq!(config.models.iter().collect::<Vec<_>>(), vec!["local/llama"]);
}

/// Malformed and missing config files surface as errors
#[tokio::test]
async fn test_malformed_or_missing_config_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    tokio::fs::write(&path, "[memory\nmin_turns = ").await.unwrap();

    let malformed = AppConfig::from_file(&path).await;
    assert!(matches!(malformed, Err(MemoryError::Toml(_))));

    let missing = AppConfig::from_file(&temp_dir.path().join("absent.toml")).await;
    assert!(matches!(missing, Err(MemoryError::Io(_))));

    let mut defaults = AppConfig::default();
    defaults.apply_lookup(|_| None);
    assert_eq!(defaults.models, ModelChain::default());
    assert_eq!(defaults.pipeline, PipelineConfig::default());
}
