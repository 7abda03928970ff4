//! Recency weighting and rendering of structured memory

use super::types::{StructuredMemory, RECENT_TAG};
use crate::transcript::Turn;
use regex::Regex;
use std::sync::LazyLock;

/// Section items rendered into the brief by default
pub const DEFAULT_BRIEF_ITEMS: usize = 5;

/// Pending items rendered into the brief, regardless of `max_items`
const MAX_PENDING_ITEMS: usize = 3;

/// Turns at the end of the supplied slice checked for recency
const RECENT_TURNS: usize = 2;

/// Confidence added once recency has been applied
const RECENCY_CONFIDENCE_BUMP: f64 = 0.1;

/// Words this short are too common to signal a reference
const MIN_SIGNIFICANT_WORD_CHARS: usize = 3;

static YEAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());

/// Keywords marking a decision or open item as still pending
const PENDING_KEYWORDS: &[&str] = &["should", "what", "decide", "debería", "qué", "decidir"];

fn is_recent(fact: &str) -> bool {
    fact.contains(RECENT_TAG)
}

/// Tag facts whose significant words show up in the last two of
/// `recent_turns`, and nudge confidence up. Returns a new memory.
pub fn apply_recency(memory: &StructuredMemory, recent_turns: &[Turn]) -> StructuredMemory {
    let start = recent_turns.len().saturating_sub(RECENT_TURNS);
    let recent_text = recent_turns[start..]
        .iter()
        .map(|t| t.content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let facts = memory
        .facts
        .iter()
        .map(|fact| {
            if is_recent(fact) {
                return fact.clone();
            }
            let lowered = fact.to_lowercase();
            let referenced = lowered
                .split_whitespace()
                .filter(|word| word.chars().count() > MIN_SIGNIFICANT_WORD_CHARS)
                .any(|word| recent_text.contains(word));
            if referenced {
                format!("{RECENT_TAG} {fact}")
            } else {
                fact.clone()
            }
        })
        .collect();

    let mut enhanced = memory.clone();
    enhanced.facts = facts;
    // never decreases, even when already above 1.0
    enhanced.metadata.confidence = memory
        .metadata
        .confidence
        .max((memory.metadata.confidence + RECENCY_CONFIDENCE_BUMP).min(1.0));
    enhanced
}

fn push_section(lines: &mut Vec<String>, header: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    lines.push(format!("\n{header}"));
    lines.extend(items.iter().map(|item| format!("• {item}")));
}

/// Verbose memory block appended to the system prompt
pub fn render_prompt_block(memory: &StructuredMemory) -> String {
    let mut lines = vec!["[MEMORY SUMMARY]".to_string(), memory.summary.clone()];
    push_section(&mut lines, "[KEY FACTS]", &memory.facts);
    push_section(&mut lines, "[KEY DECISIONS]", &memory.decisions);
    push_section(&mut lines, "[OPEN ITEMS]", &memory.open_items);
    lines.join("\n")
}

/// One-line digest for secondary consumers.
///
/// Recent or dated facts are picked first, the rest fill up to `max_items`.
pub fn render_brief(memory: &StructuredMemory, max_items: usize) -> String {
    let mut sections = vec![format!("Summary: {}", memory.summary)];

    let (important, rest): (Vec<&String>, Vec<&String>) = memory
        .facts
        .iter()
        .partition(|fact| is_recent(fact) || YEAR_PATTERN.is_match(fact));

    let selected: Vec<&str> = important
        .into_iter()
        .take(max_items)
        .chain(rest)
        .take(max_items)
        .map(String::as_str)
        .collect();
    if !selected.is_empty() {
        sections.push(format!("Key facts: {}", selected.join("; ")));
    }

    let pending: Vec<&str> = memory
        .decisions
        .iter()
        .chain(memory.open_items.iter())
        .filter(|item| {
            let lowered = item.to_lowercase();
            PENDING_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
        })
        .take(MAX_PENDING_ITEMS)
        .map(String::as_str)
        .collect();
    if !pending.is_empty() {
        sections.push(format!("Pending: {}", pending.join("; ")));
    }

    sections.join(". ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Language;
    use crate::memory::types::MemoryMetadata;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn memory(facts: &[&str], decisions: &[&str], open_items: &[&str]) -> StructuredMemory {
        StructuredMemory {
            summary: "Planning a move".to_string(),
            facts: facts.iter().map(|s| s.to_string()).collect(),
            decisions: decisions.iter().map(|s| s.to_string()).collect(),
            open_items: open_items.iter().map(|s| s.to_string()).collect(),
            metadata: MemoryMetadata {
                confidence: 0.8,
                language: Language::English,
                extracted_at: Utc::now(),
            },
        }
    }

    #[test]
    fn test_apply_recency_tags_referenced_facts() {
        let input = memory(&["Lives in Lisbon", "Has two cats"], &[], &[]);
        let turns = vec![
            Turn::user("Tell me about cats"),
            Turn::assistant("Sure"),
            Turn::user("How is the weather in lisbon today?"),
        ];
        let out = apply_recency(&input, &turns);
        assert_eq!(out.facts, vec!["[RECENT] Lives in Lisbon", "Has two cats"]);
        assert!((out.metadata.confidence - 0.9).abs() < 1e-9);
        // input untouched
        assert_eq!(input.facts[0], "Lives in Lisbon");
    }

    #[test]
    fn test_apply_recency_no_double_tag() {
        let input = memory(&["Lives in Lisbon"], &[], &[]);
        let turns = vec![Turn::user("lisbon again")];
        let once = apply_recency(&input, &turns);
        let twice = apply_recency(&once, &turns);
        assert_eq!(twice.facts, vec!["[RECENT] Lives in Lisbon"]);
    }

    #[test]
    fn test_apply_recency_confidence_capped() {
        let mut input = memory(&[], &[], &[]);
        input.metadata.confidence = 0.95;
        assert_eq!(apply_recency(&input, &[]).metadata.confidence, 1.0);

        input.metadata.confidence = 1.0;
        assert_eq!(apply_recency(&input, &[]).metadata.confidence, 1.0);
    }

    #[test]
    fn test_render_prompt_block_omits_empty_sections() {
        let block = render_prompt_block(&memory(&["Lives in Lisbon"], &[], &["Should we rent a van?"]));
        assert_eq!(
            block,
            "[MEMORY SUMMARY]\nPlanning a move\n\n[KEY FACTS]\n• Lives in Lisbon\n\n[OPEN ITEMS]\n• Should we rent a van?"
        );

        let bare = render_prompt_block(&memory(&[], &[], &[]));
        assert_eq!(bare, "[MEMORY SUMMARY]\nPlanning a move");
    }

    #[test]
    fn test_render_brief_prioritizes_recent_and_dated() {
        let input = memory(
            &["Likes tea", "[RECENT] Lives in Lisbon", "Moved in 2019", "Has two cats"],
            &["Booked movers", "Decide on a date"],
            &["What about insurance?"],
        );
        let brief = render_brief(&input, 3);
        assert_eq!(
            brief,
            "Summary: Planning a move. Key facts: [RECENT] Lives in Lisbon; Moved in 2019; Likes tea. Pending: Decide on a date; What about insurance?"
        );
    }

    #[test]
    fn test_render_brief_summary_only() {
        assert_eq!(render_brief(&memory(&[], &[], &[]), DEFAULT_BRIEF_ITEMS), "Summary: Planning a move");
    }

    #[test]
    fn test_render_brief_pending_capped() {
        let input = memory(&[], &["should a", "should b", "should c", "should d"], &[]);
        assert_eq!(render_brief(&input, 5), "Summary: Planning a move. Pending: should a; should b; should c");
    }
}
