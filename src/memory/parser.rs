//! Parser for sectioned summarizer output, plus pattern-based fact extraction
//!
//! Grammar, applied line by line (lines are trimmed, blank lines skipped):
//!
//! ```text
//! document := line*
//! line     := header | bullet | other
//! header   := ["#"*] ["**"] NAME ":" ["**"] [text]
//! NAME     := SUMMARY | FACTS | DECISIONS | OPEN ITEMS
//!             (es also: RESUMEN | HECHOS | DECISIONES | TEMAS ABIERTOS)
//! bullet   := ("•" | "-" | "*") text
//! ```
//!
//! A header moves the section cursor. `SUMMARY:` text on the same line (or
//! the first plain line after it) becomes the summary. Bullets longer than
//! [`MIN_BULLET_CHARS`] are appended to the list under the cursor. Anything
//! else is ignored.

use super::types::{MemoryMetadata, StructuredMemory};
use crate::detect::Language;
use crate::transcript::{joined_text, Turn};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Bullet items this short or shorter are dropped as noise
pub const MIN_BULLET_CHARS: usize = 10;

/// Confidence when the model output carried at least one list item
pub const CONFIDENCE_WITH_ITEMS: f64 = 0.8;

/// Confidence when only a summary (or nothing) could be parsed
pub const CONFIDENCE_SUMMARY_ONLY: f64 = 0.6;

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}/\d{4}\b").unwrap());

static MONEY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\d+|\d+\s*(?:dollars?|USD|euros?|EUR)").unwrap()
});

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b").unwrap());

static QUANTITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d+(?:\.\d+)?\s+(?:days?|months?|years?|hours?|minutes?|people|items)")
        .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Summary,
    Facts,
    Decisions,
    OpenItems,
}

const HEADERS: &[(&str, Section)] = &[
    ("SUMMARY:", Section::Summary),
    ("FACTS:", Section::Facts),
    ("DECISIONS:", Section::Decisions),
    ("OPEN ITEMS:", Section::OpenItems),
];

const SPANISH_HEADERS: &[(&str, Section)] = &[
    ("RESUMEN:", Section::Summary),
    ("HECHOS:", Section::Facts),
    ("DECISIONES:", Section::Decisions),
    ("TEMAS ABIERTOS:", Section::OpenItems),
];

/// Summary used when the model output carries none
pub fn placeholder_summary(language: Language) -> &'static str {
    match language {
        Language::English => "Conversation about various topics mentioned by the user.",
        Language::Spanish => "Conversación sobre temas diversos mencionados por el usuario.",
    }
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&line[prefix.len()..])
    } else {
        None
    }
}

/// Recognize a section header, returning the section and any inline text
fn match_header(line: &str, language: Language) -> Option<(Section, &str)> {
    let candidate = line.trim_start_matches('#').trim_start().trim_start_matches("**");

    let spanish: &[(&str, Section)] = match language {
        Language::Spanish => SPANISH_HEADERS,
        Language::English => &[],
    };

    HEADERS.iter().chain(spanish.iter()).find_map(|(prefix, section)| {
        strip_prefix_ignore_case(candidate, prefix)
            .map(|rest| (*section, rest.trim_start_matches('*').trim()))
    })
}

fn bullet_content(line: &str) -> Option<&str> {
    let mut chars = line.chars();
    match chars.next() {
        Some('•') | Some('-') | Some('*') => Some(chars.as_str().trim()),
        _ => None,
    }
}

/// Parse sectioned model output into structured memory.
///
/// Never fails: missing sections stay empty and a missing summary falls back
/// to [`placeholder_summary`].
pub fn parse_structured_output(
    text: &str,
    language: Language,
    extracted_at: DateTime<Utc>,
) -> StructuredMemory {
    let mut summary = String::new();
    let mut facts = Vec::new();
    let mut decisions = Vec::new();
    let mut open_items = Vec::new();
    let mut cursor: Option<Section> = None;

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }

        if let Some((section, inline)) = match_header(line, language) {
            if section == Section::Summary && !inline.is_empty() {
                summary = inline.to_string();
            }
            cursor = Some(section);
            continue;
        }

        if let Some(content) = bullet_content(line) {
            if content.chars().count() <= MIN_BULLET_CHARS {
                continue;
            }
            match cursor {
                Some(Section::Facts) => facts.push(content.to_string()),
                Some(Section::Decisions) => decisions.push(content.to_string()),
                Some(Section::OpenItems) => open_items.push(content.to_string()),
                Some(Section::Summary) | None => {}
            }
            continue;
        }

        if cursor == Some(Section::Summary) && summary.is_empty() {
            summary = line.to_string();
        }
    }

    if summary.is_empty() {
        summary = placeholder_summary(language).to_string();
    }

    let confidence = if facts.is_empty() && decisions.is_empty() && open_items.is_empty() {
        CONFIDENCE_SUMMARY_ONLY
    } else {
        CONFIDENCE_WITH_ITEMS
    };

    StructuredMemory {
        summary,
        facts,
        decisions,
        open_items,
        metadata: MemoryMetadata {
            confidence,
            language,
            extracted_at,
        },
    }
}

/// Extract dates, amounts, names and quantities straight from the
/// transcript text, labelled in the conversation language.
pub fn extract_pattern_facts(transcript: &[Turn], language: Language) -> Vec<String> {
    let text = joined_text(transcript);

    let (date, amount, name, quantity) = match language {
        Language::English => ("Date", "Amount", "Name", "Quantity"),
        Language::Spanish => ("Fecha", "Monto", "Nombre", "Cantidad"),
    };

    let labelled: [(&Regex, &str); 4] = [
        (&DATE_PATTERN, date),
        (&MONEY_PATTERN, amount),
        (&NAME_PATTERN, name),
        (&QUANTITY_PATTERN, quantity),
    ];

    labelled
        .iter()
        .flat_map(|(pattern, label)| {
            pattern
                .find_iter(&text)
                .map(move |m| format!("{}: {}", label, m.as_str()))
        })
        .collect()
}

/// Append `extra` facts, skipping exact duplicates of facts already present
pub fn merge_facts(facts: &mut Vec<String>, extra: Vec<String>) {
    for fact in extra {
        if !facts.contains(&fact) {
            facts.push(fact);
        }
    }
}
