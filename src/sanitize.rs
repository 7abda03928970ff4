//! Text sanitizer for model-facing and user-facing text
//!
//! Strips reasoning markers, model self-narration lines and Unicode
//! characters that break layout. Applied to transcript turns before they
//! are measured or summarized.

use regex::Regex;
use std::sync::LazyLock;

/// Lines where the model narrates its own reasoning instead of answering
static META_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:Reasoned\b|We need to respond\b|User (?:says|asks)\b|Now user\b|Probably\b|Let's respond\b)",
    )
    .unwrap()
});

/// Explicit reasoning/tag markers, opening and closing. Inner gaps match any
/// run of non-newline whitespace, the same runs later collapsed to one space.
static THINK_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?think>|\[/?REASONING\]|\[/?CHAIN[^\S\n]+OF[^\S\n]+THOUGHT\]").unwrap()
});

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Map a single character to its replacement, or `None` to keep it.
///
/// Specific characters are handled first; anything left in the
/// U+2000..U+200F / U+2028..U+2029 / U+FEFF range becomes a plain space.
fn normalize_char(c: char) -> Option<&'static str> {
    match c {
        // thin, hair, zero-width, non-breaking, narrow no-break spaces
        '\u{2009}' | '\u{200A}' | '\u{200B}' | '\u{00A0}' | '\u{202F}' => Some(" "),
        // zero-width joiner, zero-width no-break space, word joiner
        '\u{200D}' | '\u{FEFF}' | '\u{2060}' => Some(""),
        '\u{2028}' => Some("\n"),
        '\u{2029}' => Some("\n\n"),
        '\u{2000}'..='\u{200F}' => Some(" "),
        _ => None,
    }
}

fn normalize_unicode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match normalize_char(c) {
            Some(replacement) => out.push_str(replacement),
            None => out.push(c),
        }
    }
    out
}

/// Remove reasoning markers until none remain, so markers split by other
/// markers (`<thi<think>nk>`) cannot survive a single pass.
fn strip_think_tags(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = THINK_TAGS.replace_all(&current, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Returns true if the line is model self-narration ("Reasoned ...",
/// "User asks ...", "Probably ...").
pub fn is_meta_line(line: &str) -> bool {
    META_LINE.is_match(line.trim())
}

/// Clean text of reasoning leakage and problematic Unicode.
///
/// Total and idempotent: `sanitize(sanitize(x)) == sanitize(x)`, empty input
/// gives empty output.
pub fn sanitize(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let normalized = normalize_unicode(input);
    let stripped = strip_think_tags(&normalized);

    // meta check runs on collapsed lines
    stripped
        .split('\n')
        .map(|line| WHITESPACE_RUN.replace_all(line, " ").trim().to_string())
        .filter(|line| !line.is_empty() && !is_meta_line(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
