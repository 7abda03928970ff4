//! Transcript types and the conversational view used by the pipeline

use crate::detect::Language;
use crate::sanitize::sanitize;
use serde::{Deserialize, Serialize};

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Whether this role takes part in the user/assistant dialogue
    pub fn is_conversational(&self) -> bool {
        matches!(self, Self::User | Self::Assistant)
    }

    /// Speaker label used when rendering dialogue for a summarizer prompt
    pub fn speaker_label(&self, language: Language) -> &'static str {
        match (self, language) {
            (Self::User, Language::English) => "User",
            (Self::User, Language::Spanish) => "Usuario",
            (Self::Assistant, Language::English) => "Assistant",
            (Self::Assistant, Language::Spanish) => "Asistente",
            (Self::System, _) => "System",
            (Self::Tool, _) => "Tool",
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Build the plain-text dialogue view of a raw message list.
///
/// Keeps user/assistant turns only, sanitizes each, and drops turns left
/// empty. Order is preserved (oldest first).
pub fn conversational_view(messages: &[Turn]) -> Vec<Turn> {
    messages
        .iter()
        .filter(|turn| turn.role.is_conversational())
        .filter_map(|turn| {
            let content = sanitize(&turn.content);
            if content.is_empty() {
                None
            } else {
                Some(Turn::new(turn.role, content))
            }
        })
        .collect()
}

/// Concatenate turn contents with single spaces
pub fn joined_text(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| t.content.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render turns as `Speaker: content` lines, capped at `max_chars`
/// characters.
pub fn render_dialogue(turns: &[Turn], language: Language, max_chars: usize) -> String {
    let rendered = turns
        .iter()
        .map(|t| format!("{}: {}", t.role.speaker_label(language), t.content))
        .collect::<Vec<_>>()
        .join("\n");

    match rendered.char_indices().nth(max_chars) {
        Some((idx, _)) => rendered[..idx].to_string(),
        None => rendered,
    }
}
