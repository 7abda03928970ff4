//! Structured memory types

use crate::detect::Language;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display tag the enhancer prefixes to facts seen in recent turns
pub const RECENT_TAG: &str = "[RECENT]";

/// Source of wall-clock time for metadata stamping
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Quality metadata attached to extracted memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    /// 0.0..=1.0
    pub confidence: f64,
    pub language: Language,
    pub extracted_at: DateTime<Utc>,
}

/// Facts, decisions and open items extracted from a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredMemory {
    pub summary: String,
    pub facts: Vec<String>,
    pub decisions: Vec<String>,
    pub open_items: Vec<String>,
    pub metadata: MemoryMetadata,
}

impl StructuredMemory {
    /// Whether any list section carries at least one item
    pub fn has_items(&self) -> bool {
        !self.facts.is_empty() || !self.decisions.is_empty() || !self.open_items.is_empty()
    }
}
