//! Summary length tiers

use crate::detect::Language;
use serde::{Deserialize, Serialize};

/// Below this many approximate tokens a summary is `Short`
const SHORT_TIER_MAX_TOKENS: f64 = 500.0;

/// Below this many approximate tokens a summary is `Medium`
const MEDIUM_TIER_MAX_TOKENS: f64 = 1000.0;

/// Target verbosity of a plain summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryTier {
    Short,
    Medium,
    Long,
}

impl SummaryTier {
    /// Sentence-count guidance placed in the summarizer prompt
    pub fn sentence_guide(&self, language: Language) -> &'static str {
        match (self, language) {
            (Self::Short, Language::English) => "1–2 sentences",
            (Self::Medium, Language::English) => "2–3 sentences",
            (Self::Long, Language::English) => "3–5 sentences",
            (Self::Short, Language::Spanish) => "1–2 oraciones",
            (Self::Medium, Language::Spanish) => "2–3 oraciones",
            (Self::Long, Language::Spanish) => "3–5 oraciones",
        }
    }
}

impl std::fmt::Display for SummaryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Short => write!(f, "short"),
            Self::Medium => write!(f, "medium"),
            Self::Long => write!(f, "long"),
        }
    }
}

/// Map an approximate token count to a summary tier
pub fn pick_tier(approx_token_count: f64) -> SummaryTier {
    if approx_token_count < SHORT_TIER_MAX_TOKENS {
        SummaryTier::Short
    } else if approx_token_count < MEDIUM_TIER_MAX_TOKENS {
        SummaryTier::Medium
    } else {
        SummaryTier::Long
    }
}
