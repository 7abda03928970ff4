//! Language and salience detection
//!
//! Both halves are strategies behind traits so a statistical or model-based
//! classifier can replace the regex vote without touching the pipeline.

mod language;
mod salience;

pub use language::RegexLanguageDetector;
pub use salience::RegexSalienceScorer;

use crate::transcript::{joined_text, Turn};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Characters per approximate token
pub const APPROX_CHARS_PER_TOKEN: f64 = 4.0;

/// Detected conversation language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "es")]
    Spanish,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Spanish => "es",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Classifies the language of a block of text
pub trait LanguageDetector: Send + Sync {
    fn detect_language(&self, text: &str) -> Language;
}

/// Scores factual density of a block of text in a known language
pub trait SalienceScorer: Send + Sync {
    fn score(&self, text: &str, language: Language) -> usize;
}

/// Measurements derived from a transcript, recomputed per invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalienceMeasurement {
    pub char_count: usize,
    /// `char_count / 4`, kept fractional
    pub approx_token_count: f64,
    pub salience_score: usize,
    pub detected_language: Language,
}

/// Runs a language detector and a salience scorer over a transcript
pub struct Detector {
    language: Box<dyn LanguageDetector>,
    salience: Box<dyn SalienceScorer>,
}

impl Detector {
    pub fn new(language: Box<dyn LanguageDetector>, salience: Box<dyn SalienceScorer>) -> Self {
        Self { language, salience }
    }

    /// Language of the transcript, by the configured detector
    pub fn detect_language(&self, transcript: &[Turn]) -> Language {
        self.language.detect_language(&joined_text(transcript))
    }

    /// Measure a transcript: size, approximate tokens, language, salience
    pub fn measure(&self, transcript: &[Turn]) -> SalienceMeasurement {
        let full_text = joined_text(transcript);
        let char_count = full_text.chars().count();
        let approx_token_count = char_count as f64 / APPROX_CHARS_PER_TOKEN;
        let detected_language = self.language.detect_language(&full_text);
        let salience_score = self.salience.score(&full_text, detected_language);

        debug!(
            "Measured transcript: chars={}, tokens~{:.1}, salience={}, language={}",
            char_count, approx_token_count, salience_score, detected_language
        );

        SalienceMeasurement {
            char_count,
            approx_token_count,
            salience_score,
            detected_language,
        }
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(
            Box::new(RegexLanguageDetector::new()),
            Box::new(RegexSalienceScorer::new()),
        )
    }
}
