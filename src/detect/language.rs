//! Frequency-vote language detection (English / Spanish)

use super::{Language, LanguageDetector};
use regex::Regex;

/// Counts indicator-word matches for each language over the lower-cased
/// text. Spanish wins only with a strictly higher count; ties (including
/// zero/zero) resolve to English.
pub struct RegexLanguageDetector {
    spanish_patterns: Vec<Regex>,
    english_patterns: Vec<Regex>,
}

impl RegexLanguageDetector {
    pub fn new() -> Self {
        Self {
            spanish_patterns: Self::compile_spanish_patterns(),
            english_patterns: Self::compile_english_patterns(),
        }
    }

    fn compile_spanish_patterns() -> Vec<Regex> {
        vec![
            // articles, conjunctions, relatives
            Regex::new(r"\b(el|la|los|las|un|una|unos|unas|y|o|pero|porque|que|como|donde|cuando)\b").unwrap(),
            // ser/estar
            Regex::new(r"\b(es|son|está|están|era|eran|fue|fueron|será|serán)\b").unwrap(),
            // common verbs
            Regex::new(r"\b(hacer|hace|hizo|hará|decir|dice|dijo|dirá|poder|puede|pudo|podrá)\b").unwrap(),
            Regex::new(r"\b(tengo|tiene|tenía|tuvimos|tendremos)\b").unwrap(),
            // pronouns
            Regex::new(r"\b(me|te|se|nos|les|lo|la|le|los|las)\b").unwrap(),
            Regex::new(r"\b(muy|poco|nada|bien|mal|sí|no|aquí|allí)\b").unwrap(),
            // greetings
            Regex::new(r"\b(hola|gracias|por favor|perdón|disculpe)\b").unwrap(),
            // demonyms
            Regex::new(r"\b(español|hispano|latin|méxico|colombia|argentina)\b").unwrap(),
        ]
    }

    fn compile_english_patterns() -> Vec<Regex> {
        vec![
            Regex::new(r"\b(the|and|or|but|because|that|how|where|when)\b").unwrap(),
            Regex::new(r"\b(is|are|was|were|be|been|will|would|can|could|should)\b").unwrap(),
            Regex::new(r"\b(do|does|did|done|make|made|say|said|says|tell|told)\b").unwrap(),
            Regex::new(r"\b(have|has|had|having|get|got|give|gave|take|took)\b").unwrap(),
            Regex::new(r"\b(i|you|he|she|it|we|they|me|him|her|us|them|this|that|these|those)\b").unwrap(),
            Regex::new(r"\b(very|much|little|nothing|well|bad|yes|no|here|there)\b").unwrap(),
            Regex::new(r"\b(hello|thank you|please|sorry|excuse me)\b").unwrap(),
            Regex::new(r"\b(english|american|british|canadian)\b").unwrap(),
        ]
    }

    fn count_matches(patterns: &[Regex], text: &str) -> usize {
        patterns.iter().map(|p| p.find_iter(text).count()).sum()
    }

    /// Raw (spanish, english) vote counts, exposed for diagnostics
    pub fn scores(&self, text: &str) -> (usize, usize) {
        let lowered = text.to_lowercase();
        (
            Self::count_matches(&self.spanish_patterns, &lowered),
            Self::count_matches(&self.english_patterns, &lowered),
        )
    }
}

impl Default for RegexLanguageDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageDetector for RegexLanguageDetector {
    fn detect_language(&self, text: &str) -> Language {
        let (spanish, english) = self.scores(text);
        if spanish > english {
            Language::Spanish
        } else {
            Language::English
        }
    }
}
