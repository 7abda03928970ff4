//! Regex salience scoring: how much factual content a transcript carries

use super::{Language, SalienceScorer};
use regex::Regex;

/// One family of salience patterns, compiled for both languages
struct PatternFamily {
    name: &'static str,
    english: Regex,
    spanish: Regex,
}

impl PatternFamily {
    fn new(name: &'static str, english: &str, spanish: &str) -> Self {
        Self {
            name,
            english: Regex::new(english).unwrap(),
            spanish: Regex::new(spanish).unwrap(),
        }
    }

    fn for_language(&self, language: Language) -> &Regex {
        match language {
            Language::English => &self.english,
            Language::Spanish => &self.spanish,
        }
    }
}

/// Sums match counts across five families: dates, numbers/currency, proper
/// nouns, decision verbs and relative time expressions.
pub struct RegexSalienceScorer {
    families: Vec<PatternFamily>,
}

impl RegexSalienceScorer {
    pub fn new() -> Self {
        Self {
            families: Self::compile_families(),
        }
    }

    fn compile_families() -> Vec<PatternFamily> {
        vec![
            PatternFamily::new(
                "dates",
                r"(?i)\b(?:\d{1,2}\s?(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)|(?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2}|\d{4}-\d{2}-\d{2})\b",
                r"(?i)\b(?:\d{1,2}\s?(?:ene|feb|mar|abr|may|jun|jul|ago|sep|oct|nov|dic)|(?:enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|octubre|noviembre|diciembre)\s+(?:de\s+)?\d{1,2}|\d{4}-\d{2}-\d{2})\b",
            ),
            PatternFamily::new(
                "numbers",
                r"\b\d{1,3}(?:,\d{3})*(?:\.\d+)?\b|[£$€]\s?\d+",
                r"\b\d{1,3}(?:\.\d{3})*(?:,\d+)?\b|[€$]\s?\d+",
            ),
            PatternFamily::new(
                "proper_nouns",
                r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b",
                r"\b[A-Z][a-záéíóúñ]+(?:\s+[A-Z][a-záéíóúñ]+)*\b",
            ),
            PatternFamily::new(
                "decision_verbs",
                r"(?i)\b(?:confirm|decide|choose|must|need|require|should|agree|set|plan|schedule)\b",
                r"(?i)\b(?:confirmar|decidir|elegir|deber|necesitar|requerir|debería|acordar|establecer|planificar|programar)\b",
            ),
            PatternFamily::new(
                "time_expressions",
                r"(?i)\b(?:today|tomorrow|yesterday|next\s+(?:week|month|year)|last\s+(?:week|month|year)|this\s+(?:week|month|year))\b",
                r"(?i)\b(?:hoy|mañana|ayer|siguiente\s+(?:semana|mes|año|día)|pasado\s+(?:semana|mes|año|día)|esta\s+(?:semana|mes|año|día))\b",
            ),
        ]
    }

    /// Per-family match counts, in family order
    pub fn breakdown(&self, text: &str, language: Language) -> Vec<(&'static str, usize)> {
        self.families
            .iter()
            .map(|f| (f.name, f.for_language(language).find_iter(text).count()))
            .collect()
    }
}

impl Default for RegexSalienceScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SalienceScorer for RegexSalienceScorer {
    fn score(&self, text: &str, language: Language) -> usize {
        self.breakdown(text, language)
            .into_iter()
            .map(|(_, count)| count)
            .sum()
    }
}
