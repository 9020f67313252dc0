//! Topic relevance scoring.
//!
//! The score is `0.5 * word_count + 0.3 * position_score + 0.2 * density * 100`
//! where, over the lowercased topic words:
//!
//! - `word_count` sums non-overlapping substring occurrences in the lowercased text,
//! - `position_score` sums `max(0, 1 - first_index / min(1000, text_len))` for words present,
//! - `density` is `word_count / max(1, whitespace_token_count)`.
//!
//! Existing thresholds depend on this exact weighting.

/// Scores above this are relevant.
pub const RELEVANCE_THRESHOLD: f64 = 0.2;

/// Scores text against a fixed topic.
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    words: Vec<String>,
}

impl RelevanceScorer {
    pub fn new(topic: &str) -> Self {
        let mut words: Vec<String> = Vec::new();
        for word in topic.to_lowercase().split_whitespace() {
            if !words.iter().any(|w| w == word) {
                words.push(word.to_string());
            }
        }
        Self { words }
    }

    pub fn topic_words(&self) -> &[String] {
        &self.words
    }

    pub fn score(&self, text: &str) -> f64 {
        if self.words.is_empty() || text.is_empty() {
            return 0.0;
        }
        let text = text.to_lowercase();
        let text_len = text.chars().count();
        let window = text_len.min(1000) as f64;

        let mut word_count = 0usize;
        let mut position_score = 0.0f64;
        for word in &self.words {
            word_count += text.matches(word.as_str()).count();
            if let Some(byte_pos) = text.find(word.as_str()) {
                let pos = text[..byte_pos].chars().count() as f64;
                position_score += (1.0 - pos / window).max(0.0);
            }
        }

        let tokens = text.split_whitespace().count().max(1);
        let density = word_count as f64 / tokens as f64;

        0.5 * word_count as f64 + 0.3 * position_score + 0.2 * density * 100.0
    }

    pub fn is_relevant(&self, text: &str) -> bool {
        self.score(text) > RELEVANCE_THRESHOLD
    }
}

/// Relevance of `text` to `topic`.
pub fn score(text: &str, topic: &str) -> f64 {
    RelevanceScorer::new(topic).score(text)
}

pub fn is_relevant(text: &str, topic: &str) -> bool {
    RelevanceScorer::new(topic).is_relevant(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_text_scores_zero() {
        assert_eq!(score("", "python asyncio"), 0.0);
        assert!(!is_relevant("", "python"));
    }

    #[test]
    fn test_empty_topic_scores_zero() {
        assert_eq!(score("some text here", "   "), 0.0);
    }

    #[test]
    fn test_single_word_at_start() {
        // word_count 1, position 1.0, density 1/2
        let s = score("Rust rocks", "rust");
        assert!(approx(s, 0.5 + 0.3 + 0.2 * 0.5 * 100.0));
    }

    #[test]
    fn test_position_uses_character_index() {
        // "é" is two bytes but one character.
        let s = score("éé rust", "rust");
        let expected = 0.5 + 0.3 * (1.0 - 3.0 / 7.0) + 0.2 * (1.0 / 2.0) * 100.0;
        assert!(approx(s, expected));
    }

    #[test]
    fn test_substring_occurrences_count() {
        // "sync" occurs inside "asyncio" and "async", no whitespace token equals it.
        let s = score("asyncio async", "sync");
        let expected = 0.5 * 2.0 + 0.3 * (1.0 - 1.0 / 13.0) + 0.2 * 1.0 * 100.0;
        assert!(approx(s, expected));
    }

    #[test]
    fn test_position_saturates_for_long_text() {
        let mut text = "x ".repeat(600);
        text.push_str("topic");
        // First occurrence at 1200 >= 1000 clamps to zero.
        let s = score(&text, "topic");
        let expected = 0.5 + 0.0 + 0.2 * (1.0 / 601.0) * 100.0;
        assert!(approx(s, expected));
    }

    #[test]
    fn test_score_is_deterministic() {
        let text = "Python asyncio is a library to write concurrent code in Python.";
        assert_eq!(score(text, "Python asyncio"), score(text, "Python asyncio"));
    }

    #[test]
    fn test_irrelevant_text() {
        assert!(!is_relevant("completely unrelated words", "kubernetes"));
        assert!(is_relevant("kubernetes schedules pods", "kubernetes"));
    }

    #[test]
    fn test_duplicate_topic_words_counted_once() {
        let scorer = RelevanceScorer::new("Rust rust");
        assert_eq!(scorer.topic_words(), &["rust".to_string()]);
    }
}
