//! Scoring signals extracted from utterance text.
//!
//! Heuristic and cheap. Every score is in `0.0..=1.0` except pacing, which
//! is raw words per minute.

use std::sync::LazyLock;

use regex::Regex;

/// Sentence terminators.
static SENTENCE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("valid sentence regex"));

/// Words that weaken a question or argument.
static HEDGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(um+|uh+|maybe|perhaps|sort of|kind of|i think|i guess|i suppose|possibly)\b")
        .expect("valid hedge regex")
});

/// Words that break courtroom decorum.
static HOSTILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(liar|lying|ridiculous|stupid|absurd|pathetic|shut up|nonsense)\b")
        .expect("valid hostile regex")
});

/// Average sentence length at or below which clarity is perfect.
const CLEAR_SENTENCE_WORDS: f64 = 20.0;
/// Average sentence length at which clarity bottoms out.
const RAMBLING_SENTENCE_WORDS: f64 = 45.0;

/// Clarity from average sentence length. `None` for empty text.
pub fn clarity_score(text: &str) -> Option<f64> {
    let lengths: Vec<usize> = SENTENCE_SPLIT
        .split(text)
        .map(|s| s.split_whitespace().count())
        .filter(|&n| n > 0)
        .collect();
    if lengths.is_empty() {
        return None;
    }
    let avg = lengths.iter().sum::<usize>() as f64 / lengths.len() as f64;
    let over = (avg - CLEAR_SENTENCE_WORDS).max(0.0);
    Some((1.0 - over / (RAMBLING_SENTENCE_WORDS - CLEAR_SENTENCE_WORDS)).clamp(0.0, 1.0))
}

/// Tone from hedge and hostile word density. Hostile words count double.
pub fn tone_score(text: &str) -> Option<f64> {
    let words = text.split_whitespace().count();
    if words == 0 {
        return None;
    }
    let hedges = HEDGE_PATTERN.find_iter(text).count();
    let hostile = HOSTILE_PATTERN.find_iter(text).count();
    let penalty = (hedges + 2 * hostile) as f64 / words as f64 * 5.0;
    Some((1.0 - penalty).clamp(0.0, 1.0))
}

/// Words per minute given the narration duration.
pub fn pacing_wpm(words: usize, duration_ms: u64) -> Option<f64> {
    if words == 0 || duration_ms == 0 {
        return None;
    }
    Some(words as f64 * 60_000.0 / duration_ms as f64)
}

/// Pacing normalized to `0..=1` against a ceiling.
pub fn pacing_score(wpm: f64, max_wpm: f64) -> f64 {
    if wpm <= max_wpm || wpm <= 0.0 {
        1.0
    } else {
        (max_wpm / wpm).clamp(0.0, 1.0)
    }
}

/// Share of alphabetic characters that are uppercase, with the letter count.
pub fn uppercase_ratio(text: &str) -> (f64, usize) {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return (0.0, 0);
    }
    let upper = letters.iter().filter(|c| c.is_uppercase()).count();
    (upper as f64 / letters.len() as f64, letters.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clarity_short_sentences() {
        let score = clarity_score("Where were you? Who was with you? What did you see?").unwrap();
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_clarity_rambling() {
        let long = "word ".repeat(60);
        let score = clarity_score(&long).unwrap();
        assert_eq!(score, 0.0);
        assert!(clarity_score("   ").is_none());
    }

    #[test]
    fn test_tone_penalizes_hedges_and_hostility() {
        let calm = tone_score("Please tell the jury what you observed that night.").unwrap();
        assert_eq!(calm, 1.0);
        let hedgy = tone_score("Um, maybe you sort of saw something?").unwrap();
        assert!(hedgy < 0.5);
        let hostile = tone_score("You are a liar and this is ridiculous.").unwrap();
        assert!(hostile < calm);
    }

    #[test]
    fn test_pacing() {
        assert_eq!(pacing_wpm(150, 60_000), Some(150.0));
        assert_eq!(pacing_wpm(10, 0), None);
        assert_eq!(pacing_score(150.0, 180.0), 1.0);
        assert_eq!(pacing_score(360.0, 180.0), 0.5);
    }

    #[test]
    fn test_uppercase_ratio() {
        let (ratio, letters) = uppercase_ratio("THIS IS OUTRAGEOUS!");
        assert_eq!(ratio, 1.0);
        assert_eq!(letters, 16);
        assert_eq!(uppercase_ratio("123").1, 0);
    }
}
