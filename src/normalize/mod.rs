//! Text normalization applied before embedding.
//!
//! The same cleaning transform runs at ingestion and at query time so that
//! stored vectors and query vectors are derived from comparable text. The
//! low-signal gates only apply to ingested content.

use crate::config::NormalizerSettings;
use regex::Regex;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Why a text was rejected as low-signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Nothing left after cleaning.
    Empty,
    /// Only digits.
    Digits,
    /// Only punctuation, dot leaders or separators.
    Punctuation,
    /// Shorter than the configured minimum.
    TooShort { chars: usize },
    /// Too few alphabetic characters.
    LowAlphaRatio { ratio: f32 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Empty => write!(f, "empty after cleaning"),
            Rejection::Digits => write!(f, "digits only"),
            Rejection::Punctuation => write!(f, "punctuation only"),
            Rejection::TooShort { chars } => write!(f, "too short ({} chars)", chars),
            Rejection::LowAlphaRatio { ratio } => write!(f, "low alphabetic ratio ({:.2})", ratio),
        }
    }
}

/// Deterministic text cleaner.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    min_chars: usize,
    min_alpha_ratio: f32,
    max_chars: usize,
    bullets: Regex,
    timestamps: Regex,
    whitespace: Regex,
}

impl TextNormalizer {
    /// Create a normalizer with default thresholds.
    pub fn new() -> Self {
        Self::with_settings(&NormalizerSettings::default())
    }

    /// Create a normalizer from configured thresholds.
    pub fn with_settings(settings: &NormalizerSettings) -> Self {
        Self {
            min_chars: settings.min_chars,
            min_alpha_ratio: settings.min_alpha_ratio,
            max_chars: settings.max_chars.max(1),
            bullets: Regex::new(r"[•▪▫◦]").expect("Invalid regex"),
            timestamps: Regex::new(r"\[\d{2}:\d{2}:\d{2}\]").expect("Invalid regex"),
            whitespace: Regex::new(r"\s+").expect("Invalid regex"),
        }
    }

    /// Clean text for embedding, returning an empty string for low-signal input.
    pub fn normalize(&self, raw: &str) -> String {
        match self.check(raw) {
            Ok(text) => text,
            Err(_) => String::new(),
        }
    }

    /// Clean text and run the low-signal gates, reporting why text was rejected.
    pub fn check(&self, raw: &str) -> Result<String, Rejection> {
        let text = self.clean(raw);
        match self.rejection(&text) {
            Some(reason) => Err(reason),
            None => Ok(text),
        }
    }

    /// Apply the cleaning transform only.
    pub fn clean(&self, raw: &str) -> String {
        let without_bullets = self.bullets.replace_all(raw, "");

        // NFKD splits accents and compatibility forms; whatever is still
        // outside ASCII afterwards is dropped.
        let mut text: String = without_bullets
            .nfkd()
            .filter(|c| c.is_ascii() && *c != '\0')
            .collect();

        // Removing one timestamp can splice the pieces of another together.
        loop {
            let next = self.timestamps.replace_all(&text, "");
            if next == text {
                break;
            }
            text = next.into_owned();
        }

        let collapsed = self.whitespace.replace_all(&text, " ");
        let trimmed = collapsed.trim();

        // ASCII only from here on, so byte offsets are char offsets.
        if trimmed.len() > self.max_chars {
            trimmed[..self.max_chars].trim_end().to_string()
        } else {
            trimmed.to_string()
        }
    }

    fn rejection(&self, text: &str) -> Option<Rejection> {
        if text.is_empty() {
            return Some(Rejection::Empty);
        }
        if text.chars().all(|c| c.is_ascii_digit()) {
            return Some(Rejection::Digits);
        }
        if text
            .chars()
            .all(|c| c.is_ascii_punctuation() || c.is_ascii_whitespace())
        {
            return Some(Rejection::Punctuation);
        }

        let chars = text.chars().count();
        if chars < self.min_chars {
            return Some(Rejection::TooShort { chars });
        }

        let alpha = text.chars().filter(|c| c.is_alphabetic()).count();
        let ratio = alpha as f32 / chars as f32;
        if ratio < self.min_alpha_ratio {
            return Some(Rejection::LowAlphaRatio { ratio });
        }

        None
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Count whitespace-separated tokens.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}
