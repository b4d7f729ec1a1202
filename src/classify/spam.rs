//! Rule-based spam classifier for review bodies.
//!
//! Every rule is evaluated independently and every rule that fires appends a
//! reason, so a verdict explains all of its causes, not just the first one.
//! Rules, in evaluation order:
//! - body shorter than `min_len` after trimming
//! - commercial spam keywords (case-insensitive)
//! - URL with an overly long tail
//! - one character repeated `repeated_char_run` times in a row
//! - run of `caps_run` capital letters/whitespace
//! - one word repeated `repeated_word_run` times in a row
//! - canned suspicious phrases (one reason per phrase)
//! - rating/text mismatch (5 stars with negative text, 1 star with positive text)
//!
//! The classifier is pure: same `(text, rating)` in, same verdict out.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

fn default_min_len() -> usize {
    10
}
fn default_url_tail_len() -> usize {
    15
}
fn default_repeated_char_run() -> usize {
    7
}
fn default_caps_run() -> usize {
    40
}
fn default_repeated_word_run() -> usize {
    4
}
fn default_mismatch_threshold() -> usize {
    3
}

fn default_commercial_patterns() -> Vec<String> {
    [
        "viagra",
        "cialis",
        "casino",
        "lottery",
        r"win \$",
        "click here",
        "free money",
        r"earn \$\d+",
        "work from home",
        "diet pill",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_suspicious_phrases() -> Vec<String> {
    [
        "call me at",
        "contact me on",
        "whatsapp me",
        "dm me",
        "follow me",
        "check my profile",
        "visit my website",
        "this is a test",
        "testing 123",
        "lorem ipsum",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_positive_words() -> Vec<String> {
    [
        "excellent",
        "amazing",
        "wonderful",
        "fantastic",
        "perfect",
        "love",
        "great",
        "best",
        "outstanding",
        "superb",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_negative_words() -> Vec<String> {
    [
        "terrible",
        "awful",
        "horrible",
        "worst",
        "disgusting",
        "filthy",
        "rude",
        "disaster",
        "pathetic",
        "useless",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Thresholds and word lists driving the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpamParams {
    /// Minimum trimmed body length (chars).
    #[serde(default = "default_min_len")]
    pub min_len: usize,
    /// Characters after `http(s)://` that make a URL suspicious.
    #[serde(default = "default_url_tail_len")]
    pub url_tail_len: usize,
    /// Total length of a same-character run that counts as spam.
    #[serde(default = "default_repeated_char_run")]
    pub repeated_char_run: usize,
    /// Length of a capitals/whitespace run that counts as shouting.
    #[serde(default = "default_caps_run")]
    pub caps_run: usize,
    /// Total consecutive occurrences of one word that count as spam.
    #[serde(default = "default_repeated_word_run")]
    pub repeated_word_run: usize,
    /// Lexicon hits needed (strictly more than) for a rating mismatch.
    #[serde(default = "default_mismatch_threshold")]
    pub mismatch_threshold: usize,
    /// Regex fragments, matched case-insensitively on word boundaries.
    #[serde(default = "default_commercial_patterns")]
    pub commercial_patterns: Vec<String>,
    #[serde(default = "default_suspicious_phrases")]
    pub suspicious_phrases: Vec<String>,
    #[serde(default = "default_positive_words")]
    pub positive_words: Vec<String>,
    #[serde(default = "default_negative_words")]
    pub negative_words: Vec<String>,
}

impl Default for SpamParams {
    fn default() -> Self {
        Self {
            min_len: default_min_len(),
            url_tail_len: default_url_tail_len(),
            repeated_char_run: default_repeated_char_run(),
            caps_run: default_caps_run(),
            repeated_word_run: default_repeated_word_run(),
            mismatch_threshold: default_mismatch_threshold(),
            commercial_patterns: default_commercial_patterns(),
            suspicious_phrases: default_suspicious_phrases(),
            positive_words: default_positive_words(),
            negative_words: default_negative_words(),
        }
    }
}

/// One fired rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpamSignal {
    TooShort,
    CommercialKeywords,
    SuspiciousUrl,
    RepeatedCharacters,
    ExcessiveCaps,
    RepeatedWords,
    SuspiciousPhrase(String),
    /// 5 stars, clearly negative text.
    TopRatingNegativeText,
    /// 1 star, clearly positive text.
    BottomRatingPositiveText,
}

impl fmt::Display for SpamSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort => f.write_str("Review text too short"),
            Self::CommercialKeywords => f.write_str("Commercial spam keywords"),
            Self::SuspiciousUrl => f.write_str("Suspicious URL in review"),
            Self::RepeatedCharacters => f.write_str("Repeated character spam"),
            Self::ExcessiveCaps => f.write_str("Excessive caps"),
            Self::RepeatedWords => f.write_str("Repeated word pattern"),
            Self::SuspiciousPhrase(p) => write!(f, "Suspicious phrase: \"{p}\""),
            Self::TopRatingNegativeText => {
                f.write_str("Rating-sentiment mismatch: 5 stars with very negative text")
            }
            Self::BottomRatingPositiveText => {
                f.write_str("Rating-sentiment mismatch: 1 star with very positive text")
            }
        }
    }
}

/// Spam verdict: `is_spam` iff at least one reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpamVerdict {
    pub is_spam: bool,
    pub reasons: Vec<String>,
    #[serde(skip)]
    pub signals: Vec<SpamSignal>,
}

impl SpamVerdict {
    fn from_signals(signals: Vec<SpamSignal>) -> Self {
        Self {
            is_spam: !signals.is_empty(),
            reasons: signals.iter().map(ToString::to_string).collect(),
            signals,
        }
    }
}

/// Compiled classifier. Build once, share behind an `Arc`.
#[derive(Debug, Clone)]
pub struct SpamClassifier {
    params: SpamParams,
    commercial: Option<Regex>,
    url: Regex,
    caps: Regex,
    positive: Option<Regex>,
    negative: Option<Regex>,
    phrases: Vec<String>,
}

impl Default for SpamClassifier {
    fn default() -> Self {
        // Defaults are static and known to compile.
        Self::new(SpamParams::default()).expect("default spam params compile")
    }
}

impl SpamClassifier {
    pub fn new(mut params: SpamParams) -> Result<Self, AppError> {
        // Basic parameter hygiene
        params.repeated_char_run = params.repeated_char_run.max(2);
        params.repeated_word_run = params.repeated_word_run.max(2);
        params.caps_run = params.caps_run.max(1);

        let commercial = alternation(&params.commercial_patterns, false)?;
        let url = compile(&format!(r"(?i)https?://\S{{{},}}", params.url_tail_len))?;
        let caps = compile(&format!(r"[A-Z\s]{{{},}}", params.caps_run))?;
        let positive = alternation(&params.positive_words, true)?;
        let negative = alternation(&params.negative_words, true)?;
        let phrases = params
            .suspicious_phrases
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        Ok(Self {
            params,
            commercial,
            url,
            caps,
            positive,
            negative,
            phrases,
        })
    }

    /// Run every rule over `(text, rating)`.
    pub fn classify(&self, text: &str, rating: u8) -> SpamVerdict {
        let mut signals = Vec::new();

        if text.trim().chars().count() < self.params.min_len {
            signals.push(SpamSignal::TooShort);
        }
        if self.commercial.as_ref().is_some_and(|re| re.is_match(text)) {
            signals.push(SpamSignal::CommercialKeywords);
        }
        if self.url.is_match(text) {
            signals.push(SpamSignal::SuspiciousUrl);
        }
        if longest_char_run(text) >= self.params.repeated_char_run {
            signals.push(SpamSignal::RepeatedCharacters);
        }
        if self.caps.is_match(text) {
            signals.push(SpamSignal::ExcessiveCaps);
        }
        if longest_word_run(text) >= self.params.repeated_word_run {
            signals.push(SpamSignal::RepeatedWords);
        }

        let lower = text.to_lowercase();
        for phrase in &self.phrases {
            if lower.contains(phrase.as_str()) {
                signals.push(SpamSignal::SuspiciousPhrase(phrase.clone()));
            }
        }

        let pos = count_matches(self.positive.as_ref(), text);
        let neg = count_matches(self.negative.as_ref(), text);
        let limit = self.params.mismatch_threshold;
        if rating == 5 && neg > limit && pos == 0 {
            signals.push(SpamSignal::TopRatingNegativeText);
        }
        if rating == 1 && pos > limit && neg == 0 {
            signals.push(SpamSignal::BottomRatingPositiveText);
        }

        SpamVerdict::from_signals(signals)
    }
}

fn compile(pattern: &str) -> Result<Regex, AppError> {
    Regex::new(pattern).map_err(|e| AppError::Config(format!("spam pattern '{pattern}': {e}")))
}

/// `(?i)\b(?:a|b|c)\b` with ASCII word boundaries, so an accented letter
/// next to a keyword still counts as a boundary. `None` when the list is
/// empty. Literal words get escaped.
fn alternation(items: &[String], literal: bool) -> Result<Option<Regex>, AppError> {
    let parts: Vec<String> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| if literal { regex::escape(s) } else { s.to_string() })
        .collect();
    if parts.is_empty() {
        return Ok(None);
    }
    compile(&format!(r"(?i)(?-u:\b)(?:{})(?-u:\b)", parts.join("|"))).map(Some)
}

fn count_matches(re: Option<&Regex>, text: &str) -> usize {
    re.map(|r| r.find_iter(text).count()).unwrap_or(0)
}

/// Longest run of one character (case-insensitive); line breaks end a run.
fn longest_char_run(text: &str) -> usize {
    let mut best = 0usize;
    let mut run = 0usize;
    let mut prev: Option<char> = None;

    for ch in text.chars() {
        if ch == '\n' || ch == '\r' {
            prev = None;
            run = 0;
            continue;
        }
        let folded = fold(ch);
        if prev == Some(folded) {
            run += 1;
        } else {
            prev = Some(folded);
            run = 1;
        }
        best = best.max(run);
    }
    best
}

fn fold(ch: char) -> char {
    ch.to_lowercase().next().unwrap_or(ch)
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Longest run of one word repeated with only whitespace in between
/// (case-insensitive). The last repetition may be a prefix of a longer token,
/// e.g. "go go go gone" counts four.
fn longest_word_run(text: &str) -> usize {
    let chunks: Vec<&str> = text.split_whitespace().collect();
    let mut best = 0usize;

    for (i, chunk) in chunks.iter().enumerate() {
        // The word that opens a run must touch the following whitespace.
        let start = chunk
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_word_char(*c))
            .last()
            .map(|(idx, _)| idx);
        let Some(start) = start else { continue };
        let word = chunk[start..].to_ascii_lowercase();

        let mut run = 1usize;
        for next in &chunks[i + 1..] {
            let next = next.to_ascii_lowercase();
            if next == word {
                run += 1;
                continue;
            }
            if next.starts_with(&word) {
                run += 1;
            }
            break;
        }
        best = best.max(run);
    }
    best
}
