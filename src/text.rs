//! Text preparation for speech synthesis.
//!
//! `split_into_chunks` breaks a text block into sentence-bounded chunks that fit
//! a model's character budget. `clean_for_speech` strips the characters TTS
//! models tend to stumble over.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// A sentence is everything up to and including a run of terminal punctuation.
static SENTENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^.!?]*[.!?]+").expect("sentence pattern is valid"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static CONTROL_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F-\x9F]").expect("control pattern is valid")
});

const SPEECH_REPLACEMENTS: &[(char, &str)] = &[
    ('„', "\""),
    ('“', "\""),
    ('”', "\""),
    ('’', "'"),
    ('‘', "'"),
    ('`', "'"),
    ('–', "-"),
    ('—', "-"),
    ('…', "..."),
];

/// Collapse whitespace runs and make sure the text ends with terminal punctuation.
pub fn normalize(text: &str) -> String {
    let mut normalized = WHITESPACE.replace_all(text, " ").trim().to_string();
    if !normalized.ends_with(['.', '!', '?']) {
        normalized.push('.');
    }
    normalized
}

/// Split `text` into sentence-bounded chunks of at most `max_chars` characters.
///
/// Consecutive sentences are joined greedily with a single space. A sentence
/// that alone exceeds `max_chars` becomes its own oversized chunk. The result
/// is never empty: blank input yields the normalized string `"."`.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let normalized = normalize(text);

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for sentence in SENTENCE
        .find_iter(&normalized)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
    {
        let sentence_len = sentence.chars().count();

        if current.is_empty() {
            current.push_str(sentence);
            current_len = sentence_len;
        } else if current_len + 1 + sentence_len <= max_chars {
            current.push(' ');
            current.push_str(sentence);
            current_len += 1 + sentence_len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
            current_len = sentence_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    if chunks.is_empty() {
        chunks.push(normalized);
    }

    debug!("Split text into {} chunks (max {} chars)", chunks.len(), max_chars);
    chunks
}

/// Strip control characters, map typographic punctuation to ASCII and collapse whitespace.
pub fn clean_for_speech(text: &str) -> String {
    let mut cleaned = CONTROL_CHARS.replace_all(text, "").into_owned();

    for (from, to) in SPEECH_REPLACEMENTS {
        if cleaned.contains(*from) {
            cleaned = cleaned.replace(*from, to);
        }
    }

    WHITESPACE.replace_all(&cleaned, " ").trim().to_string()
}

/// First `max_chars` characters of `text`, used to identify segments in diagnostics.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
