//! Finalized-utterance cleanup.
//!
//! Streaming recognition of a learner speaking a foreign language produces
//! stray known-language filler words, stutter repeats ("nice nice"), and
//! sentences transcribed twice. [`MessageCleaner::clean`] removes those
//! before an utterance becomes a permanent message.
//!
//! ## Rules
//!
//! 1. Split into sentences at runs of `.`, `!`, `?`.
//! 2. Per sentence, drop filler tokens (compared lower-cased with `.,!?;`
//!    stripped) and tokens equal to the previous surviving token.
//! 3. Drop empty sentences and repeated sentence bodies (first one wins).
//! 4. Rejoin with single spaces. `!`/`?` terminators are kept; plain
//!    periods become `.` and the final one is dropped.
//!
//! The function is pure and idempotent: `clean(clean(x)) == clean(x)`.

use std::collections::HashSet;

/// Known-language words treated as noise inside target-language speech.
pub const DEFAULT_FILLER_WORDS: &[&str] = &[
    "good", "and", "the", "is", "are", "you", "me", "what", "does", "this", "mean", "only",
];

/// Characters stripped from a token before comparing against the filler list.
const TOKEN_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';'];

/// Sentence-terminating characters.
fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Utterance cleaner with a configurable filler list.
#[derive(Debug, Clone)]
pub struct MessageCleaner {
    fillers: HashSet<String>,
}

impl Default for MessageCleaner {
    fn default() -> Self {
        Self::new(DEFAULT_FILLER_WORDS.iter().copied())
    }
}

impl MessageCleaner {
    /// Create a cleaner with the given filler words (case-insensitive).
    pub fn new<I, S>(fillers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            fillers: fillers
                .into_iter()
                .map(|w| w.as_ref().trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    /// Clean a finalized utterance. Returns an empty string when nothing
    /// survives; callers must treat that as "no content".
    pub fn clean(&self, raw: &str) -> String {
        let mut seen_bodies: HashSet<String> = HashSet::new();
        let mut sentences: Vec<(String, &str)> = Vec::new();

        for (body, terminator) in split_sentences(raw) {
            let cleaned = self.clean_sentence(body);
            if cleaned.is_empty() {
                continue;
            }
            if !seen_bodies.insert(cleaned.clone()) {
                continue;
            }
            sentences.push((cleaned, terminator));
        }

        let last = sentences.len().saturating_sub(1);
        let mut out = String::new();
        for (i, (body, terminator)) in sentences.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(body);
            if terminator.contains(['!', '?']) {
                out.push_str(terminator);
            } else if i < last {
                out.push('.');
            }
        }

        out.trim().to_string()
    }

    fn clean_sentence(&self, sentence: &str) -> String {
        let mut kept: Vec<&str> = Vec::new();
        for token in sentence.split_whitespace() {
            if self.is_filler(token) {
                continue;
            }
            if kept.last() == Some(&token) {
                continue;
            }
            kept.push(token);
        }
        kept.join(" ")
    }

    fn is_filler(&self, token: &str) -> bool {
        let normalized: String = token
            .chars()
            .filter(|c| !TOKEN_PUNCTUATION.contains(c))
            .collect::<String>()
            .to_lowercase();
        !normalized.is_empty() && self.fillers.contains(&normalized)
    }
}

/// Split `text` into `(body, terminator_run)` pairs. The last pair has an
/// empty terminator when the text does not end with punctuation.
fn split_sentences(text: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_terminator(c) {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if !is_terminator(next) {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }
        out.push((&text[start..i], &text[i..end]));
        start = end;
    }

    if start < text.len() {
        out.push((&text[start..], ""));
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────
