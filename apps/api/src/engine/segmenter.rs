//! Sentence Segmenter — splits a raw passage into sentences and candidate spans.
//!
//! Splitting is placeholder-protected: periods that do not end a sentence
//! (inside double quotes, in single-capital abbreviations like `U.S.`, between
//! digits in decimals like `3.14`) are swapped for a private-use placeholder
//! before the boundary scan and restored afterward. A boundary is a sentence
//! mark (`.`, `!`, `?`) followed by whitespace and an uppercase letter or an
//! opening quote.
//!
//! Pure functions of their input — no side effects, fully deterministic.

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Minimum whitespace-token count for a sentence to be a blanking candidate.
pub const MIN_VALID_WORDS: usize = 5;

/// Placeholder for protected periods. Private-use codepoint — never occurs in
/// real passage text.
const PERIOD_PLACEHOLDER: char = '\u{E000}';

/// One sentence of a passage. Created once by `segment`; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    /// Position in the passage, 0-based.
    pub index: usize,
    pub text: String,
    pub word_count: usize,
    /// `word_count >= MIN_VALID_WORDS` — only valid sentences may be blanked.
    pub is_valid: bool,
}

/// Granularity of a blanking candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpanKind {
    Word,
    Phrase,
    Sentence,
}

/// A candidate region of text eligible to be hidden behind a blank.
///
/// `source_index` is the sentence index for sentence-level spans, or the
/// byte offset of the first occurrence for word/phrase-level spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub kind: SpanKind,
    pub text: String,
    pub source_index: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Sentence segmentation
// ────────────────────────────────────────────────────────────────────────────

/// Splits a passage into sentences.
///
/// Empty pieces are dropped; surviving pieces are trimmed and indexed in
/// passage order.
pub fn segment(passage: &str) -> Vec<Sentence> {
    let protected = protect_periods(passage);

    split_protected(&protected)
        .into_iter()
        .map(|piece| restore_periods(piece.trim()))
        .filter(|piece| !piece.is_empty())
        .enumerate()
        .map(|(index, text)| {
            let word_count = text.split_whitespace().count();
            Sentence {
                index,
                is_valid: word_count >= MIN_VALID_WORDS,
                text,
                word_count,
            }
        })
        .collect()
}

/// Swaps non-boundary periods for `PERIOD_PLACEHOLDER`.
///
/// Three protected cases:
/// (a) periods inside double-quoted text,
/// (b) periods after a single capital letter (`A.`, and each step of `U.S.`),
/// (c) periods between two digits (`3.14`).
fn protect_periods(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_quote = false;

    for (i, &c) in chars.iter().enumerate() {
        if c == '"' {
            in_quote = !in_quote;
            out.push(c);
            continue;
        }
        if c != '.' {
            out.push(c);
            continue;
        }

        let prev = i.checked_sub(1).map(|p| chars[p]);
        let before_prev = i.checked_sub(2).map(|p| chars[p]);
        let next = chars.get(i + 1).copied();

        let single_capital = prev.is_some_and(|p| p.is_ascii_uppercase())
            && !before_prev.is_some_and(|b| b.is_alphabetic());
        let decimal = prev.is_some_and(|p| p.is_ascii_digit())
            && next.is_some_and(|n| n.is_ascii_digit());

        if in_quote || single_capital || decimal {
            out.push(PERIOD_PLACEHOLDER);
        } else {
            out.push('.');
        }
    }

    out
}

fn restore_periods(text: &str) -> String {
    text.replace(PERIOD_PLACEHOLDER, ".")
}

/// Splits protected text at sentence boundaries.
///
/// A boundary is `.`/`!`/`?`, then at least one whitespace char, then an
/// uppercase letter or an opening quote. The boundary mark stays with the
/// preceding piece; the whitespace run belongs to neither.
fn split_protected(protected: &str) -> Vec<String> {
    let chars: Vec<char> = protected.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        if matches!(chars[i], '.' | '!' | '?') {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j > i + 1 && j < chars.len() && is_sentence_opener(chars[j]) {
                pieces.push(chars[start..=i].iter().collect());
                start = j;
                i = j;
                continue;
            }
        }
        i += 1;
    }

    if start < chars.len() {
        pieces.push(chars[start..].iter().collect());
    }
    pieces
}

fn is_sentence_opener(c: char) -> bool {
    c.is_uppercase() || c == '"' || c == '\u{201C}' || c == '('
}

// ────────────────────────────────────────────────────────────────────────────
// Word/phrase candidate scan
// ────────────────────────────────────────────────────────────────────────────

/// Closed dictionary of multi-word idioms, 2–4 tokens each, lowercase.
///
/// Matched greedily longest-first so that shorter entries never fragment a
/// longer idiom.
static IDIOM_DICTIONARY: &[&str] = &[
    // 4-token
    "as a result of",
    "as soon as possible",
    "at the expense of",
    "in the event of",
    "on the other hand",
    "with the exception of",
    // 3-token
    "as well as",
    "by means of",
    "come up with",
    "get rid of",
    "in addition to",
    "in front of",
    "in order to",
    "in spite of",
    "in terms of",
    "look forward to",
    "on behalf of",
    "put up with",
    "run out of",
    "take care of",
    // 2-token
    "according to",
    "because of",
    "due to",
    "instead of",
    "prior to",
];

const MAX_IDIOM_TOKENS: usize = 4;
const MIN_IDIOM_TOKENS: usize = 2;

/// Walks the token stream emitting idiom (`Phrase`) spans via greedy
/// longest-match against `IDIOM_DICTIONARY`, falling back to single `Word`
/// spans. Tokens that are pure punctuation are skipped.
pub fn scan_candidates(text: &str) -> Vec<Span> {
    let tokens = tokenize(text);
    let normalized: Vec<String> = tokens.iter().map(|(_, t)| normalize_token(t)).collect();

    let mut spans = Vec::new();
    let mut i = 0usize;

    while i < tokens.len() {
        let mut matched_len = None;
        for len in (MIN_IDIOM_TOKENS..=MAX_IDIOM_TOKENS).rev() {
            if i + len > tokens.len() {
                continue;
            }
            let phrase = normalized[i..i + len].join(" ");
            if IDIOM_DICTIONARY.contains(&phrase.as_str()) {
                matched_len = Some(len);
                break;
            }
        }

        match matched_len {
            Some(len) => {
                let (start, _) = tokens[i];
                let (last_offset, last_token) = tokens[i + len - 1];
                let end = last_offset + last_token.len();
                spans.push(Span {
                    kind: SpanKind::Phrase,
                    text: text[start..end].to_string(),
                    source_index: start,
                });
                i += len;
            }
            None => {
                let (offset, token) = tokens[i];
                let core = token.trim_matches(|c: char| !c.is_alphanumeric());
                if !core.is_empty() {
                    let lead = token.len()
                        - token
                            .trim_start_matches(|c: char| !c.is_alphanumeric())
                            .len();
                    spans.push(Span {
                        kind: SpanKind::Word,
                        text: core.to_string(),
                        source_index: offset + lead,
                    });
                }
                i += 1;
            }
        }
    }

    spans
}

/// Whitespace tokenizer preserving byte offsets into the source text.
fn tokenize(text: &str) -> Vec<(usize, &str)> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push((s, &text[s..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push((s, &text[s..]));
    }
    tokens
}

/// Lowercases a token and strips surrounding punctuation for dictionary lookup.
fn normalize_token(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
