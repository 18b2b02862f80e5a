//! Bracket-Aware Rewriter — swaps chosen spans for labeled blank markers.
//!
//! The passage is parsed into segments alternately outside/inside parentheses.
//! Replacement only ever touches *outside* segments, so pre-existing
//! parenthetical content can never be blanked even if a selector exclusion
//! check had a gap. Every produced document is round-trip verified:
//! substituting the answers back must reproduce the source passage.

use serde::{Deserialize, Serialize};

use crate::engine::selector::BlankSpec;
use crate::engine::EngineError;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Underscores on each side of the label inside a blank marker. Fixed so the
/// marker's width never telegraphs the answer's length.
pub const BLANK_PAD: usize = 20;

/// A blanked passage plus its answer key. Immutable once validated;
/// `round_trip_ok` is always computed, never assumed, and is true for every
/// document that leaves the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlankedDocument {
    pub original_passage: String,
    pub blanked_text: String,
    /// Answers in label order (== order of appearance in the passage).
    pub answers: Vec<String>,
    pub round_trip_ok: bool,
}

/// One stretch of passage text, either between or inside parentheses.
/// `closed` records whether an inside segment had its `)` — needed to
/// reassemble unterminated input byte-for-byte.
#[derive(Debug, Clone, PartialEq)]
struct Segment {
    text: String,
    inside: bool,
    closed: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Rewriting
// ────────────────────────────────────────────────────────────────────────────

/// The marker that replaces a blanked span: `(____…A…____)`.
pub fn blank_marker(label: char) -> String {
    let pad = "_".repeat(BLANK_PAD);
    format!("({pad}{label}{pad})")
}

/// Replaces each spec's span with its labeled marker and verifies the result.
///
/// Specs are processed in label order. For each, the first occurrence of the
/// span text within the first matching outside-parentheses segment is
/// replaced. A span that cannot be placed, or a failed round-trip, is a
/// `BlankGenerationMismatch` — the caller discards the document and retries
/// selection or aborts.
pub fn rewrite(passage: &str, specs: &[BlankSpec]) -> Result<BlankedDocument, EngineError> {
    let mut segments = split_segments(passage);

    for spec in specs {
        let marker = blank_marker(spec.label);
        let placed = segments
            .iter_mut()
            .filter(|seg| !seg.inside)
            .find_map(|seg| {
                seg.text.find(&spec.span.text).map(|pos| {
                    seg.text
                        .replace_range(pos..pos + spec.span.text.len(), &marker);
                })
            })
            .is_some();

        if !placed {
            return Err(EngineError::BlankGenerationMismatch);
        }
    }

    let blanked_text = join_segments(&segments);
    let answers: Vec<String> = specs.iter().map(|s| s.span.text.clone()).collect();

    let round_trip_ok = verify_round_trip(passage, &blanked_text, specs);
    if !round_trip_ok {
        return Err(EngineError::BlankGenerationMismatch);
    }

    Ok(BlankedDocument {
        original_passage: passage.to_string(),
        blanked_text,
        answers,
        round_trip_ok,
    })
}

/// Substitutes every marker back with its answer, in label order, and compares
/// against the source. Comparison is after an outer `trim()` only — interior
/// whitespace differences would fail, leading/trailing ones are tolerated.
pub fn verify_round_trip(passage: &str, blanked_text: &str, specs: &[BlankSpec]) -> bool {
    let mut restored = blanked_text.to_string();
    for spec in specs {
        restored = restored.replacen(&blank_marker(spec.label), &spec.span.text, 1);
    }
    restored.trim() == passage.trim()
}

// ────────────────────────────────────────────────────────────────────────────
// Segment parsing
// ────────────────────────────────────────────────────────────────────────────

/// Splits text on `(` / `)` delimiters, tracking the inside/outside state.
/// Non-nested by contract; a stray `(` inside a parenthetical is kept as a
/// literal character so reassembly stays exact.
fn split_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut buffer = String::new();
    let mut inside = false;

    for c in text.chars() {
        match c {
            '(' if !inside => {
                segments.push(Segment {
                    text: std::mem::take(&mut buffer),
                    inside: false,
                    closed: true,
                });
                inside = true;
            }
            ')' if inside => {
                segments.push(Segment {
                    text: std::mem::take(&mut buffer),
                    inside: true,
                    closed: true,
                });
                inside = false;
            }
            _ => buffer.push(c),
        }
    }

    segments.push(Segment {
        text: buffer,
        inside,
        closed: !inside,
    });
    segments
}

/// Reassembles segments, re-inserting the original delimiters.
fn join_segments(segments: &[Segment]) -> String {
    let mut out = String::new();
    for seg in segments {
        if seg.inside {
            out.push('(');
            out.push_str(&seg.text);
            if seg.closed {
                out.push(')');
            }
        } else {
            out.push_str(&seg.text);
        }
    }
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
