//! Exclusion Tracker — finds spans already parenthesized in the source passage.
//!
//! Anything inside `(...)` in the original text is permanently ineligible for
//! blanking. Passages are not expected to contain nested parentheses; a nested
//! or unterminated `(` is a malformed-input warning, not an error — scanning
//! stops adding exclusions at that point and the pipeline continues with
//! whatever coverage was collected.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A byte-offset range `[start, end)` of passage text enclosed in parentheses
/// (delimiters excluded). Computed once; read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedSpan {
    pub start: usize,
    pub end: usize,
}

impl ExcludedSpan {
    /// True if `[start, end)` lies entirely inside this span.
    pub fn contains_range(&self, start: usize, end: usize) -> bool {
        self.start <= start && end <= self.end
    }
}

/// Scans the passage for matched `(...)` pairs and records each interior range.
pub fn find_excluded(passage: &str) -> Vec<ExcludedSpan> {
    let mut spans = Vec::new();
    let mut open: Option<usize> = None;

    for (i, c) in passage.char_indices() {
        match c {
            '(' => {
                if open.is_some() {
                    warn!(
                        offset = i,
                        "malformed input: nested '(' — exclusion scan stops here"
                    );
                    return spans;
                }
                open = Some(i);
            }
            ')' => {
                if let Some(start) = open.take() {
                    spans.push(ExcludedSpan {
                        start: start + 1,
                        end: i,
                    });
                }
                // stray ')' with no matching '(' is ignored
            }
            _ => {}
        }
    }

    if let Some(start) = open {
        warn!(
            offset = start,
            "malformed input: unterminated '(' — interior not excluded"
        );
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_parentheses_yields_nothing() {
        assert!(find_excluded("plain text with no brackets").is_empty());
    }

    #[test]
    fn test_single_pair_interior_range() {
        let passage = "before (inside) after";
        let spans = find_excluded(passage);
        assert_eq!(spans.len(), 1);
        assert_eq!(&passage[spans[0].start..spans[0].end], "inside");
    }

    #[test]
    fn test_multiple_pairs() {
        let passage = "(a) middle (b)";
        let spans = find_excluded(passage);
        assert_eq!(spans.len(), 2);
        assert_eq!(&passage[spans[0].start..spans[0].end], "a");
        assert_eq!(&passage[spans[1].start..spans[1].end], "b");
    }

    #[test]
    fn test_unterminated_open_excludes_nothing_past_it() {
        let spans = find_excluded("good (kept) then (never closed");
        assert_eq!(spans.len(), 1, "only the closed pair counts");
    }

    #[test]
    fn test_nested_open_stops_scan() {
        let spans = find_excluded("(outer (inner) rest) and (later)");
        // nested '(' aborts the scan — nothing before it had closed
        assert!(spans.is_empty());
    }

    #[test]
    fn test_stray_close_is_ignored() {
        let passage = "odd ) here (pair) done";
        let spans = find_excluded(passage);
        assert_eq!(spans.len(), 1);
        assert_eq!(&passage[spans[0].start..spans[0].end], "pair");
    }

    #[test]
    fn test_contains_range() {
        let span = ExcludedSpan { start: 5, end: 10 };
        assert!(span.contains_range(5, 10));
        assert!(span.contains_range(6, 9));
        assert!(!span.contains_range(4, 9));
        assert!(!span.contains_range(6, 11));
    }
}
