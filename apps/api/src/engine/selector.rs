//! Span Selector — decides which sentences to hide behind blanks.
//!
//! The external suggestion oracle is consulted first (bounded retries, fixed
//! backoff); every reply is validated before acceptance because the oracle is
//! untrusted. When the oracle budget is exhausted, a deterministic stride
//! heuristic picks the blanks locally. Oracle failures never leak out of this
//! module as long as the fallback succeeds.
//!
//! Labels are assigned by order of appearance in the original passage, never
//! by selection order — oracle replies are unordered.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::engine::exclusion::ExcludedSpan;
use crate::engine::oracle::{OracleError, SuggestionOracle, SuggestionReply};
use crate::engine::segmenter::{Sentence, Span, SpanKind};
use crate::engine::EngineError;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// A labeled blank: which span is hidden and which answer letter it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlankSpec {
    /// `'A'..='E'`, in passage order.
    pub label: char,
    pub span: Span,
}

/// Tunables for the selection loop. Retry state stays a local loop counter —
/// no process-wide retry bookkeeping.
#[derive(Debug, Clone)]
pub struct BlankPolicy {
    /// Total oracle attempts before the local fallback takes over.
    pub oracle_attempts: u32,
    /// Fixed delay between consecutive oracle attempts.
    pub oracle_backoff_ms: u64,
}

impl Default for BlankPolicy {
    fn default() -> Self {
        Self {
            oracle_attempts: 3,
            oracle_backoff_ms: 250,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Blank-count policy table
// ────────────────────────────────────────────────────────────────────────────

/// Maps the number of valid candidate sentences to the number of blanks.
///
/// | valid | blanks |
/// |-------|--------|
/// | ≥10   | 5      |
/// | 8–9   | 4      |
/// | 6–7   | 3      |
/// | 4–5   | 3      |
/// | 2–3   | 2      |
/// | <2    | error  |
pub fn blank_count_for(valid_count: usize) -> Result<usize, EngineError> {
    match valid_count {
        n if n >= 10 => Ok(5),
        8..=9 => Ok(4),
        6..=7 => Ok(3),
        4..=5 => Ok(3),
        2..=3 => Ok(2),
        n => Err(EngineError::InsufficientContent { valid: n }),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Selection
// ────────────────────────────────────────────────────────────────────────────

/// Chooses the sentences to blank.
///
/// Candidates are the valid sentences whose text does not fall inside an
/// excluded (pre-parenthesized) region of `passage`. The oracle is consulted
/// up to `policy.oracle_attempts` times; refusals, transport failures, and
/// invalid replies all consume an attempt. The stride fallback then decides.
pub async fn select(
    sentences: &[Sentence],
    excluded: &[ExcludedSpan],
    passage: &str,
    oracle: &dyn SuggestionOracle,
    policy: &BlankPolicy,
) -> Result<Vec<BlankSpec>, EngineError> {
    let candidates: Vec<&Sentence> = sentences
        .iter()
        .filter(|s| s.is_valid && !sentence_is_excluded(passage, s, excluded))
        .collect();

    let blank_count = blank_count_for(candidates.len())?;
    let texts: Vec<String> = candidates.iter().map(|s| s.text.clone()).collect();

    let mut picks: Option<Vec<usize>> = None;

    for attempt in 1..=policy.oracle_attempts {
        if attempt > 1 {
            tokio::time::sleep(std::time::Duration::from_millis(policy.oracle_backoff_ms)).await;
        }

        match oracle.suggest(&texts, blank_count).await {
            Ok(reply) => match validate_reply(&reply, &texts, blank_count) {
                Some(indices) => {
                    picks = Some(indices);
                    break;
                }
                None => warn!(attempt, "oracle reply failed validation — retrying"),
            },
            Err(OracleError::Refusal(marker)) => {
                warn!(attempt, marker = %marker, "oracle refused the request")
            }
            Err(OracleError::Transient(e)) => {
                warn!(attempt, error = %e, "oracle call failed")
            }
        }
    }

    let picks = match picks {
        Some(p) => p,
        None => {
            info!(
                candidates = candidates.len(),
                blanks = blank_count,
                "oracle budget exhausted — using deterministic stride selection"
            );
            fallback_select(candidates.len(), blank_count)?
        }
    };

    // Label by order of appearance in the passage, not by selection order.
    let mut chosen: Vec<&Sentence> = picks.iter().map(|&i| candidates[i]).collect();
    chosen.sort_by_key(|s| s.index);

    Ok(chosen
        .iter()
        .enumerate()
        .map(|(i, s)| BlankSpec {
            label: (b'A' + i as u8) as char,
            span: Span {
                kind: SpanKind::Sentence,
                text: s.text.clone(),
                source_index: s.index,
            },
        })
        .collect())
}

// ────────────────────────────────────────────────────────────────────────────
// Oracle reply validation
// ────────────────────────────────────────────────────────────────────────────

/// Validates an oracle reply. Returns the accepted indices (into `texts`) or
/// `None` when any rule is violated:
/// (i) exact count, (ii) byte-identical sentence texts, (iii) in-range unique
/// indices with no two adjacent after sorting.
fn validate_reply(
    reply: &SuggestionReply,
    texts: &[String],
    required: usize,
) -> Option<Vec<usize>> {
    if reply.indices.len() != required || reply.sentences.len() != required {
        return None;
    }

    let mut sorted = reply.indices.clone();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != required || sorted.iter().any(|&i| i >= texts.len()) {
        return None;
    }
    if sorted.windows(2).any(|w| w[1] - w[0] < 2) {
        return None;
    }

    // The oracle must not paraphrase — every returned text must exist verbatim.
    if reply
        .sentences
        .iter()
        .any(|s| !texts.iter().any(|t| t == s))
    {
        return None;
    }

    Some(reply.indices.clone())
}

// ────────────────────────────────────────────────────────────────────────────
// Deterministic fallback
// ────────────────────────────────────────────────────────────────────────────

/// Stride-based local selection: index 0 first, then roughly every
/// `count / required` positions, skipping chosen or adjacent indices by
/// scanning forward then backward from the ideal position.
///
/// Non-adjacency is unsatisfiable at the policy floor (2 candidates, 2
/// blanks); the blank count takes precedence there and adjacency is relaxed
/// for the remaining picks.
fn fallback_select(count: usize, required: usize) -> Result<Vec<usize>, EngineError> {
    if let Some(picks) = stride_scan(count, required, true) {
        return Ok(picks);
    }
    if let Some(picks) = stride_scan(count, required, false) {
        warn!(
            count,
            required, "stride selection relaxed non-adjacency to honor the blank count"
        );
        return Ok(picks);
    }
    Err(EngineError::SelectionExhausted {
        required,
        available: count,
    })
}

fn stride_scan(count: usize, required: usize, enforce_gap: bool) -> Option<Vec<usize>> {
    if required == 0 || required > count {
        return None;
    }

    let stride = (count / required).max(1);
    let mut chosen: Vec<usize> = Vec::with_capacity(required);
    let mut ideal = 0usize;

    for _ in 0..required {
        let is_free = |i: usize| {
            !chosen.contains(&i) && (!enforce_gap || chosen.iter().all(|&c| c.abs_diff(i) != 1))
        };
        let pos = (ideal..count)
            .find(|&i| is_free(i))
            .or_else(|| (0..ideal).rev().find(|&i| is_free(i)))?;
        chosen.push(pos);
        ideal = (pos + stride).min(count - 1);
    }

    Some(chosen)
}

// ────────────────────────────────────────────────────────────────────────────
// Exclusion filter
// ────────────────────────────────────────────────────────────────────────────

/// True if the sentence's full text (net of any parens it carries itself)
/// falls inside an excluded region of the passage.
fn sentence_is_excluded(passage: &str, sentence: &Sentence, excluded: &[ExcludedSpan]) -> bool {
    if excluded.is_empty() {
        return false;
    }
    let Some(pos) = passage.find(&sentence.text) else {
        return false;
    };

    let text = &sentence.text;
    let lead = text.len() - text.trim_start_matches('(').len();
    let trail = text.len() - text.trim_end_matches(')').len();
    let start = pos + lead;
    let end = pos + text.len() - trail;
    if start >= end {
        return false;
    }

    excluded.iter().any(|span| span.contains_range(start, end))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::exclusion::find_excluded;
    use crate::engine::segmenter::segment;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted oracle for tests: pops one pre-programmed reply per call and
    /// counts how many calls were made.
    struct ScriptedOracle {
        replies: Mutex<VecDeque<Result<SuggestionReply, OracleError>>>,
        calls: AtomicU32,
    }

    impl ScriptedOracle {
        fn new(replies: Vec<Result<SuggestionReply, OracleError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicU32::new(0),
            }
        }

        /// An oracle that refuses every call — forces the local fallback.
        fn always_refusing() -> Self {
            Self::new(vec![])
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl SuggestionOracle for ScriptedOracle {
        async fn suggest(
            &self,
            _sentences: &[String],
            _required_count: usize,
        ) -> Result<SuggestionReply, OracleError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(OracleError::Refusal("i cannot".to_string())))
        }
    }

    fn refusal() -> Result<SuggestionReply, OracleError> {
        Err(OracleError::Refusal("i'm sorry".to_string()))
    }

    fn fast_policy() -> BlankPolicy {
        BlankPolicy {
            oracle_attempts: 3,
            oracle_backoff_ms: 1,
        }
    }

    /// Three sentences of 8, 9, and 10 words — the §8 scenario passage.
    fn three_sentence_passage() -> &'static str {
        "Alpha bravo charlie delta echo foxtrot golf hotel. \
         India juliet kilo lima mike november oscar papa quebec. \
         Romeo sierra tango uniform victor whiskey xray yankee zulu omega."
    }

    /// Six valid sentences, no parentheses.
    fn six_sentence_passage() -> &'static str {
        "First sentence has five good words here. \
         Second sentence also has plenty of words. \
         Third sentence likewise carries enough words along. \
         Fourth sentence rounds out the passage nicely. \
         Fifth sentence closes the whole passage off. \
         Sixth sentence finally ends the passage here."
    }

    // ── blank-count policy table ────────────────────────────────────────────

    #[test]
    fn test_blank_count_policy_table() {
        assert_eq!(blank_count_for(15).unwrap(), 5);
        assert_eq!(blank_count_for(10).unwrap(), 5);
        assert_eq!(blank_count_for(9).unwrap(), 4);
        assert_eq!(blank_count_for(8).unwrap(), 4);
        assert_eq!(blank_count_for(7).unwrap(), 3);
        assert_eq!(blank_count_for(6).unwrap(), 3);
        assert_eq!(blank_count_for(5).unwrap(), 3);
        assert_eq!(blank_count_for(4).unwrap(), 3);
        assert_eq!(blank_count_for(3).unwrap(), 2);
        assert_eq!(blank_count_for(2).unwrap(), 2);
    }

    #[test]
    fn test_blank_count_below_two_is_insufficient() {
        for n in [0usize, 1] {
            assert!(matches!(
                blank_count_for(n),
                Err(EngineError::InsufficientContent { .. })
            ));
        }
    }

    // ── fallback heuristic ──────────────────────────────────────────────────

    #[test]
    fn test_fallback_three_candidates_two_blanks_picks_0_and_2() {
        assert_eq!(fallback_select(3, 2).unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_fallback_ten_candidates_five_blanks_spread() {
        let picks = fallback_select(10, 5).unwrap();
        assert_eq!(picks, vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn test_fallback_non_adjacent_where_satisfiable() {
        for count in 5..=14usize {
            let required = blank_count_for(count).unwrap();
            let picks = fallback_select(count, required).unwrap();
            assert_eq!(picks.len(), required);
            let mut sorted = picks.clone();
            sorted.sort_unstable();
            assert!(
                sorted.windows(2).all(|w| w[1] - w[0] >= 2),
                "adjacent picks {sorted:?} for count={count}"
            );
        }
    }

    #[test]
    fn test_fallback_relaxes_adjacency_only_at_policy_floor() {
        // 2 candidates, 2 blanks: non-adjacency is unsatisfiable, count wins
        let picks = fallback_select(2, 2).unwrap();
        assert_eq!(picks.len(), 2);
    }

    #[test]
    fn test_fallback_more_blanks_than_candidates_exhausts() {
        assert!(matches!(
            fallback_select(2, 3),
            Err(EngineError::SelectionExhausted { .. })
        ));
    }

    // ── oracle reply validation ─────────────────────────────────────────────

    #[test]
    fn test_validate_reply_accepts_exact_copy() {
        let texts = vec!["a a a".to_string(), "b b b".to_string(), "c c c".to_string()];
        let reply = SuggestionReply {
            indices: vec![0, 2],
            sentences: vec!["a a a".to_string(), "c c c".to_string()],
        };
        assert_eq!(validate_reply(&reply, &texts, 2), Some(vec![0, 2]));
    }

    #[test]
    fn test_validate_reply_rejects_wrong_count() {
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let reply = SuggestionReply {
            indices: vec![0],
            sentences: vec!["a".to_string()],
        };
        assert!(validate_reply(&reply, &texts, 2).is_none());
    }

    #[test]
    fn test_validate_reply_rejects_paraphrase() {
        let texts = vec!["The cat sat.".to_string(), "x".to_string(), "y".to_string()];
        let reply = SuggestionReply {
            indices: vec![0, 2],
            sentences: vec!["The cat sat".to_string(), "y".to_string()], // missing period
        };
        assert!(
            validate_reply(&reply, &texts, 2).is_none(),
            "paraphrased text must be rejected byte-for-byte"
        );
    }

    #[test]
    fn test_validate_reply_rejects_adjacent_indices() {
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let reply = SuggestionReply {
            indices: vec![0, 1],
            sentences: vec!["a".to_string(), "b".to_string()],
        };
        assert!(validate_reply(&reply, &texts, 2).is_none());
    }

    #[test]
    fn test_validate_reply_rejects_out_of_range_and_duplicate_indices() {
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let out_of_range = SuggestionReply {
            indices: vec![0, 9],
            sentences: vec!["a".to_string(), "c".to_string()],
        };
        assert!(validate_reply(&out_of_range, &texts, 2).is_none());

        let duplicate = SuggestionReply {
            indices: vec![0, 0],
            sentences: vec!["a".to_string(), "a".to_string()],
        };
        assert!(validate_reply(&duplicate, &texts, 2).is_none());
    }

    // ── select: end-to-end scenarios ────────────────────────────────────────

    #[tokio::test]
    async fn test_select_fallback_scenario_three_sentences() {
        // §8 scenario: 8/9/10-word sentences, oracle disabled → picks [0, 2]
        let passage = three_sentence_passage();
        let sentences = segment(passage);
        assert_eq!(sentences.len(), 3);

        let oracle = ScriptedOracle::always_refusing();
        let specs = select(&sentences, &[], passage, &oracle, &fast_policy())
            .await
            .unwrap();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].label, 'A');
        assert_eq!(specs[1].label, 'B');
        assert_eq!(specs[0].span.source_index, 0);
        assert_eq!(specs[1].span.source_index, 2);
    }

    #[tokio::test]
    async fn test_select_refusal_twice_then_valid_uses_oracle_result() {
        // §8 scenario: two refusals, then a valid reply — 3 calls, oracle wins
        let passage = six_sentence_passage();
        let sentences = segment(passage);
        assert_eq!(sentences.len(), 6);

        // 6 candidates → 3 blanks; [1, 3, 5] differs from the fallback [0, 2, 4]
        let valid = SuggestionReply {
            indices: vec![1, 3, 5],
            sentences: vec![
                sentences[1].text.clone(),
                sentences[3].text.clone(),
                sentences[5].text.clone(),
            ],
        };
        let oracle = ScriptedOracle::new(vec![refusal(), refusal(), Ok(valid)]);

        let specs = select(&sentences, &[], passage, &oracle, &fast_policy())
            .await
            .unwrap();

        assert_eq!(oracle.call_count(), 3, "exactly 3 oracle calls expected");
        let picked: Vec<usize> = specs.iter().map(|s| s.span.source_index).collect();
        assert_eq!(
            picked,
            vec![1, 3, 5],
            "oracle result, not the stride fallback [0, 2, 4], must win"
        );
    }

    #[tokio::test]
    async fn test_select_unordered_oracle_reply_labels_by_passage_order() {
        let passage = six_sentence_passage();
        let sentences = segment(passage);

        let valid = SuggestionReply {
            indices: vec![5, 0, 2],
            sentences: vec![
                sentences[5].text.clone(),
                sentences[0].text.clone(),
                sentences[2].text.clone(),
            ],
        };
        let oracle = ScriptedOracle::new(vec![Ok(valid)]);

        let specs = select(&sentences, &[], passage, &oracle, &fast_policy())
            .await
            .unwrap();

        assert_eq!(specs.len(), 3);
        assert_eq!(
            specs.iter().map(|s| s.label).collect::<Vec<_>>(),
            vec!['A', 'B', 'C']
        );
        assert_eq!(
            specs.iter().map(|s| s.span.source_index).collect::<Vec<_>>(),
            vec![0, 2, 5],
            "labels follow passage order regardless of reply order"
        );
    }

    #[tokio::test]
    async fn test_select_invalid_replies_fall_back_after_three_attempts() {
        let passage = three_sentence_passage();
        let sentences = segment(passage);

        let adjacent = SuggestionReply {
            indices: vec![0, 1],
            sentences: vec![sentences[0].text.clone(), sentences[1].text.clone()],
        };
        let oracle = ScriptedOracle::new(vec![
            Ok(adjacent.clone()),
            Ok(adjacent.clone()),
            Ok(adjacent),
        ]);

        let specs = select(&sentences, &[], passage, &oracle, &fast_policy())
            .await
            .unwrap();

        assert_eq!(oracle.call_count(), 3);
        let picked: Vec<usize> = specs.iter().map(|s| s.span.source_index).collect();
        assert_eq!(picked, vec![0, 2], "fallback must decide after 3 bad replies");
    }

    #[tokio::test]
    async fn test_select_insufficient_content() {
        let passage = "Only one valid sentence lives here today.";
        let sentences = segment(passage);
        let oracle = ScriptedOracle::always_refusing();

        let result = select(&sentences, &[], passage, &oracle, &fast_policy()).await;
        assert!(matches!(
            result,
            Err(EngineError::InsufficientContent { valid: 1 })
        ));
    }

    #[tokio::test]
    async fn test_select_never_picks_bracketed_sentence() {
        // §8 scenario: a fully parenthesized sentence plus 4 valid ones
        let passage = "First sentence has five good words here. \
             Second sentence also has plenty of words. \
             Third sentence likewise carries enough words along. \
             Fourth sentence rounds out the passage nicely. \
             (This bracketed sentence is fully excluded today.)";
        let sentences = segment(passage);
        assert_eq!(sentences.len(), 5);

        let excluded = find_excluded(passage);
        assert_eq!(excluded.len(), 1);

        let oracle = ScriptedOracle::always_refusing();
        let specs = select(&sentences, &excluded, passage, &oracle, &fast_policy())
            .await
            .unwrap();

        // 4 candidates → 3 blanks, none of them the bracketed sentence
        assert_eq!(specs.len(), 3);
        assert!(
            specs.iter().all(|s| !s.span.text.contains("bracketed")),
            "excluded sentence must never be selected: {specs:?}"
        );
    }

    #[test]
    fn test_sentence_is_excluded_ignores_partial_overlap() {
        let passage = "Outside text (inner part) more outside text here.";
        let excluded = find_excluded(passage);
        let sentences = segment(passage);
        assert_eq!(sentences.len(), 1);
        assert!(
            !sentence_is_excluded(passage, &sentences[0], &excluded),
            "a sentence merely containing a parenthetical is still a candidate"
        );
    }
}
