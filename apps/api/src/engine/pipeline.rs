//! Generation Pipeline — segment → exclude → select → rewrite.
//!
//! Each stage consumes an immutable input and produces a new immutable output;
//! the only suspension point is the selector's oracle call. A failed
//! round-trip is retried exactly once with a fresh selector run — it usually
//! means a bad selector output slipped past validation — before the error is
//! surfaced to the caller.

use tracing::{info, warn};

use crate::engine::exclusion::find_excluded;
use crate::engine::oracle::SuggestionOracle;
use crate::engine::rewriter::{rewrite, BlankedDocument};
use crate::engine::segmenter::{segment, Sentence};
use crate::engine::selector::{select, BlankPolicy, BlankSpec};
use crate::engine::EngineError;

/// Extra full-pipeline attempts after a round-trip mismatch.
const MISMATCH_RETRIES: u32 = 1;

/// Output of a successful pipeline run.
#[derive(Debug, Clone)]
pub struct GeneratedBlanks {
    pub document: BlankedDocument,
    pub specs: Vec<BlankSpec>,
    pub sentences: Vec<Sentence>,
}

/// Runs the full blank-generation pipeline over one passage.
pub async fn generate_blanks(
    passage: &str,
    oracle: &dyn SuggestionOracle,
    policy: &BlankPolicy,
) -> Result<GeneratedBlanks, EngineError> {
    let sentences = segment(passage);
    let excluded = find_excluded(passage);

    info!(
        sentences = sentences.len(),
        valid = sentences.iter().filter(|s| s.is_valid).count(),
        excluded = excluded.len(),
        "passage segmented"
    );

    for attempt in 0..=MISMATCH_RETRIES {
        let specs = select(&sentences, &excluded, passage, oracle, policy).await?;

        match rewrite(passage, &specs) {
            Ok(document) => {
                info!(
                    blanks = specs.len(),
                    attempt = attempt + 1,
                    "blanked document generated and round-trip verified"
                );
                return Ok(GeneratedBlanks {
                    document,
                    specs,
                    sentences,
                });
            }
            Err(EngineError::BlankGenerationMismatch) if attempt < MISMATCH_RETRIES => {
                warn!(
                    attempt = attempt + 1,
                    "round-trip mismatch — rerunning selection"
                );
            }
            Err(e) => return Err(e),
        }
    }

    Err(EngineError::BlankGenerationMismatch)
}
