// Blank-Generation Engine
// Implements: sentence segmentation, exclusion tracking, span selection with
// oracle validation + deterministic fallback, bracket-aware rewriting with
// round-trip verification.
// All LLM calls go through llm_client — no direct Anthropic SDK calls here.

pub mod exclusion;
pub mod handlers;
pub mod oracle;
pub mod pipeline;
pub mod prompts;
pub mod rewriter;
pub mod segmenter;
pub mod selector;

use thiserror::Error;

// Re-export the public API consumed by other modules (handlers, routes).
pub use pipeline::{generate_blanks, GeneratedBlanks};
pub use selector::BlankPolicy;

/// Engine-level failures. Retryable oracle conditions are handled inside the
/// selector and never surface here; these are the fatal-for-this-attempt
/// kinds the pipeline caller must act on.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Fewer than 2 valid sentences — not retryable.
    #[error("insufficient content: {valid} valid sentence(s), need at least 2")]
    InsufficientContent { valid: usize },

    /// The local heuristic could not place the required blanks. Guarded
    /// against, but the policy table makes it near-impossible to hit.
    #[error("selection exhausted: could not place {required} blank(s) across {available} candidate sentence(s)")]
    SelectionExhausted { required: usize, available: usize },

    /// Round-trip reconstruction did not reproduce the source passage.
    #[error("blank generation mismatch: round-trip reconstruction does not reproduce the source passage")]
    BlankGenerationMismatch,
}
