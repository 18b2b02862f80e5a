//! Suggestion Oracle — narrow interface over the external sentence-suggestion
//! backend.
//!
//! The oracle is untrusted: it may refuse, return the wrong count, paraphrase,
//! or pick adjacent sentences. All validation and retry logic lives in the
//! selector (`engine::selector`); this module only defines the interface and
//! the LLM-backed production implementation. Swapping the backend means
//! implementing `SuggestionOracle` — nothing else changes.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::engine::prompts::{SUGGEST_PROMPT_TEMPLATE, SUGGEST_SYSTEM};
use crate::llm_client::prompts::FIDELITY_INSTRUCTION;
use crate::llm_client::{strip_json_fences, LlmClient};

// ────────────────────────────────────────────────────────────────────────────
// Interface
// ────────────────────────────────────────────────────────────────────────────

/// The oracle's proposed selection: indices into the sentence list it was
/// given, paired with the exact sentence texts.
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestionReply {
    pub indices: Vec<usize>,
    pub sentences: Vec<String>,
}

#[derive(Debug, Error)]
pub enum OracleError {
    /// The backend answered with a rejection phrase instead of data.
    #[error("oracle refused the request: {0}")]
    Refusal(String),

    /// Network/API/parse failure — worth retrying.
    #[error("oracle transient failure: {0}")]
    Transient(String),
}

/// External suggestion backend consulted for which sentences to blank.
///
/// Carried in `AppState` as `Arc<dyn SuggestionOracle>`.
#[async_trait]
pub trait SuggestionOracle: Send + Sync {
    async fn suggest(
        &self,
        sentences: &[String],
        required_count: usize,
    ) -> Result<SuggestionReply, OracleError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LLM-backed implementation
// ────────────────────────────────────────────────────────────────────────────

/// Rejection phrases that mark a refusal response. Checked case-insensitively
/// before any JSON parsing is attempted.
const REFUSAL_MARKERS: &[&str] = &[
    "i cannot",
    "i can't",
    "i'm sorry",
    "i am sorry",
    "i apologize",
    "unable to assist",
];

/// Production oracle backed by the Claude Messages API via `llm_client`.
pub struct LlmSuggestionOracle {
    llm: LlmClient,
}

impl LlmSuggestionOracle {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl SuggestionOracle for LlmSuggestionOracle {
    async fn suggest(
        &self,
        sentences: &[String],
        required_count: usize,
    ) -> Result<SuggestionReply, OracleError> {
        let prompt = build_suggest_prompt(sentences, required_count)
            .map_err(|e| OracleError::Transient(format!("prompt serialization failed: {e}")))?;

        let response = self
            .llm
            .call(&prompt, SUGGEST_SYSTEM)
            .await
            .map_err(|e| OracleError::Transient(e.to_string()))?;

        let text = response
            .text()
            .ok_or_else(|| OracleError::Transient("empty oracle response".to_string()))?;

        if let Some(marker) = detect_refusal(text) {
            return Err(OracleError::Refusal(marker.to_string()));
        }

        let reply: SuggestionReply = serde_json::from_str(strip_json_fences(text))
            .map_err(|e| OracleError::Transient(format!("unparseable oracle reply: {e}")))?;

        debug!(
            indices = ?reply.indices,
            "oracle suggested {} sentence(s)",
            reply.sentences.len()
        );
        Ok(reply)
    }
}

/// Returns the matched rejection phrase if the raw response reads as a refusal.
fn detect_refusal(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    REFUSAL_MARKERS
        .iter()
        .find(|marker| lower.contains(**marker))
        .copied()
}

fn build_suggest_prompt(
    sentences: &[String],
    required_count: usize,
) -> Result<String, serde_json::Error> {
    let numbered: Vec<serde_json::Value> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| serde_json::json!({ "index": i, "text": s }))
        .collect();
    let sentences_json = serde_json::to_string_pretty(&numbered)?;

    Ok(SUGGEST_PROMPT_TEMPLATE
        .replace("{fidelity_instruction}", FIDELITY_INSTRUCTION)
        .replace("{required_count}", &required_count.to_string())
        .replace("{sentences_json}", &sentences_json))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
