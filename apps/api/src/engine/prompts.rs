// All LLM prompt constants for the blank-generation engine.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

/// System prompt for sentence suggestion — enforces JSON-only output.
pub const SUGGEST_SYSTEM: &str = JSON_ONLY_SYSTEM;

/// Suggestion prompt template.
/// Replace: {fidelity_instruction}, {required_count}, {sentences_json}
pub const SUGGEST_PROMPT_TEMPLATE: &str = r#"{fidelity_instruction}

You are choosing which sentences of a reading passage to hide behind fill-in-the-blank markers on a printed exam.

From the numbered sentence list below, pick exactly {required_count} sentences that are the most pedagogically useful to blank out (content-bearing, self-contained, not throwaway transitions).

Return a JSON object with this EXACT schema (no extra fields):
{
  "indices": [0, 2],
  "sentences": ["exact text of sentence 0", "exact text of sentence 2"]
}

HARD RULES:
1. Return exactly {required_count} indices and exactly {required_count} sentences
2. Copy each chosen sentence character-for-character from the list — no paraphrasing, no re-punctuation, no trimming
3. No two chosen indices may be adjacent (their difference must be at least 2)
4. Every index must refer to a sentence in the list

SENTENCES:
{sentences_json}"#;
