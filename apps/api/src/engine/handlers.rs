//! Axum route handlers for the Exam Generation API.
//!
//! The handler, not the engine, owns the credit sequencing contract:
//! reserve strictly before the pipeline starts, then commit on success or
//! refund on any failure before the response is reported.

use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::billing::{ReservationGuard, GENERATION_COST};
use crate::engine::exclusion::{find_excluded, ExcludedSpan};
use crate::engine::pipeline::{generate_blanks, GeneratedBlanks};
use crate::engine::segmenter::{scan_candidates, segment, Sentence, Span};
use crate::errors::AppError;
use crate::history::{record_fire_and_forget, HistoryEntry};
use crate::layout::{make_block, pack, BlockKind, ContentBlock, LayoutPlan, TextMetrics};
use crate::state::AppState;

/// Default instruction block text; callers may override per request.
const DEFAULT_INSTRUCTION: &str =
    "Fill in each blank with the sentence that best completes the passage.";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateExamRequest {
    pub account_id: Uuid,
    pub passage: String,
    /// Optional translation block laid out after the answer options.
    pub translation: Option<String>,
    /// Optional instruction text override.
    pub instruction: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateExamResponse {
    pub exam_id: Uuid,
    pub blanked_text: String,
    /// Answer key in label order.
    pub answers: Vec<String>,
    pub layout: LayoutPlan,
    pub round_trip_ok: bool,
}

#[derive(Debug, Deserialize)]
pub struct SegmentPreviewRequest {
    pub passage: String,
}

#[derive(Debug, Serialize)]
pub struct SegmentPreviewResponse {
    pub sentences: Vec<Sentence>,
    pub valid_count: usize,
    pub excluded: Vec<ExcludedSpan>,
    pub candidates: Vec<Span>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/exams
///
/// Full pipeline: reserve credits → segment → select → rewrite → estimate →
/// pack → commit credits → fire-and-forget history handoff.
pub async fn handle_generate_exam(
    State(state): State<AppState>,
    Json(request): Json<GenerateExamRequest>,
) -> Result<Json<GenerateExamResponse>, AppError> {
    if request.passage.trim().is_empty() {
        return Err(AppError::Validation("passage cannot be empty".to_string()));
    }

    // Bounded pool of in-flight generations; excess requests queue here.
    let _permit = state
        .generation_limiter
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("generation limiter closed: {e}")))?;

    // Credits are reserved strictly before the pipeline starts and resolved
    // exactly once before the response is reported. The guard refunds on drop
    // if the request is cancelled mid-pipeline.
    let guard =
        ReservationGuard::reserve(state.ledger.clone(), request.account_id, GENERATION_COST)
            .await?;

    match run_pipeline(&state, &request).await {
        Ok((blanks, layout)) => {
            guard.commit().await?;

            let exam_id = Uuid::new_v4();
            record_fire_and_forget(
                state.history.clone(),
                HistoryEntry {
                    exam_id,
                    account_id: request.account_id,
                    created_at: Utc::now(),
                    blanked_text: blanks.document.blanked_text.clone(),
                    answers: blanks.document.answers.clone(),
                    page_count: layout.pages.len(),
                },
            );

            Ok(Json(GenerateExamResponse {
                exam_id,
                blanked_text: blanks.document.blanked_text,
                answers: blanks.document.answers,
                layout,
                round_trip_ok: blanks.document.round_trip_ok,
            }))
        }
        Err(err) => {
            guard.refund().await;
            Err(err)
        }
    }
}

/// POST /api/v1/exams/segment
///
/// Unbilled preview of segmentation, exclusion, and word/phrase candidates —
/// lets callers inspect what the engine would work with before generating.
pub async fn handle_segment_preview(
    State(_state): State<AppState>,
    Json(request): Json<SegmentPreviewRequest>,
) -> Result<Json<SegmentPreviewResponse>, AppError> {
    if request.passage.trim().is_empty() {
        return Err(AppError::Validation("passage cannot be empty".to_string()));
    }

    let sentences = segment(&request.passage);
    let valid_count = sentences.iter().filter(|s| s.is_valid).count();
    let excluded = find_excluded(&request.passage);
    let candidates = scan_candidates(&request.passage);

    Ok(Json(SegmentPreviewResponse {
        sentences,
        valid_count,
        excluded,
        candidates,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline glue
// ────────────────────────────────────────────────────────────────────────────

async fn run_pipeline(
    state: &AppState,
    request: &GenerateExamRequest,
) -> Result<(GeneratedBlanks, LayoutPlan), AppError> {
    let blanks = generate_blanks(&request.passage, state.oracle.as_ref(), &state.policy).await?;
    let blocks = build_content_blocks(request, &blanks, &state.metrics);
    let layout = pack(&blocks, &state.packer, &state.metrics)?;
    Ok((blanks, layout))
}

/// Assembles the ordered content blocks: instruction → passage → options →
/// translation (if supplied).
fn build_content_blocks(
    request: &GenerateExamRequest,
    blanks: &GeneratedBlanks,
    metrics: &TextMetrics,
) -> Vec<ContentBlock> {
    let instruction = request
        .instruction
        .clone()
        .unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string());

    let mut blocks = vec![
        make_block(BlockKind::Instruction, instruction, metrics),
        make_block(
            BlockKind::Passage,
            blanks.document.blanked_text.clone(),
            metrics,
        ),
        make_block(
            BlockKind::Options,
            build_options_text(&blanks.document.answers),
            metrics,
        ),
    ];

    if let Some(translation) = &request.translation {
        if !translation.trim().is_empty() {
            blocks.push(make_block(
                BlockKind::Translation,
                translation.clone(),
                metrics,
            ));
        }
    }

    blocks
}

/// One `(A) answer` line per blank, in label order.
fn build_options_text(answers: &[String]) -> String {
    answers
        .iter()
        .enumerate()
        .map(|(i, answer)| format!("({}) {answer}", (b'A' + i as u8) as char))
        .collect::<Vec<_>>()
        .join("\n")
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
