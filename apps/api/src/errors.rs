use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::billing::LedgerError;
use crate::engine::EngineError;
use crate::layout::LayoutError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Retryable conditions (oracle refusals, transient oracle failures) never
/// reach this type — they are resolved inside the selector.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),

            AppError::Engine(EngineError::InsufficientContent { .. }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INSUFFICIENT_CONTENT",
                self.to_string(),
            ),
            AppError::Engine(EngineError::SelectionExhausted { .. }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "SELECTION_EXHAUSTED",
                self.to_string(),
            ),
            AppError::Engine(EngineError::BlankGenerationMismatch) => {
                tracing::error!("round-trip validation failed after retry");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "GENERATION_MISMATCH",
                    "Blank generation failed validation — please retry".to_string(),
                )
            }

            AppError::Layout(LayoutError::Overflow { .. }) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "LAYOUT_OVERFLOW",
                self.to_string(),
            ),

            AppError::Ledger(LedgerError::InsufficientFunds { .. }) => (
                StatusCode::PAYMENT_REQUIRED,
                "INSUFFICIENT_CREDITS",
                self.to_string(),
            ),
            AppError::Ledger(e) => {
                tracing::error!("Ledger error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LEDGER_ERROR",
                    "A credit accounting error occurred".to_string(),
                )
            }

            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
