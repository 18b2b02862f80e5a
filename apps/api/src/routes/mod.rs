pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::engine::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Exam generation API
        .route("/api/v1/exams", post(handlers::handle_generate_exam))
        .route(
            "/api/v1/exams/segment",
            post(handlers::handle_segment_preview),
        )
        .with_state(state)
}
