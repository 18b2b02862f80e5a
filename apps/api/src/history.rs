//! History Service — fire-and-forget handoff of finished exams to the
//! external persistence collaborator.
//!
//! Recording happens on a spawned task after the response is already decided;
//! a failure here is logged and never rolls back a successful generation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

/// Snapshot of one finished generation, as handed to the history service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub exam_id: Uuid,
    pub account_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub blanked_text: String,
    pub answers: Vec<String>,
    pub page_count: usize,
}

/// The persistence collaborator. Carried in `AppState` as
/// `Arc<dyn HistoryStore>`.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn record(&self, entry: &HistoryEntry) -> anyhow::Result<()>;
}

/// Stand-in store that only logs. Production deployments wire the real
/// history service behind the same trait.
pub struct LoggingHistoryStore;

#[async_trait]
impl HistoryStore for LoggingHistoryStore {
    async fn record(&self, entry: &HistoryEntry) -> anyhow::Result<()> {
        info!(
            exam = %entry.exam_id,
            account = %entry.account_id,
            answers = entry.answers.len(),
            pages = entry.page_count,
            "exam recorded"
        );
        Ok(())
    }
}

/// Hands the entry to the store on a detached task.
pub fn record_fire_and_forget(store: Arc<dyn HistoryStore>, entry: HistoryEntry) {
    tokio::spawn(async move {
        if let Err(e) = store.record(&entry).await {
            warn!(exam = %entry.exam_id, error = %e, "history record failed — generation result unaffected");
        }
    });
}
