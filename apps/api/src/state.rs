use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::billing::CreditLedger;
use crate::config::Config;
use crate::engine::oracle::SuggestionOracle;
use crate::engine::BlankPolicy;
use crate::history::HistoryStore;
use crate::layout::{PackerConfig, TextMetrics};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable suggestion backend. Default: LlmSuggestionOracle.
    pub oracle: Arc<dyn SuggestionOracle>,
    /// Credit accounting collaborator. Dev default: UnmeteredLedger.
    pub ledger: Arc<dyn CreditLedger>,
    /// Persistence collaborator, invoked fire-and-forget.
    pub history: Arc<dyn HistoryStore>,
    pub config: Config,
    /// Selection tunables — oracle attempt budget and backoff.
    pub policy: BlankPolicy,
    /// Font metrics and container dimensions for height estimation.
    pub metrics: TextMetrics,
    /// Page capacity, safety margin, column count, splittable kinds.
    pub packer: PackerConfig,
    /// Bounds the number of generation pipelines in flight at once.
    pub generation_limiter: Arc<Semaphore>,
}
