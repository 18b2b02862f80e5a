//! Credit Ledger — the external accounting collaborator, modeled as a narrow
//! trait the way the suggestion oracle is.
#![allow(dead_code)]
//!
//! "reserve → attempt → commit-or-refund" is a hard sequencing contract: a
//! request's credits are reserved strictly before the pipeline starts and
//! resolved exactly once before the request is reported. `ReservationGuard`
//! refunds on drop, so cancellation or a panic between reservation and
//! resolution can never leave a user under-refunded. The engine itself never
//! touches the ledger — only the handler (the pipeline caller) does.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

/// Credits reserved per exam generation request.
pub const GENERATION_COST: u32 = 1;

// ────────────────────────────────────────────────────────────────────────────
// Interface
// ────────────────────────────────────────────────────────────────────────────

/// Proof of a successful reservation, passed back on commit or refund.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationToken {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount: u32,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient credits: account {account_id} has {available}, needs {required}")]
    InsufficientFunds {
        account_id: Uuid,
        required: u32,
        available: u32,
    },

    #[error("unknown reservation {0}")]
    UnknownReservation(Uuid),
}

/// The credit accounting service. Carried in `AppState` as
/// `Arc<dyn CreditLedger>`.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    async fn reserve(
        &self,
        account_id: Uuid,
        amount: u32,
    ) -> Result<ReservationToken, LedgerError>;

    /// Consumes the reserved credits for good.
    async fn commit(&self, token: &ReservationToken) -> Result<(), LedgerError>;

    /// Returns the reserved credits to the account.
    async fn refund(&self, token: &ReservationToken) -> Result<(), LedgerError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Reservation guard
// ────────────────────────────────────────────────────────────────────────────

/// RAII wrapper around one reservation. Resolve it with `commit` or `refund`;
/// dropping it unresolved refunds asynchronously.
pub struct ReservationGuard {
    ledger: Arc<dyn CreditLedger>,
    token: Option<ReservationToken>,
}

impl ReservationGuard {
    pub async fn reserve(
        ledger: Arc<dyn CreditLedger>,
        account_id: Uuid,
        amount: u32,
    ) -> Result<Self, LedgerError> {
        let token = ledger.reserve(account_id, amount).await?;
        Ok(Self {
            ledger,
            token: Some(token),
        })
    }

    pub async fn commit(mut self) -> Result<(), LedgerError> {
        match self.token.take() {
            Some(token) => self.ledger.commit(&token).await,
            None => Ok(()),
        }
    }

    /// Refunds the reservation. Failures are logged, not propagated — the
    /// caller is already on an error path.
    pub async fn refund(mut self) {
        if let Some(token) = self.token.take() {
            if let Err(e) = self.ledger.refund(&token).await {
                error!(reservation = %token.id, error = %e, "credit refund failed");
            }
        }
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            warn!(reservation = %token.id, "reservation dropped unresolved — refunding");
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let ledger = Arc::clone(&self.ledger);
                    handle.spawn(async move {
                        if let Err(e) = ledger.refund(&token).await {
                            error!(reservation = %token.id, error = %e, "refund of dropped reservation failed");
                        }
                    });
                }
                Err(_) => {
                    error!(reservation = %token.id, "no runtime available to refund dropped reservation");
                }
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory implementation (tests, local development)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct LedgerState {
    balances: HashMap<Uuid, u32>,
    reservations: HashMap<Uuid, ReservationToken>,
}

/// Strict in-memory ledger. Accounts must be granted credits before they can
/// reserve; unknown accounts have a zero balance.
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, account_id: Uuid, amount: u32) {
        let mut state = self.state.lock().unwrap();
        *state.balances.entry(account_id).or_insert(0) += amount;
    }

    pub fn balance(&self, account_id: Uuid) -> u32 {
        let state = self.state.lock().unwrap();
        state.balances.get(&account_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl CreditLedger for InMemoryLedger {
    async fn reserve(
        &self,
        account_id: Uuid,
        amount: u32,
    ) -> Result<ReservationToken, LedgerError> {
        let mut state = self.state.lock().unwrap();
        let balance = state.balances.entry(account_id).or_insert(0);
        if *balance < amount {
            return Err(LedgerError::InsufficientFunds {
                account_id,
                required: amount,
                available: *balance,
            });
        }
        *balance -= amount;

        let token = ReservationToken {
            id: Uuid::new_v4(),
            account_id,
            amount,
        };
        state.reservations.insert(token.id, token.clone());
        Ok(token)
    }

    async fn commit(&self, token: &ReservationToken) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        state
            .reservations
            .remove(&token.id)
            .map(|_| ())
            .ok_or(LedgerError::UnknownReservation(token.id))
    }

    async fn refund(&self, token: &ReservationToken) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        let token = state
            .reservations
            .remove(&token.id)
            .ok_or(LedgerError::UnknownReservation(token.id))?;
        *state.balances.entry(token.account_id).or_insert(0) += token.amount;
        Ok(())
    }
}

/// Ledger stand-in that accepts everything. Default for local development —
/// production deployments wire the real billing service behind the same trait.
pub struct UnmeteredLedger;

#[async_trait]
impl CreditLedger for UnmeteredLedger {
    async fn reserve(
        &self,
        account_id: Uuid,
        amount: u32,
    ) -> Result<ReservationToken, LedgerError> {
        Ok(ReservationToken {
            id: Uuid::new_v4(),
            account_id,
            amount,
        })
    }

    async fn commit(&self, _token: &ReservationToken) -> Result<(), LedgerError> {
        Ok(())
    }

    async fn refund(&self, _token: &ReservationToken) -> Result<(), LedgerError> {
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
