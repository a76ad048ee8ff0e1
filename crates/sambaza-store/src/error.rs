//! Store error types.

use rust_decimal::Decimal;
use thiserror::Error;

use sambaza_core::TxStatus;

use crate::ledger::FloatAccount;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A float debit would take the balance below zero.
    #[error("insufficient {account} float: balance {balance}, requested delta {delta}")]
    InsufficientFloat {
        /// The float account that refused the adjustment.
        account: FloatAccount,
        /// Balance at the time of the attempt.
        balance: Decimal,
        /// The rejected delta.
        delta: Decimal,
    },

    /// A record that must exist for this operation is missing.
    #[error("no record for checkout request {0}")]
    NotFound(String),

    /// A caller requested a transition the status machine forbids. This is
    /// a programming error in the caller, not a race.
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition {
        /// The expected pre-state.
        from: TxStatus,
        /// The forbidden successor.
        to: TxStatus,
    },

    /// A persisted value no current code path can produce.
    #[error("corrupt persisted value: {0}")]
    Decode(String),

    /// Underlying database failure.
    #[error("database error: {0}")]
    Backend(#[from] sqlx::Error),
}
