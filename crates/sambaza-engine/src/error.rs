//! Engine error types.

use thiserror::Error;

use sambaza_core::{AmountError, MsisdnError};
use sambaza_daraja::DarajaError;
use sambaza_store::StoreError;

/// Errors surfaced by the engine's entry points.
///
/// Initiation errors reach the HTTP client as 4xx/5xx. Callback handlers
/// only surface store-level failures — provider trouble is absorbed into
/// the state machine and the error log, never returned to the rail.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The payer number is unusable.
    #[error("invalid payer number: {0}")]
    InvalidPayer(MsisdnError),

    /// The destination number is unusable.
    #[error("invalid recipient number: {0}")]
    InvalidRecipient(MsisdnError),

    /// The destination belongs to no supported carrier.
    #[error("unsupported carrier for recipient {0}")]
    UnsupportedCarrier(String),

    /// The requested amount is outside the accepted range.
    #[error(transparent)]
    Amount(#[from] AmountError),

    /// The rail refused to queue the push.
    #[error("payment rail rejected the push: {0}")]
    PushRejected(#[source] DarajaError),

    /// The store failed; the handler cannot make progress.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Whether this is the caller's fault (HTTP 4xx) rather than ours.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidPayer(_)
                | EngineError::InvalidRecipient(_)
                | EngineError::UnsupportedCarrier(_)
                | EngineError::Amount(_)
        )
    }
}
