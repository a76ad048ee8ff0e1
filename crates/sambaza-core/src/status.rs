//! # Transaction Status Machine
//!
//! The twelve lifecycle states of a top-up transaction and the legal
//! transitions between them. The current state lives in the transaction
//! store and is shared by concurrent handlers, so transitions are checked
//! as data (`can_transition_to`) and enforced by the store's conditional
//! update — a handler that loses the race observes a gate miss, not a
//! double side-effect.
//!
//! ```text
//! PUSH_INITIATED ─┬─▶ MPESA_PAYMENT_FAILED
//!                 └─▶ RECEIVED_PENDING_FULFILLMENT ──▶ FULFILLMENT_IN_PROGRESS
//!                        │                                 │          │
//!                        │ (invalid amount/destination)    ▼          ▼
//!                        │                COMPLETED_AND_FULFILLED   RECEIVED_FULFILLMENT_FAILED
//!                        ▼                                                │
//!                 REVERSAL_PENDING_CONFIRMATION ◀─────────────────────────┤
//!                        │        │       │                               ▼
//!                        ▼        ▼       ▼                REVERSAL_INITIATION_FAILED
//!         REVERSED_SUCCESSFULLY   │   REVERSAL_TIMED_OUT
//!                                 ▼
//!                  REVERSAL_FAILED_CONFIRMATION
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a top-up transaction.
///
/// Serialized in SCREAMING_SNAKE_CASE — the strings are part of the
/// persisted schema and the status API, not an implementation detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    /// STK push sent; awaiting the payment callback.
    PushInitiated,
    /// Payment cancelled, declined, or timed out. Terminal.
    MpesaPaymentFailed,
    /// Payment confirmed; dispatch not yet started.
    ReceivedPendingFulfillment,
    /// Float debited, dispatch in flight.
    FulfillmentInProgress,
    /// Airtime delivered. Terminal.
    CompletedAndFulfilled,
    /// Dispatch failed after any fallback; reversal owed.
    ReceivedFulfillmentFailed,
    /// Reversal request accepted by the rail; awaiting its result callback.
    ReversalPendingConfirmation,
    /// The rail rejected the reversal request. Terminal, needs manual reconciliation.
    ReversalInitiationFailed,
    /// Reversal confirmed. Terminal.
    ReversedSuccessfully,
    /// Reversal result callback reported failure. Terminal, needs manual reconciliation.
    ReversalFailedConfirmation,
    /// Reversal expired in the rail's queue. Terminal, needs manual reconciliation.
    ReversalTimedOut,
    /// Unhandled error inside the fulfillment stretch. Terminal, needs manual reconciliation.
    CriticalFulfillmentError,
}

/// Error for status strings that match no known state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown transaction status: {0:?}")]
pub struct TxStatusParseError(pub String);

impl TxStatus {
    /// The persisted SCREAMING_SNAKE_CASE name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::PushInitiated => "PUSH_INITIATED",
            TxStatus::MpesaPaymentFailed => "MPESA_PAYMENT_FAILED",
            TxStatus::ReceivedPendingFulfillment => "RECEIVED_PENDING_FULFILLMENT",
            TxStatus::FulfillmentInProgress => "FULFILLMENT_IN_PROGRESS",
            TxStatus::CompletedAndFulfilled => "COMPLETED_AND_FULFILLED",
            TxStatus::ReceivedFulfillmentFailed => "RECEIVED_FULFILLMENT_FAILED",
            TxStatus::ReversalPendingConfirmation => "REVERSAL_PENDING_CONFIRMATION",
            TxStatus::ReversalInitiationFailed => "REVERSAL_INITIATION_FAILED",
            TxStatus::ReversedSuccessfully => "REVERSED_SUCCESSFULLY",
            TxStatus::ReversalFailedConfirmation => "REVERSAL_FAILED_CONFIRMATION",
            TxStatus::ReversalTimedOut => "REVERSAL_TIMED_OUT",
            TxStatus::CriticalFulfillmentError => "CRITICAL_FULFILLMENT_ERROR",
        }
    }

    /// Parse a persisted status string.
    pub fn parse(raw: &str) -> Result<Self, TxStatusParseError> {
        match raw {
            "PUSH_INITIATED" => Ok(TxStatus::PushInitiated),
            "MPESA_PAYMENT_FAILED" => Ok(TxStatus::MpesaPaymentFailed),
            "RECEIVED_PENDING_FULFILLMENT" => Ok(TxStatus::ReceivedPendingFulfillment),
            "FULFILLMENT_IN_PROGRESS" => Ok(TxStatus::FulfillmentInProgress),
            "COMPLETED_AND_FULFILLED" => Ok(TxStatus::CompletedAndFulfilled),
            "RECEIVED_FULFILLMENT_FAILED" => Ok(TxStatus::ReceivedFulfillmentFailed),
            "REVERSAL_PENDING_CONFIRMATION" => Ok(TxStatus::ReversalPendingConfirmation),
            "REVERSAL_INITIATION_FAILED" => Ok(TxStatus::ReversalInitiationFailed),
            "REVERSED_SUCCESSFULLY" => Ok(TxStatus::ReversedSuccessfully),
            "REVERSAL_FAILED_CONFIRMATION" => Ok(TxStatus::ReversalFailedConfirmation),
            "REVERSAL_TIMED_OUT" => Ok(TxStatus::ReversalTimedOut),
            "CRITICAL_FULFILLMENT_ERROR" => Ok(TxStatus::CriticalFulfillmentError),
            other => Err(TxStatusParseError(other.to_string())),
        }
    }

    /// Whether no further transitions are allowed from this state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TxStatus::MpesaPaymentFailed
                | TxStatus::CompletedAndFulfilled
                | TxStatus::ReversalInitiationFailed
                | TxStatus::ReversedSuccessfully
                | TxStatus::ReversalFailedConfirmation
                | TxStatus::ReversalTimedOut
                | TxStatus::CriticalFulfillmentError
        )
    }

    /// Whether this state leaves money and airtime out of agreement and
    /// requires a human to close the books.
    pub fn needs_reconciliation(&self) -> bool {
        matches!(
            self,
            TxStatus::ReversalInitiationFailed
                | TxStatus::ReversalFailedConfirmation
                | TxStatus::ReversalTimedOut
                | TxStatus::CriticalFulfillmentError
        )
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: TxStatus) -> bool {
        use TxStatus::*;
        match (self, next) {
            (PushInitiated, MpesaPaymentFailed) => true,
            (PushInitiated, ReceivedPendingFulfillment) => true,
            // Invalid amount or destination at callback time skips dispatch
            // and goes straight to the reversal path.
            (ReceivedPendingFulfillment, FulfillmentInProgress) => true,
            (ReceivedPendingFulfillment, ReversalPendingConfirmation) => true,
            (ReceivedPendingFulfillment, ReversalInitiationFailed) => true,
            (FulfillmentInProgress, CompletedAndFulfilled) => true,
            (FulfillmentInProgress, ReceivedFulfillmentFailed) => true,
            (ReceivedFulfillmentFailed, ReversalPendingConfirmation) => true,
            (ReceivedFulfillmentFailed, ReversalInitiationFailed) => true,
            (ReversalPendingConfirmation, ReversedSuccessfully) => true,
            (ReversalPendingConfirmation, ReversalFailedConfirmation) => true,
            (ReversalPendingConfirmation, ReversalTimedOut) => true,
            // The fulfillment stretch can always degrade to the critical state.
            (ReceivedPendingFulfillment, CriticalFulfillmentError) => true,
            (FulfillmentInProgress, CriticalFulfillmentError) => true,
            (ReceivedFulfillmentFailed, CriticalFulfillmentError) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for TxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TxStatus; 12] = [
        TxStatus::PushInitiated,
        TxStatus::MpesaPaymentFailed,
        TxStatus::ReceivedPendingFulfillment,
        TxStatus::FulfillmentInProgress,
        TxStatus::CompletedAndFulfilled,
        TxStatus::ReceivedFulfillmentFailed,
        TxStatus::ReversalPendingConfirmation,
        TxStatus::ReversalInitiationFailed,
        TxStatus::ReversedSuccessfully,
        TxStatus::ReversalFailedConfirmation,
        TxStatus::ReversalTimedOut,
        TxStatus::CriticalFulfillmentError,
    ];

    #[test]
    fn as_str_parse_round_trips() {
        for status in ALL {
            assert_eq!(TxStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(TxStatus::parse("SOMETHING_ELSE").is_err());
    }

    #[test]
    fn serde_uses_the_persisted_names() {
        let json = serde_json::to_string(&TxStatus::ReceivedPendingFulfillment).unwrap();
        assert_eq!(json, "\"RECEIVED_PENDING_FULFILLMENT\"");
    }

    #[test]
    fn terminal_states_have_no_successors() {
        for status in ALL.iter().filter(|s| s.is_terminal()) {
            for next in ALL {
                assert!(
                    !status.can_transition_to(next),
                    "{status} must not transition to {next}"
                );
            }
        }
    }

    #[test]
    fn no_state_transitions_to_itself() {
        for status in ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn happy_path_is_legal() {
        assert!(TxStatus::PushInitiated.can_transition_to(TxStatus::ReceivedPendingFulfillment));
        assert!(
            TxStatus::ReceivedPendingFulfillment.can_transition_to(TxStatus::FulfillmentInProgress)
        );
        assert!(TxStatus::FulfillmentInProgress.can_transition_to(TxStatus::CompletedAndFulfilled));
    }

    #[test]
    fn reversal_path_is_legal() {
        assert!(
            TxStatus::FulfillmentInProgress.can_transition_to(TxStatus::ReceivedFulfillmentFailed)
        );
        assert!(TxStatus::ReceivedFulfillmentFailed
            .can_transition_to(TxStatus::ReversalPendingConfirmation));
        assert!(
            TxStatus::ReversalPendingConfirmation.can_transition_to(TxStatus::ReversedSuccessfully)
        );
        assert!(TxStatus::ReversalPendingConfirmation
            .can_transition_to(TxStatus::ReversalFailedConfirmation));
        assert!(TxStatus::ReversalPendingConfirmation.can_transition_to(TxStatus::ReversalTimedOut));
    }

    #[test]
    fn payment_failure_cannot_resume() {
        assert!(!TxStatus::MpesaPaymentFailed.can_transition_to(TxStatus::FulfillmentInProgress));
        assert!(!TxStatus::MpesaPaymentFailed.can_transition_to(TxStatus::ReceivedPendingFulfillment));
    }

    #[test]
    fn reconciliation_states_are_terminal() {
        for status in ALL.iter().filter(|s| s.needs_reconciliation()) {
            assert!(status.is_terminal(), "{status} must be terminal");
        }
    }
}
