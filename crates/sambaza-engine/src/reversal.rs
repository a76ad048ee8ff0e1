//! # Reversal Callbacks
//!
//! The rail answers a reversal asynchronously on two URLs: a result
//! callback carrying a verdict, and a queue-timeout callback carrying
//! none. Both are matched back to their transaction through the
//! originator conversation id persisted at submission time.

use sambaza_core::{Fault, FaultKind, TxStatus};
use sambaza_daraja::ReversalOutcome;
use sambaza_store::FailedReconciliation;

use crate::error::EngineError;
use crate::Engine;

impl Engine {
    /// Apply a reversal result callback.
    pub async fn handle_reversal_result(
        &self,
        outcome: ReversalOutcome,
    ) -> Result<(), EngineError> {
        let Some(id) = self.resolve_reversal_target(&outcome).await? else {
            return Ok(());
        };

        match outcome.result_code {
            Some(0) => {
                let advanced = self
                    .store
                    .resolve_reversal(&id, TxStatus::ReversedSuccessfully)
                    .await?;
                if advanced {
                    tracing::info!(checkout_request_id = %id, "payment reversed");
                    self.notify_payment_reversed(&id);
                }
            }
            Some(code) => {
                let advanced = self
                    .store
                    .resolve_reversal(&id, TxStatus::ReversalFailedConfirmation)
                    .await?;
                if advanced {
                    let amount = self.pending_reversal_amount(&id).await?;
                    self.store
                        .create_failed_reconciliation(FailedReconciliation {
                            checkout_request_id: id.clone(),
                            reason: format!(
                                "reversal failed (code {code}): {}",
                                outcome.result_desc
                            ),
                            original_amount: amount,
                        })
                        .await?;
                }
            }
            None => {
                // A result callback without a code is a malformed payload,
                // not a verdict.
                self.log_fault(
                    Fault::new(
                        FaultKind::StkCallbackError,
                        serde_json::json!({"reason": "reversal result without ResultCode"}),
                    )
                    .for_request(id),
                )
                .await;
            }
        }
        Ok(())
    }

    /// Apply a reversal queue-timeout callback.
    pub async fn handle_reversal_timeout(
        &self,
        outcome: ReversalOutcome,
    ) -> Result<(), EngineError> {
        let Some(id) = self.resolve_reversal_target(&outcome).await? else {
            return Ok(());
        };

        let advanced = self
            .store
            .resolve_reversal(&id, TxStatus::ReversalTimedOut)
            .await?;
        if advanced {
            tracing::warn!(checkout_request_id = %id, "reversal timed out in rail queue");
            let amount = self.pending_reversal_amount(&id).await?;
            self.store
                .create_failed_reconciliation(FailedReconciliation {
                    checkout_request_id: id.clone(),
                    reason: "reversal timed out in the rail queue".into(),
                    original_amount: amount,
                })
                .await?;
        }
        Ok(())
    }

    async fn resolve_reversal_target(
        &self,
        outcome: &ReversalOutcome,
    ) -> Result<Option<sambaza_core::CheckoutRequestId>, EngineError> {
        let Some(conversation_id) = outcome.originator_conversation_id.as_deref() else {
            self.log_fault(Fault::new(
                FaultKind::StkCallbackError,
                serde_json::json!({"reason": "reversal callback without OriginatorConversationID"}),
            ))
            .await;
            return Ok(None);
        };
        let found = self.store.find_reversal_request(conversation_id).await?;
        if found.is_none() {
            self.log_fault(Fault::new(
                FaultKind::StkCallbackError,
                serde_json::json!({
                    "reason": "reversal callback matches no pending reversal",
                    "originator_conversation_id": conversation_id,
                }),
            ))
            .await;
        }
        Ok(found)
    }

    /// Amount at stake for a reconciliation record, read back from the
    /// transaction (the amount actually collected).
    async fn pending_reversal_amount(
        &self,
        id: &sambaza_core::CheckoutRequestId,
    ) -> Result<rust_decimal::Decimal, EngineError> {
        Ok(self
            .store
            .get_transaction(id)
            .await?
            .and_then(|record| record.amount_received)
            .unwrap_or_default())
    }
}
