//! # Status View
//!
//! The read side backing `GET /transaction-status/:id` — a join of the
//! request, transaction, and sale records into one client-facing shape.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use sambaza_core::{CheckoutRequestId, TxStatus};
use sambaza_store::StoreError;

use crate::error::EngineError;
use crate::Engine;

/// What a client sees when polling a transaction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    /// Current lifecycle state.
    pub status: TxStatus,
    /// When the request was initiated.
    pub created_at: DateTime<Utc>,
    /// When the sale completed, if it did.
    pub completed_at: Option<DateTime<Utc>>,
    /// Amount requested, KES.
    pub amount: Decimal,
    /// Amount actually collected, once known.
    pub amount_received: Option<Decimal>,
    /// The destination number, national form.
    pub recipient: String,
    /// Destination carrier.
    pub carrier: String,
    /// Provider that delivered, once known.
    pub provider_used: Option<String>,
    /// Airtime actually dispatched (amount plus bonus), once known.
    pub dispatched_amount: Option<Decimal>,
    /// Whether the transaction awaits manual reconciliation.
    pub reconciliation_needed: bool,
}

impl Engine {
    /// The current state of a transaction, or [`StoreError::NotFound`].
    pub async fn transaction_status(
        &self,
        id: &CheckoutRequestId,
    ) -> Result<StatusView, EngineError> {
        let request = self
            .store
            .get_request(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
        let record = self
            .store
            .get_transaction(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;
        let sale = self.store.get_sale(id).await?;

        Ok(StatusView {
            status: record.status,
            created_at: request.initiated_at,
            completed_at: sale.as_ref().map(|s| s.completed_at),
            amount: request.requested_amount,
            amount_received: record.amount_received,
            recipient: request.destination_msisdn.national().to_string(),
            carrier: request.carrier.as_str().to_string(),
            provider_used: record.provider_used.map(|p| p.as_str().to_string()),
            dispatched_amount: sale.map(|s| s.dispatched_amount),
            reconciliation_needed: record.reconciliation_needed,
        })
    }
}
