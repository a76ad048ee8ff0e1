//! # Persisted Record Shapes
//!
//! The row types of the six logical collections. `New*` shapes are what
//! handlers hand to the store; the store assigns all timestamps
//! server-side so records survive clock skew between gateway instances.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sambaza_core::{
    Carrier, CheckoutRequestId, Msisdn, PaymentReceipt, ProviderKind, TxStatus,
};

/// A top-up request as first received, frozen after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTopupRequest {
    /// Rail-assigned id, the canonical key.
    pub checkout_request_id: CheckoutRequestId,
    /// The paying subscriber.
    pub payer_msisdn: Msisdn,
    /// The subscriber receiving the airtime.
    pub destination_msisdn: Msisdn,
    /// Carrier resolved from the destination at initiation.
    pub carrier: Carrier,
    /// Amount the customer asked to pay, KES.
    pub requested_amount: Decimal,
    /// The inbound request body, kept for audit.
    pub payload_snapshot: serde_json::Value,
}

/// A stored top-up request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopupRequest {
    /// Rail-assigned id, the canonical key.
    pub checkout_request_id: CheckoutRequestId,
    /// The paying subscriber.
    pub payer_msisdn: Msisdn,
    /// The subscriber receiving the airtime.
    pub destination_msisdn: Msisdn,
    /// Carrier resolved from the destination at initiation.
    pub carrier: Carrier,
    /// Amount the customer asked to pay, KES.
    pub requested_amount: Decimal,
    /// The inbound request body, kept for audit.
    pub payload_snapshot: serde_json::Value,
    /// Server-assigned creation time.
    pub initiated_at: DateTime<Utc>,
}

/// The mutable lifecycle record keyed by checkout request id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Rail-assigned id, the canonical key.
    pub checkout_request_id: CheckoutRequestId,
    /// Current lifecycle state.
    pub status: TxStatus,
    /// M-Pesa receipt, present once the payment is confirmed.
    pub payment_receipt: Option<PaymentReceipt>,
    /// Amount actually collected, present once the payment is confirmed.
    pub amount_received: Option<Decimal>,
    /// Short fulfillment outcome label (`DELIVERED` / `FAILED`).
    pub fulfillment_status: Option<String>,
    /// Provider that delivered (or last attempted) the airtime.
    pub provider_used: Option<ProviderKind>,
    /// Whether the aggregator fallback was attempted.
    pub fallback_attempted: bool,
    /// Whether this transaction awaits manual reconciliation.
    pub reconciliation_needed: bool,
    /// Server-assigned time of the last state change.
    pub last_updated: DateTime<Utc>,
}

/// A completed (or attempted) sale, written when fulfillment starts resolving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    /// Rail-assigned id, the canonical key.
    pub checkout_request_id: CheckoutRequestId,
    /// Amount the customer paid, KES.
    pub original_amount: Decimal,
    /// Promotional airtime added on top.
    pub bonus: Decimal,
    /// `original_amount + bonus`, the value actually dispatched.
    pub dispatched_amount: Decimal,
    /// Destination carrier.
    pub carrier: Carrier,
    /// Provider that completed the dispatch.
    pub provider_used: Option<ProviderKind>,
    /// Raw provider response, kept for audit.
    pub dispatch_result: serde_json::Value,
    /// The percentage used to compute the bonus.
    pub bonus_percentage: Decimal,
}

/// A stored sale record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRecord {
    /// Rail-assigned id, the canonical key.
    pub checkout_request_id: CheckoutRequestId,
    /// Amount the customer paid, KES.
    pub original_amount: Decimal,
    /// Promotional airtime added on top.
    pub bonus: Decimal,
    /// `original_amount + bonus`, the value actually dispatched.
    pub dispatched_amount: Decimal,
    /// Destination carrier.
    pub carrier: Carrier,
    /// Provider that completed the dispatch.
    pub provider_used: Option<ProviderKind>,
    /// Raw provider response, kept for audit.
    pub dispatch_result: serde_json::Value,
    /// The percentage used to compute the bonus.
    pub bonus_percentage: Decimal,
    /// Server-assigned completion time.
    pub completed_at: DateTime<Utc>,
}

/// A reversal submitted to the rail, awaiting its result callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingReversal {
    /// The transaction being reversed.
    pub checkout_request_id: CheckoutRequestId,
    /// Amount being refunded, KES.
    pub original_amount: Decimal,
    /// The subscriber being refunded.
    pub payer_msisdn: Msisdn,
    /// The reversal request as sent to the rail.
    pub reversal_request: serde_json::Value,
}

/// A transaction whose books a human must close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedReconciliation {
    /// The affected transaction.
    pub checkout_request_id: CheckoutRequestId,
    /// Why automatic recovery stopped.
    pub reason: String,
    /// Amount at stake, KES.
    pub original_amount: Decimal,
}

/// One bonus-percentage change, for the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusHistoryEntry {
    /// Which telco's percentage changed (`safaricom` / `africastalking`).
    pub telco: String,
    /// Percentage before the change.
    pub old_pct: Decimal,
    /// Percentage after the change.
    pub new_pct: Decimal,
    /// Who made the change.
    pub actor: String,
    /// Server-assigned change time.
    pub created_at: DateTime<Utc>,
}
