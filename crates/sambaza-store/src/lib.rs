#![deny(missing_docs)]

//! # sambaza-store — Durable State for the SambazaPay Gateway
//!
//! Six logical collections (requests, transactions, sales, error log,
//! reconciliations, bonus history) plus the float ledger and the two
//! singleton settings rows, behind the [`Store`] trait.
//!
//! Two implementations:
//!
//! - [`PgStore`] — Postgres via sqlx. Timestamps are server-assigned
//!   (`NOW()`), status transitions are conditional updates gated on the
//!   expected pre-state, and float adjustments run in row-locked
//!   transactions.
//! - [`MemStore`] — an in-memory twin with the same gating semantics, used
//!   by tests and by dev mode when `DATABASE_URL` is absent.
//!
//! ## Transition gating
//!
//! Every status-changing method returns `Ok(true)` when it performed the
//! transition and `Ok(false)` when the gate missed — the row was not in the
//! expected pre-state. A gate miss is how duplicate callback deliveries and
//! racing handlers are absorbed: the loser observes `false` and performs no
//! side-effect.

pub mod error;
pub mod ledger;
pub mod mem;
pub mod pg;
pub mod records;

use async_trait::async_trait;
use rust_decimal::Decimal;

use sambaza_core::{
    BonusSettings, CheckoutRequestId, Fault, PaymentReceipt, ProviderKind, TxStatus,
};

pub use error::StoreError;
pub use ledger::FloatAccount;
pub use mem::MemStore;
pub use pg::PgStore;
pub use records::{
    BonusHistoryEntry, FailedReconciliation, NewSale, NewTopupRequest, PendingReversal,
    SaleRecord, TopupRequest, TransactionRecord,
};

/// The persistence seam of the gateway.
///
/// One method per lifecycle operation rather than a generic update: the
/// store owns the transition gates, so a caller cannot accidentally write a
/// state the machine forbids.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create the frozen request record and its transaction row in
    /// [`TxStatus::PushInitiated`], atomically.
    async fn create_request(&self, request: NewTopupRequest) -> Result<(), StoreError>;

    /// Fetch a request by its checkout request id.
    async fn get_request(
        &self,
        id: &CheckoutRequestId,
    ) -> Result<Option<TopupRequest>, StoreError>;

    /// Fetch the lifecycle record by its checkout request id.
    async fn get_transaction(
        &self,
        id: &CheckoutRequestId,
    ) -> Result<Option<TransactionRecord>, StoreError>;

    /// `PUSH_INITIATED → MPESA_PAYMENT_FAILED`.
    async fn record_payment_failed(&self, id: &CheckoutRequestId) -> Result<bool, StoreError>;

    /// `PUSH_INITIATED → RECEIVED_PENDING_FULFILLMENT`, recording the
    /// receipt and the amount actually collected.
    async fn record_payment_confirmed(
        &self,
        id: &CheckoutRequestId,
        receipt: &PaymentReceipt,
        amount: Decimal,
    ) -> Result<bool, StoreError>;

    /// `RECEIVED_PENDING_FULFILLMENT → FULFILLMENT_IN_PROGRESS`.
    ///
    /// The float debit is issued by the engine immediately before this
    /// transition; the gate is what makes the debit happen at most once.
    async fn begin_fulfillment(&self, id: &CheckoutRequestId) -> Result<bool, StoreError>;

    /// `FULFILLMENT_IN_PROGRESS → COMPLETED_AND_FULFILLED`.
    async fn complete_fulfillment(
        &self,
        id: &CheckoutRequestId,
        provider: ProviderKind,
        fallback_attempted: bool,
    ) -> Result<bool, StoreError>;

    /// `FULFILLMENT_IN_PROGRESS → RECEIVED_FULFILLMENT_FAILED`.
    async fn fail_fulfillment(
        &self,
        id: &CheckoutRequestId,
        fallback_attempted: bool,
    ) -> Result<bool, StoreError>;

    /// `from → REVERSAL_PENDING_CONFIRMATION`, where `from` is either
    /// `RECEIVED_PENDING_FULFILLMENT` (invalid amount/destination) or
    /// `RECEIVED_FULFILLMENT_FAILED` (dispatch failure).
    async fn record_reversal_submitted(
        &self,
        id: &CheckoutRequestId,
        from: TxStatus,
    ) -> Result<bool, StoreError>;

    /// `from → REVERSAL_INITIATION_FAILED`, same pre-states as submission.
    async fn record_reversal_rejected(
        &self,
        id: &CheckoutRequestId,
        from: TxStatus,
    ) -> Result<bool, StoreError>;

    /// `REVERSAL_PENDING_CONFIRMATION → outcome`, where `outcome` is one of
    /// `REVERSED_SUCCESSFULLY`, `REVERSAL_FAILED_CONFIRMATION`, or
    /// `REVERSAL_TIMED_OUT`.
    async fn resolve_reversal(
        &self,
        id: &CheckoutRequestId,
        outcome: TxStatus,
    ) -> Result<bool, StoreError>;

    /// Degrade any state in the fulfillment stretch to
    /// `CRITICAL_FULFILLMENT_ERROR`.
    async fn mark_critical(&self, id: &CheckoutRequestId) -> Result<bool, StoreError>;

    /// Write the sale record for a transaction. Written once, at payment
    /// confirmation, with the dispatch outcome still open; a duplicate
    /// write keeps the first record.
    async fn create_sale(&self, sale: NewSale) -> Result<(), StoreError>;

    /// Record the dispatch outcome on an existing sale: the provider that
    /// delivered (when one did) and the raw provider response.
    async fn update_sale_result(
        &self,
        id: &CheckoutRequestId,
        provider: Option<ProviderKind>,
        dispatch_result: serde_json::Value,
    ) -> Result<bool, StoreError>;

    /// Fetch the sale record for a transaction.
    async fn get_sale(&self, id: &CheckoutRequestId) -> Result<Option<SaleRecord>, StoreError>;

    /// Append a fault to the durable error log. Never fails the caller's
    /// flow for classification reasons — only for backend failures.
    async fn log_fault(&self, fault: Fault) -> Result<(), StoreError>;

    /// Record a reversal submitted to the rail.
    async fn create_pending_reversal(&self, entry: PendingReversal) -> Result<(), StoreError>;

    /// Record a transaction needing manual reconciliation.
    async fn create_failed_reconciliation(
        &self,
        entry: FailedReconciliation,
    ) -> Result<(), StoreError>;

    /// Resolve a reversal result/timeout callback to its transaction via
    /// the originator conversation id captured at submission time.
    async fn find_reversal_request(
        &self,
        originator_conversation_id: &str,
    ) -> Result<Option<CheckoutRequestId>, StoreError>;

    /// Current per-telco bonus percentages.
    async fn bonus_settings(&self) -> Result<BonusSettings, StoreError>;

    /// Replace the bonus percentages, writing a history entry for each
    /// value that actually changed.
    async fn update_bonus_settings(
        &self,
        settings: BonusSettings,
        actor: &str,
    ) -> Result<BonusSettings, StoreError>;

    /// Recent bonus changes, newest first.
    async fn bonus_history(&self, limit: i64) -> Result<Vec<BonusHistoryEntry>, StoreError>;

    /// The dealer service PIN, if configured.
    async fn service_pin(&self) -> Result<Option<String>, StoreError>;

    /// Adjust a float balance by `delta` under a single-row transaction.
    ///
    /// Fails with [`StoreError::InsufficientFloat`] when the result would
    /// go below zero. A missing row auto-initializes to zero first.
    /// Returns the post-adjustment balance.
    async fn adjust_float(
        &self,
        account: FloatAccount,
        delta: Decimal,
    ) -> Result<Decimal, StoreError>;

    /// Overwrite a float balance with a provider-reported authoritative
    /// value. Returns the previous balance.
    async fn set_float(
        &self,
        account: FloatAccount,
        balance: Decimal,
    ) -> Result<Decimal, StoreError>;

    /// Current balance of a float account (zero if never touched).
    async fn float_balance(&self, account: FloatAccount) -> Result<Decimal, StoreError>;
}
