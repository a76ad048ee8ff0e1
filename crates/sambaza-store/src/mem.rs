//! # In-Memory Store
//!
//! The Postgres store's twin for tests and for dev mode without a
//! `DATABASE_URL`. Gating semantics are identical: transitions check the
//! expected pre-state under the lock, so duplicate deliveries and racing
//! handlers resolve the same way they do against Postgres.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use sambaza_core::{
    BonusSettings, CheckoutRequestId, Fault, PaymentReceipt, ProviderKind, TxStatus,
};

use crate::error::StoreError;
use crate::ledger::FloatAccount;
use crate::records::{
    BonusHistoryEntry, FailedReconciliation, NewSale, NewTopupRequest, PendingReversal,
    SaleRecord, TopupRequest, TransactionRecord,
};
use crate::Store;

/// A reconciliation row as held in memory.
#[derive(Debug, Clone)]
pub struct ReconciliationEntry {
    /// `pending_reversal` or `failed_reconciliation`.
    pub kind: &'static str,
    /// The affected transaction.
    pub checkout_request_id: CheckoutRequestId,
    /// Amount at stake, KES.
    pub original_amount: Decimal,
    /// Why automatic recovery stopped (failed reconciliations only).
    pub reason: Option<String>,
    /// Structured detail: the reversal request for pending reversals.
    pub detail: serde_json::Value,
}

#[derive(Default)]
struct Inner {
    requests: HashMap<String, TopupRequest>,
    transactions: HashMap<String, TransactionRecord>,
    sales: HashMap<String, SaleRecord>,
    faults: Vec<Fault>,
    reconciliations: Vec<ReconciliationEntry>,
    bonus_history: Vec<BonusHistoryEntry>,
    bonus_settings: BonusSettings,
    service_pin: Option<String>,
    floats: HashMap<FloatAccount, Decimal>,
}

/// In-memory [`Store`].
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the dealer service PIN (normally operator-provisioned).
    pub fn set_service_pin(&self, pin: impl Into<String>) {
        self.inner.lock().service_pin = Some(pin.into());
    }

    /// Snapshot of the fault log, for assertions.
    pub fn faults(&self) -> Vec<Fault> {
        self.inner.lock().faults.clone()
    }

    /// Snapshot of the reconciliation queue, for assertions.
    pub fn reconciliations(&self) -> Vec<ReconciliationEntry> {
        self.inner.lock().reconciliations.clone()
    }

    fn transition(
        &self,
        id: &CheckoutRequestId,
        from: TxStatus,
        to: TxStatus,
        mutate: impl FnOnce(&mut TransactionRecord),
    ) -> Result<bool, StoreError> {
        if !from.can_transition_to(to) {
            return Err(StoreError::IllegalTransition { from, to });
        }
        let mut inner = self.inner.lock();
        let Some(record) = inner.transactions.get_mut(id.as_str()) else {
            return Ok(false);
        };
        if record.status != from {
            return Ok(false);
        }
        record.status = to;
        record.reconciliation_needed = to.needs_reconciliation();
        record.last_updated = Utc::now();
        mutate(record);
        Ok(true)
    }
}

#[async_trait]
impl Store for MemStore {
    async fn create_request(&self, request: NewTopupRequest) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let key = request.checkout_request_id.as_str().to_string();
        let now = Utc::now();
        inner.requests.insert(
            key.clone(),
            TopupRequest {
                checkout_request_id: request.checkout_request_id.clone(),
                payer_msisdn: request.payer_msisdn,
                destination_msisdn: request.destination_msisdn,
                carrier: request.carrier,
                requested_amount: request.requested_amount,
                payload_snapshot: request.payload_snapshot,
                initiated_at: now,
            },
        );
        inner.transactions.insert(
            key,
            TransactionRecord {
                checkout_request_id: request.checkout_request_id,
                status: TxStatus::PushInitiated,
                payment_receipt: None,
                amount_received: None,
                fulfillment_status: None,
                provider_used: None,
                fallback_attempted: false,
                reconciliation_needed: false,
                last_updated: now,
            },
        );
        Ok(())
    }

    async fn get_request(
        &self,
        id: &CheckoutRequestId,
    ) -> Result<Option<TopupRequest>, StoreError> {
        Ok(self.inner.lock().requests.get(id.as_str()).cloned())
    }

    async fn get_transaction(
        &self,
        id: &CheckoutRequestId,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(self.inner.lock().transactions.get(id.as_str()).cloned())
    }

    async fn record_payment_failed(&self, id: &CheckoutRequestId) -> Result<bool, StoreError> {
        self.transition(
            id,
            TxStatus::PushInitiated,
            TxStatus::MpesaPaymentFailed,
            |_| {},
        )
    }

    async fn record_payment_confirmed(
        &self,
        id: &CheckoutRequestId,
        receipt: &PaymentReceipt,
        amount: Decimal,
    ) -> Result<bool, StoreError> {
        let receipt = receipt.clone();
        self.transition(
            id,
            TxStatus::PushInitiated,
            TxStatus::ReceivedPendingFulfillment,
            |record| {
                record.payment_receipt = Some(receipt);
                record.amount_received = Some(amount);
            },
        )
    }

    async fn begin_fulfillment(&self, id: &CheckoutRequestId) -> Result<bool, StoreError> {
        self.transition(
            id,
            TxStatus::ReceivedPendingFulfillment,
            TxStatus::FulfillmentInProgress,
            |_| {},
        )
    }

    async fn complete_fulfillment(
        &self,
        id: &CheckoutRequestId,
        provider: ProviderKind,
        fallback_attempted: bool,
    ) -> Result<bool, StoreError> {
        self.transition(
            id,
            TxStatus::FulfillmentInProgress,
            TxStatus::CompletedAndFulfilled,
            |record| {
                record.fulfillment_status = Some("DELIVERED".to_string());
                record.provider_used = Some(provider);
                record.fallback_attempted = fallback_attempted;
            },
        )
    }

    async fn fail_fulfillment(
        &self,
        id: &CheckoutRequestId,
        fallback_attempted: bool,
    ) -> Result<bool, StoreError> {
        self.transition(
            id,
            TxStatus::FulfillmentInProgress,
            TxStatus::ReceivedFulfillmentFailed,
            |record| {
                record.fulfillment_status = Some("FAILED".to_string());
                record.fallback_attempted = fallback_attempted;
            },
        )
    }

    async fn record_reversal_submitted(
        &self,
        id: &CheckoutRequestId,
        from: TxStatus,
    ) -> Result<bool, StoreError> {
        self.transition(id, from, TxStatus::ReversalPendingConfirmation, |_| {})
    }

    async fn record_reversal_rejected(
        &self,
        id: &CheckoutRequestId,
        from: TxStatus,
    ) -> Result<bool, StoreError> {
        self.transition(id, from, TxStatus::ReversalInitiationFailed, |_| {})
    }

    async fn resolve_reversal(
        &self,
        id: &CheckoutRequestId,
        outcome: TxStatus,
    ) -> Result<bool, StoreError> {
        self.transition(id, TxStatus::ReversalPendingConfirmation, outcome, |_| {})
    }

    async fn mark_critical(&self, id: &CheckoutRequestId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let Some(record) = inner.transactions.get_mut(id.as_str()) else {
            return Ok(false);
        };
        let in_stretch = matches!(
            record.status,
            TxStatus::ReceivedPendingFulfillment
                | TxStatus::FulfillmentInProgress
                | TxStatus::ReceivedFulfillmentFailed
        );
        if !in_stretch {
            return Ok(false);
        }
        record.status = TxStatus::CriticalFulfillmentError;
        record.reconciliation_needed = true;
        record.last_updated = Utc::now();
        Ok(true)
    }

    async fn create_sale(&self, sale: NewSale) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let key = sale.checkout_request_id.as_str().to_string();
        // Same at-most-once behavior as the ON CONFLICT DO NOTHING insert.
        inner.sales.entry(key).or_insert(SaleRecord {
            checkout_request_id: sale.checkout_request_id,
            original_amount: sale.original_amount,
            bonus: sale.bonus,
            dispatched_amount: sale.dispatched_amount,
            carrier: sale.carrier,
            provider_used: sale.provider_used,
            dispatch_result: sale.dispatch_result,
            bonus_percentage: sale.bonus_percentage,
            completed_at: Utc::now(),
        });
        Ok(())
    }

    async fn update_sale_result(
        &self,
        id: &CheckoutRequestId,
        provider: Option<ProviderKind>,
        dispatch_result: serde_json::Value,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let Some(sale) = inner.sales.get_mut(id.as_str()) else {
            return Ok(false);
        };
        sale.provider_used = provider;
        sale.dispatch_result = dispatch_result;
        sale.completed_at = Utc::now();
        Ok(true)
    }

    async fn get_sale(&self, id: &CheckoutRequestId) -> Result<Option<SaleRecord>, StoreError> {
        Ok(self.inner.lock().sales.get(id.as_str()).cloned())
    }

    async fn log_fault(&self, fault: Fault) -> Result<(), StoreError> {
        self.inner.lock().faults.push(fault);
        Ok(())
    }

    async fn create_pending_reversal(&self, entry: PendingReversal) -> Result<(), StoreError> {
        self.inner.lock().reconciliations.push(ReconciliationEntry {
            kind: "pending_reversal",
            checkout_request_id: entry.checkout_request_id,
            original_amount: entry.original_amount,
            reason: None,
            detail: entry.reversal_request,
        });
        Ok(())
    }

    async fn create_failed_reconciliation(
        &self,
        entry: FailedReconciliation,
    ) -> Result<(), StoreError> {
        self.inner.lock().reconciliations.push(ReconciliationEntry {
            kind: "failed_reconciliation",
            checkout_request_id: entry.checkout_request_id,
            original_amount: entry.original_amount,
            reason: Some(entry.reason),
            detail: serde_json::Value::Null,
        });
        Ok(())
    }

    async fn find_reversal_request(
        &self,
        originator_conversation_id: &str,
    ) -> Result<Option<CheckoutRequestId>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .reconciliations
            .iter()
            .rev()
            .find(|entry| {
                entry.kind == "pending_reversal"
                    && entry.detail["originator_conversation_id"] == originator_conversation_id
            })
            .map(|entry| entry.checkout_request_id.clone()))
    }

    async fn bonus_settings(&self) -> Result<BonusSettings, StoreError> {
        Ok(self.inner.lock().bonus_settings.clone())
    }

    async fn update_bonus_settings(
        &self,
        settings: BonusSettings,
        actor: &str,
    ) -> Result<BonusSettings, StoreError> {
        let mut inner = self.inner.lock();
        let old = inner.bonus_settings.clone();
        for (telco, old_pct, new_pct) in [
            ("safaricom", old.safaricom_pct, settings.safaricom_pct),
            (
                "africastalking",
                old.africastalking_pct,
                settings.africastalking_pct,
            ),
        ] {
            if old_pct != new_pct {
                inner.bonus_history.push(BonusHistoryEntry {
                    telco: telco.to_string(),
                    old_pct,
                    new_pct,
                    actor: actor.to_string(),
                    created_at: Utc::now(),
                });
            }
        }
        inner.bonus_settings = settings.clone();
        Ok(settings)
    }

    async fn bonus_history(&self, limit: i64) -> Result<Vec<BonusHistoryEntry>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .bonus_history
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn service_pin(&self) -> Result<Option<String>, StoreError> {
        Ok(self.inner.lock().service_pin.clone())
    }

    async fn adjust_float(
        &self,
        account: FloatAccount,
        delta: Decimal,
    ) -> Result<Decimal, StoreError> {
        let mut inner = self.inner.lock();
        let current = inner.floats.get(&account).copied().unwrap_or(Decimal::ZERO);
        let next = current + delta;
        if next < Decimal::ZERO {
            return Err(StoreError::InsufficientFloat {
                account,
                balance: current,
                delta,
            });
        }
        inner.floats.insert(account, next);
        Ok(next)
    }

    async fn set_float(
        &self,
        account: FloatAccount,
        balance: Decimal,
    ) -> Result<Decimal, StoreError> {
        let mut inner = self.inner.lock();
        let previous = inner.floats.insert(account, balance).unwrap_or(Decimal::ZERO);
        Ok(previous)
    }

    async fn float_balance(&self, account: FloatAccount) -> Result<Decimal, StoreError> {
        Ok(self
            .inner
            .lock()
            .floats
            .get(&account)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sambaza_core::{Carrier, Msisdn};

    fn request(id: &str) -> NewTopupRequest {
        NewTopupRequest {
            checkout_request_id: CheckoutRequestId::new(id),
            payer_msisdn: Msisdn::parse("254700000001").unwrap(),
            destination_msisdn: Msisdn::parse("0712345678").unwrap(),
            carrier: Carrier::Safaricom,
            requested_amount: dec!(100),
            payload_snapshot: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn payment_confirmation_is_idempotent() {
        let store = MemStore::new();
        let id = CheckoutRequestId::new("ws_CO_1");
        store.create_request(request("ws_CO_1")).await.unwrap();

        let receipt = PaymentReceipt::new("QK123");
        let first = store
            .record_payment_confirmed(&id, &receipt, dec!(100))
            .await
            .unwrap();
        let second = store
            .record_payment_confirmed(&id, &receipt, dec!(100))
            .await
            .unwrap();
        assert!(first);
        assert!(!second, "duplicate delivery must miss the gate");

        let record = store.get_transaction(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TxStatus::ReceivedPendingFulfillment);
        assert_eq!(record.amount_received, Some(dec!(100)));
    }

    #[tokio::test]
    async fn begin_fulfillment_happens_at_most_once() {
        let store = MemStore::new();
        let id = CheckoutRequestId::new("ws_CO_2");
        store.create_request(request("ws_CO_2")).await.unwrap();
        store
            .record_payment_confirmed(&id, &PaymentReceipt::new("QK1"), dec!(50))
            .await
            .unwrap();

        assert!(store.begin_fulfillment(&id).await.unwrap());
        assert!(!store.begin_fulfillment(&id).await.unwrap());
    }

    #[tokio::test]
    async fn illegal_transitions_are_rejected_not_raced() {
        let store = MemStore::new();
        let id = CheckoutRequestId::new("ws_CO_3");
        store.create_request(request("ws_CO_3")).await.unwrap();

        let err = store
            .resolve_reversal(&id, TxStatus::PushInitiated)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn float_never_goes_negative() {
        let store = MemStore::new();
        store
            .adjust_float(FloatAccount::SafaricomDealer, dec!(100))
            .await
            .unwrap();
        let err = store
            .adjust_float(FloatAccount::SafaricomDealer, dec!(-150))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InsufficientFloat { .. }));
        // The failed debit must not move the balance.
        assert_eq!(
            store
                .float_balance(FloatAccount::SafaricomDealer)
                .await
                .unwrap(),
            dec!(100)
        );
    }

    #[tokio::test]
    async fn missing_float_auto_initializes_to_zero() {
        let store = MemStore::new();
        assert_eq!(
            store
                .float_balance(FloatAccount::Africastalking)
                .await
                .unwrap(),
            Decimal::ZERO
        );
        let balance = store
            .adjust_float(FloatAccount::Africastalking, dec!(25))
            .await
            .unwrap();
        assert_eq!(balance, dec!(25));
    }

    #[tokio::test]
    async fn duplicate_sale_writes_keep_the_first() {
        let store = MemStore::new();
        store.create_request(request("ws_CO_4")).await.unwrap();
        let id = CheckoutRequestId::new("ws_CO_4");
        let sale = NewSale {
            checkout_request_id: id.clone(),
            original_amount: dec!(100),
            bonus: dec!(2),
            dispatched_amount: dec!(102),
            carrier: Carrier::Safaricom,
            provider_used: Some(ProviderKind::DealerDirect),
            dispatch_result: serde_json::json!({"first": true}),
            bonus_percentage: dec!(2),
        };
        store.create_sale(sale.clone()).await.unwrap();
        store
            .create_sale(NewSale {
                dispatch_result: serde_json::json!({"first": false}),
                ..sale
            })
            .await
            .unwrap();
        let stored = store.get_sale(&id).await.unwrap().unwrap();
        assert_eq!(stored.dispatch_result["first"], true);
    }

    #[tokio::test]
    async fn bonus_updates_write_history_only_for_changes() {
        let store = MemStore::new();
        store
            .update_bonus_settings(
                BonusSettings {
                    safaricom_pct: dec!(2),
                    africastalking_pct: dec!(0),
                },
                "ops@example.com",
            )
            .await
            .unwrap();
        store
            .update_bonus_settings(
                BonusSettings {
                    safaricom_pct: dec!(2),
                    africastalking_pct: dec!(1.5),
                },
                "ops@example.com",
            )
            .await
            .unwrap();

        let history = store.bonus_history(10).await.unwrap();
        assert_eq!(history.len(), 2);
        // Newest first: the africastalking change, then the safaricom one.
        assert_eq!(history[0].telco, "africastalking");
        assert_eq!(history[0].old_pct, dec!(0));
        assert_eq!(history[0].new_pct, dec!(1.5));
        assert_eq!(history[1].telco, "safaricom");
    }

    #[tokio::test]
    async fn mark_critical_only_applies_in_the_fulfillment_stretch() {
        let store = MemStore::new();
        let id = CheckoutRequestId::new("ws_CO_5");
        store.create_request(request("ws_CO_5")).await.unwrap();

        // PUSH_INITIATED is outside the stretch.
        assert!(!store.mark_critical(&id).await.unwrap());

        store
            .record_payment_confirmed(&id, &PaymentReceipt::new("QK9"), dec!(10))
            .await
            .unwrap();
        assert!(store.mark_critical(&id).await.unwrap());
        let record = store.get_transaction(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TxStatus::CriticalFulfillmentError);
        assert!(record.reconciliation_needed);
    }
}
