//! # Payment Callback & Fulfillment
//!
//! The second half of every transaction. The rail reports the payment
//! outcome; on success the engine writes the sale record, debits float,
//! dispatches airtime with the carrier-appropriate provider (falling back
//! to the aggregator for home-telco numbers), and finalizes — or walks
//! the reversal path so the customer's money comes back.
//!
//! Ordering invariants enforced here:
//!
//! - a sale record exists from the moment a payment is confirmed;
//! - the float debit lands before the dispatch attempt;
//! - a failed attempt is credited back before any fallback debits again;
//! - the reversal is submitted to the rail before the transaction is
//!   written as `REVERSAL_PENDING_CONFIRMATION`.

use rust_decimal::Decimal;

use sambaza_airtime::{AirtimeError, DispatchReceipt};
use sambaza_core::{
    bonus_for, validate_topup_amount, Bonus, CheckoutRequestId, Fault, FaultKind, FaultSubKind,
    PaymentReceipt, ProviderKind, TxStatus,
};
use sambaza_daraja::StkCallback;
use sambaza_store::{FloatAccount, NewSale, PendingReversal, StoreError, TopupRequest};

use crate::error::EngineError;
use crate::{Engine, AGGREGATOR_COMMISSION_RATE, FLOAT_DRIFT_TOLERANCE};

impl Engine {
    /// Apply a payment callback. Idempotent on the checkout id: duplicate
    /// deliveries lose their transition gate and change nothing.
    pub async fn handle_payment_callback(
        &self,
        callback: StkCallback,
    ) -> Result<(), EngineError> {
        let id = callback.checkout_request_id.clone();
        let Some(request) = self.store.get_request(&id).await? else {
            self.log_fault(
                Fault::new(
                    FaultKind::StkCallbackError,
                    serde_json::json!({
                        "reason": "unknown checkout request id",
                        "result_code": callback.result_code,
                    }),
                )
                .for_request(id),
            )
            .await;
            return Ok(());
        };

        if !callback.is_success() {
            let advanced = self.store.record_payment_failed(&id).await?;
            if advanced {
                tracing::info!(checkout_request_id = %id, code = callback.result_code,
                    "payment failed");
                self.log_fault(
                    Fault::new(
                        FaultKind::StkPaymentError,
                        serde_json::json!({
                            "result_code": callback.result_code,
                            "result_desc": callback.result_desc,
                        }),
                    )
                    .for_request(id),
                )
                .await;
            }
            return Ok(());
        }

        let amount = callback
            .metadata
            .amount()
            .unwrap_or(request.requested_amount);
        let receipt = match callback.metadata.receipt() {
            Some(receipt) => receipt,
            None => {
                // Collected payment with a malformed callback: keep going
                // with a placeholder so the money is traceable, and leave
                // a loud record.
                self.log_fault(
                    Fault::new(
                        FaultKind::StkCallbackError,
                        serde_json::json!({"reason": "success callback without receipt"}),
                    )
                    .for_request(id.clone()),
                )
                .await;
                PaymentReceipt::new("UNKNOWN")
            }
        };

        let advanced = self
            .store
            .record_payment_confirmed(&id, &receipt, amount)
            .await?;
        if !advanced {
            tracing::debug!(checkout_request_id = %id, "duplicate payment callback ignored");
            return Ok(());
        }

        if let Err(e) = self.fulfill_confirmed(&request, amount).await {
            tracing::error!(checkout_request_id = %id, "fulfillment degraded to critical: {e}");
            if let Err(store_err) = self.store.mark_critical(&id).await {
                tracing::error!("failed to mark critical: {store_err}");
            }
            self.log_fault(
                Fault::new(
                    FaultKind::CriticalFulfillmentError,
                    serde_json::json!({"error": e.to_string()}),
                )
                .for_request(id),
            )
            .await;
        }
        Ok(())
    }

    /// Everything after a confirmed payment: the sale record, the
    /// validity checks, and the dispatch chain. Expected failures walk
    /// the reversal path and return `Ok`; only unexpected trouble (store
    /// loss, logic holes) bubbles to the critical handler above.
    async fn fulfill_confirmed(
        &self,
        request: &TopupRequest,
        amount: Decimal,
    ) -> Result<(), EngineError> {
        let id = &request.checkout_request_id;

        let amount_ok = validate_topup_amount(amount).is_ok();
        let carrier_ok = request.carrier.is_supported();

        // The sale record exists from confirmation onward, outcome still
        // open. Zero bonus when the transaction is already reversal-bound.
        let bonus = if amount_ok && carrier_ok {
            bonus_for(request.carrier, amount, &self.store.bonus_settings().await?)
        } else {
            Bonus::zero()
        };
        let dispatched = amount + bonus.amount;
        self.store
            .create_sale(NewSale {
                checkout_request_id: id.clone(),
                original_amount: amount,
                bonus: bonus.amount,
                dispatched_amount: dispatched,
                carrier: request.carrier,
                provider_used: None,
                dispatch_result: serde_json::json!({}),
                bonus_percentage: bonus.rate,
            })
            .await?;

        if !amount_ok {
            self.log_fault(
                Fault::new(
                    FaultKind::AirtimeFulfillmentError,
                    serde_json::json!({"amount": amount}),
                )
                .with_sub_kind(FaultSubKind::InvalidAmountRange)
                .for_request(id.clone()),
            )
            .await;
            return self
                .submit_reversal(request, amount, TxStatus::ReceivedPendingFulfillment)
                .await;
        }

        if !carrier_ok {
            self.log_fault(
                Fault::new(
                    FaultKind::AirtimeFulfillmentError,
                    serde_json::json!({"recipient": request.destination_msisdn.national()}),
                )
                .with_sub_kind(FaultSubKind::UnknownCarrier)
                .for_request(id.clone()),
            )
            .await;
            return self
                .submit_reversal(request, amount, TxStatus::ReceivedPendingFulfillment)
                .await;
        }

        let home = request.carrier.is_home();
        let primary_account = if home {
            FloatAccount::SafaricomDealer
        } else {
            FloatAccount::Africastalking
        };

        // Debit before dispatch. A float too thin to cover the dispatch is
        // an ordinary fulfillment failure: reverse the payment.
        let post_debit = match self.store.adjust_float(primary_account, -dispatched).await {
            Ok(balance) => balance,
            Err(StoreError::InsufficientFloat { balance, .. }) => {
                self.log_fault(
                    Fault::new(
                        FaultKind::AirtimeFulfillmentError,
                        serde_json::json!({
                            "reason": "insufficient float",
                            "account": primary_account,
                            "balance": balance,
                            "needed": dispatched,
                        }),
                    )
                    .with_sub_kind(FaultSubKind::AirtimeDispatchFailed)
                    .for_request(id.clone()),
                )
                .await;
                return self
                    .submit_reversal(request, amount, TxStatus::ReceivedPendingFulfillment)
                    .await;
            }
            Err(e) => return Err(e.into()),
        };

        if !self.store.begin_fulfillment(id).await? {
            // Lost the race to a concurrent handler: undo our debit and
            // let the winner run the dispatch.
            self.store.adjust_float(primary_account, dispatched).await?;
            return Ok(());
        }

        if home {
            match self
                .dealer
                .dispatch(&request.destination_msisdn, dispatched, request.carrier)
                .await
            {
                Ok(receipt) => {
                    self.finish_success(
                        request,
                        amount,
                        dispatched,
                        ProviderKind::DealerDirect,
                        false,
                        post_debit,
                        receipt,
                    )
                    .await
                }
                Err(primary_err) => {
                    self.log_dispatch_failure(id, ProviderKind::DealerDirect, &primary_err)
                        .await;
                    // Credit back before the fallback takes its own debit.
                    self.store
                        .adjust_float(FloatAccount::SafaricomDealer, dispatched)
                        .await?;
                    self.fallback_via_aggregator(request, amount, dispatched)
                        .await
                }
            }
        } else {
            match self
                .aggregator
                .dispatch(&request.destination_msisdn, dispatched, request.carrier)
                .await
            {
                Ok(receipt) => {
                    self.store
                        .adjust_float(
                            FloatAccount::Africastalking,
                            amount * AGGREGATOR_COMMISSION_RATE,
                        )
                        .await?;
                    self.finish_success(
                        request,
                        amount,
                        dispatched,
                        ProviderKind::Aggregator,
                        false,
                        post_debit,
                        receipt,
                    )
                    .await
                }
                Err(e) => {
                    self.log_dispatch_failure(id, ProviderKind::Aggregator, &e).await;
                    self.store
                        .adjust_float(FloatAccount::Africastalking, dispatched)
                        .await?;
                    self.store.fail_fulfillment(id, false).await?;
                    self.submit_reversal(request, amount, TxStatus::ReceivedFulfillmentFailed)
                        .await
                }
            }
        }
    }

    /// The aggregator fallback after a dealer-direct failure. The home
    /// float is already credited back when this runs.
    async fn fallback_via_aggregator(
        &self,
        request: &TopupRequest,
        amount: Decimal,
        dispatched: Decimal,
    ) -> Result<(), EngineError> {
        let id = &request.checkout_request_id;

        let post_debit = match self
            .store
            .adjust_float(FloatAccount::Africastalking, -dispatched)
            .await
        {
            Ok(balance) => balance,
            Err(StoreError::InsufficientFloat { balance, .. }) => {
                self.log_fault(
                    Fault::new(
                        FaultKind::AirtimeFulfillmentError,
                        serde_json::json!({
                            "reason": "insufficient fallback float",
                            "balance": balance,
                            "needed": dispatched,
                        }),
                    )
                    .with_sub_kind(FaultSubKind::AirtimeDispatchFailed)
                    .for_request(id.clone()),
                )
                .await;
                self.store.fail_fulfillment(id, true).await?;
                return self
                    .submit_reversal(request, amount, TxStatus::ReceivedFulfillmentFailed)
                    .await;
            }
            Err(e) => return Err(e.into()),
        };

        match self
            .aggregator
            .dispatch(&request.destination_msisdn, dispatched, request.carrier)
            .await
        {
            Ok(receipt) => {
                self.store
                    .adjust_float(
                        FloatAccount::Africastalking,
                        amount * AGGREGATOR_COMMISSION_RATE,
                    )
                    .await?;
                self.finish_success(
                    request,
                    amount,
                    dispatched,
                    ProviderKind::AggregatorFallback,
                    true,
                    post_debit,
                    receipt,
                )
                .await
            }
            Err(e) => {
                self.log_dispatch_failure(id, ProviderKind::Aggregator, &e).await;
                self.store
                    .adjust_float(FloatAccount::Africastalking, dispatched)
                    .await?;
                self.store.fail_fulfillment(id, true).await?;
                self.submit_reversal(request, amount, TxStatus::ReceivedFulfillmentFailed)
                    .await
            }
        }
    }

    /// Sale outcome, terminal status, authoritative balance overwrite,
    /// analytics — in that order.
    async fn finish_success(
        &self,
        request: &TopupRequest,
        amount: Decimal,
        dispatched: Decimal,
        provider: ProviderKind,
        fallback_attempted: bool,
        post_debit_balance: Decimal,
        receipt: DispatchReceipt,
    ) -> Result<(), EngineError> {
        let id = &request.checkout_request_id;

        self.store
            .update_sale_result(id, Some(provider), receipt.raw.clone())
            .await?;
        self.store
            .complete_fulfillment(id, provider, fallback_attempted)
            .await?;

        // The dealer reports its own view of the float; that view wins.
        if provider == ProviderKind::DealerDirect {
            if let Some(authoritative) = receipt.reported_balance {
                self.store
                    .set_float(FloatAccount::SafaricomDealer, authoritative)
                    .await?;
                let drift = (authoritative - post_debit_balance).abs();
                if drift > FLOAT_DRIFT_TOLERANCE {
                    self.log_fault(
                        Fault::new(
                            FaultKind::FloatReconciliationWarning,
                            serde_json::json!({
                                "local": post_debit_balance,
                                "authoritative": authoritative,
                                "drift": drift,
                            }),
                        )
                        .for_request(id.clone()),
                    )
                    .await;
                }
            }
        }

        tracing::info!(
            checkout_request_id = %id,
            provider = %provider,
            %dispatched,
            "airtime delivered"
        );
        self.notify_sale_completed(request, amount, dispatched, provider);
        Ok(())
    }

    async fn log_dispatch_failure(
        &self,
        id: &CheckoutRequestId,
        provider: ProviderKind,
        error: &AirtimeError,
    ) {
        tracing::warn!(checkout_request_id = %id, provider = %provider, "dispatch failed: {error}");
        // An upstream that answered "no" is a dispatch failure; transport
        // loss and unreadable responses are runtime exceptions.
        let (detail, sub_kind) = match error {
            AirtimeError::Refused { detail, .. } => {
                (detail.clone(), FaultSubKind::AirtimeDispatchFailed)
            }
            AirtimeError::Api { status, body, .. } => (
                serde_json::json!({"status": status, "body": body}),
                FaultSubKind::AirtimeDispatchFailed,
            ),
            other => (
                serde_json::json!({"error": other.to_string()}),
                FaultSubKind::RuntimeException,
            ),
        };
        // The sale keeps the last failure detail; the outcome stays open
        // until a later attempt succeeds or the reversal path owns it.
        if let Err(e) = self
            .store
            .update_sale_result(id, None, serde_json::json!({"failed": detail}))
            .await
        {
            tracing::error!("failed to record dispatch failure on sale: {e}");
        }
        self.log_fault(
            Fault::new(
                FaultKind::AirtimeFulfillmentError,
                serde_json::json!({"provider": provider, "detail": detail}),
            )
            .with_sub_kind(sub_kind)
            .for_request(id.clone()),
        )
        .await;
    }

    /// Submit a reversal to the rail, then advance the transaction. A
    /// rejected submission lands in the failed-reconciliation queue.
    pub(crate) async fn submit_reversal(
        &self,
        request: &TopupRequest,
        amount: Decimal,
        from: TxStatus,
    ) -> Result<(), EngineError> {
        let id = &request.checkout_request_id;
        let record = self
            .store
            .get_transaction(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.as_str().to_string()))?;

        let Some(receipt) = record.payment_receipt else {
            // Nothing the rail can act on. Park it for a human.
            self.store.record_reversal_rejected(id, from).await?;
            self.store
                .create_failed_reconciliation(sambaza_store::FailedReconciliation {
                    checkout_request_id: id.clone(),
                    reason: "no payment receipt to reverse".into(),
                    original_amount: amount,
                })
                .await?;
            return Ok(());
        };

        match self.rail.reverse(receipt.as_str(), amount, id).await {
            Ok(accepted) => {
                // Persist the correlation handle before the status write:
                // the result callback can only be matched through it.
                self.store
                    .create_pending_reversal(PendingReversal {
                        checkout_request_id: id.clone(),
                        original_amount: amount,
                        payer_msisdn: request.payer_msisdn.clone(),
                        reversal_request: serde_json::json!({
                            "originator_conversation_id": accepted.originator_conversation_id,
                            "conversation_id": accepted.conversation_id,
                            "request": accepted.request_snapshot,
                        }),
                    })
                    .await?;
                self.store.record_reversal_submitted(id, from).await?;
                tracing::info!(checkout_request_id = %id, %amount, "reversal submitted");
            }
            Err(e) => {
                tracing::error!(checkout_request_id = %id, "reversal rejected by rail: {e}");
                self.store.record_reversal_rejected(id, from).await?;
                self.store
                    .create_failed_reconciliation(sambaza_store::FailedReconciliation {
                        checkout_request_id: id.clone(),
                        reason: format!("reversal submission rejected: {e}"),
                        original_amount: amount,
                    })
                    .await?;
            }
        }
        Ok(())
    }
}
