//! # Lifecycle Scenarios
//!
//! End-to-end engine behavior against the in-memory store and stub
//! providers: happy paths, fallback, reversal walks, duplicate
//! deliveries, and the float invariants that must hold through all of
//! them.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use sambaza_airtime::{AirtimeDispatch, AirtimeError, DispatchReceipt};
use sambaza_core::{
    BonusSettings, Carrier, CheckoutRequestId, FaultKind, Msisdn, ProviderKind, TxStatus,
};
use sambaza_daraja::{DarajaError, ReversalAccepted, ReversalOutcome, StkCallback, StkPushAccepted};
use sambaza_engine::{Engine, EngineError, InitiationRequest, PaymentRail};
use sambaza_store::{FloatAccount, MemStore, Store};

// -- Stub collaborators -------------------------------------------------------

struct StubRail {
    next_checkout_id: Mutex<String>,
    reverse_ok: bool,
    reversals: Mutex<Vec<(String, Decimal, String)>>,
}

impl StubRail {
    fn accepting(id: &str) -> Self {
        Self {
            next_checkout_id: Mutex::new(id.to_string()),
            reverse_ok: true,
            reversals: Mutex::new(Vec::new()),
        }
    }

    fn rejecting_reversals(id: &str) -> Self {
        Self {
            reverse_ok: false,
            ..Self::accepting(id)
        }
    }
}

#[async_trait]
impl PaymentRail for StubRail {
    async fn stk_push(
        &self,
        _payer: &Msisdn,
        _amount: Decimal,
        _account_reference: &str,
    ) -> Result<StkPushAccepted, DarajaError> {
        Ok(StkPushAccepted {
            checkout_request_id: CheckoutRequestId::new(self.next_checkout_id.lock().clone()),
            merchant_request_id: Some("29115-1".into()),
            customer_message: Some("Enter your PIN".into()),
        })
    }

    async fn reverse(
        &self,
        receipt: &str,
        amount: Decimal,
        checkout_id: &CheckoutRequestId,
    ) -> Result<ReversalAccepted, DarajaError> {
        self.reversals
            .lock()
            .push((receipt.to_string(), amount, checkout_id.as_str().to_string()));
        if self.reverse_ok {
            Ok(ReversalAccepted {
                originator_conversation_id: format!("OC-{checkout_id}"),
                conversation_id: Some("AG_1".into()),
                request_snapshot: json!({"TransactionID": receipt}),
            })
        } else {
            Err(DarajaError::Rejected {
                code: "401.002.01".into(),
                description: "Invalid initiator".into(),
            })
        }
    }
}

struct StubDispatch {
    kind: ProviderKind,
    outcomes: Mutex<VecDeque<Result<DispatchReceipt, ()>>>,
    calls: Mutex<Vec<(String, Decimal)>>,
}

impl StubDispatch {
    fn new(kind: ProviderKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            outcomes: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn push_success(&self, receipt: DispatchReceipt) {
        self.outcomes.lock().push_back(Ok(receipt));
    }

    fn push_failure(&self) {
        self.outcomes.lock().push_back(Err(()));
    }

    fn calls(&self) -> Vec<(String, Decimal)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AirtimeDispatch for StubDispatch {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn dispatch(
        &self,
        destination: &Msisdn,
        amount: Decimal,
        _carrier: Carrier,
    ) -> Result<DispatchReceipt, AirtimeError> {
        self.calls
            .lock()
            .push((destination.national().to_string(), amount));
        match self.outcomes.lock().pop_front() {
            Some(Ok(receipt)) => Ok(receipt),
            Some(Err(())) | None => Err(AirtimeError::Refused {
                provider: self.kind,
                detail: json!({"responseStatus": "500"}),
            }),
        }
    }
}

fn dealer_receipt(balance: Option<Decimal>) -> DispatchReceipt {
    DispatchReceipt {
        provider: ProviderKind::DealerDirect,
        provider_ref: Some("R250101.0001.000001".into()),
        reported_balance: balance,
        raw: json!({"responseStatus": "200",
            "responseDesc": "R250101.0001.000001 New balance is Ksh. 4900.00"}),
    }
}

fn aggregator_receipt() -> DispatchReceipt {
    DispatchReceipt {
        provider: ProviderKind::Aggregator,
        provider_ref: Some("ATQid_1f2e".into()),
        reported_balance: None,
        raw: json!({"responses": [{"status": "Sent", "errorMessage": "None"}]}),
    }
}

struct Harness {
    engine: Engine,
    store: Arc<MemStore>,
    rail: Arc<StubRail>,
    dealer: Arc<StubDispatch>,
    aggregator: Arc<StubDispatch>,
}

fn harness(rail: StubRail) -> Harness {
    let store = Arc::new(MemStore::new());
    let rail = Arc::new(rail);
    let dealer = StubDispatch::new(ProviderKind::DealerDirect);
    let aggregator = StubDispatch::new(ProviderKind::Aggregator);
    let engine = Engine::new(
        store.clone() as Arc<dyn Store>,
        rail.clone() as Arc<dyn PaymentRail>,
        dealer.clone() as Arc<dyn AirtimeDispatch>,
        aggregator.clone() as Arc<dyn AirtimeDispatch>,
        None,
    );
    Harness {
        engine,
        store,
        rail,
        dealer,
        aggregator,
    }
}

async fn seed_floats(store: &MemStore, safaricom: Decimal, aggregator: Decimal) {
    store
        .adjust_float(FloatAccount::SafaricomDealer, safaricom)
        .await
        .unwrap();
    store
        .adjust_float(FloatAccount::Africastalking, aggregator)
        .await
        .unwrap();
}

async fn seed_bonuses(store: &MemStore, safaricom: Decimal, aggregator: Decimal) {
    store
        .update_bonus_settings(
            BonusSettings {
                safaricom_pct: safaricom,
                africastalking_pct: aggregator,
            },
            "tests",
        )
        .await
        .unwrap();
}

fn initiation(recipient: &str, amount: Decimal) -> InitiationRequest {
    InitiationRequest {
        phone_number: "254700000001".into(),
        amount,
        recipient: recipient.into(),
    }
}

fn payment_callback(id: &str, result_code: i64, amount: Decimal, receipt: &str) -> StkCallback {
    let payload = if result_code == 0 {
        json!({"Body": {"stkCallback": {
            "MerchantRequestID": "29115-1",
            "CheckoutRequestID": id,
            "ResultCode": result_code,
            "ResultDesc": "Processed",
            "CallbackMetadata": {"Item": [
                {"Name": "Amount", "Value": amount},
                {"Name": "MpesaReceiptNumber", "Value": receipt},
                {"Name": "PhoneNumber", "Value": 254700000001i64}
            ]}
        }}})
    } else {
        json!({"Body": {"stkCallback": {
            "CheckoutRequestID": id,
            "ResultCode": result_code,
            "ResultDesc": "Request cancelled by user"
        }}})
    };
    StkCallback::from_json(&payload).unwrap()
}

fn reversal_result(originator: &str, code: i64) -> ReversalOutcome {
    ReversalOutcome::from_json(&json!({"Result": {
        "ResultCode": code,
        "ResultDesc": if code == 0 { "Processed" } else { "Failed" },
        "OriginatorConversationID": originator,
        "ConversationID": "AG_1",
        "TransactionID": "QKR91H3X"
    }}))
    .unwrap()
}

// -- Scenarios ----------------------------------------------------------------

#[tokio::test]
async fn home_telco_happy_path() {
    let h = harness(StubRail::accepting("ws_CO_1"));
    seed_floats(&h.store, dec!(5002), dec!(0)).await;
    seed_bonuses(&h.store, dec!(2), dec!(0)).await;
    h.dealer.push_success(dealer_receipt(Some(dec!(4900.00))));

    let accepted = h
        .engine
        .handle_initiation(initiation("0712345678", dec!(100)))
        .await
        .unwrap();
    assert_eq!(accepted.checkout_request_id.as_str(), "ws_CO_1");

    h.engine
        .handle_payment_callback(payment_callback("ws_CO_1", 0, dec!(100), "QK123"))
        .await
        .unwrap();

    let id = CheckoutRequestId::new("ws_CO_1");
    let record = h.store.get_transaction(&id).await.unwrap().unwrap();
    assert_eq!(record.status, TxStatus::CompletedAndFulfilled);
    assert_eq!(record.provider_used, Some(ProviderKind::DealerDirect));
    assert!(!record.fallback_attempted);

    let sale = h.store.get_sale(&id).await.unwrap().unwrap();
    assert_eq!(sale.bonus, dec!(2.00));
    assert_eq!(sale.dispatched_amount, dec!(102.00));

    // The dealer reported 4900.00; that value wins over the local ledger.
    assert_eq!(
        h.store
            .float_balance(FloatAccount::SafaricomDealer)
            .await
            .unwrap(),
        dec!(4900.00)
    );
    assert_eq!(h.dealer.calls(), vec![("0712345678".to_string(), dec!(102.00))]);
    assert!(h.rail.reversals.lock().is_empty());
}

#[tokio::test]
async fn home_telco_falls_back_to_aggregator() {
    let h = harness(StubRail::accepting("ws_CO_2"));
    seed_floats(&h.store, dec!(5000), dec!(1000)).await;
    seed_bonuses(&h.store, dec!(2), dec!(0)).await;
    h.dealer.push_failure();
    h.aggregator.push_success(aggregator_receipt());

    h.engine
        .handle_initiation(initiation("0712345678", dec!(100)))
        .await
        .unwrap();
    h.engine
        .handle_payment_callback(payment_callback("ws_CO_2", 0, dec!(100), "QK124"))
        .await
        .unwrap();

    let id = CheckoutRequestId::new("ws_CO_2");
    let record = h.store.get_transaction(&id).await.unwrap().unwrap();
    assert_eq!(record.status, TxStatus::CompletedAndFulfilled);
    assert_eq!(record.provider_used, Some(ProviderKind::AggregatorFallback));
    assert!(record.fallback_attempted);

    // Home float untouched after the credit-back.
    assert_eq!(
        h.store
            .float_balance(FloatAccount::SafaricomDealer)
            .await
            .unwrap(),
        dec!(5000)
    );
    // Aggregator float: -dispatched + 4% commission = 1000 - 102 + 4.
    assert_eq!(
        h.store
            .float_balance(FloatAccount::Africastalking)
            .await
            .unwrap(),
        dec!(902.00)
    );
}

#[tokio::test]
async fn non_home_carrier_uses_aggregator_only() {
    let h = harness(StubRail::accepting("ws_CO_3"));
    seed_floats(&h.store, dec!(5000), dec!(1000)).await;
    seed_bonuses(&h.store, dec!(0), dec!(2.5)).await;
    h.aggregator.push_success(aggregator_receipt());

    h.engine
        .handle_initiation(initiation("0733000000", dec!(100)))
        .await
        .unwrap();
    h.engine
        .handle_payment_callback(payment_callback("ws_CO_3", 0, dec!(100), "QK125"))
        .await
        .unwrap();

    let id = CheckoutRequestId::new("ws_CO_3");
    let record = h.store.get_transaction(&id).await.unwrap().unwrap();
    assert_eq!(record.status, TxStatus::CompletedAndFulfilled);
    assert_eq!(record.provider_used, Some(ProviderKind::Aggregator));

    // Bonus 100 × 2.5% = 2.50, rounded half-up to 3.
    let sale = h.store.get_sale(&id).await.unwrap().unwrap();
    assert_eq!(sale.bonus, dec!(3));
    assert_eq!(sale.dispatched_amount, dec!(103));

    assert!(h.dealer.calls().is_empty());
    assert_eq!(
        h.store
            .float_balance(FloatAccount::Africastalking)
            .await
            .unwrap(),
        dec!(1000) - dec!(103) + dec!(4.00)
    );
}

#[tokio::test]
async fn full_dispatch_failure_walks_the_reversal_path() {
    let h = harness(StubRail::accepting("ws_CO_4"));
    seed_floats(&h.store, dec!(5000), dec!(1000)).await;
    h.dealer.push_failure();
    h.aggregator.push_failure();

    h.engine
        .handle_initiation(initiation("0712345678", dec!(100)))
        .await
        .unwrap();
    h.engine
        .handle_payment_callback(payment_callback("ws_CO_4", 0, dec!(100), "QK126"))
        .await
        .unwrap();

    let id = CheckoutRequestId::new("ws_CO_4");
    let record = h.store.get_transaction(&id).await.unwrap().unwrap();
    assert_eq!(record.status, TxStatus::ReversalPendingConfirmation);
    assert!(record.fallback_attempted);

    // Net float change is zero after both credit-backs.
    assert_eq!(
        h.store
            .float_balance(FloatAccount::SafaricomDealer)
            .await
            .unwrap(),
        dec!(5000)
    );
    assert_eq!(
        h.store
            .float_balance(FloatAccount::Africastalking)
            .await
            .unwrap(),
        dec!(1000)
    );

    // The reversal targeted the receipt for the collected amount.
    let reversals = h.rail.reversals.lock().clone();
    assert_eq!(reversals, vec![("QK126".to_string(), dec!(100), "ws_CO_4".to_string())]);

    // The sale record exists with the outcome showing no provider
    // delivered.
    let sale = h.store.get_sale(&id).await.unwrap().unwrap();
    assert_eq!(sale.provider_used, None);
    assert_eq!(sale.original_amount, dec!(100));

    // The result callback closes the loop.
    h.engine
        .handle_reversal_result(reversal_result("OC-ws_CO_4", 0))
        .await
        .unwrap();
    let record = h.store.get_transaction(&id).await.unwrap().unwrap();
    assert_eq!(record.status, TxStatus::ReversedSuccessfully);
}

#[tokio::test]
async fn rejected_reversal_parks_for_reconciliation() {
    let h = harness(StubRail::rejecting_reversals("ws_CO_5"));
    seed_floats(&h.store, dec!(5000), dec!(1000)).await;
    h.dealer.push_failure();
    h.aggregator.push_failure();

    h.engine
        .handle_initiation(initiation("0712345678", dec!(100)))
        .await
        .unwrap();
    h.engine
        .handle_payment_callback(payment_callback("ws_CO_5", 0, dec!(100), "QK127"))
        .await
        .unwrap();

    let id = CheckoutRequestId::new("ws_CO_5");
    let record = h.store.get_transaction(&id).await.unwrap().unwrap();
    assert_eq!(record.status, TxStatus::ReversalInitiationFailed);
    assert!(record.reconciliation_needed);
    assert!(h
        .store
        .reconciliations()
        .iter()
        .any(|entry| entry.kind == "failed_reconciliation"
            && entry.checkout_request_id == id));
}

#[tokio::test]
async fn amount_out_of_range_fails_initiation_without_a_record() {
    let h = harness(StubRail::accepting("ws_CO_6"));

    let err = h
        .engine
        .handle_initiation(initiation("0712345678", dec!(3)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Amount(_)));
    assert!(err.is_client_error());

    // Nothing was pushed, nothing was stored.
    let id = CheckoutRequestId::new("ws_CO_6");
    assert!(h.store.get_request(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn boundary_amounts_are_accepted() {
    for (amount, id) in [(dec!(5), "ws_CO_5a"), (dec!(5000), "ws_CO_5b")] {
        let h = harness(StubRail::accepting(id));
        let accepted = h
            .engine
            .handle_initiation(initiation("0712345678", amount))
            .await
            .unwrap();
        assert_eq!(accepted.checkout_request_id.as_str(), id);
    }
}

#[tokio::test]
async fn unsupported_carrier_fails_initiation() {
    let h = harness(StubRail::accepting("ws_CO_7"));
    let err = h
        .engine
        .handle_initiation(initiation("0666123456", dec!(100)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnsupportedCarrier(_)));
}

#[tokio::test]
async fn cancelled_payment_is_terminal_with_no_float_movement() {
    let h = harness(StubRail::accepting("ws_CO_8"));
    seed_floats(&h.store, dec!(5000), dec!(1000)).await;

    h.engine
        .handle_initiation(initiation("0712345678", dec!(100)))
        .await
        .unwrap();
    h.engine
        .handle_payment_callback(payment_callback("ws_CO_8", 1032, dec!(0), ""))
        .await
        .unwrap();

    let id = CheckoutRequestId::new("ws_CO_8");
    let record = h.store.get_transaction(&id).await.unwrap().unwrap();
    assert_eq!(record.status, TxStatus::MpesaPaymentFailed);
    assert!(h.store.get_sale(&id).await.unwrap().is_none());
    assert_eq!(
        h.store
            .float_balance(FloatAccount::SafaricomDealer)
            .await
            .unwrap(),
        dec!(5000)
    );
    assert!(h
        .store
        .faults()
        .iter()
        .any(|fault| fault.kind == FaultKind::StkPaymentError));
}

#[tokio::test]
async fn duplicate_success_callback_moves_float_and_sale_exactly_once() {
    let h = harness(StubRail::accepting("ws_CO_9"));
    seed_floats(&h.store, dec!(5000), dec!(0)).await;
    h.dealer.push_success(dealer_receipt(None));

    h.engine
        .handle_initiation(initiation("0712345678", dec!(100)))
        .await
        .unwrap();

    let callback = payment_callback("ws_CO_9", 0, dec!(100), "QK128");
    h.engine
        .handle_payment_callback(callback.clone())
        .await
        .unwrap();
    h.engine.handle_payment_callback(callback).await.unwrap();

    let id = CheckoutRequestId::new("ws_CO_9");
    let record = h.store.get_transaction(&id).await.unwrap().unwrap();
    assert_eq!(record.status, TxStatus::CompletedAndFulfilled);

    // Exactly one dispatch, exactly one float movement (no bonus settings
    // seeded, so dispatched == 100).
    assert_eq!(h.dealer.calls().len(), 1);
    assert_eq!(
        h.store
            .float_balance(FloatAccount::SafaricomDealer)
            .await
            .unwrap(),
        dec!(4900)
    );
    assert!(h.store.get_sale(&id).await.unwrap().is_some());
}

#[tokio::test]
async fn collected_amount_outside_range_reverses_without_dispatch() {
    let h = harness(StubRail::accepting("ws_CO_10"));
    seed_floats(&h.store, dec!(10000), dec!(0)).await;

    h.engine
        .handle_initiation(initiation("0712345678", dec!(5000)))
        .await
        .unwrap();
    // The rail reports more collected than the gateway accepts.
    h.engine
        .handle_payment_callback(payment_callback("ws_CO_10", 0, dec!(5001), "QK129"))
        .await
        .unwrap();

    let id = CheckoutRequestId::new("ws_CO_10");
    let record = h.store.get_transaction(&id).await.unwrap().unwrap();
    assert_eq!(record.status, TxStatus::ReversalPendingConfirmation);
    assert!(h.dealer.calls().is_empty());

    // The sale scaffold exists with no bonus and no provider.
    let sale = h.store.get_sale(&id).await.unwrap().unwrap();
    assert_eq!(sale.bonus, rust_decimal::Decimal::ZERO);
    assert_eq!(sale.dispatched_amount, dec!(5001));
    assert_eq!(sale.provider_used, None);
    assert_eq!(
        h.store
            .float_balance(FloatAccount::SafaricomDealer)
            .await
            .unwrap(),
        dec!(10000)
    );
    assert!(h
        .store
        .faults()
        .iter()
        .any(|fault| fault.sub_kind == Some(sambaza_core::FaultSubKind::InvalidAmountRange)));
}

#[tokio::test]
async fn insufficient_float_reverses_instead_of_dispatching() {
    let h = harness(StubRail::accepting("ws_CO_11"));
    seed_floats(&h.store, dec!(50), dec!(0)).await;

    h.engine
        .handle_initiation(initiation("0712345678", dec!(100)))
        .await
        .unwrap();
    h.engine
        .handle_payment_callback(payment_callback("ws_CO_11", 0, dec!(100), "QK130"))
        .await
        .unwrap();

    let id = CheckoutRequestId::new("ws_CO_11");
    let record = h.store.get_transaction(&id).await.unwrap().unwrap();
    assert_eq!(record.status, TxStatus::ReversalPendingConfirmation);
    assert!(h.dealer.calls().is_empty());
    assert_eq!(
        h.store
            .float_balance(FloatAccount::SafaricomDealer)
            .await
            .unwrap(),
        dec!(50)
    );
}

#[tokio::test]
async fn failed_reversal_confirmation_needs_reconciliation() {
    let h = harness(StubRail::accepting("ws_CO_12"));
    seed_floats(&h.store, dec!(5000), dec!(1000)).await;
    h.dealer.push_failure();
    h.aggregator.push_failure();

    h.engine
        .handle_initiation(initiation("0712345678", dec!(100)))
        .await
        .unwrap();
    h.engine
        .handle_payment_callback(payment_callback("ws_CO_12", 0, dec!(100), "QK131"))
        .await
        .unwrap();
    h.engine
        .handle_reversal_result(reversal_result("OC-ws_CO_12", 1))
        .await
        .unwrap();

    let id = CheckoutRequestId::new("ws_CO_12");
    let record = h.store.get_transaction(&id).await.unwrap().unwrap();
    assert_eq!(record.status, TxStatus::ReversalFailedConfirmation);
    assert!(record.reconciliation_needed);
}

#[tokio::test]
async fn reversal_timeout_needs_reconciliation() {
    let h = harness(StubRail::accepting("ws_CO_13"));
    seed_floats(&h.store, dec!(5000), dec!(1000)).await;
    h.dealer.push_failure();
    h.aggregator.push_failure();

    h.engine
        .handle_initiation(initiation("0712345678", dec!(100)))
        .await
        .unwrap();
    h.engine
        .handle_payment_callback(payment_callback("ws_CO_13", 0, dec!(100), "QK132"))
        .await
        .unwrap();

    let timeout = ReversalOutcome::from_json(&json!({"Result": {
        "ResultDesc": "Request timed out",
        "OriginatorConversationID": "OC-ws_CO_13"
    }}))
    .unwrap();
    h.engine.handle_reversal_timeout(timeout).await.unwrap();

    let id = CheckoutRequestId::new("ws_CO_13");
    let record = h.store.get_transaction(&id).await.unwrap().unwrap();
    assert_eq!(record.status, TxStatus::ReversalTimedOut);
    assert!(record.reconciliation_needed);
}

#[tokio::test]
async fn duplicate_reversal_result_is_absorbed() {
    let h = harness(StubRail::accepting("ws_CO_14"));
    seed_floats(&h.store, dec!(5000), dec!(1000)).await;
    h.dealer.push_failure();
    h.aggregator.push_failure();

    h.engine
        .handle_initiation(initiation("0712345678", dec!(100)))
        .await
        .unwrap();
    h.engine
        .handle_payment_callback(payment_callback("ws_CO_14", 0, dec!(100), "QK133"))
        .await
        .unwrap();

    h.engine
        .handle_reversal_result(reversal_result("OC-ws_CO_14", 0))
        .await
        .unwrap();
    h.engine
        .handle_reversal_result(reversal_result("OC-ws_CO_14", 1))
        .await
        .unwrap();

    // First verdict wins; the late contradictory delivery changes nothing.
    let id = CheckoutRequestId::new("ws_CO_14");
    let record = h.store.get_transaction(&id).await.unwrap().unwrap();
    assert_eq!(record.status, TxStatus::ReversedSuccessfully);
}

#[tokio::test]
async fn unknown_callback_id_is_logged_and_acked() {
    let h = harness(StubRail::accepting("ws_CO_15"));
    h.engine
        .handle_payment_callback(payment_callback("ws_CO_nope", 0, dec!(100), "QK134"))
        .await
        .unwrap();
    assert!(h
        .store
        .faults()
        .iter()
        .any(|fault| fault.kind == FaultKind::StkCallbackError));
}

#[tokio::test]
async fn status_view_reflects_the_lifecycle() {
    let h = harness(StubRail::accepting("ws_CO_16"));
    seed_floats(&h.store, dec!(5000), dec!(0)).await;
    seed_bonuses(&h.store, dec!(2), dec!(0)).await;
    h.dealer.push_success(dealer_receipt(Some(dec!(4898.00))));

    h.engine
        .handle_initiation(initiation("0712345678", dec!(100)))
        .await
        .unwrap();

    let id = CheckoutRequestId::new("ws_CO_16");
    let view = h.engine.transaction_status(&id).await.unwrap();
    assert_eq!(view.status, TxStatus::PushInitiated);
    assert_eq!(view.amount, dec!(100));
    assert_eq!(view.recipient, "0712345678");
    assert!(view.completed_at.is_none());

    h.engine
        .handle_payment_callback(payment_callback("ws_CO_16", 0, dec!(100), "QK135"))
        .await
        .unwrap();

    let view = h.engine.transaction_status(&id).await.unwrap();
    assert_eq!(view.status, TxStatus::CompletedAndFulfilled);
    assert_eq!(view.dispatched_amount, Some(dec!(102.00)));
    assert_eq!(view.provider_used.as_deref(), Some("dealer-direct"));
    assert!(view.completed_at.is_some());
}
