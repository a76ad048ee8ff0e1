//! # Initiation
//!
//! Validates a customer's top-up request, pushes the charge to the rail,
//! and persists the request/transaction pair under the rail-assigned
//! checkout id. Fully cancellable up to the moment the rail accepts the
//! push; after that a pending transaction exists and the callback decides
//! its fate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sambaza_core::{
    validate_topup_amount, Carrier, CheckoutRequestId, Fault, FaultKind, Msisdn,
};
use sambaza_store::NewTopupRequest;

use crate::error::EngineError;
use crate::Engine;

/// A top-up request as received from the portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiationRequest {
    /// The paying subscriber, any accepted phone shape.
    pub phone_number: String,
    /// Amount to charge and top up, KES.
    pub amount: Decimal,
    /// The subscriber to receive the airtime.
    pub recipient: String,
}

/// A push the rail accepted; the customer is looking at a PIN prompt.
#[derive(Debug, Clone, Serialize)]
pub struct InitiationAccepted {
    /// The canonical transaction key, for status polling.
    pub checkout_request_id: CheckoutRequestId,
    /// Text the rail suggests showing the customer.
    pub customer_message: Option<String>,
}

impl Engine {
    /// Validate, push, persist. Validation failures return before any
    /// side-effect; rail and store failures are logged to the error store
    /// before surfacing.
    pub async fn handle_initiation(
        &self,
        request: InitiationRequest,
    ) -> Result<InitiationAccepted, EngineError> {
        let payer = Msisdn::parse(&request.phone_number).map_err(EngineError::InvalidPayer)?;
        let amount = validate_topup_amount(request.amount)?;
        let destination =
            Msisdn::parse(&request.recipient).map_err(EngineError::InvalidRecipient)?;
        let carrier = Carrier::of(&destination);
        if !carrier.is_supported() {
            return Err(EngineError::UnsupportedCarrier(
                destination.national().to_string(),
            ));
        }

        let accepted = match self
            .rail
            .stk_push(&payer, amount, destination.national())
            .await
        {
            Ok(accepted) => accepted,
            Err(e) => {
                self.log_fault(Fault::new(
                    FaultKind::StkPushInitiationError,
                    serde_json::json!({
                        "payer": payer.national(),
                        "recipient": destination.national(),
                        "amount": amount,
                        "error": e.to_string(),
                    }),
                ))
                .await;
                return Err(EngineError::PushRejected(e));
            }
        };

        tracing::info!(
            checkout_request_id = %accepted.checkout_request_id,
            carrier = %carrier,
            %amount,
            "STK push accepted"
        );

        let snapshot = serde_json::to_value(&request).unwrap_or_default();
        self.store
            .create_request(NewTopupRequest {
                checkout_request_id: accepted.checkout_request_id.clone(),
                payer_msisdn: payer,
                destination_msisdn: destination,
                carrier,
                requested_amount: amount,
                payload_snapshot: snapshot,
            })
            .await?;

        Ok(InitiationAccepted {
            checkout_request_id: accepted.checkout_request_id,
            customer_message: accepted.customer_message,
        })
    }

    /// Log a fault, downgrading a failed write to a trace — the error log
    /// must never take the handler down with it.
    pub(crate) async fn log_fault(&self, fault: Fault) {
        if let Err(e) = self.store.log_fault(fault).await {
            tracing::error!("failed to write error record: {e}");
        }
    }
}
