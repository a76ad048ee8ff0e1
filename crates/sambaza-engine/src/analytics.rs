//! # Analytics Notification
//!
//! Best-effort, fire-and-forget. The analytics service keeps its own
//! aggregates; the core's correctness never depends on these calls
//! landing. Failures are recorded under their own fault kind and
//! otherwise ignored.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use url::Url;

use sambaza_core::{CheckoutRequestId, Fault, FaultKind, ProviderKind};
use sambaza_store::TopupRequest;

use crate::Engine;

/// HTTP notifier for the external analytics service.
#[derive(Debug, Clone)]
pub struct AnalyticsNotifier {
    http: reqwest::Client,
    url: Url,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase", tag = "event")]
enum AnalyticsEvent<'a> {
    #[serde(rename_all = "camelCase")]
    SaleCompleted {
        checkout_request_id: &'a str,
        carrier: &'a str,
        amount: Decimal,
        dispatched_amount: Decimal,
        provider: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    PaymentReversed { checkout_request_id: &'a str },
}

impl AnalyticsNotifier {
    /// Build a notifier posting to `url`.
    pub fn new(url: Url) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, url })
    }

    async fn post(&self, event: &AnalyticsEvent<'_>) -> Result<(), reqwest::Error> {
        self.http
            .post(self.url.clone())
            .json(event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

impl Engine {
    /// Tell analytics a sale completed. Spawned; never awaited by the
    /// lifecycle.
    pub(crate) fn notify_sale_completed(
        &self,
        request: &TopupRequest,
        amount: Decimal,
        dispatched: Decimal,
        provider: ProviderKind,
    ) {
        let Some(notifier) = self.analytics.clone() else {
            return;
        };
        let store = Arc::clone(&self.store);
        let id = request.checkout_request_id.clone();
        let carrier = request.carrier.as_str().to_string();
        tokio::spawn(async move {
            let event = AnalyticsEvent::SaleCompleted {
                checkout_request_id: id.as_str(),
                carrier: &carrier,
                amount,
                dispatched_amount: dispatched,
                provider: provider.as_str(),
            };
            if let Err(e) = notifier.post(&event).await {
                tracing::warn!(checkout_request_id = %id, "analytics notification failed: {e}");
                let _ = store
                    .log_fault(
                        Fault::new(
                            FaultKind::AnalyticsNotificationError,
                            serde_json::json!({"event": "sale_completed", "error": e.to_string()}),
                        )
                        .for_request(id),
                    )
                    .await;
            }
        });
    }

    /// Tell analytics a payment was reversed. Spawned; never awaited.
    pub(crate) fn notify_payment_reversed(&self, id: &CheckoutRequestId) {
        let Some(notifier) = self.analytics.clone() else {
            return;
        };
        let store = Arc::clone(&self.store);
        let id = id.clone();
        tokio::spawn(async move {
            let event = AnalyticsEvent::PaymentReversed {
                checkout_request_id: id.as_str(),
            };
            if let Err(e) = notifier.post(&event).await {
                tracing::warn!(checkout_request_id = %id, "analytics notification failed: {e}");
                let _ = store
                    .log_fault(
                        Fault::new(
                            FaultKind::AnalyticsNotificationError,
                            serde_json::json!({"event": "payment_reversed", "error": e.to_string()}),
                        )
                        .for_request(id),
                    )
                    .await;
            }
        });
    }
}
