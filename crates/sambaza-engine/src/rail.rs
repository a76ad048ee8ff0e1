//! # Payment Rail Seam
//!
//! The engine's view of the payment rail: one push, one reversal. The
//! production implementation is [`DarajaClient`]; tests substitute mocks.

use async_trait::async_trait;
use rust_decimal::Decimal;

use sambaza_core::{CheckoutRequestId, Msisdn};
use sambaza_daraja::{DarajaClient, DarajaError, ReversalAccepted, StkPushAccepted};

/// The two rail operations the lifecycle needs.
#[async_trait]
pub trait PaymentRail: Send + Sync {
    /// Ask the payer's phone to approve a charge.
    async fn stk_push(
        &self,
        payer: &Msisdn,
        amount: Decimal,
        account_reference: &str,
    ) -> Result<StkPushAccepted, DarajaError>;

    /// Refund a collected payment identified by its receipt.
    async fn reverse(
        &self,
        receipt: &str,
        amount: Decimal,
        checkout_id: &CheckoutRequestId,
    ) -> Result<ReversalAccepted, DarajaError>;
}

#[async_trait]
impl PaymentRail for DarajaClient {
    async fn stk_push(
        &self,
        payer: &Msisdn,
        amount: Decimal,
        account_reference: &str,
    ) -> Result<StkPushAccepted, DarajaError> {
        DarajaClient::stk_push(self, payer, amount, account_reference).await
    }

    async fn reverse(
        &self,
        receipt: &str,
        amount: Decimal,
        checkout_id: &CheckoutRequestId,
    ) -> Result<ReversalAccepted, DarajaError> {
        DarajaClient::reverse(self, receipt, amount, checkout_id).await
    }
}
