//! # Postgres Store
//!
//! sqlx-backed implementation of [`Store`]. All timestamps are assigned by
//! the database (`NOW()`); status transitions are single conditional
//! `UPDATE`s gated on the expected pre-state; float adjustments take a row
//! lock (`SELECT … FOR UPDATE`) inside a transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};

use sambaza_core::{
    BonusSettings, Carrier, CheckoutRequestId, Fault, Msisdn, PaymentReceipt, ProviderKind,
    TxStatus,
};

use crate::error::StoreError;
use crate::ledger::FloatAccount;
use crate::records::{
    BonusHistoryEntry, FailedReconciliation, NewSale, NewTopupRequest, PendingReversal,
    SaleRecord, TopupRequest, TransactionRecord,
};
use crate::Store;

/// Connect a pool with sane defaults for the gateway workload.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Postgres-backed [`Store`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the idempotent schema. Safe to run at every startup.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(include_str!("../migrations/schema.sql"))
            .execute(&self.pool)
            .await?;
        tracing::info!("store schema is current");
        Ok(())
    }

    /// One conditional transition. Returns whether the gate matched.
    async fn transition(
        &self,
        id: &CheckoutRequestId,
        from: TxStatus,
        to: TxStatus,
    ) -> Result<bool, StoreError> {
        if !from.can_transition_to(to) {
            return Err(StoreError::IllegalTransition { from, to });
        }
        let rows = sqlx::query(
            "UPDATE transactions
             SET status = $3, reconciliation_needed = $4, last_updated = NOW()
             WHERE checkout_request_id = $1 AND status = $2",
        )
        .bind(id.as_str())
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(to.needs_reconciliation())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows == 1)
    }
}

#[derive(FromRow)]
struct RequestRow {
    checkout_request_id: String,
    payer_msisdn: String,
    destination_msisdn: String,
    carrier: String,
    requested_amount: Decimal,
    payload_snapshot: serde_json::Value,
    initiated_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for TopupRequest {
    type Error = StoreError;

    fn try_from(row: RequestRow) -> Result<Self, StoreError> {
        Ok(TopupRequest {
            checkout_request_id: CheckoutRequestId::new(row.checkout_request_id),
            payer_msisdn: parse_msisdn(&row.payer_msisdn)?,
            destination_msisdn: parse_msisdn(&row.destination_msisdn)?,
            carrier: parse_carrier(&row.carrier)?,
            requested_amount: row.requested_amount,
            payload_snapshot: row.payload_snapshot,
            initiated_at: row.initiated_at,
        })
    }
}

#[derive(FromRow)]
struct TransactionRow {
    checkout_request_id: String,
    status: String,
    payment_receipt: Option<String>,
    amount_received: Option<Decimal>,
    fulfillment_status: Option<String>,
    provider_used: Option<String>,
    fallback_attempted: bool,
    reconciliation_needed: bool,
    last_updated: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for TransactionRecord {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, StoreError> {
        let status = TxStatus::parse(&row.status)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let provider_used = row
            .provider_used
            .as_deref()
            .map(|raw| {
                ProviderKind::parse(raw)
                    .ok_or_else(|| StoreError::Decode(format!("unknown provider {raw:?}")))
            })
            .transpose()?;
        Ok(TransactionRecord {
            checkout_request_id: CheckoutRequestId::new(row.checkout_request_id),
            status,
            payment_receipt: row.payment_receipt.map(PaymentReceipt::new),
            amount_received: row.amount_received,
            fulfillment_status: row.fulfillment_status,
            provider_used,
            fallback_attempted: row.fallback_attempted,
            reconciliation_needed: row.reconciliation_needed,
            last_updated: row.last_updated,
        })
    }
}

#[derive(FromRow)]
struct SaleRow {
    checkout_request_id: String,
    original_amount: Decimal,
    bonus: Decimal,
    dispatched_amount: Decimal,
    carrier: String,
    provider_used: Option<String>,
    dispatch_result: serde_json::Value,
    bonus_percentage: Decimal,
    completed_at: DateTime<Utc>,
}

impl TryFrom<SaleRow> for SaleRecord {
    type Error = StoreError;

    fn try_from(row: SaleRow) -> Result<Self, StoreError> {
        let provider_used = row
            .provider_used
            .as_deref()
            .map(|raw| {
                ProviderKind::parse(raw)
                    .ok_or_else(|| StoreError::Decode(format!("unknown provider {raw:?}")))
            })
            .transpose()?;
        Ok(SaleRecord {
            checkout_request_id: CheckoutRequestId::new(row.checkout_request_id),
            original_amount: row.original_amount,
            bonus: row.bonus,
            dispatched_amount: row.dispatched_amount,
            carrier: parse_carrier(&row.carrier)?,
            provider_used,
            dispatch_result: row.dispatch_result,
            bonus_percentage: row.bonus_percentage,
            completed_at: row.completed_at,
        })
    }
}

#[derive(FromRow)]
struct BonusHistoryRow {
    telco: String,
    old_pct: Decimal,
    new_pct: Decimal,
    actor: String,
    created_at: DateTime<Utc>,
}

fn parse_msisdn(raw: &str) -> Result<Msisdn, StoreError> {
    Msisdn::parse(raw).map_err(|e| StoreError::Decode(e.to_string()))
}

fn parse_carrier(raw: &str) -> Result<Carrier, StoreError> {
    // Carriers persist as their lowercase names.
    match raw {
        "safaricom" => Ok(Carrier::Safaricom),
        "airtel" => Ok(Carrier::Airtel),
        "telkom" => Ok(Carrier::Telkom),
        "equitel" => Ok(Carrier::Equitel),
        "faiba" => Ok(Carrier::Faiba),
        "unknown" => Ok(Carrier::Unknown),
        other => Err(StoreError::Decode(format!("unknown carrier {other:?}"))),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_request(&self, request: NewTopupRequest) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO topup_requests
             (checkout_request_id, payer_msisdn, destination_msisdn, carrier,
              requested_amount, payload_snapshot, initiated_at)
             VALUES ($1, $2, $3, $4, $5, $6, NOW())",
        )
        .bind(request.checkout_request_id.as_str())
        .bind(request.payer_msisdn.national())
        .bind(request.destination_msisdn.national())
        .bind(request.carrier.as_str())
        .bind(request.requested_amount)
        .bind(&request.payload_snapshot)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO transactions (checkout_request_id, status, last_updated)
             VALUES ($1, $2, NOW())",
        )
        .bind(request.checkout_request_id.as_str())
        .bind(TxStatus::PushInitiated.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_request(
        &self,
        id: &CheckoutRequestId,
    ) -> Result<Option<TopupRequest>, StoreError> {
        let row = sqlx::query_as::<_, RequestRow>(
            "SELECT checkout_request_id, payer_msisdn, destination_msisdn, carrier,
                    requested_amount, payload_snapshot, initiated_at
             FROM topup_requests WHERE checkout_request_id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn get_transaction(
        &self,
        id: &CheckoutRequestId,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT checkout_request_id, status, payment_receipt, amount_received,
                    fulfillment_status, provider_used, fallback_attempted,
                    reconciliation_needed, last_updated
             FROM transactions WHERE checkout_request_id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn record_payment_failed(&self, id: &CheckoutRequestId) -> Result<bool, StoreError> {
        self.transition(id, TxStatus::PushInitiated, TxStatus::MpesaPaymentFailed)
            .await
    }

    async fn record_payment_confirmed(
        &self,
        id: &CheckoutRequestId,
        receipt: &PaymentReceipt,
        amount: Decimal,
    ) -> Result<bool, StoreError> {
        let rows = sqlx::query(
            "UPDATE transactions
             SET status = $3, payment_receipt = $4, amount_received = $5,
                 last_updated = NOW()
             WHERE checkout_request_id = $1 AND status = $2",
        )
        .bind(id.as_str())
        .bind(TxStatus::PushInitiated.as_str())
        .bind(TxStatus::ReceivedPendingFulfillment.as_str())
        .bind(receipt.as_str())
        .bind(amount)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows == 1)
    }

    async fn begin_fulfillment(&self, id: &CheckoutRequestId) -> Result<bool, StoreError> {
        self.transition(
            id,
            TxStatus::ReceivedPendingFulfillment,
            TxStatus::FulfillmentInProgress,
        )
        .await
    }

    async fn complete_fulfillment(
        &self,
        id: &CheckoutRequestId,
        provider: ProviderKind,
        fallback_attempted: bool,
    ) -> Result<bool, StoreError> {
        let rows = sqlx::query(
            "UPDATE transactions
             SET status = $3, fulfillment_status = 'DELIVERED', provider_used = $4,
                 fallback_attempted = $5, last_updated = NOW()
             WHERE checkout_request_id = $1 AND status = $2",
        )
        .bind(id.as_str())
        .bind(TxStatus::FulfillmentInProgress.as_str())
        .bind(TxStatus::CompletedAndFulfilled.as_str())
        .bind(provider.as_str())
        .bind(fallback_attempted)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows == 1)
    }

    async fn fail_fulfillment(
        &self,
        id: &CheckoutRequestId,
        fallback_attempted: bool,
    ) -> Result<bool, StoreError> {
        let rows = sqlx::query(
            "UPDATE transactions
             SET status = $3, fulfillment_status = 'FAILED',
                 fallback_attempted = $4, last_updated = NOW()
             WHERE checkout_request_id = $1 AND status = $2",
        )
        .bind(id.as_str())
        .bind(TxStatus::FulfillmentInProgress.as_str())
        .bind(TxStatus::ReceivedFulfillmentFailed.as_str())
        .bind(fallback_attempted)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows == 1)
    }

    async fn record_reversal_submitted(
        &self,
        id: &CheckoutRequestId,
        from: TxStatus,
    ) -> Result<bool, StoreError> {
        self.transition(id, from, TxStatus::ReversalPendingConfirmation)
            .await
    }

    async fn record_reversal_rejected(
        &self,
        id: &CheckoutRequestId,
        from: TxStatus,
    ) -> Result<bool, StoreError> {
        self.transition(id, from, TxStatus::ReversalInitiationFailed)
            .await
    }

    async fn resolve_reversal(
        &self,
        id: &CheckoutRequestId,
        outcome: TxStatus,
    ) -> Result<bool, StoreError> {
        self.transition(id, TxStatus::ReversalPendingConfirmation, outcome)
            .await
    }

    async fn mark_critical(&self, id: &CheckoutRequestId) -> Result<bool, StoreError> {
        let rows = sqlx::query(
            "UPDATE transactions
             SET status = $2, reconciliation_needed = TRUE, last_updated = NOW()
             WHERE checkout_request_id = $1 AND status IN ($3, $4, $5)",
        )
        .bind(id.as_str())
        .bind(TxStatus::CriticalFulfillmentError.as_str())
        .bind(TxStatus::ReceivedPendingFulfillment.as_str())
        .bind(TxStatus::FulfillmentInProgress.as_str())
        .bind(TxStatus::ReceivedFulfillmentFailed.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows == 1)
    }

    async fn create_sale(&self, sale: NewSale) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sales
             (checkout_request_id, original_amount, bonus, dispatched_amount,
              carrier, provider_used, dispatch_result, bonus_percentage, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
             ON CONFLICT (checkout_request_id) DO NOTHING",
        )
        .bind(sale.checkout_request_id.as_str())
        .bind(sale.original_amount)
        .bind(sale.bonus)
        .bind(sale.dispatched_amount)
        .bind(sale.carrier.as_str())
        .bind(sale.provider_used.map(|p| p.as_str()))
        .bind(&sale.dispatch_result)
        .bind(sale.bonus_percentage)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_sale_result(
        &self,
        id: &CheckoutRequestId,
        provider: Option<ProviderKind>,
        dispatch_result: serde_json::Value,
    ) -> Result<bool, StoreError> {
        let rows = sqlx::query(
            "UPDATE sales
             SET provider_used = $2, dispatch_result = $3, completed_at = NOW()
             WHERE checkout_request_id = $1",
        )
        .bind(id.as_str())
        .bind(provider.map(|p| p.as_str()))
        .bind(&dispatch_result)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(rows == 1)
    }

    async fn get_sale(&self, id: &CheckoutRequestId) -> Result<Option<SaleRecord>, StoreError> {
        let row = sqlx::query_as::<_, SaleRow>(
            "SELECT checkout_request_id, original_amount, bonus, dispatched_amount,
                    carrier, provider_used, dispatch_result, bonus_percentage, completed_at
             FROM sales WHERE checkout_request_id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn log_fault(&self, fault: Fault) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO error_log (kind, sub_kind, checkout_request_id, context, created_at)
             VALUES ($1, $2, $3, $4, NOW())",
        )
        .bind(fault.kind.as_str())
        .bind(fault.sub_kind.map(|s| s.as_str()))
        .bind(fault.checkout_request_id.as_ref().map(|id| id.as_str().to_string()))
        .bind(&fault.context)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_pending_reversal(&self, entry: PendingReversal) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO reconciliations
             (kind, checkout_request_id, original_amount, payer_msisdn, detail, created_at)
             VALUES ('pending_reversal', $1, $2, $3, $4, NOW())",
        )
        .bind(entry.checkout_request_id.as_str())
        .bind(entry.original_amount)
        .bind(entry.payer_msisdn.national())
        .bind(&entry.reversal_request)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn create_failed_reconciliation(
        &self,
        entry: FailedReconciliation,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO reconciliations
             (kind, checkout_request_id, original_amount, reason, created_at)
             VALUES ('failed_reconciliation', $1, $2, $3, NOW())",
        )
        .bind(entry.checkout_request_id.as_str())
        .bind(entry.original_amount)
        .bind(&entry.reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_reversal_request(
        &self,
        originator_conversation_id: &str,
    ) -> Result<Option<CheckoutRequestId>, StoreError> {
        let id: Option<String> = sqlx::query_scalar(
            "SELECT checkout_request_id FROM reconciliations
             WHERE kind = 'pending_reversal'
               AND detail ->> 'originator_conversation_id' = $1
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(originator_conversation_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id.map(CheckoutRequestId::new))
    }

    async fn bonus_settings(&self) -> Result<BonusSettings, StoreError> {
        let row: Option<(Decimal, Decimal)> = sqlx::query_as(
            "SELECT safaricom_pct, africastalking_pct FROM bonus_settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        // Missing settings mean zero bonus, not an error.
        Ok(row
            .map(|(safaricom_pct, africastalking_pct)| BonusSettings {
                safaricom_pct,
                africastalking_pct,
            })
            .unwrap_or_default())
    }

    async fn update_bonus_settings(
        &self,
        settings: BonusSettings,
        actor: &str,
    ) -> Result<BonusSettings, StoreError> {
        let mut tx = self.pool.begin().await?;
        let old: (Decimal, Decimal) = sqlx::query_as(
            "SELECT safaricom_pct, africastalking_pct FROM bonus_settings
             WHERE id = 1 FOR UPDATE",
        )
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or((Decimal::ZERO, Decimal::ZERO));

        sqlx::query(
            "INSERT INTO bonus_settings (id, safaricom_pct, africastalking_pct, last_updated)
             VALUES (1, $1, $2, NOW())
             ON CONFLICT (id) DO UPDATE
             SET safaricom_pct = $1, africastalking_pct = $2, last_updated = NOW()",
        )
        .bind(settings.safaricom_pct)
        .bind(settings.africastalking_pct)
        .execute(&mut *tx)
        .await?;

        for (telco, old_pct, new_pct) in [
            ("safaricom", old.0, settings.safaricom_pct),
            ("africastalking", old.1, settings.africastalking_pct),
        ] {
            if old_pct != new_pct {
                sqlx::query(
                    "INSERT INTO bonus_history (telco, old_pct, new_pct, actor, created_at)
                     VALUES ($1, $2, $3, $4, NOW())",
                )
                .bind(telco)
                .bind(old_pct)
                .bind(new_pct)
                .bind(actor)
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        Ok(settings)
    }

    async fn bonus_history(&self, limit: i64) -> Result<Vec<BonusHistoryEntry>, StoreError> {
        let rows = sqlx::query_as::<_, BonusHistoryRow>(
            "SELECT telco, old_pct, new_pct, actor, created_at
             FROM bonus_history ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| BonusHistoryEntry {
                telco: row.telco,
                old_pct: row.old_pct,
                new_pct: row.new_pct,
                actor: row.actor,
                created_at: row.created_at,
            })
            .collect())
    }

    async fn service_pin(&self) -> Result<Option<String>, StoreError> {
        let pin: Option<String> =
            sqlx::query_scalar("SELECT service_pin FROM dealer_config WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(pin)
    }

    async fn adjust_float(
        &self,
        account: FloatAccount,
        delta: Decimal,
    ) -> Result<Decimal, StoreError> {
        let mut tx = self.pool.begin().await?;
        let current: Option<Decimal> = sqlx::query_scalar(
            "SELECT balance FROM float_balances WHERE name = $1 FOR UPDATE",
        )
        .bind(account.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let current = match current {
            Some(balance) => balance,
            None => {
                sqlx::query(
                    "INSERT INTO float_balances (name, balance, last_updated)
                     VALUES ($1, 0, NOW())",
                )
                .bind(account.as_str())
                .execute(&mut *tx)
                .await?;
                Decimal::ZERO
            }
        };

        let next = current + delta;
        if next < Decimal::ZERO {
            tx.rollback().await?;
            return Err(StoreError::InsufficientFloat {
                account,
                balance: current,
                delta,
            });
        }

        sqlx::query(
            "UPDATE float_balances SET balance = $2, last_updated = NOW() WHERE name = $1",
        )
        .bind(account.as_str())
        .bind(next)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(next)
    }

    async fn set_float(
        &self,
        account: FloatAccount,
        balance: Decimal,
    ) -> Result<Decimal, StoreError> {
        let mut tx = self.pool.begin().await?;
        let previous: Option<Decimal> = sqlx::query_scalar(
            "SELECT balance FROM float_balances WHERE name = $1 FOR UPDATE",
        )
        .bind(account.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO float_balances (name, balance, last_updated)
             VALUES ($1, $2, NOW())
             ON CONFLICT (name) DO UPDATE SET balance = $2, last_updated = NOW()",
        )
        .bind(account.as_str())
        .bind(balance)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(previous.unwrap_or(Decimal::ZERO))
    }

    async fn float_balance(&self, account: FloatAccount) -> Result<Decimal, StoreError> {
        let balance: Option<Decimal> =
            sqlx::query_scalar("SELECT balance FROM float_balances WHERE name = $1")
                .bind(account.as_str())
                .fetch_optional(&self.pool)
                .await?;
        Ok(balance.unwrap_or(Decimal::ZERO))
    }
}
