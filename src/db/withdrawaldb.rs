// db/withdrawaldb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::paymentmodels::{BankDetails, Withdrawal, WithdrawalStatus};

const WITHDRAWAL_COLUMNS: &str = r#"
    id,
    user_id,
    amount,
    currency,
    bank_name,
    account_number,
    account_name,
    bank_code,
    status,
    provider_reference,
    failure_reason,
    approved_by,
    created_at,
    approved_at,
    completed_at
"#;

#[async_trait]
pub trait WithdrawalExt {
    /// Reserves the amount and creates the `pending` row in one transaction.
    /// The wallet debit is guarded on `available_balance >= amount`, so two
    /// racing requests cannot jointly overdraw; returns `None` when the guard
    /// fails (insufficient available balance).
    async fn create_withdrawal(
        &self,
        user_id: Uuid,
        amount: i64,
        currency: &str,
        bank_details: &BankDetails,
    ) -> Result<Option<Withdrawal>, Error>;

    async fn get_withdrawal(&self, withdrawal_id: Uuid) -> Result<Option<Withdrawal>, Error>;

    /// Guarded `pending -> processing`; exactly one admin call wins. `None`
    /// means the row was not `pending` (or does not exist).
    async fn begin_processing(
        &self,
        withdrawal_id: Uuid,
        admin_id: Uuid,
    ) -> Result<Option<Withdrawal>, Error>;

    /// `processing -> completed` after a successful provider transfer.
    async fn complete_withdrawal(
        &self,
        withdrawal_id: Uuid,
        provider_reference: &str,
    ) -> Result<Withdrawal, Error>;

    /// `processing -> failed` AND the compensating wallet credit, in one
    /// transaction — a failed payout can never leave the reserve debited.
    async fn fail_withdrawal_and_refund(
        &self,
        withdrawal_id: Uuid,
        reason: &str,
    ) -> Result<Withdrawal, Error>;

    async fn withdrawals_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Withdrawal>, Error>;

    async fn list_withdrawals(
        &self,
        status: Option<WithdrawalStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Withdrawal>, Error>;
}

#[async_trait]
impl WithdrawalExt for DBClient {
    async fn create_withdrawal(
        &self,
        user_id: Uuid,
        amount: i64,
        currency: &str,
        bank_details: &BankDetails,
    ) -> Result<Option<Withdrawal>, Error> {
        let mut tx = self.pool.begin().await?;

        let debited = sqlx::query(
            r#"
            UPDATE wallets
            SET available_balance = available_balance - $2,
                balance = balance - $2,
                updated_at = NOW()
            WHERE user_id = $1 AND available_balance >= $2
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        if debited.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let withdrawal = sqlx::query_as::<_, Withdrawal>(&format!(
            r#"
            INSERT INTO withdrawals
            (user_id, amount, currency, bank_name, account_number, account_name, bank_code)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {WITHDRAWAL_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(amount)
        .bind(currency)
        .bind(&bank_details.bank_name)
        .bind(&bank_details.account_number)
        .bind(&bank_details.account_name)
        .bind(&bank_details.bank_code)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(withdrawal))
    }

    async fn get_withdrawal(&self, withdrawal_id: Uuid) -> Result<Option<Withdrawal>, Error> {
        sqlx::query_as::<_, Withdrawal>(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE id = $1"
        ))
        .bind(withdrawal_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn begin_processing(
        &self,
        withdrawal_id: Uuid,
        admin_id: Uuid,
    ) -> Result<Option<Withdrawal>, Error> {
        sqlx::query_as::<_, Withdrawal>(&format!(
            r#"
            UPDATE withdrawals
            SET status = 'processing',
                approved_by = $2,
                approved_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {WITHDRAWAL_COLUMNS}
            "#
        ))
        .bind(withdrawal_id)
        .bind(admin_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn complete_withdrawal(
        &self,
        withdrawal_id: Uuid,
        provider_reference: &str,
    ) -> Result<Withdrawal, Error> {
        sqlx::query_as::<_, Withdrawal>(&format!(
            r#"
            UPDATE withdrawals
            SET status = 'completed',
                provider_reference = $2,
                completed_at = NOW()
            WHERE id = $1 AND status = 'processing'
            RETURNING {WITHDRAWAL_COLUMNS}
            "#
        ))
        .bind(withdrawal_id)
        .bind(provider_reference)
        .fetch_one(&self.pool)
        .await
    }

    async fn fail_withdrawal_and_refund(
        &self,
        withdrawal_id: Uuid,
        reason: &str,
    ) -> Result<Withdrawal, Error> {
        let mut tx = self.pool.begin().await?;

        let withdrawal = sqlx::query_as::<_, Withdrawal>(&format!(
            r#"
            UPDATE withdrawals
            SET status = 'failed',
                failure_reason = $2
            WHERE id = $1 AND status = 'processing'
            RETURNING {WITHDRAWAL_COLUMNS}
            "#
        ))
        .bind(withdrawal_id)
        .bind(reason)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE wallets
            SET available_balance = available_balance + $2,
                balance = balance + $2,
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(withdrawal.user_id)
        .bind(withdrawal.amount)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(withdrawal)
    }

    async fn withdrawals_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Withdrawal>, Error> {
        sqlx::query_as::<_, Withdrawal>(&format!(
            r#"
            SELECT {WITHDRAWAL_COLUMNS}
            FROM withdrawals
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn list_withdrawals(
        &self,
        status: Option<WithdrawalStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Withdrawal>, Error> {
        sqlx::query_as::<_, Withdrawal>(&format!(
            r#"
            SELECT {WITHDRAWAL_COLUMNS}
            FROM withdrawals
            WHERE ($1::withdrawal_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }
}
