// db/paymentdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::paymentmodels::{Payment, PaymentStatus, PaymentType, Wallet};

const PAYMENT_COLUMNS: &str = r#"
    id,
    payer_id,
    payee_id,
    project_id,
    job_id,
    amount,
    currency,
    payment_type,
    status,
    escrow_status,
    reference,
    provider_reference,
    description,
    created_at,
    paid_at,
    released_at,
    refunded_at
"#;

const WALLET_COLUMNS: &str = r#"
    id,
    user_id,
    balance,
    available_balance,
    escrow_balance,
    currency,
    is_verified,
    bank_name,
    account_number,
    account_name,
    bank_code,
    created_at,
    updated_at
"#;

#[derive(Debug)]
pub struct NewPayment {
    pub payer_id: Uuid,
    pub payee_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub amount: i64,
    pub payment_type: PaymentType,
    pub reference: String,
    pub description: String,
}

/// Outcome of the guarded `pending -> completed` settlement transaction.
#[derive(Debug)]
pub enum SettleOutcome {
    /// This call won the transition; wallet side effects were applied with it.
    Applied(Payment),
    /// The payment had already left `pending` (concurrent verify or earlier
    /// settlement); returned unchanged, no wallet mutation.
    AlreadySettled(Payment),
}

/// Outcome of a guarded `held -> released/refunded` escrow transaction.
#[derive(Debug)]
pub enum EscrowTransitionOutcome {
    Applied { payment: Payment, wallet: Wallet },
    /// The row was no longer `held` when the guarded UPDATE ran; the current
    /// row is returned for the caller to re-plan (idempotent no-op vs error).
    Conflict(Payment),
    /// The payee wallet guard `escrow_balance >= amount` failed; the whole
    /// transaction was rolled back.
    InsufficientEscrow { requested: i64, held: i64 },
}

#[async_trait]
pub trait PaymentExt {
    async fn create_payment(&self, new_payment: NewPayment) -> Result<Payment, Error>;
    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, Error>;
    async fn get_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, Error>;
    async fn set_provider_reference(
        &self,
        payment_id: Uuid,
        provider_reference: &str,
    ) -> Result<(), Error>;

    /// Settles a verified payment: `status -> completed` plus the wallet
    /// mutation its type calls for, in one transaction. The status flip is
    /// guarded on `status = 'pending'`, so a racing second verify observes
    /// `AlreadySettled` and credits nothing.
    async fn settle_payment(
        &self,
        payment: &Payment,
        provider_reference: &str,
    ) -> Result<SettleOutcome, Error>;

    /// `status -> failed`, guarded on `pending`; no wallet mutation.
    async fn fail_payment(&self, payment_id: Uuid) -> Result<Payment, Error>;

    /// `escrow_status: held -> released` plus the payee wallet move
    /// (`escrow -= amount, available += amount`), one transaction.
    async fn release_escrow(&self, payment: &Payment)
        -> Result<EscrowTransitionOutcome, Error>;

    /// `escrow_status: held -> refunded`, `status -> refunded`, plus the
    /// payee wallet reversal (`escrow -= amount, balance -= amount`).
    async fn refund_escrow(&self, payment: &Payment)
        -> Result<EscrowTransitionOutcome, Error>;

    async fn payments_for_user(
        &self,
        user_id: Uuid,
        status: Option<PaymentStatus>,
        payment_type: Option<PaymentType>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Payment>, Error>;

    async fn all_payments(
        &self,
        status: Option<PaymentStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Payment>, Error>;
}

#[async_trait]
impl PaymentExt for DBClient {
    async fn create_payment(&self, new_payment: NewPayment) -> Result<Payment, Error> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments
            (payer_id, payee_id, project_id, job_id, amount, payment_type, reference, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(new_payment.payer_id)
        .bind(new_payment.payee_id)
        .bind(new_payment.project_id)
        .bind(new_payment.job_id)
        .bind(new_payment.amount)
        .bind(new_payment.payment_type)
        .bind(new_payment.reference)
        .bind(new_payment.description)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, Error> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_payment_by_reference(&self, reference: &str) -> Result<Option<Payment>, Error> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
    }

    async fn set_provider_reference(
        &self,
        payment_id: Uuid,
        provider_reference: &str,
    ) -> Result<(), Error> {
        sqlx::query("UPDATE payments SET provider_reference = $2 WHERE id = $1")
            .bind(payment_id)
            .bind(provider_reference)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn settle_payment(
        &self,
        payment: &Payment,
        provider_reference: &str,
    ) -> Result<SettleOutcome, Error> {
        let mut tx = self.pool.begin().await?;

        let settled = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET status = 'completed',
                escrow_status = CASE WHEN payment_type = 'project_payment'
                                     THEN 'held'::escrow_status
                                     ELSE escrow_status END,
                provider_reference = $2,
                paid_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment.id)
        .bind(provider_reference)
        .fetch_optional(&mut *tx)
        .await?;

        let settled = match settled {
            Some(row) => row,
            None => {
                // Lost the race: someone else already moved it out of pending.
                tx.rollback().await?;
                let current = sqlx::query_as::<_, Payment>(&format!(
                    "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
                ))
                .bind(payment.id)
                .fetch_one(&self.pool)
                .await?;
                return Ok(SettleOutcome::AlreadySettled(current));
            }
        };

        match settled.payment_type {
            PaymentType::Topup => {
                sqlx::query(
                    "INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
                )
                .bind(settled.payer_id)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    r#"
                    UPDATE wallets
                    SET balance = balance + $2,
                        available_balance = available_balance + $2,
                        updated_at = NOW()
                    WHERE user_id = $1
                    "#,
                )
                .bind(settled.payer_id)
                .bind(settled.amount)
                .execute(&mut *tx)
                .await?;
            }
            PaymentType::ProjectPayment => {
                // Funds are earmarked for the freelancer: recognized on the
                // payee wallet at hold time, not yet withdrawable.
                let payee_id = settled.payee_id.ok_or(Error::RowNotFound)?;

                sqlx::query(
                    "INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
                )
                .bind(payee_id)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    r#"
                    UPDATE wallets
                    SET balance = balance + $2,
                        escrow_balance = escrow_balance + $2,
                        updated_at = NOW()
                    WHERE user_id = $1
                    "#,
                )
                .bind(payee_id)
                .bind(settled.amount)
                .execute(&mut *tx)
                .await?;
            }
            // Job activation belongs to the job service; nothing to do here.
            PaymentType::JobVerification => {}
        }

        tx.commit().await?;
        Ok(SettleOutcome::Applied(settled))
    }

    async fn fail_payment(&self, payment_id: Uuid) -> Result<Payment, Error> {
        let failed = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET status = 'failed'
            WHERE id = $1 AND status = 'pending'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        match failed {
            Some(payment) => Ok(payment),
            // Already settled elsewhere; return the current row unchanged.
            None => {
                sqlx::query_as::<_, Payment>(&format!(
                    "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
                ))
                .bind(payment_id)
                .fetch_one(&self.pool)
                .await
            }
        }
    }

    async fn release_escrow(&self, payment: &Payment) -> Result<EscrowTransitionOutcome, Error> {
        let payee_id = payment.payee_id.ok_or(Error::RowNotFound)?;
        let mut tx = self.pool.begin().await?;

        let released = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET escrow_status = 'released',
                released_at = NOW()
            WHERE id = $1 AND escrow_status = 'held'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment.id)
        .fetch_optional(&mut *tx)
        .await?;

        let released = match released {
            Some(row) => row,
            None => {
                tx.rollback().await?;
                let current = sqlx::query_as::<_, Payment>(&format!(
                    "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
                ))
                .bind(payment.id)
                .fetch_one(&self.pool)
                .await?;
                return Ok(EscrowTransitionOutcome::Conflict(current));
            }
        };

        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            r#"
            UPDATE wallets
            SET escrow_balance = escrow_balance - $2,
                available_balance = available_balance + $2,
                updated_at = NOW()
            WHERE user_id = $1 AND escrow_balance >= $2
            RETURNING {WALLET_COLUMNS}
            "#
        ))
        .bind(payee_id)
        .bind(released.amount)
        .fetch_optional(&mut *tx)
        .await?;

        match wallet {
            Some(wallet) => {
                tx.commit().await?;
                Ok(EscrowTransitionOutcome::Applied {
                    payment: released,
                    wallet,
                })
            }
            None => {
                tx.rollback().await?;
                let held = self.payee_escrow_balance(payee_id).await?;
                Ok(EscrowTransitionOutcome::InsufficientEscrow {
                    requested: released.amount,
                    held,
                })
            }
        }
    }

    async fn refund_escrow(&self, payment: &Payment) -> Result<EscrowTransitionOutcome, Error> {
        let payee_id = payment.payee_id.ok_or(Error::RowNotFound)?;
        let mut tx = self.pool.begin().await?;

        let refunded = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET escrow_status = 'refunded',
                status = 'refunded',
                refunded_at = NOW()
            WHERE id = $1 AND escrow_status = 'held'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment.id)
        .fetch_optional(&mut *tx)
        .await?;

        let refunded = match refunded {
            Some(row) => row,
            None => {
                tx.rollback().await?;
                let current = sqlx::query_as::<_, Payment>(&format!(
                    "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
                ))
                .bind(payment.id)
                .fetch_one(&self.pool)
                .await?;
                return Ok(EscrowTransitionOutcome::Conflict(current));
            }
        };

        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            r#"
            UPDATE wallets
            SET escrow_balance = escrow_balance - $2,
                balance = balance - $2,
                updated_at = NOW()
            WHERE user_id = $1 AND escrow_balance >= $2
            RETURNING {WALLET_COLUMNS}
            "#
        ))
        .bind(payee_id)
        .bind(refunded.amount)
        .fetch_optional(&mut *tx)
        .await?;

        match wallet {
            Some(wallet) => {
                tx.commit().await?;
                Ok(EscrowTransitionOutcome::Applied {
                    payment: refunded,
                    wallet,
                })
            }
            None => {
                tx.rollback().await?;
                let held = self.payee_escrow_balance(payee_id).await?;
                Ok(EscrowTransitionOutcome::InsufficientEscrow {
                    requested: refunded.amount,
                    held,
                })
            }
        }
    }

    async fn payments_for_user(
        &self,
        user_id: Uuid,
        status: Option<PaymentStatus>,
        payment_type: Option<PaymentType>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Payment>, Error> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE (payer_id = $1 OR payee_id = $1)
              AND ($2::payment_status IS NULL OR status = $2)
              AND ($3::payment_type IS NULL OR payment_type = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(user_id)
        .bind(status)
        .bind(payment_type)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn all_payments(
        &self,
        status: Option<PaymentStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Payment>, Error> {
        sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE ($1::payment_status IS NULL OR status = $1)
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

impl DBClient {
    async fn payee_escrow_balance(&self, payee_id: Uuid) -> Result<i64, Error> {
        use sqlx::Row;

        let row = sqlx::query("SELECT escrow_balance FROM wallets WHERE user_id = $1")
            .bind(payee_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get::<i64, _>("escrow_balance")).unwrap_or(0))
    }
}
