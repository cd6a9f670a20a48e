// db/subscriptiondb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::subscriptionmodels::{Subscription, SubscriptionStatus, SubscriptionTier};
use crate::models::usermodel::User;

const SUBSCRIPTION_COLUMNS: &str = r#"
    id,
    user_id,
    plan,
    amount,
    currency,
    status,
    start_date,
    end_date,
    payment_reference,
    created_at
"#;

const USER_COLUMNS: &str = r#"
    id,
    name,
    email,
    role,
    is_premium,
    subscription_tier,
    subscription_status,
    premium_expiry_date,
    current_subscription_id,
    created_at,
    updated_at
"#;

#[async_trait]
pub trait SubscriptionExt {
    /// Idempotency anchor for `verify_upgrade`: one history row per gateway
    /// transaction reference.
    async fn get_subscription_by_payment_reference(
        &self,
        payment_reference: &str,
    ) -> Result<Option<Subscription>, Error>;

    /// Appends the history row and flips the user's entitlement columns,
    /// including `current_subscription_id`, in one transaction.
    async fn record_upgrade(
        &self,
        user_id: Uuid,
        tier: SubscriptionTier,
        amount: i64,
        currency: &str,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        payment_reference: &str,
    ) -> Result<(Subscription, User), Error>;

    /// Marks the user and the current history row cancelled. Entitlement
    /// (`is_premium`, expiry) is left untouched — access runs to expiry.
    async fn cancel_current_subscription(&self, user_id: Uuid) -> Result<Option<User>, Error>;

    async fn all_subscriptions(
        &self,
        status: Option<SubscriptionStatus>,
        limit: i64,
    ) -> Result<Vec<Subscription>, Error>;
}

#[async_trait]
impl SubscriptionExt for DBClient {
    async fn get_subscription_by_payment_reference(
        &self,
        payment_reference: &str,
    ) -> Result<Option<Subscription>, Error> {
        sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE payment_reference = $1"
        ))
        .bind(payment_reference)
        .fetch_optional(&self.pool)
        .await
    }

    async fn record_upgrade(
        &self,
        user_id: Uuid,
        tier: SubscriptionTier,
        amount: i64,
        currency: &str,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        payment_reference: &str,
    ) -> Result<(Subscription, User), Error> {
        let mut tx = self.pool.begin().await?;

        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            INSERT INTO subscriptions
            (user_id, plan, amount, currency, status, start_date, end_date, payment_reference)
            VALUES ($1, $2, $3, $4, 'active', $5, $6, $7)
            RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(tier)
        .bind(amount)
        .bind(currency)
        .bind(start_date)
        .bind(end_date)
        .bind(payment_reference)
        .fetch_one(&mut *tx)
        .await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET is_premium = true,
                subscription_tier = $2,
                subscription_status = 'active',
                premium_expiry_date = $3,
                current_subscription_id = $4,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(tier)
        .bind(end_date)
        .bind(subscription.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((subscription, user))
    }

    async fn cancel_current_subscription(&self, user_id: Uuid) -> Result<Option<User>, Error> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET subscription_status = 'cancelled',
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let user = match user {
            Some(user) => user,
            None => {
                tx.rollback().await?;
                return Ok(None);
            }
        };

        if let Some(subscription_id) = user.current_subscription_id {
            sqlx::query(
                "UPDATE subscriptions SET status = 'cancelled' WHERE id = $1 AND status = 'active'",
            )
            .bind(subscription_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(user))
    }

    async fn all_subscriptions(
        &self,
        status: Option<SubscriptionStatus>,
        limit: i64,
    ) -> Result<Vec<Subscription>, Error> {
        sqlx::query_as::<_, Subscription>(&format!(
            r#"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM subscriptions
            WHERE ($1::subscription_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
