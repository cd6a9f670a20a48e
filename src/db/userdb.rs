// db/userdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::usermodel::User;

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
pub trait UserExt {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, Error>;

    /// Guarded demotion of a lapsed premium entitlement. Fires only while the
    /// row still matches `is_premium AND premium_expiry_date < NOW()`, so
    /// concurrent readers race benignly; returns the demoted row when this
    /// caller won, `None` when there was nothing left to demote.
    async fn expire_lapsed_premium(&self, user_id: Uuid) -> Result<Option<User>, Error>;

    /// Bulk form of `expire_lapsed_premium` used by the periodic sweep.
    async fn expire_all_lapsed_premium(&self) -> Result<u64, Error>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn expire_lapsed_premium(&self, user_id: Uuid) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET is_premium = false,
                subscription_status = 'expired',
                subscription_tier = 'free',
                updated_at = NOW()
            WHERE id = $1
              AND is_premium = true
              AND premium_expiry_date IS NOT NULL
              AND premium_expiry_date < NOW()
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn expire_all_lapsed_premium(&self) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_premium = false,
                subscription_status = 'expired',
                subscription_tier = 'free',
                updated_at = NOW()
            WHERE is_premium = true
              AND premium_expiry_date IS NOT NULL
              AND premium_expiry_date < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
