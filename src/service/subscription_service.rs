// service/subscription_service.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::{subscriptiondb::SubscriptionExt, userdb::UserExt},
    models::subscriptionmodels::{SubscriptionStatus, SubscriptionTier},
    models::usermodel::User,
    service::{
        error::ServiceError,
        payment_gateway::{ChargeStatus, PaymentGatewayService, PaymentInit},
    },
    utils::currency::kobo_to_naira,
    AppState,
};

use crate::DBClient;

/// Effective entitlement as seen by a reader at a given instant. Computed
/// purely from the user row; persistence of a demotion is a separate,
/// best-effort write.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct EffectiveEntitlement {
    pub is_premium: bool,
    pub subscription_tier: SubscriptionTier,
    pub subscription_status: SubscriptionStatus,
    pub premium_expiry_date: Option<DateTime<Utc>>,
    pub days_until_expiry: Option<i64>,
    pub is_expiring_soon: bool,
}

/// Lazy expiry rule: a premium flag with an expiry date in the past reads as
/// `expired/free`, regardless of what is persisted. Monotonic — once a
/// reader observes the demotion, no earlier state can be observed again
/// (expiry dates only move forward, via verified upgrades).
pub fn evaluate_entitlement(user: &User, now: DateTime<Utc>) -> EffectiveEntitlement {
    let lapsed = user.is_premium
        && user
            .premium_expiry_date
            .map(|expiry| expiry < now)
            .unwrap_or(false);

    if lapsed {
        return EffectiveEntitlement {
            is_premium: false,
            subscription_tier: SubscriptionTier::Free,
            subscription_status: SubscriptionStatus::Expired,
            premium_expiry_date: user.premium_expiry_date,
            days_until_expiry: None,
            is_expiring_soon: false,
        };
    }

    let days_until_expiry = user
        .premium_expiry_date
        .filter(|_| user.is_premium)
        .map(|expiry| {
            let remaining = expiry - now;
            // Ceil to whole days the way the mobile banner counts them.
            let days = remaining.num_days();
            if remaining - ChronoDuration::days(days) > ChronoDuration::zero() {
                days + 1
            } else {
                days
            }
        });

    EffectiveEntitlement {
        is_premium: user.is_premium,
        subscription_tier: user.subscription_tier,
        subscription_status: user.subscription_status,
        premium_expiry_date: user.premium_expiry_date,
        days_until_expiry,
        is_expiring_soon: days_until_expiry.map(|d| d <= 7).unwrap_or(false),
    }
}

#[derive(Clone)]
pub struct SubscriptionService {
    db_client: Arc<DBClient>,
    gateway: Arc<PaymentGatewayService>,
}

impl SubscriptionService {
    pub fn new(db_client: Arc<DBClient>, gateway: Arc<PaymentGatewayService>) -> Self {
        Self { db_client, gateway }
    }

    /// Entitlement read with lazy expiry. The demotion write is guarded so
    /// concurrent readers race benignly to the identical end state.
    pub async fn entitlement(&self, user_id: Uuid) -> Result<EffectiveEntitlement, ServiceError> {
        let user = self
            .db_client
            .get_user(user_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        let effective = evaluate_entitlement(&user, Utc::now());

        if user.is_premium && !effective.is_premium {
            if self.db_client.expire_lapsed_premium(user_id).await?.is_some() {
                tracing::info!(user_id = %user_id, "premium entitlement lapsed, demoted");
            }
        }

        Ok(effective)
    }

    pub async fn initialize_upgrade(
        &self,
        user: &User,
        tier: SubscriptionTier,
        duration_months: u32,
    ) -> Result<PaymentInit, ServiceError> {
        if tier == SubscriptionTier::Free {
            return Err(ServiceError::Validation(
                "Invalid subscription tier".to_string(),
            ));
        }

        if !(1..=12).contains(&duration_months) {
            return Err(ServiceError::Validation(
                "Duration must be between 1 and 12 months".to_string(),
            ));
        }

        if !user.has_valid_contact() {
            return Err(ServiceError::InvalidContact);
        }

        let amount_kobo = tier.monthly_price_kobo() * duration_months as i64;
        let reference = format!("SUB_{}_{}", user.id, Utc::now().timestamp_millis());

        let metadata = serde_json::json!({
            "user_id": user.id,
            "type": "subscription",
            "tier": tier.to_str(),
            "duration_months": duration_months,
        });

        let init = self
            .gateway
            .initialize_payment(
                &user.email,
                kobo_to_naira(amount_kobo),
                &reference,
                Some(metadata),
            )
            .await?;

        tracing::info!(
            user_id = %user.id,
            tier = tier.to_str(),
            duration_months,
            amount = amount_kobo,
            "subscription upgrade initialized"
        );

        Ok(init)
    }

    /// Idempotent: a transaction reference that already produced a history
    /// row returns the current entitlement without touching anything.
    pub async fn verify_upgrade(
        &self,
        user: &User,
        transaction_ref: &str,
    ) -> Result<EffectiveEntitlement, ServiceError> {
        if let Some(existing) = self
            .db_client
            .get_subscription_by_payment_reference(transaction_ref)
            .await?
        {
            if existing.user_id != user.id {
                return Err(ServiceError::Unauthorized);
            }
            return self.entitlement(user.id).await;
        }

        // Numeric references are provider transaction ids; our own SUB_*
        // references verify by tx_ref.
        let transaction_id = transaction_ref
            .chars()
            .all(|c| c.is_ascii_digit())
            .then_some(transaction_ref);

        let verification = self
            .gateway
            .verify_payment(transaction_ref, transaction_id)
            .await?;

        match verification.status {
            ChargeStatus::Successful => {
                let meta = verification.meta.unwrap_or(serde_json::json!({}));

                let tier = meta["tier"]
                    .as_str()
                    .and_then(SubscriptionTier::from_str)
                    .unwrap_or(SubscriptionTier::Premium);

                let duration_months = meta["duration_months"]
                    .as_u64()
                    .or_else(|| {
                        meta["duration_months"]
                            .as_str()
                            .and_then(|raw| raw.parse::<u64>().ok())
                    })
                    .unwrap_or(1)
                    .clamp(1, 12) as u32;

                let now = Utc::now();
                let expiry = now
                    .checked_add_months(Months::new(duration_months))
                    .unwrap_or(now + ChronoDuration::days(30 * duration_months as i64));

                let (subscription, updated_user) = self
                    .db_client
                    .record_upgrade(
                        user.id,
                        tier,
                        verification.amount_kobo,
                        &verification.currency,
                        now,
                        expiry,
                        transaction_ref,
                    )
                    .await?;

                tracing::info!(
                    user_id = %user.id,
                    subscription_id = %subscription.id,
                    tier = tier.to_str(),
                    expiry = %expiry,
                    "subscription upgrade verified"
                );

                Ok(evaluate_entitlement(&updated_user, now))
            }
            ChargeStatus::Failed => Err(ServiceError::Validation(
                "Payment verification failed".to_string(),
            )),
            ChargeStatus::Pending => Err(ServiceError::VerificationPending),
        }
    }

    /// Cancellation keeps access until natural expiry: only the status flips.
    pub async fn cancel(&self, user_id: Uuid) -> Result<EffectiveEntitlement, ServiceError> {
        let user = self
            .db_client
            .cancel_current_subscription(user_id)
            .await?
            .ok_or(ServiceError::NotFound("User"))?;

        tracing::info!(user_id = %user_id, "subscription cancelled, access retained until expiry");

        Ok(evaluate_entitlement(&user, Utc::now()))
    }

    pub async fn all_subscriptions(
        &self,
        status: Option<SubscriptionStatus>,
        limit: i64,
    ) -> Result<Vec<crate::models::subscriptionmodels::Subscription>, ServiceError> {
        Ok(self.db_client.all_subscriptions(status, limit).await?)
    }
}

/// Optional periodic sweep behind the lazy-expiry rule: demotes every lapsed
/// premium row in bulk with the same guarded UPDATE the read path uses.
pub async fn start_subscription_expiry_sweep(app_state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(3600));

    loop {
        interval.tick().await;

        match app_state.db_client.expire_all_lapsed_premium().await {
            Ok(0) => {}
            Ok(count) => tracing::info!(count, "expired lapsed premium subscriptions"),
            Err(err) => tracing::warn!(error = %err, "subscription expiry sweep failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::usermodel::UserRole;

    fn premium_user(expiry: Option<DateTime<Utc>>) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@connecta.app".to_string(),
            role: UserRole::Freelancer,
            is_premium: true,
            subscription_tier: SubscriptionTier::Premium,
            subscription_status: SubscriptionStatus::Active,
            premium_expiry_date: expiry,
            current_subscription_id: Some(Uuid::new_v4()),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn active_premium_reads_as_premium() {
        let now = Utc::now();
        let user = premium_user(Some(now + ChronoDuration::days(30)));

        let effective = evaluate_entitlement(&user, now);

        assert!(effective.is_premium);
        assert_eq!(effective.subscription_tier, SubscriptionTier::Premium);
        assert_eq!(effective.subscription_status, SubscriptionStatus::Active);
        assert_eq!(effective.days_until_expiry, Some(30));
        assert!(!effective.is_expiring_soon);
    }

    #[test]
    fn lapsed_premium_reads_as_expired_free() {
        let now = Utc::now();
        let user = premium_user(Some(now - ChronoDuration::hours(1)));

        let effective = evaluate_entitlement(&user, now);

        assert!(!effective.is_premium);
        assert_eq!(effective.subscription_tier, SubscriptionTier::Free);
        assert_eq!(effective.subscription_status, SubscriptionStatus::Expired);
    }

    #[test]
    fn evaluation_is_idempotent_across_readers() {
        let now = Utc::now();
        let user = premium_user(Some(now - ChronoDuration::days(2)));

        let first = evaluate_entitlement(&user, now);
        let second = evaluate_entitlement(&user, now + ChronoDuration::minutes(5));

        assert_eq!(first.is_premium, second.is_premium);
        assert_eq!(first.subscription_status, second.subscription_status);
    }

    #[test]
    fn cancelled_subscription_keeps_access_until_expiry() {
        let now = Utc::now();
        let mut user = premium_user(Some(now + ChronoDuration::days(10)));
        user.subscription_status = SubscriptionStatus::Cancelled;

        let effective = evaluate_entitlement(&user, now);

        assert!(effective.is_premium);
        assert_eq!(effective.subscription_status, SubscriptionStatus::Cancelled);
    }

    #[test]
    fn expiring_soon_flags_the_final_week() {
        let now = Utc::now();
        let user = premium_user(Some(now + ChronoDuration::days(3)));

        let effective = evaluate_entitlement(&user, now);

        assert!(effective.is_expiring_soon);
        assert_eq!(effective.days_until_expiry, Some(3));
    }

    #[test]
    fn premium_without_expiry_date_does_not_lapse() {
        let now = Utc::now();
        let user = premium_user(None);

        let effective = evaluate_entitlement(&user, now);

        assert!(effective.is_premium);
        assert_eq!(effective.days_until_expiry, None);
    }
}
