// dtos/subscriptiondtos.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::subscriptionmodels::{Subscription, SubscriptionStatus, SubscriptionTier};
use crate::service::subscription_service::EffectiveEntitlement;
use crate::utils::currency::kobo_to_naira;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpgradeRequestDto {
    pub tier: SubscriptionTier,

    #[validate(range(min = 1, max = 12, message = "Duration must be between 1 and 12 months"))]
    pub duration_months: Option<u32>,
}

/// The mobile callback posts whichever identifier the gateway handed back.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyUpgradeRequestDto {
    pub transaction_id: Option<String>,
    pub tx_ref: Option<String>,
}

impl VerifyUpgradeRequestDto {
    pub fn reference(&self) -> Option<&str> {
        let transaction_id = self.transaction_id.as_deref().filter(|s| !s.is_empty());
        let tx_ref = self.tx_ref.as_deref().filter(|s| !s.is_empty());
        transaction_id.or(tx_ref)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntitlementResponseDto {
    pub is_premium: bool,
    pub subscription_tier: SubscriptionTier,
    pub subscription_status: SubscriptionStatus,
    pub expiry_date: Option<DateTime<Utc>>,
    pub days_until_expiry: Option<i64>,
    pub is_expiring_soon: bool,
}

impl From<EffectiveEntitlement> for EntitlementResponseDto {
    fn from(entitlement: EffectiveEntitlement) -> Self {
        Self {
            is_premium: entitlement.is_premium,
            subscription_tier: entitlement.subscription_tier,
            subscription_status: entitlement.subscription_status,
            expiry_date: entitlement.premium_expiry_date,
            days_until_expiry: entitlement.days_until_expiry,
            is_expiring_soon: entitlement.is_expiring_soon,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubscriptionResponseDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: SubscriptionTier,
    pub amount: f64,
    pub currency: String,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub payment_reference: String,
}

impl From<Subscription> for SubscriptionResponseDto {
    fn from(subscription: Subscription) -> Self {
        Self {
            id: subscription.id,
            user_id: subscription.user_id,
            plan: subscription.plan,
            amount: kobo_to_naira(subscription.amount),
            currency: subscription.currency,
            status: subscription.status,
            start_date: subscription.start_date,
            end_date: subscription.end_date,
            payment_reference: subscription.payment_reference,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct SubscriptionListQueryDto {
    pub status: Option<SubscriptionStatus>,

    #[validate(range(min = 1, max = 500, message = "Limit must be between 1 and 500"))]
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_dto_prefers_transaction_id() {
        let dto = VerifyUpgradeRequestDto {
            transaction_id: Some("12345".to_string()),
            tx_ref: Some("SUB_x_1".to_string()),
        };
        assert_eq!(dto.reference(), Some("12345"));
    }

    #[test]
    fn verify_dto_falls_back_to_tx_ref() {
        let dto = VerifyUpgradeRequestDto {
            transaction_id: None,
            tx_ref: Some("SUB_x_1".to_string()),
        };
        assert_eq!(dto.reference(), Some("SUB_x_1"));
    }

    #[test]
    fn verify_dto_rejects_empty_values() {
        let dto = VerifyUpgradeRequestDto {
            transaction_id: Some("".to_string()),
            tx_ref: None,
        };
        assert_eq!(dto.reference(), None);
    }
}
