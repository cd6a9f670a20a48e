use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "subscription_tier", rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Premium,
    Enterprise,
}

impl SubscriptionTier {
    pub fn to_str(&self) -> &str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Premium => "premium",
            SubscriptionTier::Enterprise => "enterprise",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "free" => Some(SubscriptionTier::Free),
            "premium" => Some(SubscriptionTier::Premium),
            "enterprise" => Some(SubscriptionTier::Enterprise),
            _ => None,
        }
    }

    /// Monthly price in kobo. Free tier is not purchasable.
    pub fn monthly_price_kobo(&self) -> i64 {
        match self {
            SubscriptionTier::Free => 0,
            SubscriptionTier::Premium => 500_000,     // 5,000 NGN
            SubscriptionTier::Enterprise => 2_000_000, // 20,000 NGN
        }
    }

    pub fn benefits(&self) -> Vec<&str> {
        match self {
            SubscriptionTier::Free => vec![
                "Standard project listings",
                "Basic support",
            ],
            SubscriptionTier::Premium => vec![
                "Boosted proposal visibility",
                "Priority support",
                "Lower platform fees",
            ],
            SubscriptionTier::Enterprise => vec![
                "Team accounts",
                "Dedicated account manager",
                "Custom contract terms",
            ],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn to_str(&self) -> &str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

/// Subscription history row. Rows are appended on every verified upgrade and
/// retained for audit; the authoritative pointer is
/// `users.current_subscription_id`.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: SubscriptionTier,
    pub amount: i64,
    pub currency: String,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub payment_reference: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchasable_tiers_have_prices() {
        assert_eq!(SubscriptionTier::Premium.monthly_price_kobo(), 500_000);
        assert_eq!(SubscriptionTier::Enterprise.monthly_price_kobo(), 2_000_000);
        assert_eq!(SubscriptionTier::Free.monthly_price_kobo(), 0);
    }

    #[test]
    fn tier_round_trips_through_str() {
        for tier in [
            SubscriptionTier::Free,
            SubscriptionTier::Premium,
            SubscriptionTier::Enterprise,
        ] {
            assert_eq!(SubscriptionTier::from_str(tier.to_str()), Some(tier));
        }
        assert_eq!(SubscriptionTier::from_str("gold"), None);
    }
}
