use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::subscriptionmodels::{SubscriptionStatus, SubscriptionTier};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Client,
    Freelancer,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Client => "client",
            UserRole::Freelancer => "freelancer",
        }
    }
}

/// Users are owned by the identity service; the payment core reads them and
/// writes only the subscription entitlement columns.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub is_premium: bool,
    pub subscription_tier: SubscriptionTier,
    pub subscription_status: SubscriptionStatus,
    pub premium_expiry_date: Option<DateTime<Utc>>,
    pub current_subscription_id: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn has_valid_contact(&self) -> bool {
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.'),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_email(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: email.to_string(),
            role: UserRole::Client,
            is_premium: false,
            subscription_tier: SubscriptionTier::Free,
            subscription_status: SubscriptionStatus::Active,
            premium_expiry_date: None,
            current_subscription_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn valid_contact_requires_a_real_address() {
        assert!(user_with_email("ada@connecta.app").has_valid_contact());
        assert!(!user_with_email("not-an-email").has_valid_contact());
        assert!(!user_with_email("@connecta.app").has_valid_contact());
        assert!(!user_with_email("ada@nodot").has_valid_contact());
    }
}
