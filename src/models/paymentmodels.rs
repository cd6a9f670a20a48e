use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "payment_type", rename_all = "snake_case")]
pub enum PaymentType {
    Topup,
    JobVerification,
    ProjectPayment,
}

impl PaymentType {
    pub fn to_str(&self) -> &str {
        match self {
            PaymentType::Topup => "topup",
            PaymentType::JobVerification => "job_verification",
            PaymentType::ProjectPayment => "project_payment",
        }
    }

    pub fn reference_prefix(&self) -> &str {
        match self {
            PaymentType::Topup => "TOPUP",
            PaymentType::JobVerification => "JOBVERIF",
            PaymentType::ProjectPayment => "PROJECT",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn to_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// Escrow lifecycle of a project payment. `Released` and `Refunded` are
/// mutually exclusive terminal states.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "escrow_status", rename_all = "snake_case")]
pub enum EscrowStatus {
    None,
    Held,
    Released,
    Refunded,
}

impl EscrowStatus {
    pub fn to_str(&self) -> &str {
        match self {
            EscrowStatus::None => "none",
            EscrowStatus::Held => "held",
            EscrowStatus::Released => "released",
            EscrowStatus::Refunded => "refunded",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "withdrawal_status", rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl WithdrawalStatus {
    pub fn to_str(&self) -> &str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Failed => "failed",
        }
    }
}

/// One wallet per user, created lazily on first payment interaction and never
/// deleted. Amounts are in kobo. Invariant maintained by every mutation:
/// `balance == available_balance + escrow_balance`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: i64,
    pub available_balance: i64,
    pub escrow_balance: i64,
    pub currency: String,
    pub is_verified: bool,
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
    pub bank_code: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Wallet {
    pub fn balance_in_naira(&self) -> f64 {
        self.balance as f64 / 100.0
    }

    pub fn available_balance_in_naira(&self) -> f64 {
        self.available_balance as f64 / 100.0
    }

    pub fn escrow_balance_in_naira(&self) -> f64 {
        self.escrow_balance as f64 / 100.0
    }

    /// Bank details on file, if all four fields are present.
    pub fn bank_details(&self) -> Option<BankDetails> {
        match (
            &self.bank_name,
            &self.account_number,
            &self.account_name,
            &self.bank_code,
        ) {
            (Some(bank_name), Some(account_number), Some(account_name), Some(bank_code)) => {
                Some(BankDetails {
                    bank_name: bank_name.clone(),
                    account_number: account_number.clone(),
                    account_name: account_name.clone(),
                    bank_code: bank_code.clone(),
                })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankDetails {
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
    pub bank_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub payer_id: Uuid,
    pub payee_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub amount: i64,
    pub currency: String,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub escrow_status: EscrowStatus,
    pub reference: String,
    pub provider_reference: Option<String>,
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn amount_in_naira(&self) -> f64 {
        self.amount as f64 / 100.0
    }
}

/// Withdrawal of available balance to a bank account. Bank details are copied
/// at request time, not referenced live. The requested amount is debited from
/// the wallet when the row is created and credited back if the payout fails.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
    pub bank_code: String,
    pub status: WithdrawalStatus,
    pub provider_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub approved_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Withdrawal {
    pub fn amount_in_naira(&self) -> f64 {
        self.amount as f64 / 100.0
    }
}

/// Gateway correlation reference, `{TYPE}_{payerId}_{millis}`.
pub fn generate_payment_reference(payment_type: PaymentType, payer_id: Uuid) -> String {
    format!(
        "{}_{}_{}",
        payment_type.reference_prefix(),
        payer_id,
        Utc::now().timestamp_millis()
    )
}

pub fn generate_withdrawal_reference(withdrawal_id: Uuid) -> String {
    format!("WD_{}", withdrawal_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_carries_type_and_payer() {
        let payer = Uuid::new_v4();
        let reference = generate_payment_reference(PaymentType::ProjectPayment, payer);

        assert!(reference.starts_with("PROJECT_"));
        assert!(reference.contains(&payer.to_string()));
        assert_eq!(reference.split('_').count(), 3);
    }

    #[test]
    fn bank_details_require_all_fields() {
        let mut wallet = Wallet {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            balance: 0,
            available_balance: 0,
            escrow_balance: 0,
            currency: "NGN".to_string(),
            is_verified: false,
            bank_name: Some("Test Bank".to_string()),
            account_number: Some("0123456789".to_string()),
            account_name: Some("Ada Obi".to_string()),
            bank_code: None,
            created_at: None,
            updated_at: None,
        };

        assert!(wallet.bank_details().is_none());

        wallet.bank_code = Some("058".to_string());
        let details = wallet.bank_details().unwrap();
        assert_eq!(details.account_number, "0123456789");
    }
}
