// dtos/paymentdtos.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::db::walletdb::WalletSummary;
use crate::models::paymentmodels::*;
use crate::utils::currency::kobo_to_naira;

// Response wrapper shared by the payment and subscription handlers.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: &str, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }
}

// Payment DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TopupRequestDto {
    #[validate(range(min = 100.0, max = 10000000.0, message = "Amount must be between ₦100 and ₦10,000,000"))]
    pub amount: f64,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct JobVerificationRequestDto {
    pub job_id: Uuid,

    #[validate(range(min = 100.0, max = 10000000.0, message = "Amount must be between ₦100 and ₦10,000,000"))]
    pub amount: f64,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ProjectPaymentRequestDto {
    pub project_id: Uuid,
    pub payee_id: Uuid,

    #[validate(range(min = 100.0, max = 10000000.0, message = "Amount must be between ₦100 and ₦10,000,000"))]
    pub amount: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyPaymentQueryDto {
    pub transaction_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResponseDto {
    pub id: Uuid,
    pub payer_id: Uuid,
    pub payee_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub amount: f64,
    pub currency: String,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub escrow_status: EscrowStatus,
    pub reference: String,
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl From<Payment> for PaymentResponseDto {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            payer_id: payment.payer_id,
            payee_id: payment.payee_id,
            project_id: payment.project_id,
            job_id: payment.job_id,
            amount: kobo_to_naira(payment.amount),
            currency: payment.currency,
            payment_type: payment.payment_type,
            status: payment.status,
            escrow_status: payment.escrow_status,
            reference: payment.reference,
            description: payment.description,
            created_at: payment.created_at,
            paid_at: payment.paid_at,
            released_at: payment.released_at,
            refunded_at: payment.refunded_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PaymentHistoryQueryDto {
    pub status: Option<PaymentStatus>,
    pub payment_type: Option<PaymentType>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,

    #[validate(range(min = 0, message = "Offset must be non-negative"))]
    pub offset: Option<i64>,
}

// Wallet DTOs
#[derive(Debug, Serialize, Deserialize)]
pub struct WalletBalanceDto {
    pub balance: f64,
    pub available_balance: f64,
    pub escrow_balance: f64,
    pub currency: String,
    pub is_verified: bool,
    /// Held project payments for this user as payee, reconciled from the
    /// payment ledger.
    pub held_payments_total: f64,
    pub pending_withdrawals: f64,
}

impl From<WalletSummary> for WalletBalanceDto {
    fn from(summary: WalletSummary) -> Self {
        Self {
            balance: kobo_to_naira(summary.balance),
            available_balance: kobo_to_naira(summary.available_balance),
            escrow_balance: kobo_to_naira(summary.escrow_balance),
            currency: summary.currency,
            is_verified: summary.is_verified,
            held_payments_total: kobo_to_naira(summary.held_payments_total),
            pending_withdrawals: kobo_to_naira(summary.pending_withdrawals),
        }
    }
}

fn validate_account_number(account_number: &str) -> Result<(), validator::ValidationError> {
    if account_number.chars().all(|c| c.is_ascii_digit()) && account_number.len() == 10 {
        Ok(())
    } else {
        Err(validator::ValidationError::new("account_number must be 10 digits"))
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct BankDetailsDto {
    #[validate(length(min = 1, max = 100, message = "Bank name is required"))]
    pub bank_name: String,

    #[validate(
        length(min = 10, max = 10, message = "Account number must be 10 digits"),
        custom = "validate_account_number"
    )]
    pub account_number: String,

    #[validate(length(min = 1, max = 100, message = "Account name is required"))]
    pub account_name: String,

    #[validate(length(min = 3, max = 3, message = "Bank code must be 3 digits"))]
    pub bank_code: String,
}

impl From<BankDetailsDto> for BankDetails {
    fn from(dto: BankDetailsDto) -> Self {
        BankDetails {
            bank_name: dto.bank_name,
            account_number: dto.account_number,
            account_name: dto.account_name,
            bank_code: dto.bank_code,
        }
    }
}

// Withdrawal DTOs
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct WithdrawalRequestDto {
    #[validate(range(min = 100.0, max = 5000000.0, message = "Amount must be between ₦100 and ₦5,000,000"))]
    pub amount: f64,

    /// Optional override; falls back to the bank details saved on the wallet.
    #[validate]
    pub bank_details: Option<BankDetailsDto>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawalResponseDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub currency: String,
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
    pub status: WithdrawalStatus,
    pub failure_reason: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Withdrawal> for WithdrawalResponseDto {
    fn from(withdrawal: Withdrawal) -> Self {
        Self {
            id: withdrawal.id,
            user_id: withdrawal.user_id,
            amount: kobo_to_naira(withdrawal.amount),
            currency: withdrawal.currency,
            bank_name: withdrawal.bank_name,
            account_number: withdrawal.account_number,
            account_name: withdrawal.account_name,
            status: withdrawal.status,
            failure_reason: withdrawal.failure_reason,
            created_at: withdrawal.created_at,
            completed_at: withdrawal.completed_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct WithdrawalListQueryDto {
    pub status: Option<WithdrawalStatus>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,

    #[validate(range(min = 0, message = "Offset must be non-negative"))]
    pub offset: Option<i64>,
}
