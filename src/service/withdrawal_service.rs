// service/withdrawal_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{
        userdb::UserExt,
        walletdb::WalletExt,
        withdrawaldb::WithdrawalExt,
    },
    mail::mails::send_withdrawal_processed_email,
    models::paymentmodels::{
        generate_withdrawal_reference, BankDetails, Withdrawal, WithdrawalStatus,
    },
    models::usermodel::User,
    service::{
        error::ServiceError,
        payment_gateway::{GatewayError, PaymentGatewayService},
    },
    utils::currency::{kobo_to_naira, naira_to_kobo},
    DBClient,
};

#[derive(Clone)]
pub struct WithdrawalService {
    db_client: Arc<DBClient>,
    gateway: Arc<PaymentGatewayService>,
}

impl WithdrawalService {
    pub fn new(db_client: Arc<DBClient>, gateway: Arc<PaymentGatewayService>) -> Self {
        Self { db_client, gateway }
    }

    /// Reserves the amount immediately: the available balance is debited in
    /// the same transaction that creates the `pending` row, so a concurrent
    /// second request cannot spend the same funds while this one awaits
    /// admin processing.
    pub async fn request_withdrawal(
        &self,
        user: &User,
        amount_naira: f64,
        bank_details: Option<BankDetails>,
    ) -> Result<Withdrawal, ServiceError> {
        if !amount_naira.is_finite() || amount_naira <= 0.0 {
            return Err(ServiceError::Validation(
                "Withdrawal amount must be greater than zero".to_string(),
            ));
        }
        let amount = naira_to_kobo(amount_naira);

        // Request-supplied details take precedence and are saved to the
        // wallet, which marks it verified for payouts.
        let wallet = match bank_details {
            Some(details) => self.db_client.save_bank_details(user.id, &details).await?,
            None => self.db_client.get_or_create_wallet(user.id).await?,
        };

        let details = wallet.bank_details().ok_or_else(|| {
            ServiceError::Validation(
                "Bank details are required. Provide them or save them in settings.".to_string(),
            )
        })?;

        if !wallet.is_verified {
            return Err(ServiceError::Validation(
                "Wallet bank details are not verified".to_string(),
            ));
        }

        let withdrawal = self
            .db_client
            .create_withdrawal(user.id, amount, &wallet.currency, &details)
            .await?
            .ok_or(ServiceError::InsufficientBalance {
                requested: amount,
                available: wallet.available_balance,
            })?;

        tracing::info!(
            withdrawal_id = %withdrawal.id,
            amount = withdrawal.amount,
            "withdrawal requested, funds reserved"
        );

        Ok(withdrawal)
    }

    /// Admin approval: `pending -> processing`, provider transfer, then
    /// `processing -> completed`, or `processing -> failed` with the reserved
    /// amount credited back in the same transaction as the status flip.
    ///
    /// A transport error (outcome unknown at the provider) leaves the row in
    /// `processing` instead of compensating: re-running this operation
    /// re-attempts the transfer under the same per-withdrawal reference,
    /// which the provider deduplicates.
    pub async fn process_withdrawal(
        &self,
        withdrawal_id: Uuid,
        admin: &User,
    ) -> Result<Withdrawal, ServiceError> {
        if !admin.is_admin() {
            return Err(ServiceError::Unauthorized);
        }

        let withdrawal = match self
            .db_client
            .begin_processing(withdrawal_id, admin.id)
            .await?
        {
            Some(withdrawal) => withdrawal,
            None => {
                let current = self
                    .db_client
                    .get_withdrawal(withdrawal_id)
                    .await?
                    .ok_or(ServiceError::NotFound("Withdrawal"))?;

                // A stuck `processing` row (crash after the transfer call) is
                // retried; anything else has already been decided.
                if current.status != WithdrawalStatus::Processing {
                    return Err(ServiceError::InvalidWithdrawalState(withdrawal_id));
                }
                current
            }
        };

        let reference = generate_withdrawal_reference(withdrawal.id);
        let transfer = self
            .gateway
            .initiate_transfer(
                &withdrawal.account_number,
                &withdrawal.bank_code,
                kobo_to_naira(withdrawal.amount),
                &reference,
                "Connecta withdrawal",
            )
            .await;

        match transfer {
            Ok(transfer) => {
                let completed = self
                    .db_client
                    .complete_withdrawal(withdrawal.id, &transfer.transfer_code)
                    .await?;

                self.notify_processed(&completed).await;

                tracing::info!(
                    withdrawal_id = %completed.id,
                    transfer_code = %transfer.transfer_code,
                    "withdrawal completed"
                );

                Ok(completed)
            }
            Err(GatewayError::Provider(reason)) => {
                // The provider explicitly rejected the transfer: compensate.
                let failed = self
                    .db_client
                    .fail_withdrawal_and_refund(withdrawal.id, &reason)
                    .await?;

                tracing::warn!(
                    withdrawal_id = %failed.id,
                    reason = %reason,
                    "withdrawal failed, reserved funds returned"
                );

                Ok(failed)
            }
            Err(err) => {
                // Outcome unknown: keep the reserve and the `processing`
                // state, surface the transient error for a retry.
                tracing::warn!(
                    withdrawal_id = %withdrawal.id,
                    error = %err,
                    "withdrawal transfer outcome unknown, left in processing"
                );
                Err(ServiceError::Gateway(err))
            }
        }
    }

    pub async fn my_withdrawals(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Withdrawal>, ServiceError> {
        Ok(self
            .db_client
            .withdrawals_for_user(user_id, limit, offset)
            .await?)
    }

    pub async fn list_withdrawals(
        &self,
        status: Option<WithdrawalStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Withdrawal>, ServiceError> {
        Ok(self
            .db_client
            .list_withdrawals(status, limit, offset)
            .await?)
    }

    async fn notify_processed(&self, withdrawal: &Withdrawal) {
        let user = match self.db_client.get_user(withdrawal.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %err, "could not load user for withdrawal mail");
                return;
            }
        };

        if let Err(err) = send_withdrawal_processed_email(
            &user.email,
            &user.name,
            withdrawal.amount_in_naira(),
            &withdrawal.currency,
        )
        .await
        {
            tracing::warn!(error = %err, "failed to send withdrawal processed email");
        }
    }
}
