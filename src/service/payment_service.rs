// service/payment_service.rs
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::{
        paymentdb::{EscrowTransitionOutcome, NewPayment, PaymentExt, SettleOutcome},
        userdb::UserExt,
        walletdb::{WalletExt, WalletSummary},
    },
    mail::mails::send_payment_received_email,
    models::paymentmodels::{generate_payment_reference, Payment, PaymentStatus, PaymentType},
    models::usermodel::User,
    service::{
        error::ServiceError,
        escrow::{plan_transition, EscrowAction, EscrowPlan},
        payment_gateway::{ChargeStatus, PaymentGatewayService},
    },
    utils::currency::naira_to_kobo,
    DBClient,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentInitiation {
    pub payment_id: Uuid,
    pub reference: String,
    pub authorization_url: String,
}

#[derive(Clone)]
pub struct PaymentService {
    db_client: Arc<DBClient>,
    gateway: Arc<PaymentGatewayService>,
}

impl PaymentService {
    pub fn new(db_client: Arc<DBClient>, gateway: Arc<PaymentGatewayService>) -> Self {
        Self { db_client, gateway }
    }

    pub async fn initialize_topup(
        &self,
        user: &User,
        amount_naira: f64,
    ) -> Result<PaymentInitiation, ServiceError> {
        let new_payment = NewPayment {
            payer_id: user.id,
            payee_id: None,
            project_id: None,
            job_id: None,
            amount: validate_amount(amount_naira)?,
            payment_type: PaymentType::Topup,
            reference: generate_payment_reference(PaymentType::Topup, user.id),
            description: "Wallet topup".to_string(),
        };

        self.initialize(user, new_payment).await
    }

    pub async fn initialize_job_verification(
        &self,
        user: &User,
        job_id: Uuid,
        amount_naira: f64,
    ) -> Result<PaymentInitiation, ServiceError> {
        let new_payment = NewPayment {
            payer_id: user.id,
            payee_id: None,
            project_id: None,
            job_id: Some(job_id),
            amount: validate_amount(amount_naira)?,
            payment_type: PaymentType::JobVerification,
            reference: generate_payment_reference(PaymentType::JobVerification, user.id),
            description: format!("Job verification payment for job {}", job_id),
        };

        self.initialize(user, new_payment).await
    }

    pub async fn initialize_project_payment(
        &self,
        user: &User,
        project_id: Uuid,
        payee_id: Uuid,
        amount_naira: f64,
    ) -> Result<PaymentInitiation, ServiceError> {
        if payee_id == user.id {
            return Err(ServiceError::Validation(
                "Payee must be a different user".to_string(),
            ));
        }

        let new_payment = NewPayment {
            payer_id: user.id,
            payee_id: Some(payee_id),
            project_id: Some(project_id),
            job_id: None,
            amount: validate_amount(amount_naira)?,
            payment_type: PaymentType::ProjectPayment,
            reference: generate_payment_reference(PaymentType::ProjectPayment, user.id),
            description: format!("Payment for project {}", project_id),
        };

        self.initialize(user, new_payment).await
    }

    async fn initialize(
        &self,
        user: &User,
        new_payment: NewPayment,
    ) -> Result<PaymentInitiation, ServiceError> {
        if !user.has_valid_contact() {
            return Err(ServiceError::InvalidContact);
        }

        let payment = self.db_client.create_payment(new_payment).await?;

        let metadata = serde_json::json!({
            "payment_id": payment.id,
            "payer_id": payment.payer_id,
            "payee_id": payment.payee_id,
            "project_id": payment.project_id,
            "job_id": payment.job_id,
            "type": payment.payment_type.to_str(),
        });

        let init = self
            .gateway
            .initialize_payment(
                &user.email,
                payment.amount_in_naira(),
                &payment.reference,
                Some(metadata),
            )
            .await?;

        tracing::info!(
            reference = %payment.reference,
            payment_type = payment.payment_type.to_str(),
            amount = payment.amount,
            "payment initialized"
        );

        Ok(PaymentInitiation {
            payment_id: payment.id,
            reference: payment.reference,
            authorization_url: init.authorization_url,
        })
    }

    /// Idempotent settlement. A payment that already left `pending` is
    /// returned unchanged; a gateway failure leaves the record untouched so
    /// the client can retry verification.
    pub async fn verify_and_settle(
        &self,
        reference: &str,
        transaction_id: Option<&str>,
    ) -> Result<Payment, ServiceError> {
        let payment = self
            .db_client
            .get_payment_by_reference(reference)
            .await?
            .ok_or(ServiceError::NotFound("Payment"))?;

        if payment.status != PaymentStatus::Pending {
            return Ok(payment);
        }

        let verification = self.gateway.verify_payment(reference, transaction_id).await?;

        match verification.status {
            ChargeStatus::Successful => {
                if verification.amount_kobo < payment.amount {
                    tracing::warn!(
                        reference = %payment.reference,
                        expected = payment.amount,
                        verified = verification.amount_kobo,
                        "verified amount below ledger amount"
                    );
                    return Err(ServiceError::Validation(
                        "Payment amount mismatch".to_string(),
                    ));
                }

                let outcome = self
                    .db_client
                    .settle_payment(&payment, &verification.provider_reference)
                    .await?;

                let settled = match outcome {
                    SettleOutcome::Applied(settled) => {
                        if settled.payment_type == PaymentType::JobVerification {
                            // The job service flips the job to active off this
                            // record; nothing to mutate locally.
                            tracing::info!(
                                reference = %settled.reference,
                                job_id = ?settled.job_id,
                                "job verification payment settled"
                            );
                        }
                        settled
                    }
                    SettleOutcome::AlreadySettled(current) => current,
                };

                Ok(settled)
            }
            ChargeStatus::Failed => {
                let failed = self.db_client.fail_payment(payment.id).await?;
                Ok(failed)
            }
            ChargeStatus::Pending => Err(ServiceError::VerificationPending),
        }
    }

    /// Releases held funds to the payee. Only the paying client may release;
    /// repeating a release is a no-op success.
    pub async fn release(&self, payment_id: Uuid, actor: &User) -> Result<Payment, ServiceError> {
        self.transition(payment_id, actor, EscrowAction::Release).await
    }

    /// Refunds held funds to the payer. Mutually exclusive with release.
    pub async fn refund(&self, payment_id: Uuid, actor: &User) -> Result<Payment, ServiceError> {
        self.transition(payment_id, actor, EscrowAction::Refund).await
    }

    async fn transition(
        &self,
        payment_id: Uuid,
        actor: &User,
        action: EscrowAction,
    ) -> Result<Payment, ServiceError> {
        let payment = self
            .db_client
            .get_payment(payment_id)
            .await?
            .ok_or(ServiceError::NotFound("Payment"))?;

        if payment.payer_id != actor.id && !actor.is_admin() {
            return Err(ServiceError::Unauthorized);
        }

        if payment.payment_type != PaymentType::ProjectPayment {
            return Err(ServiceError::Validation(
                "Only project payments carry escrow".to_string(),
            ));
        }

        match plan_transition(payment.escrow_status, action) {
            EscrowPlan::AlreadySettled => return Ok(payment),
            EscrowPlan::Invalid => {
                return Err(ServiceError::InvalidEscrowTransition(format!(
                    "cannot {} a payment in escrow state `{}`",
                    action.to_str(),
                    payment.escrow_status.to_str(),
                )))
            }
            EscrowPlan::Apply => {}
        }

        let outcome = match action {
            EscrowAction::Release => self.db_client.release_escrow(&payment).await?,
            EscrowAction::Refund => self.db_client.refund_escrow(&payment).await?,
        };

        match outcome {
            EscrowTransitionOutcome::Applied { payment, wallet } => {
                tracing::info!(
                    reference = %payment.reference,
                    action = action.to_str(),
                    payee_escrow = wallet.escrow_balance,
                    payee_available = wallet.available_balance,
                    "escrow transition applied"
                );

                if action == EscrowAction::Release {
                    self.notify_payee_released(&payment).await;
                }

                Ok(payment)
            }
            // A concurrent call moved the row first; re-plan against what it
            // became so a raced repeat-release still reads as success.
            EscrowTransitionOutcome::Conflict(current) => {
                match plan_transition(current.escrow_status, action) {
                    EscrowPlan::AlreadySettled => Ok(current),
                    _ => Err(ServiceError::InvalidEscrowTransition(format!(
                        "cannot {} a payment in escrow state `{}`",
                        action.to_str(),
                        current.escrow_status.to_str(),
                    ))),
                }
            }
            EscrowTransitionOutcome::InsufficientEscrow { requested, held } => {
                Err(ServiceError::InsufficientEscrow { requested, held })
            }
        }
    }

    async fn notify_payee_released(&self, payment: &Payment) {
        let Some(payee_id) = payment.payee_id else {
            return;
        };

        let payee = match self.db_client.get_user(payee_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(error = %err, "could not load payee for release mail");
                return;
            }
        };

        if let Err(err) = send_payment_received_email(
            &payee.email,
            &payee.name,
            payment.amount_in_naira(),
            &payment.currency,
        )
        .await
        {
            tracing::warn!(error = %err, "failed to send release email");
        }
    }

    pub async fn wallet_balance(&self, user_id: Uuid) -> Result<WalletSummary, ServiceError> {
        Ok(self.db_client.wallet_summary(user_id).await?)
    }

    pub async fn history(
        &self,
        user_id: Uuid,
        status: Option<PaymentStatus>,
        payment_type: Option<PaymentType>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Payment>, ServiceError> {
        Ok(self
            .db_client
            .payments_for_user(user_id, status, payment_type, limit, offset)
            .await?)
    }

    pub async fn all_payments(
        &self,
        status: Option<PaymentStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Payment>, ServiceError> {
        Ok(self.db_client.all_payments(status, limit, offset).await?)
    }
}

fn validate_amount(amount_naira: f64) -> Result<i64, ServiceError> {
    if !amount_naira.is_finite() || amount_naira <= 0.0 {
        return Err(ServiceError::Validation(
            "Amount must be greater than zero".to_string(),
        ));
    }

    Ok(naira_to_kobo(amount_naira))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use sqlx::PgPool;

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/connecta".to_string(),
            app_url: "http://localhost:5173".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_maxage: 3600,
            port: 8000,
            paystack_secret_key: "sk_test".to_string(),
            flutterwave_secret_key: "flw_test".to_string(),
            active_payment_provider: "flutterwave".to_string(),
            gateway_timeout_secs: 5,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: "".to_string(),
            smtp_password: "".to_string(),
            mail_from: "Connecta <noreply@connecta.app>".to_string(),
        }
    }

    #[tokio::test]
    async fn payment_service_wiring_compiles() {
        let pool = PgPool::connect_lazy("postgres://localhost/connecta").unwrap();
        let db_client = Arc::new(DBClient::new(pool));
        let gateway = Arc::new(PaymentGatewayService::new(&test_config()));
        let svc = PaymentService::new(db_client, gateway);

        let _ = svc.wallet_balance(Uuid::nil());
    }

    #[test]
    fn rejects_non_positive_amounts() {
        assert!(validate_amount(0.0).is_err());
        assert!(validate_amount(-10.0).is_err());
        assert!(validate_amount(f64::NAN).is_err());
        assert!(validate_amount(f64::INFINITY).is_err());
    }

    #[test]
    fn converts_valid_amounts_to_kobo() {
        assert_eq!(validate_amount(5000.0).unwrap(), 500_000);
        assert_eq!(validate_amount(0.01).unwrap(), 1);
    }
}
