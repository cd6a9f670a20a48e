// handler/payments.rs
use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha512;
use subtle::ConstantTimeEq;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{walletdb::WalletExt, withdrawaldb::WithdrawalExt},
    dtos::paymentdtos::*,
    error::HttpError,
    middleware::JWTAuthMiddeware,
    models::paymentmodels::BankDetails,
    AppState,
};

// Payment initialization

pub async fn initialize_topup(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<TopupRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let initiation = app_state
        .payment_service
        .initialize_topup(&auth.user, body.amount)
        .await?;

    Ok(Json(ApiResponse::success(
        "Topup payment initialized",
        initiation,
    )))
}

pub async fn initialize_job_verification(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<JobVerificationRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let initiation = app_state
        .payment_service
        .initialize_job_verification(&auth.user, body.job_id, body.amount)
        .await?;

    Ok(Json(ApiResponse::success(
        "Job verification payment initialized",
        initiation,
    )))
}

pub async fn initialize_project_payment(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<ProjectPaymentRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let initiation = app_state
        .payment_service
        .initialize_project_payment(&auth.user, body.project_id, body.payee_id, body.amount)
        .await?;

    Ok(Json(ApiResponse::success(
        "Project payment initialized",
        initiation,
    )))
}

// Verification

pub async fn verify_payment(
    Path(reference): Path<String>,
    Query(params): Query<VerifyPaymentQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(_auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let payment = app_state
        .payment_service
        .verify_and_settle(&reference, params.transaction_id.as_deref())
        .await?;

    let response: PaymentResponseDto = payment.into();
    Ok(Json(ApiResponse::success("Payment verified", response)))
}

/// Gateway redirect target for webview flows: verifies, then bounces the
/// client to the app's success or failure page.
pub async fn payment_callback(
    Query(params): Query<HashMap<String, String>>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let reference = params
        .get("tx_ref")
        .or_else(|| params.get("trxref"))
        .or_else(|| params.get("reference"))
        .ok_or_else(|| HttpError::bad_request("No reference provided"))?;

    let transaction_id = params.get("transaction_id").map(|s| s.as_str());

    tracing::info!(reference = %reference, "gateway redirect received");

    let app_url = &app_state.env.app_url;

    match app_state
        .payment_service
        .verify_and_settle(reference, transaction_id)
        .await
    {
        Ok(payment) => {
            let frontend_url = format!(
                "{}/payment/success?reference={}",
                app_url,
                urlencoding::encode(&payment.reference)
            );
            Ok(axum::response::Redirect::to(&frontend_url))
        }
        Err(err) => {
            let frontend_url = format!(
                "{}/payment/failed?reference={}&error={}",
                app_url,
                urlencoding::encode(reference),
                urlencoding::encode(&err.to_string())
            );
            Ok(axum::response::Redirect::to(&frontend_url))
        }
    }
}

// Escrow transitions

pub async fn release_payment(
    Path(payment_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let payment = app_state
        .payment_service
        .release(payment_id, &auth.user)
        .await?;

    let response: PaymentResponseDto = payment.into();
    Ok(Json(ApiResponse::success("Payment released", response)))
}

pub async fn refund_payment(
    Path(payment_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let payment = app_state
        .payment_service
        .refund(payment_id, &auth.user)
        .await?;

    let response: PaymentResponseDto = payment.into();
    Ok(Json(ApiResponse::success("Payment refunded", response)))
}

// Wallet

pub async fn get_wallet_balance(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let summary = app_state.payment_service.wallet_balance(auth.user.id).await?;

    let response: WalletBalanceDto = summary.into();
    Ok(Json(ApiResponse::success("Wallet balance retrieved", response)))
}

pub async fn save_bank_details(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<BankDetailsDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let details: BankDetails = body.into();
    let wallet = app_state
        .db_client
        .save_bank_details(auth.user.id, &details)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(
        "Withdrawal settings saved",
        wallet.bank_details(),
    )))
}

pub async fn get_payment_history(
    Query(params): Query<PaymentHistoryQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let payments = app_state
        .payment_service
        .history(
            auth.user.id,
            params.status,
            params.payment_type,
            params.limit.unwrap_or(20),
            params.offset.unwrap_or(0),
        )
        .await?;

    let response: Vec<PaymentResponseDto> = payments.into_iter().map(|p| p.into()).collect();
    Ok(Json(ApiResponse::success("Payment history retrieved", response)))
}

// Withdrawals

pub async fn request_withdrawal(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<WithdrawalRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let withdrawal = app_state
        .withdrawal_service
        .request_withdrawal(
            &auth.user,
            body.amount,
            body.bank_details.map(|d| d.into()),
        )
        .await?;

    let response: WithdrawalResponseDto = withdrawal.into();
    Ok(Json(ApiResponse::success(
        "Withdrawal request submitted",
        response,
    )))
}

pub async fn get_my_withdrawals(
    Query(params): Query<WithdrawalListQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let withdrawals = app_state
        .withdrawal_service
        .my_withdrawals(
            auth.user.id,
            params.limit.unwrap_or(20),
            params.offset.unwrap_or(0),
        )
        .await?;

    let response: Vec<WithdrawalResponseDto> =
        withdrawals.into_iter().map(|w| w.into()).collect();
    Ok(Json(ApiResponse::success("Withdrawals retrieved", response)))
}

pub async fn process_withdrawal(
    Path(withdrawal_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let withdrawal = app_state
        .withdrawal_service
        .process_withdrawal(withdrawal_id, &auth.user)
        .await?;

    let message = match withdrawal.status {
        crate::models::paymentmodels::WithdrawalStatus::Completed => "Withdrawal processed",
        crate::models::paymentmodels::WithdrawalStatus::Failed => {
            "Withdrawal failed, reserved funds returned"
        }
        _ => "Withdrawal updated",
    };

    let response: WithdrawalResponseDto = withdrawal.into();
    Ok(Json(ApiResponse::success(message, response)))
}

pub async fn admin_list_withdrawals(
    Query(params): Query<WithdrawalListQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(_auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let withdrawals = app_state
        .withdrawal_service
        .list_withdrawals(
            params.status,
            params.limit.unwrap_or(100),
            params.offset.unwrap_or(0),
        )
        .await?;

    let response: Vec<WithdrawalResponseDto> =
        withdrawals.into_iter().map(|w| w.into()).collect();
    Ok(Json(ApiResponse::success("Withdrawals retrieved", response)))
}

pub async fn admin_list_payments(
    Query(params): Query<PaymentHistoryQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(_auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let payments = app_state
        .payment_service
        .all_payments(
            params.status,
            params.limit.unwrap_or(100),
            params.offset.unwrap_or(0),
        )
        .await?;

    let response: Vec<PaymentResponseDto> = payments.into_iter().map(|p| p.into()).collect();
    Ok(Json(ApiResponse::success("Payments retrieved", response)))
}

// Webhooks

/// Paystack signs the raw payload with HMAC-SHA512 under the secret key.
fn verify_paystack_signature(payload: &Value, signature: &str, secret: &str) -> bool {
    let payload_string = payload.to_string();

    let mut mac = match Hmac::<Sha512>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload_string.as_bytes());

    let expected = hex::encode(mac.finalize().into_bytes());

    // Constant-time compare to prevent timing attacks.
    ConstantTimeEq::ct_eq(signature.as_bytes(), expected.as_bytes()).into()
}

pub async fn paystack_webhook(
    Extension(app_state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, HttpError> {
    let signature = headers
        .get("x-paystack-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            HttpError::new(
                "Missing or invalid Paystack signature",
                StatusCode::BAD_REQUEST,
            )
        })?;

    if !verify_paystack_signature(&body, signature, &app_state.env.paystack_secret_key) {
        tracing::warn!("Invalid Paystack webhook signature received");
        return Err(HttpError::new(
            "Invalid webhook signature",
            StatusCode::UNAUTHORIZED,
        ));
    }

    let event_type = body["event"]
        .as_str()
        .ok_or_else(|| HttpError::bad_request("Missing event type in webhook payload"))?;

    let data = &body["data"];

    match event_type {
        "charge.success" => {
            if let Some(reference) = data["reference"].as_str() {
                settle_from_webhook(&app_state, reference, None).await;
            }
        }
        "transfer.success" => {
            if let Some(reference) = data["reference"].as_str() {
                complete_withdrawal_from_webhook(&app_state, reference, data).await;
            }
        }
        "transfer.failed" | "transfer.reversed" => {
            if let Some(reference) = data["reference"].as_str() {
                fail_withdrawal_from_webhook(&app_state, reference, event_type).await;
            }
        }
        _ => {
            tracing::info!("Unhandled Paystack webhook event: {}", event_type);
        }
    }

    Ok(Json(serde_json::json!({"status": "success"})))
}

pub async fn flutterwave_webhook(
    Extension(app_state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, HttpError> {
    let signature = headers
        .get("verif-hash")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            HttpError::new(
                "Missing or invalid Flutterwave signature",
                StatusCode::BAD_REQUEST,
            )
        })?;

    let secret = &app_state.env.flutterwave_secret_key;
    if !bool::from(ConstantTimeEq::ct_eq(
        signature.as_bytes(),
        secret.as_bytes(),
    )) {
        tracing::warn!("Invalid Flutterwave webhook signature received");
        return Err(HttpError::new(
            "Invalid webhook signature",
            StatusCode::UNAUTHORIZED,
        ));
    }

    let event_type = body["event"]
        .as_str()
        .ok_or_else(|| HttpError::bad_request("Missing event type in webhook payload"))?;

    let data = &body["data"];

    match event_type {
        "charge.completed" => {
            if let Some(reference) = data["tx_ref"].as_str() {
                let transaction_id = data["id"].as_i64().map(|id| id.to_string());
                settle_from_webhook(&app_state, reference, transaction_id.as_deref()).await;
            }
        }
        "transfer.completed" => {
            if let Some(reference) = data["reference"].as_str() {
                complete_withdrawal_from_webhook(&app_state, reference, data).await;
            }
        }
        "transfer.failed" | "transfer.reversed" => {
            if let Some(reference) = data["reference"].as_str() {
                fail_withdrawal_from_webhook(&app_state, reference, event_type).await;
            }
        }
        _ => {
            tracing::info!("Unhandled Flutterwave webhook event: {}", event_type);
        }
    }

    Ok(Json(serde_json::json!({"status": "success"})))
}

/// Webhook settlement re-verifies against the provider rather than trusting
/// the pushed payload; `verify_and_settle` is idempotent so a webhook racing
/// the client's own verify call is harmless.
async fn settle_from_webhook(
    app_state: &Arc<AppState>,
    reference: &str,
    transaction_id: Option<&str>,
) {
    match app_state
        .payment_service
        .verify_and_settle(reference, transaction_id)
        .await
    {
        Ok(payment) => {
            tracing::info!(
                reference = %payment.reference,
                status = payment.status.to_str(),
                "webhook settlement processed"
            );
        }
        Err(err) => {
            tracing::warn!(reference = %reference, error = %err, "webhook settlement failed");
        }
    }
}

async fn complete_withdrawal_from_webhook(app_state: &Arc<AppState>, reference: &str, data: &Value) {
    let Some(withdrawal_id) = parse_withdrawal_reference(reference) else {
        tracing::info!(reference = %reference, "transfer webhook for unknown reference");
        return;
    };

    let provider_reference = data["id"]
        .as_i64()
        .map(|id| id.to_string())
        .or_else(|| data["transfer_code"].as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| reference.to_string());

    match app_state
        .db_client
        .complete_withdrawal(withdrawal_id, &provider_reference)
        .await
    {
        Ok(withdrawal) => {
            tracing::info!(withdrawal_id = %withdrawal.id, "withdrawal completed via webhook");
        }
        Err(err) => {
            // Usually a replay of an already-settled transfer.
            tracing::info!(withdrawal_id = %withdrawal_id, error = %err, "transfer webhook ignored");
        }
    }
}

async fn fail_withdrawal_from_webhook(app_state: &Arc<AppState>, reference: &str, event: &str) {
    let Some(withdrawal_id) = parse_withdrawal_reference(reference) else {
        tracing::info!(reference = %reference, "transfer webhook for unknown reference");
        return;
    };

    match app_state
        .db_client
        .fail_withdrawal_and_refund(withdrawal_id, event)
        .await
    {
        Ok(withdrawal) => {
            tracing::warn!(
                withdrawal_id = %withdrawal.id,
                event,
                "withdrawal failed via webhook, reserved funds returned"
            );
        }
        Err(err) => {
            tracing::info!(withdrawal_id = %withdrawal_id, error = %err, "transfer webhook ignored");
        }
    }
}

fn parse_withdrawal_reference(reference: &str) -> Option<Uuid> {
    reference
        .strip_prefix("WD_")
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paystack_signature_round_trip() {
        let payload = serde_json::json!({"event": "charge.success", "data": {"reference": "TOPUP_x_1"}});
        let secret = "sk_test_secret";

        let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload.to_string().as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        assert!(verify_paystack_signature(&payload, &signature, secret));
        assert!(!verify_paystack_signature(&payload, &signature, "other_secret"));
        assert!(!verify_paystack_signature(&payload, "deadbeef", secret));
    }

    #[test]
    fn withdrawal_reference_parses_only_own_format() {
        let id = Uuid::new_v4();
        assert_eq!(parse_withdrawal_reference(&format!("WD_{}", id)), Some(id));
        assert_eq!(parse_withdrawal_reference("TOPUP_abc_123"), None);
        assert_eq!(parse_withdrawal_reference("WD_not-a-uuid"), None);
    }
}
