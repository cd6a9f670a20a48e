// handler/subscriptions.rs
use std::sync::Arc;

use axum::{extract::Query, response::IntoResponse, Extension, Json};
use validator::Validate;

use crate::{
    dtos::paymentdtos::ApiResponse,
    dtos::subscriptiondtos::*,
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub async fn list_plans() -> impl IntoResponse {
    use crate::models::subscriptionmodels::SubscriptionTier;
    use crate::utils::currency::kobo_to_naira;

    let plans: Vec<serde_json::Value> = [
        SubscriptionTier::Free,
        SubscriptionTier::Premium,
        SubscriptionTier::Enterprise,
    ]
    .iter()
    .map(|tier| {
        serde_json::json!({
            "tier": tier.to_str(),
            "monthly_price": kobo_to_naira(tier.monthly_price_kobo()),
            "currency": "NGN",
            "benefits": tier.benefits(),
        })
    })
    .collect();

    Json(ApiResponse::success("Plans retrieved", plans))
}

pub async fn get_my_subscription(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let entitlement = app_state
        .subscription_service
        .entitlement(auth.user.id)
        .await?;

    let response: EntitlementResponseDto = entitlement.into();
    Ok(Json(ApiResponse::success("Subscription retrieved", response)))
}

pub async fn initialize_upgrade(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<UpgradeRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let init = app_state
        .subscription_service
        .initialize_upgrade(&auth.user, body.tier, body.duration_months.unwrap_or(1))
        .await?;

    Ok(Json(ApiResponse::success(
        "Subscription upgrade initialized",
        serde_json::json!({
            "reference": init.reference,
            "authorization_url": init.authorization_url,
        }),
    )))
}

pub async fn verify_upgrade(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<VerifyUpgradeRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    let reference = body
        .reference()
        .ok_or_else(|| HttpError::bad_request("Missing transaction reference"))?;

    let entitlement = app_state
        .subscription_service
        .verify_upgrade(&auth.user, reference)
        .await?;

    let response: EntitlementResponseDto = entitlement.into();
    Ok(Json(ApiResponse::success(
        "Subscription upgraded successfully",
        response,
    )))
}

pub async fn cancel_subscription(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let entitlement = app_state.subscription_service.cancel(auth.user.id).await?;

    let response: EntitlementResponseDto = entitlement.into();
    Ok(Json(ApiResponse::success(
        "Subscription cancelled. You will retain access until your expiry date.",
        response,
    )))
}

pub async fn admin_list_subscriptions(
    Query(params): Query<SubscriptionListQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(_auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    params
        .validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let subscriptions = app_state
        .subscription_service
        .all_subscriptions(params.status, params.limit.unwrap_or(100))
        .await?;

    let response: Vec<SubscriptionResponseDto> =
        subscriptions.into_iter().map(|s| s.into()).collect();
    Ok(Json(ApiResponse::success("Subscriptions retrieved", response)))
}
