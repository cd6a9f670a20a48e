// routes.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    handler::{payments, subscriptions},
    middleware::{admin_only, auth},
    AppState,
};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Protected payment routes (require auth)
    let protected_payment_routes = Router::new()
        .route("/initialize-topup", post(payments::initialize_topup))
        .route("/job-verification", post(payments::initialize_job_verification))
        .route("/project-payment", post(payments::initialize_project_payment))
        .route("/verify/:reference", get(payments::verify_payment))
        .route("/:payment_id/release", post(payments::release_payment))
        .route("/:payment_id/refund", post(payments::refund_payment))
        .route("/wallet/balance", get(payments::get_wallet_balance))
        .route("/wallet/bank-details", post(payments::save_bank_details))
        .route("/history", get(payments::get_payment_history))
        .route("/withdrawal/request", post(payments::request_withdrawal))
        .route("/withdrawals", get(payments::get_my_withdrawals))
        .layer(middleware::from_fn(auth));

    // Admin payment routes (auth + elevated role)
    let admin_payment_routes = Router::new()
        .route("/withdrawal/:withdrawal_id/process", post(payments::process_withdrawal))
        .route("/admin/withdrawals", get(payments::admin_list_withdrawals))
        .route("/admin/payments", get(payments::admin_list_payments))
        .layer(middleware::from_fn(admin_only))
        .layer(middleware::from_fn(auth));

    // Public payment routes (gateway callbacks; signature-checked or
    // re-verified against the provider, never trusted blindly)
    let public_payment_routes = Router::new()
        .route("/callback", get(payments::payment_callback))
        .route("/webhook/paystack", post(payments::paystack_webhook))
        .route("/webhook/flutterwave", post(payments::flutterwave_webhook));

    let payment_routes = Router::new()
        .merge(protected_payment_routes)
        .merge(admin_payment_routes)
        .merge(public_payment_routes);

    let protected_subscription_routes = Router::new()
        .route("/me", get(subscriptions::get_my_subscription))
        .route("/initialize-upgrade", post(subscriptions::initialize_upgrade))
        .route("/verify-upgrade", post(subscriptions::verify_upgrade))
        .route("/cancel", post(subscriptions::cancel_subscription))
        .layer(middleware::from_fn(auth));

    let admin_subscription_routes = Router::new()
        .route("/admin/all", get(subscriptions::admin_list_subscriptions))
        .layer(middleware::from_fn(admin_only))
        .layer(middleware::from_fn(auth));

    let subscription_routes = Router::new()
        .route("/plans", get(subscriptions::list_plans))
        .merge(protected_subscription_routes)
        .merge(admin_subscription_routes);

    let api_route = Router::new()
        .nest("/payments", payment_routes)
        .nest("/subscriptions", subscription_routes)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(app_state));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_route)
}
