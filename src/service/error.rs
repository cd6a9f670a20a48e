use axum::http::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::error::HttpError;
use crate::service::payment_gateway::GatewayError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("A valid contact email is required. Please update your profile.")]
    InvalidContact,

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Payment has not settled at the provider yet. Retry verification later.")]
    VerificationPending,

    #[error("Insufficient available balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: i64, available: i64 },

    #[error("Insufficient escrow balance: requested {requested}, held {held}")]
    InsufficientEscrow { requested: i64, held: i64 },

    #[error("Invalid escrow transition: {0}")]
    InvalidEscrowTransition(String),

    #[error("Withdrawal {0} is not in a processable state")]
    InvalidWithdrawalState(Uuid),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("You are not authorized to perform this action")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_)
            | ServiceError::InvalidContact
            | ServiceError::InvalidEscrowTransition(_)
            | ServiceError::InvalidWithdrawalState(_) => StatusCode::BAD_REQUEST,

            // Outcome unknown at the provider: the caller should retry, no
            // local state was changed.
            ServiceError::Gateway(_) => StatusCode::BAD_GATEWAY,
            ServiceError::VerificationPending => StatusCode::CONFLICT,

            ServiceError::InsufficientBalance { .. }
            | ServiceError::InsufficientEscrow { .. } => StatusCode::PAYMENT_REQUIRED,

            ServiceError::Unauthorized => StatusCode::FORBIDDEN,

            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,

            ServiceError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match &error {
            ServiceError::NotFound(_) => HttpError::not_found(error.to_string()),

            ServiceError::Gateway(_) => HttpError::bad_gateway(error.to_string()),
            ServiceError::VerificationPending => HttpError::conflict(error.to_string()),

            ServiceError::InsufficientBalance { .. }
            | ServiceError::InsufficientEscrow { .. } => {
                HttpError::payment_required(error.to_string())
            }

            ServiceError::Unauthorized => HttpError::forbidden(error.to_string()),

            ServiceError::Database(_) => HttpError::server_error(error.to_string()),

            ServiceError::Validation(_)
            | ServiceError::InvalidContact
            | ServiceError::InvalidEscrowTransition(_)
            | ServiceError::InvalidWithdrawalState(_) => HttpError::bad_request(error.to_string()),
        }
    }
}
