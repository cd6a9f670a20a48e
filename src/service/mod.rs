pub mod error;
pub mod escrow;
pub mod payment_gateway;
pub mod payment_service;
pub mod subscription_service;
pub mod withdrawal_service;
