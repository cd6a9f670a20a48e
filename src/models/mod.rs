pub mod paymentmodels;
pub mod subscriptionmodels;
pub mod usermodel;
