pub mod paymentdtos;
pub mod subscriptiondtos;
