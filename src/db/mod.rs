pub mod db;
pub mod paymentdb;
pub mod subscriptiondb;
pub mod userdb;
pub mod walletdb;
pub mod withdrawaldb;
