// service/payment_gateway.rs
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

/// A gateway failure means the payment outcome is UNKNOWN, not failed.
/// Callers must leave their local records untouched and retry later; only an
/// explicit `Failed` charge status from the provider marks a payment failed.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payment provider rejected the request: {0}")]
    Provider(String),

    #[error("unknown payment provider `{0}`")]
    UnknownProvider(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChargeStatus {
    Successful,
    Failed,
    /// The provider has seen the charge but not settled it yet.
    Pending,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentInit {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug)]
pub struct GatewayVerification {
    pub status: ChargeStatus,
    pub amount_kobo: i64,
    pub currency: String,
    pub provider_reference: String,
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransferInit {
    pub reference: String,
    pub transfer_code: String,
    pub status: String,
}

pub struct PaymentGatewayService {
    client: reqwest::Client,
    paystack_secret_key: String,
    flutterwave_secret_key: String,
    active_provider: String,
}

impl PaymentGatewayService {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.gateway_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            paystack_secret_key: config.paystack_secret_key.clone(),
            flutterwave_secret_key: config.flutterwave_secret_key.clone(),
            active_provider: config.active_payment_provider.clone(),
        }
    }

    pub async fn initialize_payment(
        &self,
        email: &str,
        amount_naira: f64,
        reference: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<PaymentInit, GatewayError> {
        match self.active_provider.as_str() {
            "paystack" => {
                self.paystack_initialize_payment(email, amount_naira, reference, metadata)
                    .await
            }
            "flutterwave" => {
                self.flutterwave_initialize_payment(email, amount_naira, reference, metadata)
                    .await
            }
            other => Err(GatewayError::UnknownProvider(other.to_string())),
        }
    }

    /// Verifies a charge. `transaction_id` is the provider-side id handed to
    /// the client callback (Flutterwave verifies by it); `reference` is our
    /// correlation reference.
    pub async fn verify_payment(
        &self,
        reference: &str,
        transaction_id: Option<&str>,
    ) -> Result<GatewayVerification, GatewayError> {
        match self.active_provider.as_str() {
            "paystack" => self.paystack_verify_payment(reference).await,
            "flutterwave" => self.flutterwave_verify_payment(reference, transaction_id).await,
            other => Err(GatewayError::UnknownProvider(other.to_string())),
        }
    }

    pub async fn initiate_transfer(
        &self,
        account_number: &str,
        bank_code: &str,
        amount_naira: f64,
        reference: &str,
        narration: &str,
    ) -> Result<TransferInit, GatewayError> {
        match self.active_provider.as_str() {
            "paystack" => {
                self.paystack_initiate_transfer(account_number, bank_code, amount_naira, reference, narration)
                    .await
            }
            "flutterwave" => {
                self.flutterwave_initiate_transfer(account_number, bank_code, amount_naira, reference, narration)
                    .await
            }
            other => Err(GatewayError::UnknownProvider(other.to_string())),
        }
    }

    // Paystack: Initialize payment
    async fn paystack_initialize_payment(
        &self,
        email: &str,
        amount_naira: f64,
        reference: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<PaymentInit, GatewayError> {
        let amount_kobo = (amount_naira * 100.0).round() as i64;

        let payload = serde_json::json!({
            "email": email,
            "amount": amount_kobo,
            "reference": reference,
            "currency": "NGN",
            "metadata": metadata.unwrap_or(serde_json::json!({})),
            "channels": ["card", "bank", "ussd", "qr", "mobile_money", "bank_transfer"]
        });

        let response = self
            .client
            .post("https://api.paystack.co/transaction/initialize")
            .header("Authorization", format!("Bearer {}", self.paystack_secret_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let body: serde_json::Value = response.json().await?;

        if body["status"].as_bool().unwrap_or(false) {
            let data = &body["data"];
            Ok(PaymentInit {
                authorization_url: data["authorization_url"].as_str().unwrap_or("").to_string(),
                access_code: data["access_code"].as_str().unwrap_or("").to_string(),
                reference: data["reference"].as_str().unwrap_or(reference).to_string(),
            })
        } else {
            Err(GatewayError::Provider(
                body["message"]
                    .as_str()
                    .unwrap_or("Payment initialization failed")
                    .to_string(),
            ))
        }
    }

    // Flutterwave: Initialize payment
    async fn flutterwave_initialize_payment(
        &self,
        email: &str,
        amount_naira: f64,
        reference: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<PaymentInit, GatewayError> {
        let payload = serde_json::json!({
            "tx_ref": reference,
            "amount": amount_naira,
            "currency": "NGN",
            "redirect_url": std::env::var("FLUTTERWAVE_REDIRECT_URL").unwrap_or_default(),
            "payment_options": "card,banktransfer,ussd,account",
            "customer": {
                "email": email,
            },
            "customizations": {
                "title": "Connecta",
                "description": "Connecta payment",
            },
            "meta": metadata.unwrap_or(serde_json::json!({}))
        });

        let response = self
            .client
            .post("https://api.flutterwave.com/v3/payments")
            .header("Authorization", format!("Bearer {}", self.flutterwave_secret_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let body: serde_json::Value = response.json().await?;

        if body["status"].as_str() == Some("success") {
            let data = &body["data"];
            Ok(PaymentInit {
                authorization_url: data["link"].as_str().unwrap_or("").to_string(),
                access_code: "".to_string(),
                reference: reference.to_string(),
            })
        } else {
            Err(GatewayError::Provider(
                body["message"]
                    .as_str()
                    .unwrap_or("Payment initialization failed")
                    .to_string(),
            ))
        }
    }

    // Paystack: Verify payment
    async fn paystack_verify_payment(
        &self,
        reference: &str,
    ) -> Result<GatewayVerification, GatewayError> {
        let url = format!("https://api.paystack.co/transaction/verify/{}", reference);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.paystack_secret_key))
            .send()
            .await?;

        let body: serde_json::Value = response.json().await?;

        if !body["status"].as_bool().unwrap_or(false) {
            return Err(GatewayError::Provider(
                body["message"].as_str().unwrap_or("Verification failed").to_string(),
            ));
        }

        let data = &body["data"];
        Ok(GatewayVerification {
            status: parse_paystack_charge_status(data["status"].as_str().unwrap_or("")),
            amount_kobo: data["amount"].as_i64().unwrap_or(0),
            currency: data["currency"].as_str().unwrap_or("NGN").to_string(),
            provider_reference: data["id"]
                .as_i64()
                .map(|id| id.to_string())
                .unwrap_or_else(|| data["reference"].as_str().unwrap_or("").to_string()),
            meta: data.get("metadata").cloned(),
        })
    }

    // Flutterwave: Verify payment
    async fn flutterwave_verify_payment(
        &self,
        reference: &str,
        transaction_id: Option<&str>,
    ) -> Result<GatewayVerification, GatewayError> {
        // Flutterwave settles lookups fastest by numeric transaction id; the
        // tx_ref endpoint covers callbacks that only carried our reference.
        let url = match transaction_id {
            Some(id) => format!("https://api.flutterwave.com/v3/transactions/{}/verify", id),
            None => format!(
                "https://api.flutterwave.com/v3/transactions/verify_by_reference?tx_ref={}",
                reference
            ),
        };

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.flutterwave_secret_key))
            .send()
            .await?;

        let body: serde_json::Value = response.json().await?;

        if body["status"].as_str() != Some("success") {
            return Err(GatewayError::Provider(
                body["message"].as_str().unwrap_or("Verification failed").to_string(),
            ));
        }

        let data = &body["data"];
        let amount_naira = data["amount"].as_f64().unwrap_or(0.0);

        Ok(GatewayVerification {
            status: parse_flutterwave_charge_status(data["status"].as_str().unwrap_or("")),
            amount_kobo: (amount_naira * 100.0).round() as i64,
            currency: data["currency"].as_str().unwrap_or("NGN").to_string(),
            provider_reference: data["id"]
                .as_i64()
                .map(|id| id.to_string())
                .unwrap_or_else(|| data["flw_ref"].as_str().unwrap_or("").to_string()),
            meta: data.get("meta").cloned(),
        })
    }

    // Paystack: Create transfer recipient and initiate transfer
    async fn paystack_initiate_transfer(
        &self,
        account_number: &str,
        bank_code: &str,
        amount_naira: f64,
        reference: &str,
        narration: &str,
    ) -> Result<TransferInit, GatewayError> {
        let recipient_payload = serde_json::json!({
            "type": "nuban",
            "name": "Recipient",
            "account_number": account_number,
            "bank_code": bank_code,
            "currency": "NGN"
        });

        let recipient_response = self
            .client
            .post("https://api.paystack.co/transferrecipient")
            .header("Authorization", format!("Bearer {}", self.paystack_secret_key))
            .header("Content-Type", "application/json")
            .json(&recipient_payload)
            .send()
            .await?;

        let recipient_body: serde_json::Value = recipient_response.json().await?;

        if !recipient_body["status"].as_bool().unwrap_or(false) {
            return Err(GatewayError::Provider(
                "Failed to create transfer recipient".to_string(),
            ));
        }

        let recipient_code = recipient_body["data"]["recipient_code"]
            .as_str()
            .ok_or_else(|| GatewayError::Provider("Missing recipient code".to_string()))?;

        let amount_kobo = (amount_naira * 100.0).round() as i64;
        let transfer_payload = serde_json::json!({
            "source": "balance",
            "amount": amount_kobo,
            "reference": reference,
            "recipient": recipient_code,
            "reason": narration
        });

        let transfer_response = self
            .client
            .post("https://api.paystack.co/transfer")
            .header("Authorization", format!("Bearer {}", self.paystack_secret_key))
            .header("Content-Type", "application/json")
            .json(&transfer_payload)
            .send()
            .await?;

        let transfer_body: serde_json::Value = transfer_response.json().await?;

        if transfer_body["status"].as_bool().unwrap_or(false) {
            let data = &transfer_body["data"];
            Ok(TransferInit {
                reference: data["reference"].as_str().unwrap_or(reference).to_string(),
                transfer_code: data["transfer_code"].as_str().unwrap_or("").to_string(),
                status: data["status"].as_str().unwrap_or("pending").to_string(),
            })
        } else {
            Err(GatewayError::Provider(
                transfer_body["message"]
                    .as_str()
                    .unwrap_or("Transfer failed")
                    .to_string(),
            ))
        }
    }

    // Flutterwave: Initiate transfer
    async fn flutterwave_initiate_transfer(
        &self,
        account_number: &str,
        bank_code: &str,
        amount_naira: f64,
        reference: &str,
        narration: &str,
    ) -> Result<TransferInit, GatewayError> {
        let payload = serde_json::json!({
            "account_bank": bank_code,
            "account_number": account_number,
            "amount": amount_naira,
            "narration": narration,
            "currency": "NGN",
            "reference": reference,
            "debit_currency": "NGN"
        });

        let response = self
            .client
            .post("https://api.flutterwave.com/v3/transfers")
            .header("Authorization", format!("Bearer {}", self.flutterwave_secret_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let body: serde_json::Value = response.json().await?;

        if body["status"].as_str() == Some("success") {
            let data = &body["data"];
            Ok(TransferInit {
                reference: data["reference"].as_str().unwrap_or(reference).to_string(),
                transfer_code: data["id"].as_i64().unwrap_or(0).to_string(),
                status: data["status"].as_str().unwrap_or("pending").to_string(),
            })
        } else {
            Err(GatewayError::Provider(
                body["message"].as_str().unwrap_or("Transfer failed").to_string(),
            ))
        }
    }
}

fn parse_paystack_charge_status(status: &str) -> ChargeStatus {
    match status {
        "success" => ChargeStatus::Successful,
        "failed" | "abandoned" | "reversed" => ChargeStatus::Failed,
        _ => ChargeStatus::Pending,
    }
}

fn parse_flutterwave_charge_status(status: &str) -> ChargeStatus {
    match status {
        "successful" => ChargeStatus::Successful,
        "failed" => ChargeStatus::Failed,
        _ => ChargeStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paystack_statuses_map_conservatively() {
        assert_eq!(parse_paystack_charge_status("success"), ChargeStatus::Successful);
        assert_eq!(parse_paystack_charge_status("failed"), ChargeStatus::Failed);
        assert_eq!(parse_paystack_charge_status("abandoned"), ChargeStatus::Failed);
        // Anything unrecognized is treated as still settling, never as failed.
        assert_eq!(parse_paystack_charge_status("ongoing"), ChargeStatus::Pending);
        assert_eq!(parse_paystack_charge_status(""), ChargeStatus::Pending);
    }

    #[test]
    fn flutterwave_statuses_map_conservatively() {
        assert_eq!(
            parse_flutterwave_charge_status("successful"),
            ChargeStatus::Successful
        );
        assert_eq!(parse_flutterwave_charge_status("failed"), ChargeStatus::Failed);
        assert_eq!(parse_flutterwave_charge_status("pending"), ChargeStatus::Pending);
    }
}
