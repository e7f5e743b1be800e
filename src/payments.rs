//! Payment provider seam used to open payment intents for a cart.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

const DEFAULT_API_BASE: &str = "https://api.stripe.com";

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Provider { status: u16, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntentRequest {
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    pub metadata: HashMap<String, String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns the provider's intent payload untouched.
    async fn create_payment_intent(&self, request: PaymentIntentRequest) -> Result<Value, PaymentError>;
}

/// Stripe-compatible REST gateway (form-encoded, bearer secret key).
pub struct StripeGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>, api_base: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string()).trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }
}

fn form_fields(request: &PaymentIntentRequest) -> Vec<(String, String)> {
    let mut fields = vec![
        ("amount".to_string(), request.amount.to_string()),
        ("currency".to_string(), request.currency.clone()),
        ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
    ];
    let mut metadata: Vec<(&String, &String)> = request.metadata.iter().collect();
    metadata.sort();
    fields.extend(metadata.into_iter().map(|(k, v)| (format!("metadata[{k}]"), v.clone())));
    fields
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_payment_intent(&self, request: PaymentIntentRequest) -> Result<Value, PaymentError> {
        let resp = self
            .client
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form_fields(&request))
            .send()
            .await?;

        let status = resp.status();
        let body: Value = resp.json().await?;
        if !status.is_success() {
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("Failed to create payment intent")
                .to_string();
            return Err(PaymentError::Provider { status: status.as_u16(), message });
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_is_flattened_in_key_order() {
        let request = PaymentIntentRequest {
            amount: 15000,
            currency: "gbp".into(),
            metadata: HashMap::from([("userId".to_string(), "u1".to_string()), ("products".to_string(), "[]".to_string())]),
        };
        let fields = form_fields(&request);
        assert_eq!(fields[0], ("amount".to_string(), "15000".to_string()));
        assert_eq!(fields[3].0, "metadata[products]");
        assert_eq!(fields[4], ("metadata[userId]".to_string(), "u1".to_string()));
    }
}
