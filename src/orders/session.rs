//! Completed checkout sessions as delivered by the payment provider's webhook.

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::collections::HashMap;

use super::OrderError;
use crate::domain::value_objects::minor_to_major;
use crate::domain::{Address, LineItem, PaidCheckout, UserId};

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";

/// Webhook envelope: `{type, data: {object}}`.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Minor currency units.
    pub amount_total: i64,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl CheckoutSession {
    /// Decodes the JSON-encoded metadata into a checkout ready to become an order.
    ///
    /// Fails with [`OrderError::InvalidOrderData`] before anything is parsed when
    /// `userId` or `products` is absent.
    pub fn to_paid_checkout(&self) -> Result<PaidCheckout, OrderError> {
        let raw_user = self.metadata.get("userId").filter(|v| !v.is_null());
        let raw_products = self.metadata.get("products").filter(|v| !v.is_null());
        let (Some(raw_user), Some(raw_products)) = (raw_user, raw_products) else {
            return Err(OrderError::InvalidOrderData("metadata must include userId and products".into()));
        };

        let user_id = decode_user_id(raw_user)?;
        let products: Vec<LineItem> = decode_field("products", raw_products)?;
        let shipping_address: Option<Address> = match self.metadata.get("shippingAddress").filter(|v| !v.is_null()) {
            Some(raw) => Some(decode_field("shippingAddress", raw)?),
            None => None,
        };

        if products.is_empty() {
            return Err(OrderError::InvalidOrderData("order has no products".into()));
        }
        if let Some(line) = products.iter().find(|l| l.quantity == 0) {
            return Err(OrderError::InvalidOrderData(format!("product {} has zero quantity", line.product_id)));
        }

        Ok(PaidCheckout {
            user_id,
            products,
            total_amount: minor_to_major(self.amount_total),
            currency: self.currency.clone(),
            shipping_address,
            payment_session_id: self.id.clone(),
            payment_intent_id: self.payment_intent.clone(),
        })
    }
}

/// A succeeded payment intent, as opened by the cart's create-payment-intent endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SucceededIntent {
    pub id: String,
    /// Minor currency units.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl SucceededIntent {
    /// Intents opened elsewhere (for instance by a hosted checkout) carry no cart lines.
    pub fn carries_cart(&self) -> bool {
        self.metadata.get("products").is_some_and(|v| !v.is_null())
    }
}

/// The intent id doubles as the de-duplication key.
impl From<SucceededIntent> for CheckoutSession {
    fn from(intent: SucceededIntent) -> Self {
        Self {
            id: intent.id.clone(),
            payment_intent: Some(intent.id),
            amount_total: intent.amount,
            currency: intent.currency,
            metadata: intent.metadata,
        }
    }
}

/// Metadata values arrive as JSON strings; structured values are accepted as-is.
fn decode_field<T: DeserializeOwned>(field: &'static str, raw: &Value) -> Result<T, OrderError> {
    let decoded = match raw {
        Value::String(encoded) => serde_json::from_str(encoded),
        other => serde_json::from_value(other.clone()),
    };
    decoded.map_err(|source| OrderError::MalformedMetadata { field, source })
}

/// `userId` may be a JSON-encoded string (`"\"u1\""`) or the bare id.
fn decode_user_id(raw: &Value) -> Result<UserId, OrderError> {
    let id = match raw {
        Value::String(s) => serde_json::from_str::<String>(s).unwrap_or_else(|_| s.clone()),
        other => decode_field::<String>("userId", other)?,
    };
    if id.trim().is_empty() {
        return Err(OrderError::InvalidOrderData("userId is empty".into()));
    }
    Ok(UserId::new(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn session(metadata: Value) -> CheckoutSession {
        serde_json::from_value(json!({
            "id": "cs_test_1",
            "payment_intent": "pi_1",
            "amount_total": 15000,
            "currency": "gbp",
            "metadata": metadata,
        }))
        .unwrap()
    }

    #[test]
    fn decodes_string_encoded_metadata() {
        let s = session(json!({
            "userId": "\"u1\"",
            "products": "[{\"productId\":\"p1\",\"quantity\":2}]",
            "shippingAddress": "{\"line1\":\"1 Harley St\",\"city\":\"London\"}",
        }));
        let checkout = s.to_paid_checkout().unwrap();
        assert_eq!(checkout.user_id, UserId::new("u1"));
        assert_eq!(checkout.products[0].quantity, 2);
        assert_eq!(checkout.total_amount, Decimal::new(150, 0));
        assert_eq!(checkout.shipping_address.unwrap().city.as_deref(), Some("London"));
    }

    #[test]
    fn bare_user_id_is_accepted() {
        let s = session(json!({"userId": "u1", "products": [{"productId": "p1", "quantity": 1}]}));
        assert_eq!(s.to_paid_checkout().unwrap().user_id, UserId::new("u1"));
    }

    #[test]
    fn missing_fields_are_invalid() {
        let s = session(json!({"products": "[]"}));
        assert!(matches!(s.to_paid_checkout(), Err(OrderError::InvalidOrderData(_))));
        let s = session(json!({"userId": "u1"}));
        assert!(matches!(s.to_paid_checkout(), Err(OrderError::InvalidOrderData(_))));
    }

    #[test]
    fn malformed_products_fail_to_parse() {
        let s = session(json!({"userId": "u1", "products": "[{oops"}));
        assert!(matches!(s.to_paid_checkout(), Err(OrderError::MalformedMetadata { field: "products", .. })));
    }
}
