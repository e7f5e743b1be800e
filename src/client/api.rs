//! Remote cart API as seen from the client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::identity::AuthUser;
use crate::domain::{Cart, ProductId, UserId};

/// A failed remote call. `message` is the server's own explanation, when it gave one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("remote request failed (status {status:?}): {}", message.as_deref().unwrap_or("no message"))]
pub struct RemoteError {
    pub status: Option<u16>,
    pub message: Option<String>,
}

impl RemoteError {
    pub fn transport() -> Self { Self { status: None, message: None } }
    pub fn with_message(status: u16, message: impl Into<String>) -> Self { Self { status: Some(status), message: Some(message.into()) } }
}

#[async_trait]
pub trait CartApi: Send + Sync {
    async fn fetch_cart(&self, user: &AuthUser) -> Result<Cart, RemoteError>;
    async fn add_item(&self, user: &AuthUser, product_id: &ProductId, quantity: u32) -> Result<Cart, RemoteError>;
    async fn remove_item(&self, user: &AuthUser, product_id: &ProductId, quantity: u32) -> Result<Cart, RemoteError>;
    async fn clear_cart(&self, user: &AuthUser) -> Result<Cart, RemoteError>;
    async fn create_payment_intent(&self, user: &AuthUser, cart_id: &str) -> Result<Value, RemoteError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartRequest<'a> {
    pub user_id: &'a UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<&'a ProductId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart_id: Option<&'a str>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CartEnvelope {
    pub cart: Cart,
}

/// `reqwest` client for the storefront's `/api/cart*` endpoints.
#[derive(Clone)]
pub struct HttpCartApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCartApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into().trim_end_matches('/').to_string() }
    }

    async fn post<T: for<'de> Deserialize<'de>>(&self, path: &str, user: &AuthUser, body: &CartRequest<'_>) -> Result<T, RemoteError> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&user.token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(path, error = %e, "cart request did not complete");
                RemoteError::transport()
            })?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.json::<Value>().await.ok().and_then(|body| {
                body.get("error").or_else(|| body.get("message")).and_then(Value::as_str).map(str::to_string)
            });
            return Err(RemoteError { status: Some(status.as_u16()), message });
        }
        resp.json::<T>().await.map_err(|e| {
            warn!(path, error = %e, "cart response could not be decoded");
            RemoteError { status: Some(status.as_u16()), message: None }
        })
    }

    async fn post_cart(&self, path: &str, user: &AuthUser, body: CartRequest<'_>) -> Result<Cart, RemoteError> {
        self.post::<CartEnvelope>(path, user, &body).await.map(|envelope| envelope.cart)
    }
}

fn request(user: &AuthUser) -> CartRequest<'_> {
    CartRequest { user_id: &user.user_id, product_id: None, quantity: None, cart_id: None }
}

#[async_trait]
impl CartApi for HttpCartApi {
    async fn fetch_cart(&self, user: &AuthUser) -> Result<Cart, RemoteError> {
        self.post_cart("/api/cart", user, request(user)).await
    }

    async fn add_item(&self, user: &AuthUser, product_id: &ProductId, quantity: u32) -> Result<Cart, RemoteError> {
        let body = CartRequest { product_id: Some(product_id), quantity: Some(quantity), ..request(user) };
        self.post_cart("/api/cart", user, body).await
    }

    async fn remove_item(&self, user: &AuthUser, product_id: &ProductId, quantity: u32) -> Result<Cart, RemoteError> {
        let body = CartRequest { product_id: Some(product_id), quantity: Some(quantity), ..request(user) };
        self.post_cart("/api/cart/remove", user, body).await
    }

    async fn clear_cart(&self, user: &AuthUser) -> Result<Cart, RemoteError> {
        self.post_cart("/api/cart/clear", user, request(user)).await
    }

    async fn create_payment_intent(&self, user: &AuthUser, cart_id: &str) -> Result<Value, RemoteError> {
        let body = CartRequest { cart_id: Some(cart_id), ..request(user) };
        self.post::<Value>("/api/cart/create-payment-intent", user, &body).await
    }
}
