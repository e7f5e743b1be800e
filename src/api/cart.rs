//! `/api/cart*` handlers.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use super::{error::ApiError, AppState};
use crate::client::api::CartEnvelope;
use crate::domain::{ProductId, UserId};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CartRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    pub product_id: Option<String>,
    #[validate(range(min = 1))]
    pub quantity: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RemoveRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub product_id: String,
    #[validate(range(min = 1))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub cart_id: String,
}

/// Fetches the cart, or adds to it when `productId` is present.
pub async fn get_or_add(State(s): State<AppState>, Json(r): Json<CartRequest>) -> Result<Json<CartEnvelope>, ApiError> {
    r.validate()?;
    let user_id = UserId::new(r.user_id);
    let cart = match r.product_id {
        Some(product_id) => s.carts.add(&user_id, ProductId::new(product_id), r.quantity.unwrap_or(1)).await?,
        None => s.carts.cart(&user_id).await?,
    };
    Ok(Json(CartEnvelope { cart }))
}

pub async fn remove(State(s): State<AppState>, Json(r): Json<RemoveRequest>) -> Result<Json<CartEnvelope>, ApiError> {
    r.validate()?;
    let cart = s.carts.remove(&UserId::new(r.user_id), &ProductId::new(r.product_id), r.quantity).await?;
    Ok(Json(CartEnvelope { cart }))
}

pub async fn clear(State(s): State<AppState>, Json(r): Json<UserRequest>) -> Result<Json<CartEnvelope>, ApiError> {
    r.validate()?;
    let cart = s.carts.clear(&UserId::new(r.user_id)).await?;
    Ok(Json(CartEnvelope { cart }))
}

pub async fn create_payment_intent(State(s): State<AppState>, Json(r): Json<PaymentIntentRequest>) -> Result<Json<Value>, ApiError> {
    r.validate()?;
    let intent = s.carts.create_payment_intent(&UserId::new(r.user_id), &r.cart_id).await?;
    Ok(Json(intent))
}
