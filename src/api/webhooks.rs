//! Payment provider webhook. Signature checks happen upstream of this service.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use super::{error::ApiError, AppState};
use crate::orders::WebhookEvent;

pub async fn payment(State(s): State<AppState>, Json(event): Json<WebhookEvent>) -> Result<Json<Value>, ApiError> {
    let outcome = s.orders.handle_event(event).await?;
    Ok(Json(match outcome {
        Some(m) => json!({ "received": true, "created": m.created, "order": m.order }),
        None => json!({ "received": true }),
    }))
}
