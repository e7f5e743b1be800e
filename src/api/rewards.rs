//! Referral reward administration endpoints.

use axum::{extract::{Query, State}, Json};
use serde::Deserialize;
use validator::Validate;

use super::{error::ApiError, AppState};
use crate::domain::{Reward, UserId};
use crate::rewards::RewardListing;

#[derive(Debug, Deserialize)]
pub struct ListParams { pub status: Option<String> }

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub appointment_id: String,
    pub status: String,
    #[validate(length(min = 1))]
    pub admin_id: String,
}

pub async fn list(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<RewardListing>, ApiError> {
    Ok(Json(s.rewards.list(p.status.as_deref()).await?))
}

pub async fn review(State(s): State<AppState>, Json(r): Json<ReviewRequest>) -> Result<Json<Reward>, ApiError> {
    r.validate()?;
    let reward = s.rewards.update(&UserId::new(r.user_id), &r.appointment_id, &r.status, &r.admin_id).await?;
    Ok(Json(reward))
}
