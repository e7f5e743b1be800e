//! JSON error envelope, `{ "error": message }`, and the mapping from service errors.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::cart::CartServiceError;
use crate::orders::OrderError;
use crate::payments::PaymentError;
use crate::rewards::RewardError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self { Self::BadRequest(e.to_string()) }
}

impl From<CartServiceError> for ApiError {
    fn from(e: CartServiceError) -> Self {
        match e {
            CartServiceError::ProductNotFound(_) => Self::NotFound(e.to_string()),
            CartServiceError::InvalidQuantity | CartServiceError::EmptyCart | CartServiceError::InvalidAmount => Self::BadRequest(e.to_string()),
            CartServiceError::PaymentProviderUnavailable => Self::Unavailable(e.to_string()),
            CartServiceError::Payment(PaymentError::Provider { message, .. }) => Self::BadGateway(message),
            CartServiceError::Payment(e) => Self::BadGateway(e.to_string()),
            CartServiceError::Store(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<RewardError> for ApiError {
    fn from(e: RewardError) -> Self {
        match e {
            RewardError::InvalidRewardStatus(_) => Self::BadRequest(e.to_string()),
            RewardError::RewardNotFound => Self::NotFound(e.to_string()),
            RewardError::Store(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(e: OrderError) -> Self {
        if e.is_precondition() { Self::BadRequest(e.to_string()) } else { Self::Internal(e.to_string()) }
    }
}
