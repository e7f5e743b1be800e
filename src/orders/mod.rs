//! Turning completed payments into orders.

use thiserror::Error;

use crate::store::StoreError;

pub mod materializer;
pub mod session;

pub use materializer::{Materialized, OrderMaterializer, PartialSideEffectFailure};
pub use session::{CheckoutSession, SucceededIntent, WebhookEvent, CHECKOUT_COMPLETED, PAYMENT_INTENT_SUCCEEDED};

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("Invalid order data: {0}")]
    InvalidOrderData(String),

    #[error("Malformed {field} metadata: {source}")]
    MalformedMetadata { field: &'static str, #[source] source: serde_json::Error },

    #[error("Malformed payment event: {0}")]
    MalformedSession(#[source] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl OrderError {
    /// Failures detected before anything was written.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::InvalidOrderData(_) | Self::MalformedMetadata { .. } | Self::MalformedSession(_))
    }
}
