//! HTTP surface.

use axum::{routing::{get, post}, Json, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::cart::CartService;
use crate::events::EventPublisher;
use crate::orders::OrderMaterializer;
use crate::payments::PaymentGateway;
use crate::rewards::RewardService;
use crate::store::DocumentStore;

pub mod cart;
pub mod error;
pub mod rewards;
pub mod webhooks;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub carts: Arc<CartService>,
    pub rewards: Arc<RewardService>,
    pub orders: Arc<OrderMaterializer>,
}

impl AppState {
    pub fn new<S: DocumentStore + 'static>(
        store: Arc<S>,
        payments: Option<Arc<dyn PaymentGateway>>,
        events: EventPublisher,
        currency: &str,
    ) -> Self {
        Self {
            carts: Arc::new(CartService::new(store.clone(), store.clone(), payments, currency)),
            rewards: Arc::new(RewardService::new(store.clone())),
            orders: Arc::new(OrderMaterializer::new(store.clone(), store.clone(), store, events)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "clinic-commerce"})) }))
        .route("/api/cart", post(cart::get_or_add))
        .route("/api/cart/remove", post(cart::remove))
        .route("/api/cart/clear", post(cart::clear))
        .route("/api/cart/create-payment-intent", post(cart::create_payment_intent))
        .route("/api/rewards", get(rewards::list).put(rewards::review))
        .route("/api/webhooks/payment", post(webhooks::payment))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
