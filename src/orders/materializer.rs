//! Order Materializer: one completed checkout session becomes exactly one order.
//!
//! The order, the buyer's history and the stock counters live in different
//! collections and are written one after another without a transaction. A
//! failure after the order insert leaves the order in place without its side
//! effects; stock failures are isolated per product and reported, not raised.

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use super::session::{CheckoutSession, SucceededIntent, WebhookEvent, CHECKOUT_COMPLETED, PAYMENT_INTENT_SUCCEEDED};
use super::OrderError;
use crate::domain::{generate_order_number, Customer, DomainEvent, LineItem, Order, PaidCheckout, ProductId};
use crate::events::EventPublisher;
use crate::store::{OrderRepository, ProductRepository, StoreError, UserRepository};

const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// A per-product stock update that failed and was skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("stock update for {product_id} failed: {reason}")]
pub struct PartialSideEffectFailure {
    pub product_id: ProductId,
    pub reason: String,
}

#[derive(Debug)]
pub struct Materialized {
    pub order: Order,
    /// `false` when the session had already been materialized and this was a replay.
    pub created: bool,
    pub stock_failures: Vec<PartialSideEffectFailure>,
}

pub struct OrderMaterializer {
    orders: Arc<dyn OrderRepository>,
    users: Arc<dyn UserRepository>,
    products: Arc<dyn ProductRepository>,
    events: EventPublisher,
}

impl OrderMaterializer {
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        users: Arc<dyn UserRepository>,
        products: Arc<dyn ProductRepository>,
        events: EventPublisher,
    ) -> Self {
        Self { orders, users, products, events }
    }

    /// Materializes completed checkout sessions and succeeded payment intents that
    /// carry cart metadata; any other event is acknowledged and ignored.
    pub async fn handle_event(&self, event: WebhookEvent) -> Result<Option<Materialized>, OrderError> {
        let session: CheckoutSession = match event.kind.as_str() {
            CHECKOUT_COMPLETED => serde_json::from_value(event.data.object).map_err(OrderError::MalformedSession)?,
            PAYMENT_INTENT_SUCCEEDED => {
                let intent: SucceededIntent = serde_json::from_value(event.data.object).map_err(OrderError::MalformedSession)?;
                if !intent.carries_cart() {
                    info!(payment_intent = %intent.id, "payment intent has no cart metadata, ignoring");
                    return Ok(None);
                }
                intent.into()
            }
            other => {
                info!(event_type = %other, "ignoring payment event");
                return Ok(None);
            }
        };
        self.materialize(&session).await.map(Some)
    }

    pub async fn materialize(&self, session: &CheckoutSession) -> Result<Materialized, OrderError> {
        let checkout = session.to_paid_checkout()?;

        if let Some(order) = self.orders.find_by_session(&session.id).await? {
            info!(session_id = %session.id, order_number = %order.order_number, "payment session already materialized");
            return Ok(Materialized { order, created: false, stock_failures: vec![] });
        }

        let mut order = match self.insert_order(checkout).await? {
            Inserted::New(order) => order,
            Inserted::Existing(order) => return Ok(Materialized { order, created: false, stock_failures: vec![] }),
        };
        info!(order_number = %order.order_number, user_id = %order.user_id, total = %order.total_amount, currency = %order.currency, "order created");

        if let Err(e) = self.record_history(&order).await {
            error!(order_number = %order.order_number, error = %e, "order stored but buying history was not updated");
            return Err(e.into());
        }

        let mut events = order.take_events();
        let mut stock_failures = vec![];
        for line in &order.products {
            match self.decrement_stock(line).await {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => {
                    warn!(order_number = %order.order_number, product_id = %line.product_id, error = %e, "stock update failed, continuing");
                    stock_failures.push(PartialSideEffectFailure { product_id: line.product_id.clone(), reason: e.to_string() });
                }
            }
        }

        self.events.publish_all(&events).await;
        Ok(Materialized { order, created: true, stock_failures })
    }

    async fn insert_order(&self, checkout: PaidCheckout) -> Result<Inserted, StoreError> {
        let mut attempt = 1;
        loop {
            let order = Order::from_paid_checkout(generate_order_number(), checkout.clone());
            match self.orders.insert_order(&order).await {
                Ok(()) => return Ok(Inserted::New(order)),
                Err(StoreError::Conflict(what)) => {
                    // A concurrent delivery of the same session won the insert.
                    if let Some(existing) = self.orders.find_by_session(&checkout.payment_session_id).await? {
                        info!(session_id = %checkout.payment_session_id, "concurrent delivery already created the order");
                        return Ok(Inserted::Existing(existing));
                    }
                    if attempt >= ORDER_NUMBER_ATTEMPTS {
                        return Err(StoreError::Conflict(what));
                    }
                    warn!(order_number = %order.order_number, "order number collision, regenerating");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn record_history(&self, order: &Order) -> Result<(), StoreError> {
        let mut customer = self.users.get_customer(&order.user_id).await?.unwrap_or_else(|| Customer::new(order.user_id.clone()));
        customer.record_purchase(&order.order_number, &order.products, order.created_at);
        self.users.save_customer(&customer).await
    }

    async fn decrement_stock(&self, line: &LineItem) -> Result<Option<DomainEvent>, StoreError> {
        let Some(mut product) = self.products.get_product(&line.product_id).await? else {
            return Ok(None);
        };
        let Some(event) = product.decrement_stock(line.quantity) else {
            return Ok(None);
        };
        if let Some(stock) = product.stock_quantity {
            self.products.set_stock(&product.id, stock).await?;
        }
        Ok(Some(event))
    }
}

enum Inserted {
    New(Order),
    Existing(Order),
}
