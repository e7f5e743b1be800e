//! Domain events
use crate::domain::value_objects::{OrderNumber, ProductId, UserId};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", rename_all = "camelCase")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProductEvent {
    StockAdjusted { product_id: ProductId, from: i64, to: i64 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OrderEvent {
    Created {
        order_id: Uuid,
        order_number: OrderNumber,
        user_id: UserId,
        #[serde(with = "rust_decimal::serde::float")]
        total: Decimal,
        currency: String,
    },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::StockAdjusted { .. }) => "products.stock_adjusted",
            Self::Order(OrderEvent::Created { .. }) => "orders.created",
        }
    }
}
