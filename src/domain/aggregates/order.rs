//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use crate::domain::aggregates::cart::LineItem;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{OrderNumber, UserId};

/// Immutable record of a completed payment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub products: Vec<LineItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub shipping_address: Option<Address>,
    pub payment_session_id: String,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

/// Shipping address as captured at checkout; every field is optional on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub name: Option<String>,
    #[serde(alias = "line1")]
    pub street1: Option<String>,
    #[serde(alias = "line2")]
    pub street2: Option<String>,
    pub city: Option<String>,
    #[serde(alias = "state")]
    pub county: Option<String>,
    #[serde(alias = "postal_code", alias = "zip")]
    pub postcode: Option<String>,
    pub country: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Processing, Shipped, Delivered, Cancelled }

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus { #[default] Pending, Completed, Failed }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Completed => "completed", Self::Failed => "failed" }
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

pub fn is_valid_order_status(status: &str) -> bool { status.parse::<OrderStatus>().is_ok() }
pub fn is_valid_payment_status(status: &str) -> bool { status.parse::<PaymentStatus>().is_ok() }

#[derive(Debug, Clone, PartialEq, Eq)] pub struct UnknownStatus(pub String);
impl std::error::Error for UnknownStatus {}
impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "unknown status '{}'", self.0) }
}

/// Everything a payment event contributes to a new order.
#[derive(Clone, Debug)]
pub struct PaidCheckout {
    pub user_id: UserId,
    pub products: Vec<LineItem>,
    pub total_amount: Decimal,
    pub currency: String,
    pub shipping_address: Option<Address>,
    pub payment_session_id: String,
    pub payment_intent_id: Option<String>,
}

impl Order {
    /// Builds the order for a settled checkout: `pending` fulfilment, `completed` payment.
    pub fn from_paid_checkout(order_number: OrderNumber, checkout: PaidCheckout) -> Self {
        let now = Utc::now();
        let mut order = Self {
            id: Uuid::now_v7(), order_number, user_id: checkout.user_id, products: checkout.products,
            total_amount: checkout.total_amount, currency: checkout.currency,
            status: OrderStatus::Pending, payment_status: PaymentStatus::Completed,
            shipping_address: checkout.shipping_address, payment_session_id: checkout.payment_session_id,
            payment_intent_id: checkout.payment_intent_id, created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Created {
            order_id: order.id,
            order_number: order.order_number.clone(),
            user_id: order.user_id.clone(),
            total: order.total_amount,
            currency: order.currency.clone(),
        }));
        order
    }

    /// Rehydrates a stored order; no events are raised.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid, order_number: OrderNumber, user_id: UserId, products: Vec<LineItem>, total_amount: Decimal,
        currency: String, status: OrderStatus, payment_status: PaymentStatus, shipping_address: Option<Address>,
        payment_session_id: String, payment_intent_id: Option<String>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id, order_number, user_id, products, total_amount, currency, status, payment_status, shipping_address,
            payment_session_id, payment_intent_id, created_at, updated_at, events: vec![],
        }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}
