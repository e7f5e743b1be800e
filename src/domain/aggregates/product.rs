//! Product Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::cart::ProductDetails;
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::ProductId;

/// Catalogue entry: a treatment, membership or package.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub image_url: Option<String>,
    /// `None` for services without tracked inventory.
    pub stock_quantity: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Self { id: ProductId::new(id), name: name.into(), price, image_url: None, stock_quantity: None, updated_at: Utc::now() }
    }

    pub fn with_stock(mut self, stock: i64) -> Self { self.stock_quantity = Some(stock); self }

    pub fn details(&self) -> ProductDetails {
        ProductDetails { name: self.name.clone(), price: self.price, image_url: self.image_url.clone() }
    }

    /// Decrements tracked, positive stock by `quantity`, floored at zero.
    ///
    /// Returns the adjustment event, or `None` when stock is untracked or already exhausted.
    pub fn decrement_stock(&mut self, quantity: u32) -> Option<DomainEvent> {
        let from = self.stock_quantity.filter(|s| *s > 0)?;
        let to = (from - i64::from(quantity)).max(0);
        self.stock_quantity = Some(to);
        self.updated_at = Utc::now();
        Some(DomainEvent::Product(ProductEvent::StockAdjusted { product_id: self.id.clone(), from, to }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_floor() {
        let mut p = Product::new("p1", "Skin booster", Decimal::new(250, 0)).with_stock(3);
        assert!(p.decrement_stock(2).is_some());
        assert_eq!(p.stock_quantity, Some(1));
        p.decrement_stock(5);
        assert_eq!(p.stock_quantity, Some(0));
        assert!(p.decrement_stock(1).is_none());
    }

    #[test]
    fn untracked_stock_is_left_alone() {
        let mut p = Product::new("p2", "Consultation", Decimal::new(50, 0));
        assert!(p.decrement_stock(1).is_none());
        assert_eq!(p.stock_quantity, None);
    }
}
