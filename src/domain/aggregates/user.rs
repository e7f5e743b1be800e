//! Customer record as far as ordering is concerned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::cart::LineItem;
use crate::domain::value_objects::{OrderNumber, ProductId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyingHistoryEntry {
    pub product_id: ProductId,
    pub date: DateTime<Utc>,
    pub order_number: OrderNumber,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: UserId,
    pub buying_history: Vec<BuyingHistoryEntry>,
}

impl Customer {
    pub fn new(id: UserId) -> Self { Self { id, buying_history: vec![] } }

    /// Appends one history entry per purchased line; existing entries are never touched.
    pub fn record_purchase(&mut self, order_number: &OrderNumber, products: &[LineItem], date: DateTime<Utc>) {
        self.buying_history.extend(products.iter().map(|line| BuyingHistoryEntry {
            product_id: line.product_id.clone(),
            date,
            order_number: order_number.clone(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchases_append() {
        let mut c = Customer::new(UserId::new("u1"));
        let first = OrderNumber::from_string("ORD-1-000001");
        c.record_purchase(&first, &[LineItem { product_id: ProductId::new("p1"), quantity: 2 }], Utc::now());
        let second = OrderNumber::from_string("ORD-2-000002");
        c.record_purchase(&second, &[
            LineItem { product_id: ProductId::new("p2"), quantity: 1 },
            LineItem { product_id: ProductId::new("p3"), quantity: 1 },
        ], Utc::now());
        assert_eq!(c.buying_history.len(), 3);
        assert_eq!(c.buying_history[0].order_number, first);
        assert_eq!(c.buying_history[2].product_id, ProductId::new("p3"));
    }
}
