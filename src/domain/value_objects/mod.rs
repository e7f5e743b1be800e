//! Value Objects for the clinic storefront

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a signed-in customer, as issued by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Catalogue identifier of a treatment, membership or package.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Human-facing order reference, `ORD-<timestampMs>-<suffix>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn from_string(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Generates an order number from the current time and a random six digit suffix.
///
/// Storage enforces uniqueness; the suffix only makes same-millisecond collisions unlikely.
pub fn generate_order_number() -> OrderNumber {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    OrderNumber(format!("ORD-{}-{:06}", Utc::now().timestamp_millis(), suffix))
}

/// Converts an amount in minor currency units (pence, cents) to major units.
pub fn minor_to_major(amount: i64) -> Decimal { Decimal::new(amount, 2) }

/// Converts a major-unit amount to minor units, rounding half away from zero.
pub fn major_to_minor(amount: Decimal) -> Option<i64> {
    use rust_decimal::prelude::ToPrimitive;
    (amount * Decimal::ONE_HUNDRED).round().to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_shape() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 6);
    }

    #[test]
    fn minor_units() {
        assert_eq!(minor_to_major(15000), Decimal::new(150, 0));
        assert_eq!(minor_to_major(1999), Decimal::new(1999, 2));
        assert_eq!(major_to_minor(Decimal::new(1999, 2)), Some(1999));
    }
}
