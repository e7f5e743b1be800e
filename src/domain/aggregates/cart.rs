//! Cart Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::ProductId;

/// `{productId, quantity}` as stored in carts, orders and payment metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Catalogue data joined onto a cart entry when the server returns a cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartEntry {
    pub product_id: ProductId,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_details: Option<ProductDetails>,
}

impl CartEntry {
    /// An entry is priced when its details resolved to a non-zero price.
    pub fn is_priced(&self) -> bool {
        self.product_details.as_ref().is_some_and(|d| !d.price.is_zero())
    }

    pub fn line_total(&self) -> Option<Decimal> {
        self.product_details.as_ref().map(|d| d.price * Decimal::from(self.quantity))
    }
}

/// A user's cart: ordered entries, unique by product, every quantity at least one.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub products: Vec<CartEntry>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_price: Decimal,
}

impl Cart {
    pub fn empty() -> Self { Self::default() }

    pub fn from_lines(lines: Vec<LineItem>) -> Self {
        let products = lines
            .into_iter()
            .filter(|l| l.quantity > 0)
            .map(|l| CartEntry { product_id: l.product_id, quantity: l.quantity, product_details: None })
            .collect();
        let mut cart = Self { products, total_price: Decimal::ZERO };
        cart.recalculate();
        cart
    }

    pub fn lines(&self) -> Vec<LineItem> {
        self.products.iter().map(|e| LineItem { product_id: e.product_id.clone(), quantity: e.quantity }).collect()
    }

    pub fn is_empty(&self) -> bool { self.products.is_empty() }

    pub fn entry(&self, product_id: &ProductId) -> Option<&CartEntry> {
        self.products.iter().find(|e| &e.product_id == product_id)
    }

    pub fn quantity_of(&self, product_id: &ProductId) -> Option<u32> { self.entry(product_id).map(|e| e.quantity) }
    pub fn contains(&self, product_id: &ProductId) -> bool { self.entry(product_id).is_some() }

    /// Total units across all entries.
    pub fn item_count(&self) -> u32 { self.products.iter().map(|e| e.quantity).sum() }

    /// Authoritative add: merges into an existing entry or appends a new one.
    pub fn add_item(&mut self, product_id: ProductId, quantity: u32) {
        if quantity == 0 { return; }
        if let Some(existing) = self.products.iter_mut().find(|e| e.product_id == product_id) {
            existing.quantity = existing.quantity.saturating_add(quantity);
        } else {
            self.products.push(CartEntry { product_id, quantity, product_details: None });
        }
        self.recalculate();
    }

    /// Authoritative remove: drops the entry once the removal reaches its quantity.
    pub fn remove_item(&mut self, product_id: &ProductId, quantity: u32) {
        if let Some(pos) = self.products.iter().position(|e| &e.product_id == product_id) {
            if self.products[pos].quantity <= quantity {
                self.products.remove(pos);
            } else {
                self.products[pos].quantity -= quantity;
            }
            self.recalculate();
        }
    }

    pub fn clear(&mut self) {
        self.products.clear();
        self.recalculate();
    }

    /// Speculative add for a cached view. Only priced entries are touched, so an
    /// unknown product never shows up as a zero-priced line.
    pub fn apply_optimistic_add(&mut self, product_id: &ProductId, quantity: u32) -> bool {
        match self.products.iter_mut().find(|e| &e.product_id == product_id) {
            Some(entry) if entry.is_priced() => {
                entry.quantity = entry.quantity.saturating_add(quantity);
                self.recalculate();
                true
            }
            _ => false,
        }
    }

    /// Speculative remove for a cached view; same pricing rule as [`Cart::apply_optimistic_add`].
    pub fn apply_optimistic_remove(&mut self, product_id: &ProductId, quantity: u32) -> bool {
        match self.entry(product_id) {
            Some(entry) if entry.is_priced() => {
                self.remove_item(product_id, quantity);
                true
            }
            _ => false,
        }
    }

    /// Joins catalogue details onto every entry, leaving unknown products unpriced.
    pub fn resolve_details<F>(&mut self, mut lookup: F)
    where
        F: FnMut(&ProductId) -> Option<ProductDetails>,
    {
        for entry in &mut self.products {
            entry.product_details = lookup(&entry.product_id);
        }
        self.recalculate();
    }

    /// Sum of quantity × price over entries with resolved prices.
    pub fn recalculate(&mut self) {
        self.total_price = self.products.iter().filter_map(CartEntry::line_total).sum();
    }
}
