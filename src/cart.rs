//! Server-side cart: the authoritative copy every client cache reconciles against.

use std::{collections::HashMap, sync::Arc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::value_objects::major_to_minor;
use crate::domain::{Cart, ProductId, UserId};
use crate::payments::{PaymentError, PaymentGateway, PaymentIntentRequest};
use crate::store::{CartRepository, ProductRepository, StoreError};

#[derive(Error, Debug)]
pub enum CartServiceError {
    #[error("Product not found")]
    ProductNotFound(ProductId),

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Cart total cannot be charged")]
    InvalidAmount,

    #[error("Payment provider not configured")]
    PaymentProviderUnavailable,

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, CartServiceError>;

pub struct CartService {
    carts: Arc<dyn CartRepository>,
    products: Arc<dyn ProductRepository>,
    payments: Option<Arc<dyn PaymentGateway>>,
    currency: String,
}

impl CartService {
    pub fn new(
        carts: Arc<dyn CartRepository>,
        products: Arc<dyn ProductRepository>,
        payments: Option<Arc<dyn PaymentGateway>>,
        currency: impl Into<String>,
    ) -> Self {
        Self { carts, products, payments, currency: currency.into() }
    }

    pub async fn cart(&self, user_id: &UserId) -> Result<Cart> {
        let cart = self.load(user_id).await?;
        self.resolve(cart).await
    }

    pub async fn add(&self, user_id: &UserId, product_id: ProductId, quantity: u32) -> Result<Cart> {
        if quantity == 0 {
            return Err(CartServiceError::InvalidQuantity);
        }
        if self.products.get_product(&product_id).await?.is_none() {
            return Err(CartServiceError::ProductNotFound(product_id));
        }
        let mut cart = self.load(user_id).await?;
        cart.add_item(product_id.clone(), quantity);
        self.carts.save_cart(user_id, &cart.lines()).await?;
        debug!(%user_id, %product_id, quantity, "added to cart");
        self.resolve(cart).await
    }

    pub async fn remove(&self, user_id: &UserId, product_id: &ProductId, quantity: u32) -> Result<Cart> {
        if quantity == 0 {
            return Err(CartServiceError::InvalidQuantity);
        }
        let mut cart = self.load(user_id).await?;
        if cart.contains(product_id) {
            cart.remove_item(product_id, quantity);
            self.carts.save_cart(user_id, &cart.lines()).await?;
            debug!(%user_id, %product_id, quantity, "removed from cart");
        }
        self.resolve(cart).await
    }

    pub async fn clear(&self, user_id: &UserId) -> Result<Cart> {
        self.carts.save_cart(user_id, &[]).await?;
        debug!(%user_id, "cart cleared");
        Ok(Cart::empty())
    }

    /// Opens a payment intent for the current cart. The metadata carries exactly
    /// what the order materializer decodes once the payment completes.
    pub async fn create_payment_intent(&self, user_id: &UserId, cart_id: &str) -> Result<Value> {
        let gateway = self.payments.as_ref().ok_or(CartServiceError::PaymentProviderUnavailable)?;
        let cart = self.cart(user_id).await?;
        if cart.is_empty() {
            return Err(CartServiceError::EmptyCart);
        }
        let amount = major_to_minor(cart.total_price).filter(|a| *a > 0).ok_or(CartServiceError::InvalidAmount)?;
        let products = serde_json::to_string(&cart.lines()).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let metadata = HashMap::from([
            ("userId".to_string(), user_id.to_string()),
            ("cartId".to_string(), cart_id.to_string()),
            ("products".to_string(), products),
        ]);
        let intent = gateway
            .create_payment_intent(PaymentIntentRequest { amount, currency: self.currency.clone(), metadata })
            .await?;
        info!(%user_id, amount, currency = %self.currency, "payment intent created");
        Ok(intent)
    }

    async fn load(&self, user_id: &UserId) -> Result<Cart> {
        Ok(Cart::from_lines(self.carts.load_cart(user_id).await?.unwrap_or_default()))
    }

    async fn resolve(&self, mut cart: Cart) -> Result<Cart> {
        let ids: Vec<ProductId> = cart.products.iter().map(|e| e.product_id.clone()).collect();
        let catalogue: HashMap<ProductId, _> = self.products.get_products(&ids).await?.into_iter().map(|p| (p.id.clone(), p.details())).collect();
        cart.resolve_details(|id| catalogue.get(id).cloned());
        Ok(cart)
    }
}
