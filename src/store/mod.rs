//! Document store ports for the `carts`, `orders`, `users`, `products` and `rewards` collections.
//!
//! Every write replaces a whole document; there is no version token, so two
//! concurrent read-modify-write cycles on the same document resolve as last
//! write wins.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Customer, LineItem, Order, Product, ProductId, Reward, RewardStatus, UserId};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Duplicate {0}")]
    Conflict(String),

    #[error("Corrupt document: {0}")]
    Corrupt(String),

    #[error("Storage error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Conflict(db.message().to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => Self::Corrupt(e.to_string()),
            _ => Self::Backend(e.to_string()),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn load_cart(&self, user_id: &UserId) -> StoreResult<Option<Vec<LineItem>>>;
    async fn save_cart(&self, user_id: &UserId, lines: &[LineItem]) -> StoreResult<()>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn get_product(&self, id: &ProductId) -> StoreResult<Option<Product>>;
    async fn get_products(&self, ids: &[ProductId]) -> StoreResult<Vec<Product>>;
    async fn set_stock(&self, id: &ProductId, stock: i64) -> StoreResult<()>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_session(&self, session_id: &str) -> StoreResult<Option<Order>>;
    /// Fails with [`StoreError::Conflict`] when the payment session or order number already exists.
    async fn insert_order(&self, order: &Order) -> StoreResult<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get_customer(&self, id: &UserId) -> StoreResult<Option<Customer>>;
    /// Writes the full history sequence back, creating the record if needed.
    async fn save_customer(&self, customer: &Customer) -> StoreResult<()>;
}

#[async_trait]
pub trait RewardRepository: Send + Sync {
    /// Newest first.
    async fn list_rewards(&self, status: Option<RewardStatus>) -> StoreResult<Vec<Reward>>;
    async fn get_reward(&self, user_id: &UserId, appointment_id: &str) -> StoreResult<Option<Reward>>;
    async fn save_reward(&self, reward: &Reward) -> StoreResult<()>;
}

/// A backend implementing every collection.
pub trait DocumentStore: CartRepository + ProductRepository + OrderRepository + UserRepository + RewardRepository {}

impl<T> DocumentStore for T where T: CartRepository + ProductRepository + OrderRepository + UserRepository + RewardRepository {}
