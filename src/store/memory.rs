//! In-process store used when no database is configured, and by the test suites.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{CartRepository, OrderRepository, ProductRepository, RewardRepository, StoreError, StoreResult, UserRepository};
use crate::domain::{Customer, LineItem, Order, Product, ProductId, Reward, RewardStatus, UserId};

#[derive(Default)]
struct Collections {
    carts: HashMap<UserId, Vec<LineItem>>,
    products: HashMap<ProductId, Product>,
    orders: Vec<Order>,
    customers: HashMap<UserId, Customer>,
    rewards: Vec<Reward>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Seeds the catalogue.
    pub async fn put_product(&self, product: Product) {
        self.inner.lock().await.products.insert(product.id.clone(), product);
    }

    pub async fn orders(&self) -> Vec<Order> { self.inner.lock().await.orders.clone() }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn load_cart(&self, user_id: &UserId) -> StoreResult<Option<Vec<LineItem>>> {
        Ok(self.inner.lock().await.carts.get(user_id).cloned())
    }

    async fn save_cart(&self, user_id: &UserId, lines: &[LineItem]) -> StoreResult<()> {
        self.inner.lock().await.carts.insert(user_id.clone(), lines.to_vec());
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn get_product(&self, id: &ProductId) -> StoreResult<Option<Product>> {
        Ok(self.inner.lock().await.products.get(id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> StoreResult<Vec<Product>> {
        let inner = self.inner.lock().await;
        Ok(ids.iter().filter_map(|id| inner.products.get(id).cloned()).collect())
    }

    async fn set_stock(&self, id: &ProductId, stock: i64) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let product = inner.products.get_mut(id).ok_or_else(|| StoreError::Backend(format!("product {id} not found")))?;
        product.stock_quantity = Some(stock);
        product.updated_at = chrono::Utc::now();
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn find_by_session(&self, session_id: &str) -> StoreResult<Option<Order>> {
        Ok(self.inner.lock().await.orders.iter().find(|o| o.payment_session_id == session_id).cloned())
    }

    async fn insert_order(&self, order: &Order) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.orders.iter().any(|o| o.payment_session_id == order.payment_session_id) {
            return Err(StoreError::Conflict(format!("payment session {}", order.payment_session_id)));
        }
        if inner.orders.iter().any(|o| o.order_number == order.order_number) {
            return Err(StoreError::Conflict(format!("order number {}", order.order_number)));
        }
        inner.orders.push(order.clone());
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get_customer(&self, id: &UserId) -> StoreResult<Option<Customer>> {
        Ok(self.inner.lock().await.customers.get(id).cloned())
    }

    async fn save_customer(&self, customer: &Customer) -> StoreResult<()> {
        self.inner.lock().await.customers.insert(customer.id.clone(), customer.clone());
        Ok(())
    }
}

#[async_trait]
impl RewardRepository for MemoryStore {
    async fn list_rewards(&self, status: Option<RewardStatus>) -> StoreResult<Vec<Reward>> {
        let inner = self.inner.lock().await;
        let mut rewards: Vec<Reward> = inner.rewards.iter().filter(|r| status.map_or(true, |s| r.status == s)).cloned().collect();
        rewards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rewards)
    }

    async fn get_reward(&self, user_id: &UserId, appointment_id: &str) -> StoreResult<Option<Reward>> {
        let inner = self.inner.lock().await;
        Ok(inner.rewards.iter().find(|r| &r.user_id == user_id && r.appointment_id == appointment_id).cloned())
    }

    async fn save_reward(&self, reward: &Reward) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.rewards.iter_mut().find(|r| r.user_id == reward.user_id && r.appointment_id == reward.appointment_id) {
            Some(existing) => *existing = reward.clone(),
            None => inner.rewards.push(reward.clone()),
        }
        Ok(())
    }
}
