//! PostgreSQL backend. Nested sequences (cart lines, buying history, order lines) are JSONB documents.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::{CartRepository, OrderRepository, ProductRepository, RewardRepository, StoreError, StoreResult, UserRepository};
use crate::domain::{
    Address, BuyingHistoryEntry, Customer, LineItem, Order, OrderNumber, Product, ProductId, Reward, RewardStatus, UserId,
};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

#[derive(sqlx::FromRow)]
struct ProductRow { id: String, name: String, price: Decimal, image_url: Option<String>, stock_quantity: Option<i64>, updated_at: DateTime<Utc> }

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self { id: ProductId::new(r.id), name: r.name, price: r.price, image_url: r.image_url, stock_quantity: r.stock_quantity, updated_at: r.updated_at }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, order_number: String, user_id: String, products: Json<Vec<LineItem>>, total_amount: Decimal, currency: String,
    status: String, payment_status: String, shipping_address: Option<Json<Address>>, payment_session_id: String,
    payment_intent_id: Option<String>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;
    fn try_from(r: OrderRow) -> Result<Self, Self::Error> {
        let status = r.status.parse().map_err(|e| StoreError::Corrupt(format!("order {}: {e}", r.id)))?;
        let payment_status = r.payment_status.parse().map_err(|e| StoreError::Corrupt(format!("order {}: {e}", r.id)))?;
        Ok(Order::restore(
            r.id, OrderNumber::from_string(r.order_number), UserId::new(r.user_id), r.products.0, r.total_amount, r.currency,
            status, payment_status, r.shipping_address.map(|a| a.0), r.payment_session_id, r.payment_intent_id,
            r.created_at, r.updated_at,
        ))
    }
}

#[derive(sqlx::FromRow)]
struct RewardRow {
    user_id: String, appointment_id: String, referrer_id: Option<String>, amount: Decimal, status: String,
    reviewed_by: Option<String>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<RewardRow> for Reward {
    type Error = StoreError;
    fn try_from(r: RewardRow) -> Result<Self, Self::Error> {
        let status = r.status.parse().map_err(|e| StoreError::Corrupt(format!("reward {}/{}: {e}", r.user_id, r.appointment_id)))?;
        Ok(Reward {
            user_id: UserId::new(r.user_id), appointment_id: r.appointment_id, referrer_id: r.referrer_id.map(UserId::new),
            amount: r.amount, status, reviewed_by: r.reviewed_by, created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

#[async_trait]
impl CartRepository for PgStore {
    async fn load_cart(&self, user_id: &UserId) -> StoreResult<Option<Vec<LineItem>>> {
        let row: Option<(Json<Vec<LineItem>>,)> = sqlx::query_as("SELECT products FROM carts WHERE user_id = $1")
            .bind(user_id.as_str()).fetch_optional(&self.db).await?;
        Ok(row.map(|(lines,)| lines.0))
    }

    async fn save_cart(&self, user_id: &UserId, lines: &[LineItem]) -> StoreResult<()> {
        sqlx::query("INSERT INTO carts (user_id, products, updated_at) VALUES ($1, $2, NOW()) ON CONFLICT (user_id) DO UPDATE SET products = EXCLUDED.products, updated_at = NOW()")
            .bind(user_id.as_str()).bind(Json(lines)).execute(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for PgStore {
    async fn get_product(&self, id: &ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1").bind(id.as_str()).fetch_optional(&self.db).await?;
        Ok(row.map(Product::from))
    }

    async fn get_products(&self, ids: &[ProductId]) -> StoreResult<Vec<Product>> {
        let ids: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = ANY($1)").bind(ids).fetch_all(&self.db).await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn set_stock(&self, id: &ProductId, stock: i64) -> StoreResult<()> {
        let done = sqlx::query("UPDATE products SET stock_quantity = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.as_str()).bind(stock).execute(&self.db).await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::Backend(format!("product {id} not found")));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn find_by_session(&self, session_id: &str) -> StoreResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE payment_session_id = $1")
            .bind(session_id).fetch_optional(&self.db).await?
            .map(Order::try_from).transpose()
    }

    async fn insert_order(&self, o: &Order) -> StoreResult<()> {
        sqlx::query("INSERT INTO orders (id, order_number, user_id, products, total_amount, currency, status, payment_status, shipping_address, payment_session_id, payment_intent_id, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)")
            .bind(o.id).bind(o.order_number.as_str()).bind(o.user_id.as_str()).bind(Json(&o.products)).bind(o.total_amount)
            .bind(&o.currency).bind(o.status.as_str()).bind(o.payment_status.as_str()).bind(o.shipping_address.as_ref().map(Json))
            .bind(&o.payment_session_id).bind(&o.payment_intent_id).bind(o.created_at).bind(o.updated_at)
            .execute(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn get_customer(&self, id: &UserId) -> StoreResult<Option<Customer>> {
        let row: Option<(Json<Vec<BuyingHistoryEntry>>,)> = sqlx::query_as("SELECT buying_history FROM users WHERE id = $1")
            .bind(id.as_str()).fetch_optional(&self.db).await?;
        Ok(row.map(|(history,)| Customer { id: id.clone(), buying_history: history.0 }))
    }

    async fn save_customer(&self, c: &Customer) -> StoreResult<()> {
        sqlx::query("INSERT INTO users (id, buying_history, updated_at) VALUES ($1, $2, NOW()) ON CONFLICT (id) DO UPDATE SET buying_history = EXCLUDED.buying_history, updated_at = NOW()")
            .bind(c.id.as_str()).bind(Json(&c.buying_history)).execute(&self.db).await?;
        Ok(())
    }
}

#[async_trait]
impl RewardRepository for PgStore {
    async fn list_rewards(&self, status: Option<RewardStatus>) -> StoreResult<Vec<Reward>> {
        let rows = match status {
            Some(s) => sqlx::query_as::<_, RewardRow>("SELECT * FROM rewards WHERE status = $1 ORDER BY created_at DESC")
                .bind(s.as_str()).fetch_all(&self.db).await?,
            None => sqlx::query_as::<_, RewardRow>("SELECT * FROM rewards ORDER BY created_at DESC").fetch_all(&self.db).await?,
        };
        rows.into_iter().map(Reward::try_from).collect()
    }

    async fn get_reward(&self, user_id: &UserId, appointment_id: &str) -> StoreResult<Option<Reward>> {
        sqlx::query_as::<_, RewardRow>("SELECT * FROM rewards WHERE user_id = $1 AND appointment_id = $2")
            .bind(user_id.as_str()).bind(appointment_id).fetch_optional(&self.db).await?
            .map(Reward::try_from).transpose()
    }

    async fn save_reward(&self, r: &Reward) -> StoreResult<()> {
        sqlx::query("INSERT INTO rewards (user_id, appointment_id, referrer_id, amount, status, reviewed_by, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) ON CONFLICT (user_id, appointment_id) DO UPDATE SET status = EXCLUDED.status, reviewed_by = EXCLUDED.reviewed_by, updated_at = EXCLUDED.updated_at")
            .bind(r.user_id.as_str()).bind(&r.appointment_id).bind(r.referrer_id.as_ref().map(UserId::as_str)).bind(r.amount)
            .bind(r.status.as_str()).bind(&r.reviewed_by).bind(r.created_at).bind(r.updated_at)
            .execute(&self.db).await?;
        Ok(())
    }
}
