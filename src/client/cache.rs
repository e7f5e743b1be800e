//! Per-user query cache: the client's possibly stale shadow of the remote cart.
//!
//! Cart fetches are generation-stamped. [`QueryCache::cancel_fetches`] bumps the
//! generation, so a fetch that was in flight when a mutation started can no
//! longer overwrite the mutation's optimistic state when it lands.

use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::{Cart, ProductId, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheState {
    /// Locally patched, not yet confirmed by the server.
    Optimistic,
    Confirmed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CachedCart {
    pub cart: Cart,
    pub state: CacheState,
}

/// Queries derived from the cart. Cached answers are dropped whenever the cached cart changes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DerivedQuery {
    ItemCount,
    Total,
    Contains(ProductId),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DerivedValue {
    Count(u32),
    Amount(Decimal),
    Flag(bool),
}

#[derive(Default)]
struct UserQueries {
    cart: Option<CachedCart>,
    derived: HashMap<DerivedQuery, DerivedValue>,
    generation: u64,
}

impl UserQueries {
    fn replace_cart(&mut self, cart: Option<CachedCart>) {
        self.cart = cart;
        self.derived.clear();
    }
}

/// Proof that a fetch started at a given generation.
#[derive(Debug)]
pub struct FetchTicket {
    user_id: UserId,
    generation: u64,
}

#[derive(Default)]
pub struct QueryCache {
    users: Mutex<HashMap<UserId, UserQueries>>,
}

impl QueryCache {
    pub fn new() -> Self { Self::default() }

    pub async fn cart(&self, user_id: &UserId) -> Option<CachedCart> {
        self.users.lock().await.get(user_id).and_then(|q| q.cart.clone())
    }

    pub async fn set_cart(&self, user_id: &UserId, cart: Cart, state: CacheState) {
        self.users.lock().await.entry(user_id.clone()).or_default().replace_cart(Some(CachedCart { cart, state }));
    }

    /// Puts back a snapshot exactly, including the absence of a cached cart.
    pub async fn restore_cart(&self, user_id: &UserId, snapshot: Option<CachedCart>) {
        self.users.lock().await.entry(user_id.clone()).or_default().replace_cart(snapshot);
    }

    /// Marks the cart stale so the next read refetches it.
    pub async fn invalidate_cart(&self, user_id: &UserId) {
        if let Some(q) = self.users.lock().await.get_mut(user_id) {
            q.replace_cart(None);
        }
    }

    pub async fn derived(&self, user_id: &UserId, query: &DerivedQuery) -> Option<DerivedValue> {
        self.users.lock().await.get(user_id).and_then(|q| q.derived.get(query).copied())
    }

    pub async fn set_derived(&self, user_id: &UserId, query: DerivedQuery, value: DerivedValue) {
        self.users.lock().await.entry(user_id.clone()).or_default().derived.insert(query, value);
    }

    /// Drops item count, total and every "is product in cart" answer.
    pub async fn invalidate_derived(&self, user_id: &UserId) {
        if let Some(q) = self.users.lock().await.get_mut(user_id) {
            q.derived.clear();
        }
    }

    pub async fn begin_fetch(&self, user_id: &UserId) -> FetchTicket {
        let generation = self.users.lock().await.entry(user_id.clone()).or_default().generation;
        FetchTicket { user_id: user_id.clone(), generation }
    }

    /// Stores a fetched cart as confirmed unless the fetch was cancelled meanwhile.
    pub async fn complete_fetch(&self, ticket: FetchTicket, cart: Cart) -> bool {
        let mut users = self.users.lock().await;
        let q = users.entry(ticket.user_id).or_default();
        if q.generation != ticket.generation {
            return false;
        }
        q.replace_cart(Some(CachedCart { cart, state: CacheState::Confirmed }));
        true
    }

    /// Cancels every in-flight cart fetch for the user.
    pub async fn cancel_fetches(&self, user_id: &UserId) {
        let mut users = self.users.lock().await;
        let q = users.entry(user_id.clone()).or_default();
        q.generation = q.generation.wrapping_add(1);
    }
}
