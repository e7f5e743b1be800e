//! Cart Reconciliation Engine.
//!
//! Every mutation runs as a three-phase transaction over the query cache:
//! snapshot (after cancelling in-flight fetches), speculative apply, then
//! commit the server's cart or restore the snapshot. The server response is
//! always authoritative; concurrent mutations resolve as last response wins.

use futures::stream::{FuturesUnordered, StreamExt};
use rust_decimal::Decimal;
use serde_json::Value;
use std::{future::Future, sync::Arc};
use thiserror::Error;
use tracing::{debug, warn};

use super::api::{CartApi, RemoteError};
use super::cache::{CacheState, CachedCart, DerivedQuery, DerivedValue, QueryCache};
use super::identity::{AuthUser, IdentityProvider};
use crate::domain::{Cart, LineItem, ProductId, UserId};

const FETCH_FAILED: &str = "Failed to fetch cart";
const ADD_FAILED: &str = "Failed to add item to cart";
const REMOVE_FAILED: &str = "Failed to remove item from cart";
const CLEAR_FAILED: &str = "Failed to clear cart";
const BULK_ADD_FAILED: &str = "Failed to add items to cart";
const PAYMENT_INTENT_FAILED: &str = "Failed to create payment intent";

/// Errors carry a message fit to show the customer as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("Please sign in to use your cart")]
    Unauthenticated,

    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    #[error("{0}")]
    RemoteRequestFailed(String),
}

impl CartError {
    fn remote(e: RemoteError, fallback: &str) -> Self {
        Self::RemoteRequestFailed(e.message.unwrap_or_else(|| fallback.to_string()))
    }
}

/// Snapshot, speculative apply, commit-or-restore.
pub struct OptimisticUpdate<'a> {
    cache: &'a QueryCache,
    user_id: &'a UserId,
    snapshot: Option<CachedCart>,
}

impl<'a> OptimisticUpdate<'a> {
    /// Cancels in-flight fetches for the user, then snapshots the cached cart.
    pub async fn begin(cache: &'a QueryCache, user_id: &'a UserId) -> Self {
        cache.cancel_fetches(user_id).await;
        let snapshot = cache.cart(user_id).await;
        Self { cache, user_id, snapshot }
    }

    pub fn snapshot(&self) -> Option<&CachedCart> { self.snapshot.as_ref() }

    /// Patches a copy of the snapshot. Nothing is written when there is no
    /// cached cart or the patch declines.
    pub async fn apply<F>(&self, patch: F) -> bool
    where
        F: FnOnce(&mut Cart) -> bool,
    {
        let Some(mut cart) = self.snapshot.as_ref().map(|c| c.cart.clone()) else {
            return false;
        };
        if !patch(&mut cart) {
            return false;
        }
        self.cache.set_cart(self.user_id, cart, CacheState::Optimistic).await;
        true
    }

    /// Unconditionally shows `cart` until the server answers.
    pub async fn replace(&self, cart: Cart) {
        self.cache.set_cart(self.user_id, cart, CacheState::Optimistic).await;
    }

    pub async fn commit(self, server: Cart) {
        self.cache.set_cart(self.user_id, server, CacheState::Confirmed).await;
        self.cache.invalidate_derived(self.user_id).await;
    }

    pub async fn rollback(self) {
        self.cache.restore_cart(self.user_id, self.snapshot).await;
        self.cache.invalidate_derived(self.user_id).await;
    }
}

pub struct CartEngine<A, I> {
    api: A,
    identity: I,
    cache: Arc<QueryCache>,
}

impl<A: CartApi, I: IdentityProvider> CartEngine<A, I> {
    pub fn new(api: A, identity: I) -> Self { Self::with_cache(api, identity, Arc::new(QueryCache::new())) }

    pub fn with_cache(api: A, identity: I, cache: Arc<QueryCache>) -> Self { Self { api, identity, cache } }

    pub fn cache(&self) -> &QueryCache { &self.cache }

    fn require_user(&self) -> Result<AuthUser, CartError> { self.identity.current_user().ok_or(CartError::Unauthenticated) }

    /// The cached cart, fetched on first use.
    pub async fn cart(&self) -> Result<Cart, CartError> {
        let user = self.require_user()?;
        self.current(&user).await
    }

    /// Always goes to the server. The result is cached unless a mutation
    /// cancelled this fetch while it was in flight.
    pub async fn refetch(&self) -> Result<Cart, CartError> {
        let user = self.require_user()?;
        self.fetch(&user).await
    }

    async fn current(&self, user: &AuthUser) -> Result<Cart, CartError> {
        match self.cache.cart(&user.user_id).await {
            Some(cached) => Ok(cached.cart),
            None => self.fetch(user).await,
        }
    }

    async fn fetch(&self, user: &AuthUser) -> Result<Cart, CartError> {
        let ticket = self.cache.begin_fetch(&user.user_id).await;
        let cart = self.api.fetch_cart(user).await.map_err(|e| CartError::remote(e, FETCH_FAILED))?;
        if !self.cache.complete_fetch(ticket, cart.clone()).await {
            debug!(user_id = %user.user_id, "discarding cancelled cart fetch");
        }
        Ok(cart)
    }

    pub async fn add(&self, product_id: &ProductId, quantity: u32) -> Result<Cart, CartError> {
        let user = self.require_user()?;
        self.add_for(&user, product_id, quantity).await
    }

    pub async fn remove(&self, product_id: &ProductId, quantity: u32) -> Result<Cart, CartError> {
        let user = self.require_user()?;
        self.remove_for(&user, product_id, quantity).await
    }

    /// Moves the entry to `target` units by issuing the add or remove of the
    /// difference. `target <= 0` deletes the entry; an unchanged quantity makes
    /// no request at all.
    pub async fn update_quantity(&self, product_id: &ProductId, target: i64) -> Result<Cart, CartError> {
        let user = self.require_user()?;
        if target <= 0 {
            return self.remove_for(&user, product_id, u32::MAX).await;
        }
        let current = self.current(&user).await?;
        let held = i64::from(current.quantity_of(product_id).unwrap_or(0));
        let difference = target - held;
        let delta = u32::try_from(difference.unsigned_abs()).map_err(|_| CartError::InvalidQuantity)?;
        match difference.signum() {
            1 => self.add_for(&user, product_id, delta).await,
            -1 => self.remove_for(&user, product_id, delta).await,
            _ => Ok(current),
        }
    }

    pub async fn clear(&self) -> Result<Cart, CartError> {
        let user = self.require_user()?;
        let tx = OptimisticUpdate::begin(&self.cache, &user.user_id).await;
        tx.replace(Cart::empty()).await;
        self.settle(tx, &user, self.api.clear_cart(&user), CLEAR_FAILED).await
    }

    /// Adds every item with one concurrent request each. The response that
    /// resolves last becomes the cache baseline; any failure rejects the batch
    /// and leaves the cart to be refetched.
    pub async fn bulk_add(&self, items: &[LineItem]) -> Result<Cart, CartError> {
        let user = self.require_user()?;
        if items.iter().any(|i| i.quantity == 0) {
            return Err(CartError::InvalidQuantity);
        }
        if items.is_empty() {
            return self.current(&user).await;
        }
        self.cache.cancel_fetches(&user.user_id).await;

        let mut pending: FuturesUnordered<_> =
            items.iter().map(|i| self.api.add_item(&user, &i.product_id, i.quantity)).collect();
        let mut last = None;
        let mut failure = None;
        // Issued requests cannot be recalled, so every one is driven to completion.
        while let Some(result) = pending.next().await {
            match result {
                Ok(cart) => last = Some(cart),
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }

        if let Some(e) = failure {
            warn!(user_id = %user.user_id, error = %e, items = items.len(), "bulk add failed");
            self.cache.invalidate_cart(&user.user_id).await;
            self.cache.invalidate_derived(&user.user_id).await;
            return Err(CartError::remote(e, BULK_ADD_FAILED));
        }
        let Some(cart) = last else {
            return self.current(&user).await;
        };
        self.cache.set_cart(&user.user_id, cart.clone(), CacheState::Confirmed).await;
        self.cache.invalidate_derived(&user.user_id).await;
        Ok(cart)
    }

    pub async fn item_count(&self) -> Result<u32, CartError> {
        let user = self.require_user()?;
        if let Some(DerivedValue::Count(n)) = self.cache.derived(&user.user_id, &DerivedQuery::ItemCount).await {
            return Ok(n);
        }
        let n = self.current(&user).await?.item_count();
        self.cache.set_derived(&user.user_id, DerivedQuery::ItemCount, DerivedValue::Count(n)).await;
        Ok(n)
    }

    pub async fn total(&self) -> Result<Decimal, CartError> {
        let user = self.require_user()?;
        if let Some(DerivedValue::Amount(total)) = self.cache.derived(&user.user_id, &DerivedQuery::Total).await {
            return Ok(total);
        }
        let total = self.current(&user).await?.total_price;
        self.cache.set_derived(&user.user_id, DerivedQuery::Total, DerivedValue::Amount(total)).await;
        Ok(total)
    }

    pub async fn contains_product(&self, product_id: &ProductId) -> Result<bool, CartError> {
        let user = self.require_user()?;
        let query = DerivedQuery::Contains(product_id.clone());
        if let Some(DerivedValue::Flag(found)) = self.cache.derived(&user.user_id, &query).await {
            return Ok(found);
        }
        let found = self.current(&user).await?.contains(product_id);
        self.cache.set_derived(&user.user_id, query, DerivedValue::Flag(found)).await;
        Ok(found)
    }

    /// Straight passthrough to the payment provider; the cache is not involved.
    pub async fn create_payment_intent(&self, cart_id: &str) -> Result<Value, CartError> {
        let user = self.require_user()?;
        self.api
            .create_payment_intent(&user, cart_id)
            .await
            .map_err(|e| CartError::remote(e, PAYMENT_INTENT_FAILED))
    }

    async fn add_for(&self, user: &AuthUser, product_id: &ProductId, quantity: u32) -> Result<Cart, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let tx = OptimisticUpdate::begin(&self.cache, &user.user_id).await;
        let patched = tx.apply(|cart| cart.apply_optimistic_add(product_id, quantity)).await;
        debug!(user_id = %user.user_id, %product_id, quantity, patched, "adding to cart");
        self.settle(tx, user, self.api.add_item(user, product_id, quantity), ADD_FAILED).await
    }

    async fn remove_for(&self, user: &AuthUser, product_id: &ProductId, quantity: u32) -> Result<Cart, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let tx = OptimisticUpdate::begin(&self.cache, &user.user_id).await;
        let patched = tx.apply(|cart| cart.apply_optimistic_remove(product_id, quantity)).await;
        debug!(user_id = %user.user_id, %product_id, quantity, patched, "removing from cart");
        self.settle(tx, user, self.api.remove_item(user, product_id, quantity), REMOVE_FAILED).await
    }

    async fn settle<F>(&self, tx: OptimisticUpdate<'_>, user: &AuthUser, remote: F, fallback: &str) -> Result<Cart, CartError>
    where
        F: Future<Output = Result<Cart, RemoteError>>,
    {
        match remote.await {
            Ok(server) => {
                tx.commit(server.clone()).await;
                Ok(server)
            }
            Err(e) => {
                warn!(user_id = %user.user_id, error = %e, "cart mutation failed, restoring snapshot");
                tx.rollback().await;
                Err(CartError::remote(e, fallback))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::identity::SessionIdentity;
    use crate::domain::ProductDetails;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// In-process stand-in for the cart endpoints.
    #[derive(Default)]
    struct FakeApi {
        server: Mutex<Cart>,
        catalogue: HashMap<ProductId, ProductDetails>,
        calls: AtomicUsize,
        failure: Mutex<Option<RemoteError>>,
        gate_mutations: AtomicBool,
        gate_fetches: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl FakeApi {
        fn with_catalogue() -> Self {
            let catalogue = HashMap::from([
                (ProductId::new("p1"), ProductDetails { name: "Lip filler".into(), price: Decimal::new(180, 0), image_url: None }),
                (ProductId::new("p2"), ProductDetails { name: "Peel".into(), price: Decimal::new(6550, 2), image_url: None }),
            ]);
            Self { catalogue, ..Self::default() }
        }

        fn fail_with(&self, e: Option<RemoteError>) { *self.failure.lock().unwrap() = e; }
        fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

        fn seed(&self, lines: Vec<LineItem>) {
            let mut cart = Cart::from_lines(lines);
            cart.resolve_details(|id| self.catalogue.get(id).cloned());
            *self.server.lock().unwrap() = cart;
        }

        async fn gate(&self, flag: &AtomicBool) {
            if flag.load(Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
        }

        async fn mutate(&self, op: impl FnOnce(&mut Cart)) -> Result<Cart, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate(&self.gate_mutations).await;
            if let Some(e) = self.failure.lock().unwrap().clone() {
                return Err(e);
            }
            let mut cart = self.server.lock().unwrap();
            op(&mut cart);
            cart.resolve_details(|id| self.catalogue.get(id).cloned());
            Ok(cart.clone())
        }
    }

    #[async_trait]
    impl CartApi for FakeApi {
        async fn fetch_cart(&self, _user: &AuthUser) -> Result<Cart, RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let snapshot = self.server.lock().unwrap().clone();
            self.gate(&self.gate_fetches).await;
            Ok(snapshot)
        }
        async fn add_item(&self, _user: &AuthUser, product_id: &ProductId, quantity: u32) -> Result<Cart, RemoteError> {
            self.mutate(|c| c.add_item(product_id.clone(), quantity)).await
        }
        async fn remove_item(&self, _user: &AuthUser, product_id: &ProductId, quantity: u32) -> Result<Cart, RemoteError> {
            self.mutate(|c| c.remove_item(product_id, quantity)).await
        }
        async fn clear_cart(&self, _user: &AuthUser) -> Result<Cart, RemoteError> {
            self.mutate(Cart::clear).await
        }
        async fn create_payment_intent(&self, _user: &AuthUser, cart_id: &str) -> Result<Value, RemoteError> {
            Ok(serde_json::json!({"id": "pi_1", "cartId": cart_id}))
        }
    }

    fn engine(api: FakeApi) -> CartEngine<FakeApi, SessionIdentity> {
        CartEngine::new(api, SessionIdentity::signed_in("u1", "token"))
    }

    fn line(id: &str, quantity: u32) -> LineItem { LineItem { product_id: ProductId::new(id), quantity } }
    fn p(id: &str) -> ProductId { ProductId::new(id) }
    fn user() -> UserId { UserId::new("u1") }

    #[tokio::test]
    async fn every_operation_requires_a_user() {
        let engine = CartEngine::new(FakeApi::with_catalogue(), SessionIdentity::default());
        assert_eq!(engine.cart().await, Err(CartError::Unauthenticated));
        assert_eq!(engine.add(&p("p1"), 1).await, Err(CartError::Unauthenticated));
        assert_eq!(engine.update_quantity(&p("p1"), 0).await, Err(CartError::Unauthenticated));
        assert_eq!(engine.clear().await, Err(CartError::Unauthenticated));
        assert_eq!(engine.item_count().await, Err(CartError::Unauthenticated));
        assert_eq!(engine.create_payment_intent("c1").await, Err(CartError::Unauthenticated));
        assert_eq!(engine.api.calls(), 0);
    }

    #[tokio::test]
    async fn cart_is_fetched_once_then_served_from_cache() {
        let api = FakeApi::with_catalogue();
        api.seed(vec![line("p1", 1)]);
        let engine = engine(api);
        let first = engine.cart().await.unwrap();
        let second = engine.cart().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.api.calls(), 1);
        assert_eq!(engine.cache().cart(&user()).await.unwrap().state, CacheState::Confirmed);
    }

    #[tokio::test]
    async fn add_patches_priced_entry_while_in_flight() {
        let api = FakeApi::with_catalogue();
        api.seed(vec![line("p1", 1)]);
        let engine = engine(api);
        engine.cart().await.unwrap();
        engine.api.gate_mutations.store(true, Ordering::SeqCst);

        let product = p("p1");
        let (result, ()) = tokio::join!(engine.add(&product, 2), async {
            engine.api.entered.notified().await;
            let cached = engine.cache().cart(&user()).await.unwrap();
            assert_eq!(cached.state, CacheState::Optimistic);
            assert_eq!(cached.cart.quantity_of(&p("p1")), Some(3));
            assert_eq!(cached.cart.total_price, Decimal::new(540, 0));
            engine.api.release.notify_one();
        });

        let cart = result.unwrap();
        assert_eq!(cart.quantity_of(&p("p1")), Some(3));
        assert_eq!(engine.cache().cart(&user()).await.unwrap().state, CacheState::Confirmed);
    }

    #[tokio::test]
    async fn add_of_uncached_product_waits_for_server() {
        let api = FakeApi::with_catalogue();
        api.seed(vec![line("p1", 1)]);
        let engine = engine(api);
        engine.cart().await.unwrap();
        engine.api.gate_mutations.store(true, Ordering::SeqCst);

        let product = p("p2");
        let (result, ()) = tokio::join!(engine.add(&product, 1), async {
            engine.api.entered.notified().await;
            let cached = engine.cache().cart(&user()).await.unwrap();
            assert!(!cached.cart.contains(&p("p2")));
            assert_eq!(cached.state, CacheState::Confirmed);
            engine.api.release.notify_one();
        });

        let cart = result.unwrap();
        assert_eq!(cart.entry(&p("p2")).unwrap().product_details.as_ref().unwrap().price, Decimal::new(6550, 2));
        assert_eq!(cart.total_price, Decimal::new(24550, 2));
    }

    #[tokio::test]
    async fn failed_mutation_restores_exact_snapshot() {
        let api = FakeApi::with_catalogue();
        api.seed(vec![line("p1", 2), line("p2", 1)]);
        let engine = engine(api);
        engine.cart().await.unwrap();
        let before = engine.cache().cart(&user()).await;

        engine.api.fail_with(Some(RemoteError::with_message(409, "Treatment unavailable")));
        assert_eq!(engine.add(&p("p1"), 1).await, Err(CartError::RemoteRequestFailed("Treatment unavailable".into())));
        assert_eq!(engine.cache().cart(&user()).await, before);

        engine.api.fail_with(Some(RemoteError::transport()));
        assert_eq!(engine.remove(&p("p1"), 1).await, Err(CartError::RemoteRequestFailed(REMOVE_FAILED.into())));
        assert_eq!(engine.cache().cart(&user()).await, before);
        assert_eq!(engine.add(&p("p1"), 1).await, Err(CartError::RemoteRequestFailed(ADD_FAILED.into())));
        assert_eq!(engine.cache().cart(&user()).await, before);
    }

    #[tokio::test]
    async fn failure_without_cached_cart_restores_nothing() {
        let engine = engine(FakeApi::with_catalogue());
        engine.api.fail_with(Some(RemoteError::transport()));
        assert!(engine.clear().await.is_err());
        assert!(engine.cache().cart(&user()).await.is_none());
    }

    #[tokio::test]
    async fn clear_empties_and_rolls_back() {
        let api = FakeApi::with_catalogue();
        api.seed(vec![line("p1", 2)]);
        let engine = engine(api);
        engine.cart().await.unwrap();
        let before = engine.cache().cart(&user()).await;

        engine.api.fail_with(Some(RemoteError::transport()));
        assert_eq!(engine.clear().await, Err(CartError::RemoteRequestFailed(CLEAR_FAILED.into())));
        assert_eq!(engine.cache().cart(&user()).await, before);

        engine.api.fail_with(None);
        let cart = engine.clear().await.unwrap();
        assert!(cart.products.is_empty());
        assert_eq!(cart.total_price, Decimal::ZERO);
    }

    #[tokio::test]
    async fn update_to_same_quantity_makes_no_request() {
        let api = FakeApi::with_catalogue();
        api.seed(vec![line("p1", 2)]);
        let engine = engine(api);
        let before = engine.cart().await.unwrap();
        let calls = engine.api.calls();
        let after = engine.update_quantity(&p("p1"), 2).await.unwrap();
        assert_eq!(after, before);
        assert_eq!(engine.api.calls(), calls);
    }

    #[tokio::test]
    async fn update_quantity_issues_the_difference() {
        let api = FakeApi::with_catalogue();
        api.seed(vec![line("p1", 2), line("p2", 1)]);
        let engine = engine(api);
        engine.cart().await.unwrap();

        let cart = engine.update_quantity(&p("p1"), 5).await.unwrap();
        assert_eq!(cart.quantity_of(&p("p1")), Some(5));
        let cart = engine.update_quantity(&p("p1"), 1).await.unwrap();
        assert_eq!(cart.quantity_of(&p("p1")), Some(1));
        let cart = engine.update_quantity(&p("p2"), 0).await.unwrap();
        assert!(!cart.contains(&p("p2")));
        assert_eq!(cart.total_price, Decimal::new(180, 0));
    }

    #[tokio::test]
    async fn add_then_remove_round_trips() {
        let api = FakeApi::with_catalogue();
        api.seed(vec![line("p1", 1)]);
        let engine = engine(api);
        let before = engine.cart().await.unwrap();
        engine.add(&p("p2"), 3).await.unwrap();
        let after = engine.remove(&p("p2"), 3).await.unwrap();
        assert_eq!(after, before);
        assert_eq!(engine.cache().cart(&user()).await.unwrap().cart, before);
    }

    #[tokio::test]
    async fn totals_stay_consistent_across_mutations() {
        let engine = engine(FakeApi::with_catalogue());
        let ops: [(&str, i64); 8] = [("p1", 2), ("p2", 3), ("p1", 1), ("p2", 0), ("p2", 4), ("p1", 6), ("p1", -1), ("p2", 2)];
        for (id, target) in ops {
            let cart = engine.update_quantity(&p(id), target).await.unwrap();
            assert!(cart.products.iter().all(|e| e.quantity >= 1));
            let expected: Decimal = cart.products.iter().filter_map(|e| e.line_total()).sum();
            assert_eq!(cart.total_price, expected);
        }
        let cart = engine.cart().await.unwrap();
        assert_eq!(cart.quantity_of(&p("p2")), Some(2));
        assert!(!cart.contains(&p("p1")));
    }

    #[tokio::test]
    async fn derived_reads_refresh_after_mutation() {
        let api = FakeApi::with_catalogue();
        api.seed(vec![line("p1", 2)]);
        let engine = engine(api);
        assert_eq!(engine.item_count().await.unwrap(), 2);
        assert_eq!(engine.api.calls(), 1);
        assert!(!engine.contains_product(&p("p2")).await.unwrap());
        assert_eq!(engine.total().await.unwrap(), Decimal::new(360, 0));

        engine.add(&p("p2"), 1).await.unwrap();
        assert_eq!(engine.item_count().await.unwrap(), 3);
        assert!(engine.contains_product(&p("p2")).await.unwrap());
        assert_eq!(engine.total().await.unwrap(), Decimal::new(42550, 2));
    }

    #[tokio::test]
    async fn derived_reads_follow_a_refetch() {
        let api = FakeApi::with_catalogue();
        api.seed(vec![line("p1", 1)]);
        let engine = engine(api);
        assert_eq!(engine.item_count().await.unwrap(), 1);
        assert!(!engine.contains_product(&p("p2")).await.unwrap());
        assert_eq!(engine.total().await.unwrap(), Decimal::new(180, 0));

        // Another session changed the cart on the server.
        engine.api.seed(vec![line("p1", 1), line("p2", 3)]);
        let cart = engine.refetch().await.unwrap();
        assert_eq!(cart.item_count(), 4);

        assert_eq!(engine.item_count().await.unwrap(), 4);
        assert!(engine.contains_product(&p("p2")).await.unwrap());
        assert_eq!(engine.total().await.unwrap(), Decimal::new(37650, 2));
    }

    #[tokio::test]
    async fn first_load_after_derived_read_keeps_them_consistent() {
        let api = FakeApi::with_catalogue();
        api.seed(vec![line("p1", 2)]);
        let engine = engine(api);
        assert_eq!(engine.item_count().await.unwrap(), 2);

        engine.cache().invalidate_cart(&user()).await;
        engine.api.seed(vec![line("p1", 5)]);
        assert_eq!(engine.cart().await.unwrap().item_count(), 5);
        assert_eq!(engine.item_count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn update_of_unpriced_entry_waits_for_server() {
        let api = FakeApi::with_catalogue();
        // p3 is not in the catalogue, so the server returns it without details.
        api.seed(vec![line("p1", 1), line("p3", 1)]);
        let engine = engine(api);
        let before = engine.cart().await.unwrap();
        assert!(!before.entry(&p("p3")).unwrap().is_priced());
        engine.api.gate_mutations.store(true, Ordering::SeqCst);

        let product = p("p3");
        let (result, ()) = tokio::join!(engine.update_quantity(&product, 3), async {
            engine.api.entered.notified().await;
            let cached = engine.cache().cart(&user()).await.unwrap();
            assert_eq!(cached.state, CacheState::Confirmed);
            assert_eq!(cached.cart, before);
            engine.api.release.notify_one();
        });

        assert_eq!(result.unwrap().quantity_of(&p("p3")), Some(3));
        let cached = engine.cache().cart(&user()).await.unwrap();
        assert_eq!(cached.state, CacheState::Confirmed);
        assert_eq!(cached.cart.quantity_of(&p("p3")), Some(3));
    }

    #[tokio::test]
    async fn mutation_cancels_in_flight_fetch() {
        let api = FakeApi::with_catalogue();
        api.seed(vec![line("p1", 1)]);
        let engine = engine(api);
        engine.cart().await.unwrap();
        engine.api.gate_fetches.store(true, Ordering::SeqCst);

        let (stale, ()) = tokio::join!(engine.refetch(), async {
            engine.api.entered.notified().await;
            engine.add(&p("p1"), 1).await.unwrap();
            engine.api.release.notify_one();
        });

        assert_eq!(stale.unwrap().quantity_of(&p("p1")), Some(1));
        assert_eq!(engine.cache().cart(&user()).await.unwrap().cart.quantity_of(&p("p1")), Some(2));
    }

    #[tokio::test]
    async fn bulk_add_adopts_final_server_cart() {
        let engine = engine(FakeApi::with_catalogue());
        let cart = engine.bulk_add(&[line("p1", 1), line("p2", 2)]).await.unwrap();
        assert_eq!(cart.item_count(), 3);
        assert_eq!(engine.api.calls(), 2);
        assert_eq!(engine.cache().cart(&user()).await.unwrap().cart, cart);
    }

    #[tokio::test]
    async fn bulk_add_rejects_whole_batch_on_failure() {
        let engine = engine(FakeApi::with_catalogue());
        engine.cart().await.unwrap();
        engine.api.fail_with(Some(RemoteError::transport()));
        let err = engine.bulk_add(&[line("p1", 1), line("p2", 1)]).await.unwrap_err();
        assert_eq!(err, CartError::RemoteRequestFailed(BULK_ADD_FAILED.into()));
        assert!(engine.cache().cart(&user()).await.is_none());
        assert_eq!(engine.bulk_add(&[line("p1", 0)]).await, Err(CartError::InvalidQuantity));
    }

    #[tokio::test]
    async fn payment_intent_leaves_cache_alone() {
        let engine = engine(FakeApi::with_catalogue());
        let intent = engine.create_payment_intent("cart-1").await.unwrap();
        assert_eq!(intent["cartId"], "cart-1");
        assert!(engine.cache().cart(&user()).await.is_none());
    }
}
