//! Client side of the cart: a responsive local cache kept eventually
//! consistent with the storefront API through optimistic updates.

pub mod api;
pub mod cache;
pub mod engine;
pub mod identity;

pub use api::{CartApi, HttpCartApi, RemoteError};
pub use cache::{CacheState, CachedCart, QueryCache};
pub use engine::{CartEngine, CartError, OptimisticUpdate};
pub use identity::{AuthUser, IdentityProvider, SessionIdentity};
