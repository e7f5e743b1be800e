//! Clinic Commerce
//!
//! Cart and checkout backend for the clinic storefront.
//!
//! ## Features
//! - Server-side carts with live product pricing
//! - Client cart engine with optimistic updates and rollback
//! - Payment intents and webhook-driven order materialization
//! - Stock adjustment and customer buying history
//! - Referral reward administration

pub mod api;
pub mod cart;
pub mod client;
pub mod config;
pub mod domain;
pub mod events;
pub mod orders;
pub mod payments;
pub mod rewards;
pub mod store;

pub use api::{router, AppState};
pub use config::{AppConfig, ConfigError};
