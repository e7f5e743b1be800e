//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod reward;
pub mod user;

pub use product::Product;
pub use order::{is_valid_order_status, is_valid_payment_status, Address, Order, OrderStatus, PaidCheckout, PaymentStatus, UnknownStatus};
pub use cart::{Cart, CartEntry, LineItem, ProductDetails};
pub use reward::{Reward, RewardStats, RewardStatus};
pub use user::{BuyingHistoryEntry, Customer};
