//! Services layer for ordering-service.
//!
//! Persistence (Postgres or in-memory), the customer checkout flow,
//! coupon administration and order notifications.

mod admin;
mod checkout;
mod database;
mod memory;
pub mod metrics;
mod notifier;
pub mod store;

pub use admin::CouponAdmin;
pub use checkout::{CheckoutService, CouponError, PlaceOrderError};
pub use database::Database;
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use notifier::{
    render_order_message, DisabledNotifier, NotifierError, OrderNotifier, TelegramNotifier,
};
pub use store::CouponStore;
