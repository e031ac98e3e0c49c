//! HTTP handlers for ordering-service.

pub mod checkout;
pub mod coupons;
pub mod health;

pub use checkout::*;
pub use coupons::*;
pub use health::*;
