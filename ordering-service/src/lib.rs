//! ordering-service: coupon engine and order placement for restaurant menus.

pub mod config;
pub mod coupons;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

pub use startup::{build_router, AppState, Application};
