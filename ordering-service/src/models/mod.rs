//! Domain models for ordering-service.

mod coupon;
mod order;

pub use coupon::{Coupon, CouponChanges, CouponType, Discount, NewCoupon, UsageIncrement};
pub use order::{AppliedCoupon, NewOrder, Order, OrderItem, OrderPlacement, OrderStatus};
