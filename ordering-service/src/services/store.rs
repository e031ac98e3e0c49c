//! Persistence interface for coupons and orders.

use crate::models::{
    Coupon, CouponChanges, NewCoupon, NewOrder, Order, OrderPlacement, UsageIncrement,
};
use async_trait::async_trait;
use service_core::error::AppError;
use uuid::Uuid;

/// Storage backend for the coupon engine. Every lookup is scoped to a
/// restaurant so one tenant can never read or mutate another's rows.
#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    /// Look up a coupon by its normalised code.
    async fn find_coupon_by_code(
        &self,
        restaurant_id: Uuid,
        coupon_code: &str,
    ) -> Result<Option<Coupon>, AppError>;

    async fn find_coupon_by_id(
        &self,
        restaurant_id: Uuid,
        coupon_id: Uuid,
    ) -> Result<Option<Coupon>, AppError>;

    /// All coupons of a restaurant, newest first.
    async fn list_coupons(&self, restaurant_id: Uuid) -> Result<Vec<Coupon>, AppError>;

    /// Whether `coupon_code` is taken in this restaurant by a coupon other
    /// than `excluding`.
    async fn code_exists(
        &self,
        restaurant_id: Uuid,
        coupon_code: &str,
        excluding: Option<Uuid>,
    ) -> Result<bool, AppError>;

    /// Insert a coupon. A duplicate code yields `AppError::Conflict`.
    async fn insert_coupon(&self, input: &NewCoupon) -> Result<Coupon, AppError>;

    /// Apply `changes`; `Ok(None)` when the coupon does not exist.
    async fn update_coupon(
        &self,
        restaurant_id: Uuid,
        coupon_id: Uuid,
        changes: &CouponChanges,
    ) -> Result<Option<Coupon>, AppError>;

    async fn delete_coupon(&self, restaurant_id: Uuid, coupon_id: Uuid)
        -> Result<bool, AppError>;

    /// Add one use only while `current_usage_count < max_usage_count`,
    /// as a single indivisible step. The same step also requires the coupon
    /// to be active and inside its validity window.
    async fn atomic_increment_usage(
        &self,
        restaurant_id: Uuid,
        coupon_id: Uuid,
    ) -> Result<UsageIncrement, AppError>;

    /// Persist an order. When it carries a coupon the usage increment and
    /// the insert commit together; a refused increment writes nothing and
    /// reports why the coupon no longer applies.
    async fn place_order(&self, order: NewOrder) -> Result<OrderPlacement, AppError>;

    async fn get_order(&self, restaurant_id: Uuid, order_id: Uuid)
        -> Result<Option<Order>, AppError>;
}
