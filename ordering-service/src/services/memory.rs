//! In-process coupon store for local development and tests.

use crate::coupons::is_redeemable;
use crate::models::{
    Coupon, CouponChanges, NewCoupon, NewOrder, Order, OrderPlacement, UsageIncrement,
};
use crate::services::store::CouponStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Default)]
struct State {
    coupons: HashMap<Uuid, Coupon>,
    orders: HashMap<Uuid, Order>,
}

/// Store backed by a `HashMap` behind one lock, so the usage increment and
/// order insert of `place_order` are a single critical section.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    unavailable: RwLock<bool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the database were unreachable.
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    async fn ensure_available(&self) -> Result<(), AppError> {
        if *self.unavailable.read().await {
            return Err(AppError::DatabaseError(anyhow::anyhow!(
                "in-memory store marked unavailable"
            )));
        }
        Ok(())
    }
}

fn duplicate_code(code: &str) -> AppError {
    AppError::Conflict(anyhow::anyhow!(
        "Coupon code '{}' already exists for this restaurant",
        code
    ))
}

fn increment(coupon: &mut Coupon, now: DateTime<Utc>) -> UsageIncrement {
    if !is_redeemable(coupon, now) {
        return UsageIncrement::CapacityExceeded;
    }
    coupon.current_usage_count += 1;
    coupon.updated_utc = now;
    UsageIncrement::Applied(coupon.current_usage_count)
}

#[async_trait]
impl CouponStore for InMemoryStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.ensure_available().await
    }

    async fn find_coupon_by_code(
        &self,
        restaurant_id: Uuid,
        coupon_code: &str,
    ) -> Result<Option<Coupon>, AppError> {
        self.ensure_available().await?;
        let state = self.state.read().await;
        Ok(state
            .coupons
            .values()
            .find(|c| c.restaurant_id == restaurant_id && c.coupon_code == coupon_code)
            .cloned())
    }

    async fn find_coupon_by_id(
        &self,
        restaurant_id: Uuid,
        coupon_id: Uuid,
    ) -> Result<Option<Coupon>, AppError> {
        self.ensure_available().await?;
        let state = self.state.read().await;
        Ok(state
            .coupons
            .get(&coupon_id)
            .filter(|c| c.restaurant_id == restaurant_id)
            .cloned())
    }

    async fn list_coupons(&self, restaurant_id: Uuid) -> Result<Vec<Coupon>, AppError> {
        self.ensure_available().await?;
        let state = self.state.read().await;
        let mut coupons: Vec<Coupon> = state
            .coupons
            .values()
            .filter(|c| c.restaurant_id == restaurant_id)
            .cloned()
            .collect();
        coupons.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(coupons)
    }

    async fn code_exists(
        &self,
        restaurant_id: Uuid,
        coupon_code: &str,
        excluding: Option<Uuid>,
    ) -> Result<bool, AppError> {
        self.ensure_available().await?;
        let state = self.state.read().await;
        Ok(state.coupons.values().any(|c| {
            c.restaurant_id == restaurant_id
                && c.coupon_code == coupon_code
                && Some(c.coupon_id) != excluding
        }))
    }

    #[instrument(skip(self, input), fields(restaurant_id = %input.restaurant_id))]
    async fn insert_coupon(&self, input: &NewCoupon) -> Result<Coupon, AppError> {
        self.ensure_available().await?;
        let mut state = self.state.write().await;

        let taken = state.coupons.values().any(|c| {
            c.restaurant_id == input.restaurant_id && c.coupon_code == input.coupon_code
        });
        if taken {
            return Err(duplicate_code(&input.coupon_code));
        }

        let now = Utc::now();
        let coupon = Coupon {
            coupon_id: Uuid::new_v4(),
            restaurant_id: input.restaurant_id,
            coupon_code: input.coupon_code.clone(),
            coupon_type: input.coupon_type,
            discount_value: input.discount_value,
            max_discount_amount: input.max_discount_amount,
            min_order_value: input.min_order_value,
            max_usage_count: input.max_usage_count,
            current_usage_count: 0,
            start_date: input.start_date,
            end_date: input.end_date,
            is_active: input.is_active,
            created_utc: now,
            updated_utc: now,
        };
        state.coupons.insert(coupon.coupon_id, coupon.clone());

        info!(coupon_id = %coupon.coupon_id, coupon_code = %coupon.coupon_code, "Coupon created");
        Ok(coupon)
    }

    #[instrument(skip(self, changes))]
    async fn update_coupon(
        &self,
        restaurant_id: Uuid,
        coupon_id: Uuid,
        changes: &CouponChanges,
    ) -> Result<Option<Coupon>, AppError> {
        self.ensure_available().await?;
        let mut state = self.state.write().await;

        if let Some(code) = &changes.coupon_code {
            let taken = state.coupons.values().any(|c| {
                c.restaurant_id == restaurant_id
                    && c.coupon_code == *code
                    && c.coupon_id != coupon_id
            });
            if taken {
                return Err(duplicate_code(code));
            }
        }

        let Some(existing) = state
            .coupons
            .get_mut(&coupon_id)
            .filter(|c| c.restaurant_id == restaurant_id)
        else {
            return Ok(None);
        };

        let mut updated = changes.apply_to(existing);
        if updated.max_usage_count < updated.current_usage_count {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "max_usage_count cannot be lower than the current usage count ({})",
                updated.current_usage_count
            )));
        }
        updated.updated_utc = Utc::now();
        *existing = updated.clone();

        Ok(Some(updated))
    }

    async fn delete_coupon(&self, restaurant_id: Uuid, coupon_id: Uuid) -> Result<bool, AppError> {
        self.ensure_available().await?;
        let mut state = self.state.write().await;
        let owned = state
            .coupons
            .get(&coupon_id)
            .is_some_and(|c| c.restaurant_id == restaurant_id);
        if owned {
            state.coupons.remove(&coupon_id);
            for order in state.orders.values_mut() {
                if order.coupon_id == Some(coupon_id) {
                    order.coupon_id = None;
                }
            }
        }
        Ok(owned)
    }

    async fn atomic_increment_usage(
        &self,
        restaurant_id: Uuid,
        coupon_id: Uuid,
    ) -> Result<UsageIncrement, AppError> {
        self.ensure_available().await?;
        let mut state = self.state.write().await;
        Ok(match state
            .coupons
            .get_mut(&coupon_id)
            .filter(|c| c.restaurant_id == restaurant_id)
        {
            Some(coupon) => increment(coupon, Utc::now()),
            None => UsageIncrement::CapacityExceeded,
        })
    }

    #[instrument(skip(self, order), fields(restaurant_id = %order.restaurant_id))]
    async fn place_order(&self, order: NewOrder) -> Result<OrderPlacement, AppError> {
        self.ensure_available().await?;
        let mut state = self.state.write().await;

        let now = Utc::now();
        if let Some(applied) = &order.coupon {
            let coupon = state
                .coupons
                .get_mut(&applied.coupon_id)
                .filter(|c| c.restaurant_id == order.restaurant_id);
            let refused = match coupon {
                Some(coupon) => match increment(coupon, now) {
                    UsageIncrement::Applied(_) => None,
                    UsageIncrement::CapacityExceeded => {
                        Some(OrderPlacement::refused(Some(&*coupon), now))
                    }
                },
                None => Some(OrderPlacement::CouponGone),
            };
            if let Some(refused) = refused {
                return Ok(refused);
            }
        }

        let order = order.into_order(Uuid::new_v4(), now);
        state.orders.insert(order.order_id, order.clone());

        info!(order_id = %order.order_id, "Order stored");
        Ok(OrderPlacement::Placed(order))
    }

    async fn get_order(
        &self,
        restaurant_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<Order>, AppError> {
        self.ensure_available().await?;
        let state = self.state.read().await;
        Ok(state
            .orders
            .get(&order_id)
            .filter(|o| o.restaurant_id == restaurant_id)
            .cloned())
    }
}
