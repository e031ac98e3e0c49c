//! Coupon administration for restaurant dashboards.

use crate::coupons::{generate_code, normalize_code, validate_code_format};
use crate::dtos::coupon::{CreateCouponRequest, UpdateCouponRequest};
use crate::models::{Coupon, CouponChanges, CouponType, NewCoupon, Order};
use crate::services::metrics::record_coupon_operation;
use crate::services::store::CouponStore;
use rust_decimal::Decimal;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Attempts at drawing an unused random code before giving up.
const MAX_GENERATION_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct CouponAdmin {
    store: Arc<dyn CouponStore>,
}

fn bad_request(message: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(anyhow::anyhow!("{}", message))
}

fn coupon_not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Coupon not found"))
}

fn code_taken(code: &str) -> AppError {
    AppError::Conflict(anyhow::anyhow!(
        "Coupon code '{}' already exists for this restaurant",
        code
    ))
}

/// Normalise an admin-entered code and check its format.
fn admin_code(raw: &str) -> Result<String, AppError> {
    let code = normalize_code(raw);
    validate_code_format(&code).map_err(bad_request)?;
    Ok(code)
}

/// Business rules every stored coupon satisfies.
fn validate_terms(coupon: &NewCoupon) -> Result<(), AppError> {
    if coupon.end_date <= coupon.start_date {
        return Err(bad_request("End date must be after start date"));
    }
    if coupon.discount_value < Decimal::ZERO {
        return Err(bad_request("Discount value cannot be negative"));
    }
    match coupon.coupon_type {
        CouponType::Flat if coupon.discount_value.is_zero() => {
            return Err(bad_request("Flat discount must be greater than zero"));
        }
        CouponType::Percentage
            if coupon.discount_value.is_zero() || coupon.discount_value > Decimal::ONE_HUNDRED =>
        {
            return Err(bad_request("Percentage discount must be between 0 and 100"));
        }
        _ => {}
    }
    if coupon.max_discount_amount.is_some_and(|cap| cap < Decimal::ZERO) {
        return Err(bad_request("Maximum discount amount cannot be negative"));
    }
    if coupon.min_order_value < Decimal::ZERO {
        return Err(bad_request("Minimum order value cannot be negative"));
    }
    if coupon.max_usage_count < 1 {
        return Err(bad_request("Usage limit must be at least 1"));
    }
    Ok(())
}

fn terms_of(coupon: &Coupon) -> NewCoupon {
    NewCoupon {
        restaurant_id: coupon.restaurant_id,
        coupon_code: coupon.coupon_code.clone(),
        coupon_type: coupon.coupon_type,
        discount_value: coupon.discount_value,
        max_discount_amount: coupon.max_discount_amount,
        min_order_value: coupon.min_order_value,
        max_usage_count: coupon.max_usage_count,
        start_date: coupon.start_date,
        end_date: coupon.end_date,
        is_active: coupon.is_active,
    }
}

impl CouponAdmin {
    pub fn new(store: Arc<dyn CouponStore>) -> Self {
        Self { store }
    }

    /// Draw random codes until one is unused in this restaurant.
    #[instrument(skip(self))]
    pub async fn generate_unique_code(&self, restaurant_id: Uuid) -> Result<String, AppError> {
        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let code = generate_code();
            if !self.store.code_exists(restaurant_id, &code, None).await? {
                return Ok(code);
            }
            warn!(attempt = attempt, "Generated coupon code collided, retrying");
        }
        Err(AppError::InternalError(anyhow::anyhow!(
            "Could not generate a unique coupon code after {} attempts",
            MAX_GENERATION_ATTEMPTS
        )))
    }

    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        restaurant_id: Uuid,
        request: CreateCouponRequest,
    ) -> Result<Coupon, AppError> {
        let coupon_code = match request.coupon_code.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let code = admin_code(raw)?;
                if self.store.code_exists(restaurant_id, &code, None).await? {
                    return Err(code_taken(&code));
                }
                code
            }
            _ => self.generate_unique_code(restaurant_id).await?,
        };

        let new_coupon = NewCoupon {
            restaurant_id,
            coupon_code,
            coupon_type: request.coupon_type,
            discount_value: request.discount_value,
            max_discount_amount: request.max_discount_amount,
            min_order_value: request.min_order_value.unwrap_or(Decimal::ZERO),
            max_usage_count: request.max_usage_count,
            start_date: request.start_date,
            end_date: request.end_date,
            is_active: request.is_active.unwrap_or(true),
        };
        validate_terms(&new_coupon)?;

        let coupon = self.store.insert_coupon(&new_coupon).await?;
        record_coupon_operation(&restaurant_id.to_string(), "create");

        Ok(coupon)
    }

    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        restaurant_id: Uuid,
        coupon_id: Uuid,
        request: UpdateCouponRequest,
    ) -> Result<Coupon, AppError> {
        let existing = self.get(restaurant_id, coupon_id).await?;

        let mut changes = CouponChanges::from(request);
        if let Some(raw) = changes.coupon_code.take() {
            let code = admin_code(&raw)?;
            if code != existing.coupon_code
                && self
                    .store
                    .code_exists(restaurant_id, &code, Some(coupon_id))
                    .await?
            {
                return Err(code_taken(&code));
            }
            changes.coupon_code = Some(code);
        }

        let merged = changes.apply_to(&existing);
        validate_terms(&terms_of(&merged))?;
        if merged.max_usage_count < existing.current_usage_count {
            return Err(bad_request(format!(
                "Usage limit cannot be lower than the current usage count ({})",
                existing.current_usage_count
            )));
        }

        let coupon = self
            .store
            .update_coupon(restaurant_id, coupon_id, &changes)
            .await?
            .ok_or_else(coupon_not_found)?;
        record_coupon_operation(&restaurant_id.to_string(), "update");

        Ok(coupon)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, restaurant_id: Uuid, coupon_id: Uuid) -> Result<(), AppError> {
        if !self.store.delete_coupon(restaurant_id, coupon_id).await? {
            return Err(coupon_not_found());
        }
        record_coupon_operation(&restaurant_id.to_string(), "delete");
        info!(coupon_id = %coupon_id, "Coupon deleted");
        Ok(())
    }

    pub async fn get(&self, restaurant_id: Uuid, coupon_id: Uuid) -> Result<Coupon, AppError> {
        self.store
            .find_coupon_by_id(restaurant_id, coupon_id)
            .await?
            .ok_or_else(coupon_not_found)
    }

    pub async fn list(&self, restaurant_id: Uuid) -> Result<Vec<Coupon>, AppError> {
        self.store.list_coupons(restaurant_id).await
    }

    pub async fn get_order(&self, restaurant_id: Uuid, order_id: Uuid) -> Result<Order, AppError> {
        self.store
            .get_order(restaurant_id, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Order not found")))
    }
}
