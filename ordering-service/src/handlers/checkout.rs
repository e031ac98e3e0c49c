//! Public checkout endpoints used by the customer-facing menu.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::coupon::ValidateCouponRequest;
use crate::dtos::order::PlaceOrderRequest;
use crate::dtos::ApiResponse;
use crate::services::{CouponError, PlaceOrderError};
use crate::startup::AppState;
use crate::utils::ValidatedJson;

/// Quote a coupon for the current cart. Never consumes a use.
pub async fn validate_coupon(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ValidateCouponRequest>,
) -> Result<impl IntoResponse, CouponError> {
    let quote = state
        .checkout
        .quote(req.restaurant_id, &req.coupon_code, req.order_total)
        .await?;

    Ok(Json(ApiResponse::new(quote)))
}

pub async fn place_order(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PlaceOrderRequest>,
) -> Result<impl IntoResponse, PlaceOrderError> {
    let order = state.checkout.place_order(req).await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(order))))
}

/// Coupons currently redeemable at a restaurant, public fields only.
pub async fn list_active_coupons(
    State(state): State<AppState>,
    Path(restaurant_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let coupons = state.checkout.redeemable_coupons(restaurant_id).await?;

    Ok(Json(ApiResponse::new(coupons)))
}
