//! Restaurant dashboard endpoints. All of them sit behind `auth_middleware`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::coupon::{
    CreateCouponRequest, DeletedResponse, GeneratedCodeResponse, UpdateCouponRequest,
};
use crate::dtos::ApiResponse;
use crate::middleware::AuthUser;
use crate::startup::AppState;
use crate::utils::ValidatedJson;

pub async fn list_coupons(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(restaurant_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.authorize(restaurant_id)?;

    let coupons = state.admin.list(restaurant_id).await?;
    Ok(Json(ApiResponse::new(coupons)))
}

pub async fn create_coupon(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(restaurant_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateCouponRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.authorize(restaurant_id)?;

    let coupon = state.admin.create(restaurant_id, req).await?;
    tracing::info!(
        restaurant_id = %restaurant_id,
        coupon_id = %coupon.coupon_id,
        coupon_code = %coupon.coupon_code,
        user = %claims.sub,
        "Coupon created"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::new(coupon))))
}

pub async fn generate_coupon_code(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(restaurant_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    claims.authorize(restaurant_id)?;

    let coupon_code = state.admin.generate_unique_code(restaurant_id).await?;
    Ok(Json(ApiResponse::new(GeneratedCodeResponse { coupon_code })))
}

pub async fn get_coupon(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((restaurant_id, coupon_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    claims.authorize(restaurant_id)?;

    let coupon = state.admin.get(restaurant_id, coupon_id).await?;
    Ok(Json(ApiResponse::new(coupon)))
}

pub async fn update_coupon(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((restaurant_id, coupon_id)): Path<(Uuid, Uuid)>,
    ValidatedJson(req): ValidatedJson<UpdateCouponRequest>,
) -> Result<impl IntoResponse, AppError> {
    claims.authorize(restaurant_id)?;

    let coupon = state.admin.update(restaurant_id, coupon_id, req).await?;
    tracing::info!(
        restaurant_id = %restaurant_id,
        coupon_id = %coupon_id,
        user = %claims.sub,
        "Coupon updated"
    );

    Ok(Json(ApiResponse::new(coupon)))
}

pub async fn delete_coupon(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((restaurant_id, coupon_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    claims.authorize(restaurant_id)?;

    state.admin.delete(restaurant_id, coupon_id).await?;
    Ok(Json(ApiResponse::new(DeletedResponse {
        id: coupon_id,
        deleted: true,
    })))
}

pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((restaurant_id, order_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    claims.authorize(restaurant_id)?;

    let order = state.admin.get_order(restaurant_id, order_id).await?;
    Ok(Json(ApiResponse::new(order)))
}
