use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Coupon, CouponChanges, CouponType};
use crate::utils::{money, money_limit};

/// Quote request sent from the checkout page.
#[derive(Debug, Deserialize, Validate)]
pub struct ValidateCouponRequest {
    pub coupon_code: String,
    pub restaurant_id: Uuid,
    #[validate(custom(function = "money"))]
    pub order_total: Decimal,
}

/// Public coupon fields plus the discount computed for the quoted total.
#[derive(Debug, Serialize, Deserialize)]
pub struct CouponQuote {
    pub id: Uuid,
    pub coupon_code: String,
    pub coupon_type: CouponType,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_value: Decimal,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub max_discount_amount: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub min_order_value: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_amount: Decimal,
}

impl CouponQuote {
    pub fn new(coupon: &Coupon, discount_amount: Decimal) -> Self {
        Self {
            id: coupon.coupon_id,
            coupon_code: coupon.coupon_code.clone(),
            coupon_type: coupon.coupon_type,
            discount_value: coupon.discount_value,
            max_discount_amount: coupon.max_discount_amount,
            min_order_value: coupon.min_order_value,
            discount_amount,
        }
    }
}

/// Coupon as advertised on the public menu.
#[derive(Debug, Serialize)]
pub struct PublicCoupon {
    pub id: Uuid,
    pub coupon_code: String,
    pub coupon_type: CouponType,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_value: Decimal,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub max_discount_amount: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub min_order_value: Decimal,
    pub end_date: DateTime<Utc>,
}

impl From<&Coupon> for PublicCoupon {
    fn from(coupon: &Coupon) -> Self {
        Self {
            id: coupon.coupon_id,
            coupon_code: coupon.coupon_code.clone(),
            coupon_type: coupon.coupon_type,
            discount_value: coupon.discount_value,
            max_discount_amount: coupon.max_discount_amount,
            min_order_value: coupon.min_order_value,
            end_date: coupon.end_date,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCouponRequest {
    /// Generated when omitted or blank.
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub coupon_type: CouponType,
    #[validate(custom(function = "money_limit"))]
    pub discount_value: Decimal,
    #[serde(default)]
    #[validate(custom(function = "money_limit"))]
    pub max_discount_amount: Option<Decimal>,
    #[serde(default)]
    #[validate(custom(function = "money_limit"))]
    pub min_order_value: Option<Decimal>,
    #[validate(range(min = 1, message = "Usage limit must be at least 1"))]
    pub max_usage_count: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Partial update. An explicit `"max_discount_amount": null` removes the cap.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCouponRequest {
    pub coupon_code: Option<String>,
    pub coupon_type: Option<CouponType>,
    #[validate(custom(function = "money_limit"))]
    pub discount_value: Option<Decimal>,
    #[serde(default, deserialize_with = "double_option")]
    pub max_discount_amount: Option<Option<Decimal>>,
    #[validate(custom(function = "money_limit"))]
    pub min_order_value: Option<Decimal>,
    #[validate(range(min = 1, message = "Usage limit must be at least 1"))]
    pub max_usage_count: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl From<UpdateCouponRequest> for CouponChanges {
    fn from(req: UpdateCouponRequest) -> Self {
        Self {
            coupon_code: req.coupon_code,
            coupon_type: req.coupon_type,
            discount_value: req.discount_value,
            max_discount_amount: req.max_discount_amount,
            min_order_value: req.min_order_value,
            max_usage_count: req.max_usage_count,
            start_date: req.start_date,
            end_date: req.end_date,
            is_active: req.is_active,
        }
    }
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<Decimal>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Decimal>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize)]
pub struct GeneratedCodeResponse {
    pub coupon_code: String,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub id: Uuid,
    pub deleted: bool,
}
