//! Coupon model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How a coupon's `discount_value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponType {
    Flat,
    Percentage,
}

impl CouponType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CouponType::Flat => "flat",
            CouponType::Percentage => "percentage",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "flat" => Some(CouponType::Flat),
            "percentage" => Some(CouponType::Percentage),
            _ => None,
        }
    }
}

impl TryFrom<String> for CouponType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CouponType::parse(&value).ok_or_else(|| format!("unknown coupon type: {}", value))
    }
}

/// Discount shape of a coupon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discount {
    /// Fixed currency amount off the order.
    Flat { amount: Decimal },
    /// `rate` percent off the order, optionally capped at `cap`.
    Percentage { rate: Decimal, cap: Option<Decimal> },
}

/// A discount rule owned by one restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Coupon {
    #[serde(rename = "id")]
    pub coupon_id: Uuid,
    pub restaurant_id: Uuid,
    pub coupon_code: String,
    #[sqlx(try_from = "String")]
    pub coupon_type: CouponType,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_value: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub max_discount_amount: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub min_order_value: Decimal,
    pub max_usage_count: i32,
    pub current_usage_count: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Coupon {
    /// The tagged discount shape stored in the flat row columns.
    pub fn discount(&self) -> Discount {
        match self.coupon_type {
            CouponType::Flat => Discount::Flat {
                amount: self.discount_value,
            },
            CouponType::Percentage => Discount::Percentage {
                rate: self.discount_value,
                cap: self.max_discount_amount,
            },
        }
    }
}

/// Input for creating a coupon. The code is already normalised and unique.
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub restaurant_id: Uuid,
    pub coupon_code: String,
    pub coupon_type: CouponType,
    pub discount_value: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub min_order_value: Decimal,
    pub max_usage_count: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_active: bool,
}

/// Partial update of a coupon. `None` leaves a column untouched;
/// `max_discount_amount: Some(None)` clears the cap.
#[derive(Debug, Clone, Default)]
pub struct CouponChanges {
    pub coupon_code: Option<String>,
    pub coupon_type: Option<CouponType>,
    pub discount_value: Option<Decimal>,
    pub max_discount_amount: Option<Option<Decimal>>,
    pub min_order_value: Option<Decimal>,
    pub max_usage_count: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl CouponChanges {
    /// Apply the changes onto a copy of `coupon`.
    pub fn apply_to(&self, coupon: &Coupon) -> Coupon {
        let mut updated = coupon.clone();
        if let Some(code) = &self.coupon_code {
            updated.coupon_code = code.clone();
        }
        if let Some(coupon_type) = self.coupon_type {
            updated.coupon_type = coupon_type;
        }
        if let Some(value) = self.discount_value {
            updated.discount_value = value;
        }
        if let Some(cap) = self.max_discount_amount {
            updated.max_discount_amount = cap;
        }
        if let Some(min) = self.min_order_value {
            updated.min_order_value = min;
        }
        if let Some(max) = self.max_usage_count {
            updated.max_usage_count = max;
        }
        if let Some(start) = self.start_date {
            updated.start_date = start;
        }
        if let Some(end) = self.end_date {
            updated.end_date = end;
        }
        if let Some(active) = self.is_active {
            updated.is_active = active;
        }
        updated
    }
}

/// Outcome of the conditional usage increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageIncrement {
    /// Counter advanced; carries the new value.
    Applied(i32),
    /// The coupon was already at its cap (or is gone).
    CapacityExceeded,
}
