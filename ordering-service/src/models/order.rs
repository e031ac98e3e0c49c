//! Order model.

use crate::coupons::{check_eligibility, Rejection};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::Coupon;

/// A line on a placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: i32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
}

/// Order status lifecycle. Only `pending` is produced here; kitchen/payment
/// transitions happen elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// A committed order.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    #[serde(rename = "id")]
    pub order_id: Uuid,
    pub restaurant_id: Uuid,
    pub items: Json<Vec<OrderItem>>,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub tax_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub delivery_charge: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub discount_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub payable_amount: Decimal,
    pub coupon_id: Option<Uuid>,
    pub coupon_code: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub table_number: Option<String>,
    pub notes: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub created_utc: DateTime<Utc>,
}

/// Coupon applied to an order being committed.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedCoupon {
    pub coupon_id: Uuid,
    pub coupon_code: String,
    pub discount_amount: Decimal,
}

/// Input for committing an order. Amounts are already validated and the
/// discount recomputed server-side.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub restaurant_id: Uuid,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub delivery_charge: Decimal,
    pub total_amount: Decimal,
    pub coupon: Option<AppliedCoupon>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub table_number: Option<String>,
    pub notes: Option<String>,
}

impl NewOrder {
    pub fn discount_amount(&self) -> Decimal {
        self.coupon
            .as_ref()
            .map(|c| c.discount_amount)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn payable_amount(&self) -> Decimal {
        self.total_amount - self.discount_amount()
    }

    /// Materialise the row that will be stored.
    pub fn into_order(self, order_id: Uuid, created_utc: DateTime<Utc>) -> Order {
        let discount_amount = self.discount_amount();
        let payable_amount = self.payable_amount();
        let (coupon_id, coupon_code) = match self.coupon {
            Some(c) => (Some(c.coupon_id), Some(c.coupon_code)),
            None => (None, None),
        };

        Order {
            order_id,
            restaurant_id: self.restaurant_id,
            items: Json(self.items),
            subtotal: self.subtotal,
            tax_amount: self.tax_amount,
            delivery_charge: self.delivery_charge,
            total_amount: self.total_amount,
            discount_amount,
            payable_amount,
            coupon_id,
            coupon_code,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            table_number: self.table_number,
            notes: self.notes,
            status: OrderStatus::Pending,
            created_utc,
        }
    }
}

/// Result of trying to commit an order that may redeem a coupon.
#[derive(Debug, Clone)]
pub enum OrderPlacement {
    Placed(Order),
    /// The coupon stopped being redeemable before its increment landed;
    /// nothing was written.
    CouponRejected(Rejection),
    /// The coupon was deleted before its increment landed; nothing was written.
    CouponGone,
}

impl OrderPlacement {
    /// Outcome for an order whose coupon increment did not land, given the
    /// coupon as it stands now.
    pub fn refused(coupon: Option<&Coupon>, now: DateTime<Utc>) -> Self {
        match coupon {
            Some(coupon) => OrderPlacement::CouponRejected(
                check_eligibility(coupon, coupon.min_order_value, now)
                    .err()
                    .unwrap_or(Rejection::UsageLimitReached),
            ),
            None => OrderPlacement::CouponGone,
        }
    }
}
