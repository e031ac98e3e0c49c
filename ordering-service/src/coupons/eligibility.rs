//! Whether a coupon may be applied to an order right now.

use crate::models::Coupon;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Why a coupon cannot be applied. Variant order is check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    Inactive,
    NotYetValid,
    Expired,
    UsageLimitReached,
    BelowMinimum { amount_needed: Decimal },
}

impl Rejection {
    /// Shortfall to reach the coupon's minimum order value, if that is the reason.
    pub fn amount_needed(&self) -> Option<Decimal> {
        match self {
            Rejection::BelowMinimum { amount_needed } => Some(*amount_needed),
            _ => None,
        }
    }

    /// Short label used for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Inactive => "inactive",
            Rejection::NotYetValid => "not_yet_valid",
            Rejection::Expired => "expired",
            Rejection::UsageLimitReached => "usage_limit_reached",
            Rejection::BelowMinimum { .. } => "below_minimum",
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Inactive => f.write_str("This coupon is no longer active."),
            Rejection::NotYetValid => f.write_str("This coupon is not yet valid."),
            Rejection::Expired => f.write_str("This coupon has expired."),
            Rejection::UsageLimitReached => {
                f.write_str("This coupon has reached its usage limit.")
            }
            Rejection::BelowMinimum { amount_needed } => write!(
                f,
                "Add ₹{:.2} more to use this coupon.",
                amount_needed.round_dp(2)
            ),
        }
    }
}

impl std::error::Error for Rejection {}

/// Check `coupon` against an order of `order_total` at instant `now`.
///
/// The first failing check decides the rejection: active flag, start,
/// end (inclusive), usage cap, minimum order value. Pure; call it again at
/// commit time since time, usage and totals may have moved since the quote.
pub fn check_eligibility(
    coupon: &Coupon,
    order_total: Decimal,
    now: DateTime<Utc>,
) -> Result<(), Rejection> {
    if !coupon.is_active {
        return Err(Rejection::Inactive);
    }
    if now < coupon.start_date {
        return Err(Rejection::NotYetValid);
    }
    if now > coupon.end_date {
        return Err(Rejection::Expired);
    }
    if coupon.current_usage_count >= coupon.max_usage_count {
        return Err(Rejection::UsageLimitReached);
    }
    if order_total < coupon.min_order_value {
        return Err(Rejection::BelowMinimum {
            amount_needed: coupon.min_order_value - order_total,
        });
    }
    Ok(())
}

/// Eligibility ignoring the order total, for listing redeemable coupons.
pub fn is_redeemable(coupon: &Coupon, now: DateTime<Utc>) -> bool {
    check_eligibility(coupon, coupon.min_order_value, now).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CouponType;
    use chrono::Duration;
    use uuid::Uuid;

    fn coupon(now: DateTime<Utc>) -> Coupon {
        Coupon {
            coupon_id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            coupon_code: "WELCOME".to_string(),
            coupon_type: CouponType::Flat,
            discount_value: Decimal::from(100),
            max_discount_amount: None,
            min_order_value: Decimal::from(500),
            max_usage_count: 10,
            current_usage_count: 0,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(1),
            is_active: true,
            created_utc: now,
            updated_utc: now,
        }
    }

    #[test]
    fn eligible_coupon_passes() {
        let now = Utc::now();
        assert_eq!(check_eligibility(&coupon(now), Decimal::from(800), now), Ok(()));
    }

    #[test]
    fn inactive_is_reported() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.is_active = false;
        let err = check_eligibility(&c, Decimal::from(800), now).unwrap_err();
        assert_eq!(err, Rejection::Inactive);
        assert_eq!(err.to_string(), "This coupon is no longer active.");
    }

    #[test]
    fn not_yet_valid_before_start() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.start_date = now + Duration::hours(1);
        assert_eq!(
            check_eligibility(&c, Decimal::from(800), now),
            Err(Rejection::NotYetValid)
        );
    }

    #[test]
    fn start_is_inclusive() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.start_date = now;
        assert_eq!(check_eligibility(&c, Decimal::from(800), now), Ok(()));
    }

    #[test]
    fn end_is_inclusive() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.end_date = now;
        assert_eq!(check_eligibility(&c, Decimal::from(800), now), Ok(()));

        let later = now + Duration::milliseconds(1);
        assert_eq!(
            check_eligibility(&c, Decimal::from(800), later),
            Err(Rejection::Expired)
        );
    }

    #[test]
    fn expired_yesterday_regardless_of_usage() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.start_date = now - Duration::days(30);
        c.end_date = now - Duration::days(1);
        c.current_usage_count = c.max_usage_count;
        let err = check_eligibility(&c, Decimal::from(100), now).unwrap_err();
        assert_eq!(err, Rejection::Expired);
        assert_eq!(err.to_string(), "This coupon has expired.");
    }

    #[test]
    fn inactive_wins_over_expired() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.is_active = false;
        c.end_date = now - Duration::days(1);
        assert_eq!(
            check_eligibility(&c, Decimal::from(800), now),
            Err(Rejection::Inactive)
        );
    }

    #[test]
    fn usage_limit_wins_over_minimum() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.current_usage_count = 10;
        let err = check_eligibility(&c, Decimal::from(10), now).unwrap_err();
        assert_eq!(err, Rejection::UsageLimitReached);
        assert_eq!(err.to_string(), "This coupon has reached its usage limit.");
    }

    #[test]
    fn below_minimum_reports_shortfall() {
        let now = Utc::now();
        let err = check_eligibility(&coupon(now), Decimal::from(300), now).unwrap_err();
        assert_eq!(err.amount_needed(), Some(Decimal::from(200)));
        assert_eq!(err.to_string(), "Add ₹200.00 more to use this coupon.");
    }

    #[test]
    fn shortfall_message_rounds_to_paise() {
        let now = Utc::now();
        let total: Decimal = "299.995".parse().unwrap();
        let err = check_eligibility(&coupon(now), total, now).unwrap_err();
        assert_eq!(err.amount_needed(), Some("200.005".parse().unwrap()));
        assert_eq!(err.to_string(), "Add ₹200.00 more to use this coupon.");
    }

    #[test]
    fn exact_minimum_is_eligible() {
        let now = Utc::now();
        assert_eq!(check_eligibility(&coupon(now), Decimal::from(500), now), Ok(()));
    }

    #[test]
    fn redeemable_ignores_order_total() {
        let now = Utc::now();
        let mut c = coupon(now);
        assert!(is_redeemable(&c, now));
        c.current_usage_count = c.max_usage_count;
        assert!(!is_redeemable(&c, now));
    }
}
