//! Discount arithmetic.

use crate::models::Discount;
use rust_decimal::Decimal;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Amount taken off `order_total` by `discount`.
///
/// The result never exceeds `order_total`, and a configured positive cap
/// bounds percentage discounts. Inputs are assumed non-negative; admin entry
/// validates that. `None` when the percentage product overflows `Decimal`.
pub fn calculate_discount(discount: &Discount, order_total: Decimal) -> Option<Decimal> {
    match *discount {
        Discount::Flat { amount } => Some(amount.min(order_total)),
        Discount::Percentage { rate, cap } => {
            let raw = order_total.checked_mul(rate)?.checked_div(HUNDRED)?;
            Some(match cap {
                Some(cap) if cap > Decimal::ZERO => raw.min(cap).min(order_total),
                _ => raw.min(order_total),
            })
        }
    }
}
