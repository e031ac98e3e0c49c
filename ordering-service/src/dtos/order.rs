use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::OrderItem;
use crate::utils::money;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderItemRequest {
    #[validate(length(min = 1, max = 200, message = "Item name is required"))]
    pub name: String,
    #[validate(range(min = 1, max = 1000, message = "Quantity must be between 1 and 1000"))]
    pub quantity: i32,
    #[validate(custom(function = "money"))]
    pub unit_price: Decimal,
}

impl From<OrderItemRequest> for OrderItem {
    fn from(item: OrderItemRequest) -> Self {
        Self {
            name: item.name,
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

/// Order submission from the public menu.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PlaceOrderRequest {
    pub restaurant_id: Uuid,
    #[validate(length(min = 1, message = "Order must contain at least one item"), nested)]
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    #[validate(custom(function = "money"))]
    pub subtotal: Option<Decimal>,
    #[serde(default)]
    #[validate(custom(function = "money"))]
    pub tax_amount: Option<Decimal>,
    #[serde(default)]
    #[validate(custom(function = "money"))]
    pub delivery_charge: Option<Decimal>,
    #[validate(custom(function = "money"))]
    pub total_amount: Decimal,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[validate(length(max = 100))]
    pub customer_name: Option<String>,
    #[validate(length(max = 20))]
    pub customer_phone: Option<String>,
    #[validate(length(max = 20))]
    pub table_number: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}
