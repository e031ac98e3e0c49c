pub mod coupon;
pub mod order;

use serde::Serialize;

/// Success envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { ok: true, data }
    }
}
