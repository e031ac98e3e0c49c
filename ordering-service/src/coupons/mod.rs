//! Coupon engine: code format, code generation, discount arithmetic and
//! eligibility. Everything here is pure and storage-agnostic.

pub mod discount;
pub mod eligibility;
pub mod format;
pub mod generator;

pub use discount::calculate_discount;
pub use eligibility::{check_eligibility, is_redeemable, Rejection};
pub use format::{normalize_code, validate_code_format, CodeFormatError, MAX_CODE_LENGTH};
pub use generator::{generate_code, generate_code_with, GENERATED_CODE_LENGTH};
