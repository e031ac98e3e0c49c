//! Coupon code format rules.

use thiserror::Error;

/// Longest code an administrator may enter.
pub const MAX_CODE_LENGTH: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodeFormatError {
    #[error("Coupon code is required")]
    Empty,
    #[error("Coupon code must be 15 characters or less")]
    TooLong,
    #[error("Coupon code must contain only letters and numbers")]
    InvalidCharacters,
}

/// Check a code against `[A-Z0-9]{1,15}`.
///
/// No case folding happens here: callers upper-case user input first, so a
/// lowercase letter is rejected like any other foreign character.
pub fn validate_code_format(code: &str) -> Result<(), CodeFormatError> {
    if code.trim().is_empty() {
        return Err(CodeFormatError::Empty);
    }
    if code.chars().count() > MAX_CODE_LENGTH {
        return Err(CodeFormatError::TooLong);
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(CodeFormatError::InvalidCharacters);
    }
    Ok(())
}

/// Trim and upper-case a customer- or admin-supplied code.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}
