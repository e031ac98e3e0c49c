use axum::{
    extract::{FromRequest, Request},
    Json,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use validator::{Validate, ValidationError};

/// `Json<T>` that also runs `validator` rules before reaching the handler.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Json parse error: {}", e)))?;

        value.validate()?;

        Ok(ValidatedJson(value))
    }
}

/// Largest amount, in rupees, accepted in any request body.
pub const MAX_MONEY: i64 = 1_000_000_000_000;

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Upper bound only; sign rules are left to the caller.
pub fn money_limit(value: &Decimal) -> Result<(), ValidationError> {
    if *value > Decimal::from(MAX_MONEY) {
        let mut err = ValidationError::new("money_limit");
        err.message = Some(format!("must not exceed {}", MAX_MONEY).into());
        return Err(err);
    }
    Ok(())
}

/// A customer-supplied amount: non-negative and at most `MAX_MONEY`.
pub fn money(value: &Decimal) -> Result<(), ValidationError> {
    non_negative(value)?;
    money_limit(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_accepts_zero_and_positive() {
        assert!(money(&Decimal::ZERO).is_ok());
        assert!(money(&Decimal::new(1999, 2)).is_ok());
        assert!(money(&Decimal::from(MAX_MONEY)).is_ok());
    }

    #[test]
    fn money_rejects_negative() {
        assert!(money(&Decimal::new(-1, 2)).is_err());
    }

    #[test]
    fn money_rejects_amounts_past_the_limit() {
        let huge: Decimal = "10000000000000000000000000000".parse().unwrap();
        assert!(money(&huge).is_err());
        assert!(money(&(Decimal::from(MAX_MONEY) + Decimal::new(1, 2))).is_err());
    }

    #[test]
    fn money_limit_leaves_sign_alone() {
        assert!(money_limit(&Decimal::from(-5)).is_ok());
        assert!(money_limit(&Decimal::from(MAX_MONEY + 1)).is_err());
    }
}
