//! Bearer-token authentication for restaurant admin routes.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;

use crate::startup::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestaurantRole {
    Owner,
    Superadmin,
}

/// Claims carried by a dashboard access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestaurantClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Restaurant the owner manages. Absent for superadmins.
    #[serde(default)]
    pub restaurant_id: Option<Uuid>,
    pub role: RestaurantRole,
    pub exp: i64,
    pub iat: i64,
}

impl RestaurantClaims {
    /// Owners act only on their own restaurant; superadmins on any.
    pub fn authorize(&self, restaurant_id: Uuid) -> Result<(), AppError> {
        match self.role {
            RestaurantRole::Superadmin => Ok(()),
            RestaurantRole::Owner if self.restaurant_id == Some(restaurant_id) => Ok(()),
            RestaurantRole::Owner => Err(AppError::Forbidden(anyhow::anyhow!(
                "You do not have access to this restaurant"
            ))),
        }
    }
}

/// HS256 token verifier.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
}

impl JwtVerifier {
    pub fn new(secret: &Secret<String>) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        }
    }

    /// Validate and decode an access token
    pub fn verify(&self, token: &str) -> Result<RestaurantClaims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let token_data = decode::<RestaurantClaims>(token, &self.decoding_key, &validation)?;

        Ok(token_data.claims)
    }
}

/// Middleware to require authentication
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let claims = state.jwt.verify(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected access token");
        e
    })?;

    // Store claims in request extensions so handlers can access them
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extractor to easily get claims in handlers
pub struct AuthUser(pub RestaurantClaims);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts.extensions.get::<RestaurantClaims>().ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "Auth claims missing from request extensions"
            ))
        })?;

        Ok(AuthUser(claims.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "unit-test-secret";

    fn claims(role: RestaurantRole, restaurant_id: Option<Uuid>, exp_offset: i64) -> RestaurantClaims {
        let now = Utc::now().timestamp();
        RestaurantClaims {
            sub: "user-1".to_string(),
            restaurant_id,
            role,
            exp: now + exp_offset,
            iat: now,
        }
    }

    fn sign(claims: &RestaurantClaims, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(&Secret::new(SECRET.to_string()))
    }

    #[test]
    fn verifies_valid_token() {
        let restaurant = Uuid::new_v4();
        let token = sign(&claims(RestaurantRole::Owner, Some(restaurant), 600), SECRET);
        let decoded = verifier().verify(&token).unwrap();
        assert_eq!(decoded.restaurant_id, Some(restaurant));
        assert_eq!(decoded.role, RestaurantRole::Owner);
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = sign(&claims(RestaurantRole::Owner, None, 600), "other-secret");
        let err = verifier().verify(&token).unwrap_err();
        assert!(matches!(err, AppError::InvalidToken(_)));
    }

    #[test]
    fn rejects_expired_token() {
        let token = sign(&claims(RestaurantRole::Owner, None, -3600), SECRET);
        assert!(verifier().verify(&token).is_err());
    }

    #[test]
    fn owner_limited_to_own_restaurant() {
        let mine = Uuid::new_v4();
        let c = claims(RestaurantRole::Owner, Some(mine), 600);
        assert!(c.authorize(mine).is_ok());
        assert!(matches!(c.authorize(Uuid::new_v4()), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn superadmin_reaches_any_restaurant() {
        let c = claims(RestaurantRole::Superadmin, None, 600);
        assert!(c.authorize(Uuid::new_v4()).is_ok());
    }
}
