pub mod auth;

pub use auth::{auth_middleware, AuthUser, JwtVerifier, RestaurantClaims, RestaurantRole};
