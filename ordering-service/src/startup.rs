//! Application startup and lifecycle management.

use axum::{
    http::{header, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{OrderingConfig, StorageBackend};
use crate::handlers;
use crate::middleware::{auth_middleware, JwtVerifier};
use crate::services::{
    init_metrics, CheckoutService, CouponAdmin, CouponStore, Database, DisabledNotifier,
    InMemoryStore, OrderNotifier, TelegramNotifier,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: OrderingConfig,
    pub store: Arc<dyn CouponStore>,
    pub checkout: CheckoutService,
    pub admin: CouponAdmin,
    pub jwt: JwtVerifier,
    pub public_rate_limiter: IpRateLimiter,
}

impl AppState {
    pub fn new(
        config: OrderingConfig,
        store: Arc<dyn CouponStore>,
        notifier: Arc<dyn OrderNotifier>,
    ) -> Self {
        let public_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.public_requests,
            config.rate_limit.public_window_seconds,
        );

        Self {
            checkout: CheckoutService::new(store.clone(), notifier),
            admin: CouponAdmin::new(store.clone()),
            jwt: JwtVerifier::new(&config.jwt.secret),
            public_rate_limiter,
            store,
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    // Customer-facing routes, rate limited per IP
    let public_routes = Router::new()
        .route("/api/coupons/validate", post(handlers::validate_coupon))
        .route("/api/orders", post(handlers::place_order))
        .route(
            "/api/restaurants/:restaurant_id/coupons/active",
            get(handlers::list_active_coupons),
        )
        .layer(from_fn_with_state(
            state.public_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    // Restaurant dashboard routes
    let admin_routes = Router::new()
        .route(
            "/api/restaurants/:restaurant_id/coupons",
            get(handlers::list_coupons).post(handlers::create_coupon),
        )
        .route(
            "/api/restaurants/:restaurant_id/coupons/generate-code",
            post(handlers::generate_coupon_code),
        )
        .route(
            "/api/restaurants/:restaurant_id/coupons/:coupon_id",
            get(handlers::get_coupon)
                .put(handlers::update_coupon)
                .delete(handlers::delete_coupon),
        )
        .route(
            "/api/restaurants/:restaurant_id/orders/:order_id",
            get(handlers::get_order),
        )
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .merge(public_routes)
        .merge(admin_routes)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    header::HeaderName::from_static("x-request-id"),
                ])
                .expose_headers([header::HeaderName::from_static("x-request-id")]),
        )
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the configured storage backend and notifier.
    pub async fn build(config: OrderingConfig) -> Result<Self, AppError> {
        init_metrics();

        let store: Arc<dyn CouponStore> = match config.storage {
            StorageBackend::Postgres => {
                let db = Database::new(
                    config.database.url.expose_secret(),
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    e
                })?;

                db.run_migrations().await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to run migrations");
                    e
                })?;

                Arc::new(db)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Arc::new(InMemoryStore::new())
            }
        };

        let notifier: Arc<dyn OrderNotifier> = if config.telegram.enabled {
            Arc::new(TelegramNotifier::new(config.telegram.clone()))
        } else {
            tracing::info!("Order notifications disabled");
            Arc::new(DisabledNotifier)
        };

        Self::build_with(config, store, notifier).await
    }

    /// Build around an existing store and notifier.
    pub async fn build_with(
        config: OrderingConfig,
        store: Arc<dyn CouponStore>,
        notifier: Arc<dyn OrderNotifier>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let addr = format!("{}:{}", config.common.host, config.common.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Ordering service listener bound");

        Ok(Self {
            port,
            listener,
            state: AppState::new(config, store, notifier),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "ordering-service",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(
            self.listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::HeaderValue;
    use tower::ServiceExt;

    fn state() -> AppState {
        let config = OrderingConfig::in_memory("router-test-secret");
        AppState::new(
            config,
            Arc::new(InMemoryStore::new()),
            Arc::new(DisabledNotifier),
        )
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = build_router(state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn admin_routes_require_token() {
        let uri = format!("/api/restaurants/{}/coupons", uuid::Uuid::new_v4());
        let response = build_router(state())
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 401);
    }

    #[tokio::test]
    async fn cors_preflight_allows_dashboard_methods() {
        let response = build_router(state())
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/coupons/validate")
                    .header(header::ORIGIN, HeaderValue::from_static("https://menu.example"))
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
    }
}
