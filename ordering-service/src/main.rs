//! Ordering Service entry point.

use ordering_service::config::OrderingConfig;
use ordering_service::services::init_metrics;
use ordering_service::startup::Application;

use service_core::observability::init_tracing;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load configuration
    let config = OrderingConfig::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting ordering-service");

    init_metrics();

    // Log configuration (mask sensitive values)
    tracing::info!(
        service_name = %config.service_name,
        environment = ?config.environment,
        storage = ?config.storage,
        http_port = %config.common.port,
        db_max_connections = %config.database.max_connections,
        telegram_enabled = config.telegram.enabled,
        public_rate_limit = config.rate_limit.public_requests,
        "Configuration loaded"
    );

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to build application");
        std::io::Error::other(format!("Application build error: {}", e))
    })?;

    tokio::select! {
        result = app.run_until_stopped() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Application error");
                return Err(e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("Graceful shutdown initiated");
        }
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}
