use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct OrderingConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub storage: StorageBackend,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub telegram: TelegramConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

/// Where coupons and orders live.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub bot_token: Secret<String>,
    pub chat_id: String,
    pub api_base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub public_requests: u32,
    pub public_window_seconds: u64,
}

impl OrderingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let environment: Environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "dev".to_string())
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let storage: StorageBackend = get_env("STORAGE_BACKEND", Some("postgres"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        let needs_database = storage == StorageBackend::Postgres;

        let telegram_enabled = get_env("TELEGRAM_ENABLED", Some("false"), false)?
            .parse()
            .unwrap_or(false);

        let config = OrderingConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("ordering-service"), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            storage,
            database: DatabaseConfig {
                url: Secret::new(if needs_database {
                    get_env("DATABASE_URL", None, is_prod)?
                } else {
                    env::var("DATABASE_URL").unwrap_or_default()
                }),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10")?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1")?,
            },
            jwt: JwtConfig {
                secret: Secret::new(get_env(
                    "JWT_SECRET",
                    Some("dev-only-jwt-secret-change-me"),
                    is_prod,
                )?),
            },
            telegram: TelegramConfig {
                enabled: telegram_enabled,
                bot_token: Secret::new(get_env(
                    "TELEGRAM_BOT_TOKEN",
                    Some(""),
                    is_prod && telegram_enabled,
                )?),
                chat_id: get_env("TELEGRAM_CHAT_ID", Some(""), is_prod && telegram_enabled)?,
                api_base_url: get_env(
                    "TELEGRAM_API_BASE_URL",
                    Some("https://api.telegram.org"),
                    false,
                )?,
                timeout_seconds: parse_env("TELEGRAM_TIMEOUT_SECONDS", "5")?,
            },
            rate_limit: RateLimitConfig {
                public_requests: parse_env("RATE_LIMIT_PUBLIC_REQUESTS", "60")?,
                public_window_seconds: parse_env("RATE_LIMIT_PUBLIC_WINDOW_SECONDS", "60")?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Development config on an ephemeral loopback port with the in-memory
    /// store and notifications off.
    pub fn in_memory(jwt_secret: &str) -> Self {
        OrderingConfig {
            common: core_config::Config {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            environment: Environment::Dev,
            service_name: "ordering-service".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            storage: StorageBackend::Memory,
            database: DatabaseConfig {
                url: Secret::new(String::new()),
                max_connections: 5,
                min_connections: 1,
            },
            jwt: JwtConfig {
                secret: Secret::new(jwt_secret.to_string()),
            },
            telegram: TelegramConfig {
                enabled: false,
                bot_token: Secret::new(String::new()),
                chat_id: String::new(),
                api_base_url: "https://api.telegram.org".to_string(),
                timeout_seconds: 5,
            },
            rate_limit: RateLimitConfig {
                public_requests: 1000,
                public_window_seconds: 60,
            },
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.database.max_connections == 0 || self.database.min_connections == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MAX_CONNECTIONS and DATABASE_MIN_CONNECTIONS must be positive"
            )));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MIN_CONNECTIONS cannot exceed DATABASE_MAX_CONNECTIONS"
            )));
        }

        if self.storage == StorageBackend::Postgres
            && self.database.url.expose_secret().is_empty()
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_URL is required for the postgres backend"
            )));
        }

        if self.jwt.secret.expose_secret().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET must not be empty"
            )));
        }

        if self.telegram.enabled
            && (self.telegram.bot_token.expose_secret().is_empty()
                || self.telegram.chat_id.is_empty())
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID are required when TELEGRAM_ENABLED=true"
            )));
        }

        if self.rate_limit.public_requests == 0 || self.rate_limit.public_window_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Public rate limit must allow at least one request per window"
            )));
        }

        // In production, ensure stricter validation
        if self.environment == Environment::Prod {
            if self.storage == StorageBackend::Memory {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "The memory storage backend is not allowed in production"
                )));
            }

            if self.jwt.secret.expose_secret().len() < 32 {
                tracing::error!("JWT_SECRET is shorter than 32 bytes in production");
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(default), false)?;
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, e))
    })
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(format!("Invalid storage backend: {}", s)),
        }
    }
}
