/// Configuration management for Revenue Service
///
/// Everything is read from environment variables; `.env` is loaded by `main`
/// before `Config::from_env` runs.
use crate::services::{BatchConfig, RevenuePolicy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// CORS configuration
    pub cors: CorsConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// JWT verification settings
    pub auth: AuthConfig,
    /// Split policy
    pub policy: RevenuePolicy,
    /// Batch driver limits
    pub batch: BatchConfig,
    /// Which store implementation backs the service
    pub store: StoreBackend,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Comma-separated list of allowed origins
    pub allowed_origins: String,
}

impl CorsConfig {
    pub fn origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    pub max_connections: u32,
}

#[derive(Clone)]
pub struct AuthConfig {
    /// HS256 signing secret shared with the identity service
    pub jwt_secret: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!(
                "REVENUE_STORE must be 'postgres' or 'memory', got '{}'",
                other
            )),
        }
    }
}

const MIN_JWT_SECRET_LEN: usize = 32;

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let production = app_env.eq_ignore_ascii_case("production");

        let store = match std::env::var("REVENUE_STORE") {
            Ok(value) => value.parse()?,
            Err(_) => StoreBackend::Postgres,
        };
        if production && store == StoreBackend::Memory {
            return Err("REVENUE_STORE=memory is not allowed in production".to_string());
        }

        let policy = RevenuePolicy {
            per_view_rate_micros: parse_env_or_default("REVENUE_PER_VIEW_RATE_MICROS", 10_000)?,
            min_watch_seconds: parse_env_or_default("REVENUE_MIN_WATCH_SECONDS", 0)?,
            platform_bps: parse_env_or_default("REVENUE_PLATFORM_BPS", 1_000)?,
            publisher_bps: parse_env_or_default("REVENUE_PUBLISHER_BPS", 2_000)?,
            owner_floor_bps: parse_env_or_default("REVENUE_OWNER_FLOOR_BPS", 6_000)?,
            publisher_account_id: match std::env::var("REVENUE_PUBLISHER_ACCOUNT_ID") {
                Ok(raw) if !raw.trim().is_empty() => Some(
                    Uuid::parse_str(raw.trim())
                        .map_err(|e| format!("Invalid REVENUE_PUBLISHER_ACCOUNT_ID: {}", e))?,
                ),
                _ => None,
            },
        };
        policy.validate().map_err(|e| e.to_string())?;

        let batch = BatchConfig {
            max_videos: parse_env_or_default("REVENUE_BATCH_MAX_VIDEOS", 100)?,
            concurrency: parse_env_or_default("REVENUE_BATCH_CONCURRENCY", 4)?,
            item_delay: Duration::from_millis(parse_env_or_default(
                "REVENUE_BATCH_ITEM_DELAY_MS",
                100,
            )?),
        };
        if batch.max_videos < 1 || batch.concurrency < 1 {
            return Err(
                "REVENUE_BATCH_MAX_VIDEOS and REVENUE_BATCH_CONCURRENCY must be at least 1"
                    .to_string(),
            );
        }

        Ok(Config {
            app: AppConfig {
                env: app_env.clone(),
                host: std::env::var("REVENUE_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("REVENUE_SERVICE_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8090),
            },
            cors: {
                let allowed_origins = match std::env::var("CORS_ALLOWED_ORIGINS") {
                    Ok(value) => value,
                    Err(_) if production => {
                        return Err("CORS_ALLOWED_ORIGINS must be set in production".to_string())
                    }
                    Err(_) => "http://localhost:3000".to_string(),
                };

                if production && allowed_origins.trim() == "*" {
                    return Err("CORS_ALLOWED_ORIGINS cannot be '*' in production".to_string());
                }

                CorsConfig { allowed_origins }
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/nova".to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(10),
            },
            auth: {
                let jwt_secret = std::env::var("JWT_SECRET")
                    .map_err(|_| "JWT_SECRET must be set".to_string())?;
                validate_jwt_secret(&jwt_secret)?;
                AuthConfig { jwt_secret }
            },
            policy,
            batch,
            store,
        })
    }
}

pub fn validate_jwt_secret(secret: &str) -> Result<(), String> {
    if secret.len() < MIN_JWT_SECRET_LEN {
        return Err(format!(
            "JWT_SECRET must be at least {} bytes",
            MIN_JWT_SECRET_LEN
        ));
    }
    Ok(())
}

fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}
