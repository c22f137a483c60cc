use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use revenue_service::config::StoreBackend;
use revenue_service::db::{MemoryRevenueStore, RevenueStore};
use revenue_service::handlers::{self, AppState};
use revenue_service::middleware::JwtAuthMiddleware;
use revenue_service::Config;
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn build_store(config: &Config) -> anyhow::Result<RevenueStore> {
    match config.store {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory revenue store; data is lost on restart");
            Ok(RevenueStore::memory(Arc::new(MemoryRevenueStore::new())))
        }
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .acquire_timeout(Duration::from_secs(5))
                .connect(&config.database.url)
                .await
                .context("Failed to create database pool")?;
            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;
            tracing::info!("Database migrations applied");

            Ok(RevenueStore::postgres(pool))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Starting revenue-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        env = %config.app.env,
        store = ?config.store,
        rate_micros = config.policy.per_view_rate_micros,
        platform_bps = config.policy.platform_bps,
        publisher_bps = config.policy.publisher_bps,
        owner_floor_bps = config.policy.owner_floor_bps,
        "Revenue policy loaded"
    );

    let store = match build_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Store initialization failed: {:#}", e);
            eprintln!("ERROR: Failed to initialize store: {:#}", e);
            std::process::exit(1);
        }
    };
    let state = web::Data::new(AppState::new(
        store,
        config.policy.clone(),
        config.batch.clone(),
    ));
    let auth = JwtAuthMiddleware::new(&config.auth.jwt_secret);

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Starting HTTP server at {}", bind_address);

    let cors_origins = config.cors.origins();
    HttpServer::new(move || {
        let mut cors = Cors::default();
        for origin in &cors_origins {
            if origin == "*" {
                cors = cors.allow_any_origin();
            } else {
                cors = cors.allowed_origin(origin);
            }
        }
        cors = cors.allow_any_method().allow_any_header().max_age(3600);

        let auth = auth.clone();
        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(tracing_actix_web::TracingLogger::default())
            .route(
                "/metrics",
                web::get().to(revenue_service::metrics::serve_metrics),
            )
            .configure(move |cfg| handlers::configure(cfg, auth))
    })
    .bind(&bind_address)?
    .run()
    .await
}
