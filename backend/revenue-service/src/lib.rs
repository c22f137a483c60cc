/// Revenue Service Library
///
/// Turns video view activity into revenue, splits it between the platform,
/// the publisher, the video owner and tagged teammates, and keeps an
/// append-and-replace ledger with derived per-player and per-day rollups.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers
/// - `models`: Ledger rows, rollups and collaborator records
/// - `services`: Split policy, calculator, engine, batch driver, reporting
/// - `db`: Store traits with PostgreSQL and in-memory implementations
/// - `middleware`: JWT authentication
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Prometheus collectors
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
