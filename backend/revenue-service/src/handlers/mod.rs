/// HTTP handlers for revenue endpoints
///
/// - revenue: calculation trigger, caller earnings, per-video ledger view
/// - admin: date-range report, daily snapshot, earnings rebuild
/// - health: liveness and readiness probes
pub mod admin;
pub mod health;
pub mod revenue;

use crate::db::RevenueStore;
use crate::error::Result;
use crate::middleware::{JwtAuthMiddleware, UserId};
use crate::models::{Profile, Role};
use crate::services::{
    BatchConfig, BatchDriver, EarningsAggregator, RevenueCalculator, RevenueEngine, RevenuePolicy,
    SummaryRollup,
};
use actix_web::web;
use std::sync::Arc;

pub use admin::{get_admin_revenue, persist_admin_summary, rebuild_earnings};
pub use health::{health, ready};
pub use revenue::{calculate_revenue, get_my_revenue, get_video_distributions};

/// Shared handler state, wrapped in `web::Data`
#[derive(Clone)]
pub struct AppState {
    pub store: RevenueStore,
    pub engine: Arc<RevenueEngine>,
    pub batch: Arc<BatchDriver>,
    pub earnings: EarningsAggregator,
    pub summaries: SummaryRollup,
}

impl AppState {
    pub fn new(store: RevenueStore, policy: RevenuePolicy, batch: BatchConfig) -> Self {
        let calculator = RevenueCalculator::new(
            policy,
            store.videos.clone(),
            store.activity.clone(),
            store.tags.clone(),
        );
        let engine = Arc::new(RevenueEngine::new(calculator, store.ledger.clone()));
        let batch = Arc::new(BatchDriver::new(engine.clone(), store.videos.clone(), batch));

        Self {
            earnings: EarningsAggregator::new(store.earnings.clone()),
            summaries: SummaryRollup::new(store.summaries.clone()),
            store,
            engine,
            batch,
        }
    }

    /// Caller profile; a user unknown to the profile directory is a plain viewer
    pub async fn profile_of(&self, user_id: UserId) -> Result<Profile> {
        Ok(self
            .store
            .profiles
            .find_profile(user_id.0)
            .await?
            .unwrap_or(Profile {
                user_id: user_id.0,
                player_id: None,
                role: Role::Viewer,
            }))
    }
}

/// Register the authenticated revenue and admin routes
pub fn configure(cfg: &mut web::ServiceConfig, auth: JwtAuthMiddleware) {
    cfg.route("/health", web::get().to(health::health))
        .route("/ready", web::get().to(health::ready))
        .service(
            web::scope("/revenue")
                .wrap(auth.clone())
                .route("/calculate", web::post().to(revenue::calculate_revenue))
                .route("/calculate", web::get().to(revenue::get_my_revenue))
                .route(
                    "/videos/{video_id}/distributions",
                    web::get().to(revenue::get_video_distributions),
                ),
        )
        .service(
            web::scope("/admin")
                .wrap(auth)
                .route("/revenue", web::get().to(admin::get_admin_revenue))
                .route("/revenue", web::post().to(admin::persist_admin_summary))
                .route("/revenue/rebuild", web::post().to(admin::rebuild_earnings)),
        );
}
