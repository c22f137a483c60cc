/// Admin handlers - revenue report, daily snapshot and rollup rebuild
use super::AppState;
use crate::error::{AppError, Result};
use crate::middleware::UserId;
use crate::models::{
    format_cents, AdminRevenueSummary, DistributionEntry, PlayerEarnings, RevenueSummary,
};
use actix_web::{web, HttpResponse};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_REPORT_DAYS: i64 = 30;
const REPORT_TOP_PLAYERS: i64 = 10;
const REPORT_RECENT_ENTRIES: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRevenueResponse {
    pub summary: RevenueSummary,
    pub platform_total: i64,
    pub platform_total_display: String,
    pub top_players: Vec<PlayerEarnings>,
    pub recent_distributions: Vec<DistributionEntry>,
    pub daily_summaries: Vec<AdminRevenueSummary>,
    pub date_range: DateRange,
}

#[derive(Debug, Serialize)]
pub struct PersistSummaryResponse {
    pub success: bool,
    pub summary: AdminRevenueSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildResponse {
    pub success: bool,
    pub players_rebuilt: u64,
}

async fn require_admin(state: &AppState, user_id: UserId) -> Result<()> {
    let profile = state.profile_of(user_id).await?;
    if !profile.is_admin() {
        tracing::warn!(user_id = %user_id.0, "non-admin attempted admin revenue access");
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    Ok(())
}

/// Resolve the report window; defaults to the last 30 days ending today (UTC)
fn resolve_range(query: &DateRangeQuery, today: NaiveDate) -> Result<DateRange> {
    let end_date = query.end_date.unwrap_or(today);
    let start_date = match query.start_date {
        Some(start_date) => start_date,
        None => end_date
            .checked_sub_signed(Duration::days(DEFAULT_REPORT_DAYS))
            .ok_or_else(|| AppError::BadRequest("end_date is out of range".to_string()))?,
    };
    if start_date > end_date {
        return Err(AppError::BadRequest(
            "start_date must not be after end_date".to_string(),
        ));
    }
    Ok(DateRange {
        start_date,
        end_date,
    })
}

/// Revenue report for a date window
pub async fn get_admin_revenue(
    state: web::Data<AppState>,
    user_id: UserId,
    query: web::Query<DateRangeQuery>,
) -> Result<HttpResponse> {
    require_admin(&state, user_id).await?;
    let range = resolve_range(&query, Utc::now().date_naive())?;

    let summary = state
        .summaries
        .summarize(range.start_date, range.end_date)
        .await?;
    let platform_total = state.earnings.get_platform_total_revenue().await?;
    let top_players = state.earnings.get_top_earners(REPORT_TOP_PLAYERS).await?;
    let recent_distributions = state
        .earnings
        .get_recent_ledger_activity(REPORT_RECENT_ENTRIES)
        .await?;
    let daily_summaries = state
        .summaries
        .daily_summaries(range.start_date, range.end_date)
        .await?;

    Ok(HttpResponse::Ok().json(AdminRevenueResponse {
        summary,
        platform_total,
        platform_total_display: format_cents(platform_total),
        top_players,
        recent_distributions,
        daily_summaries,
        date_range: range,
    }))
}

/// Compute and store today's summary row
pub async fn persist_admin_summary(
    state: web::Data<AppState>,
    user_id: UserId,
) -> Result<HttpResponse> {
    require_admin(&state, user_id).await?;
    let summary = state
        .summaries
        .persist_daily_summary(Utc::now().date_naive())
        .await?;

    Ok(HttpResponse::Ok().json(PersistSummaryResponse {
        success: true,
        summary,
    }))
}

/// Recompute every player's earnings from the ledger
pub async fn rebuild_earnings(
    state: web::Data<AppState>,
    user_id: UserId,
) -> Result<HttpResponse> {
    require_admin(&state, user_id).await?;
    let players_rebuilt = state.store.ledger.rebuild_player_earnings().await?;
    tracing::info!(user_id = %user_id.0, players_rebuilt, "player earnings rebuilt");

    Ok(HttpResponse::Ok().json(RebuildResponse {
        success: true,
        players_rebuilt,
    }))
}
