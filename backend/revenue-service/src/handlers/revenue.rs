/// Revenue handlers - calculation trigger and player-facing reads
use super::AppState;
use crate::error::{AppError, Result};
use crate::middleware::UserId;
use crate::models::{DistributionEntry, PlayerEarnings, Profile};
use crate::services::{BatchMode, ProcessOutcome};
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_RECENT_LIMIT: i64 = 20;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateRequest {
    pub video_id: Option<Uuid>,
    pub player_id: Option<Uuid>,
    /// Page size for the all-public mode, clamped to the configured cap
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub videos_processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<usize>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyRevenueResponse {
    pub earnings: PlayerEarnings,
    pub recent_distributions: Vec<DistributionEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDistributionsResponse {
    pub video_id: Uuid,
    pub total_cents: i64,
    pub distributions: Vec<DistributionEntry>,
}

/// Players may only recalculate their own videos
fn ensure_self_or_admin(profile: &Profile, owner_player_id: Uuid) -> Result<()> {
    if profile.is_admin() || profile.player_id == Some(owner_player_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Revenue can only be calculated for your own videos".to_string(),
        ))
    }
}

/// Trigger a revenue calculation
///
/// `{videoId}` runs one video, `{playerId}` every public video of that player,
/// and an empty body a bounded page of all public videos (admin only).
pub async fn calculate_revenue(
    state: web::Data<AppState>,
    user_id: UserId,
    body: Option<web::Json<CalculateRequest>>,
) -> Result<HttpResponse> {
    let req = body.map(|b| b.into_inner()).unwrap_or_default();
    let profile = state.profile_of(user_id).await?;

    let mode = match (req.video_id, req.player_id) {
        (Some(_), Some(_)) => {
            return Err(AppError::BadRequest(
                "Provide either videoId or playerId, not both".to_string(),
            ))
        }
        (Some(video_id), None) => {
            let video = state
                .store
                .videos
                .find_video(video_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("video {}", video_id)))?;
            ensure_self_or_admin(&profile, video.owner_player_id)?;
            BatchMode::Single(video_id)
        }
        (None, Some(player_id)) => {
            ensure_self_or_admin(&profile, player_id)?;
            BatchMode::ByPlayer(player_id)
        }
        (None, None) => {
            if !profile.is_admin() {
                return Err(AppError::Forbidden(
                    "Only admins can recalculate all videos".to_string(),
                ));
            }
            BatchMode::AllPublic {
                limit: req.limit.unwrap_or(state.batch.config().max_videos),
                offset: req.offset.unwrap_or(0),
            }
        }
    };

    tracing::info!(
        user_id = %user_id.0,
        mode = mode.label(),
        "revenue calculation requested"
    );

    if let BatchMode::Single(video_id) = mode {
        let message = match state.engine.process_video(video_id).await? {
            ProcessOutcome::Committed {
                gross_cents,
                entries,
                ..
            } => format!(
                "Revenue calculated for video {}: {} cents in {} entries",
                video_id, gross_cents, entries
            ),
            ProcessOutcome::NotEligible { visibility, .. } => format!(
                "Video {} is {} and earns no revenue",
                video_id,
                visibility.as_str()
            ),
        };
        return Ok(HttpResponse::Ok().json(CalculateResponse {
            success: true,
            videos_processed: None,
            errors: None,
            message,
        }));
    }

    let report = state.batch.run(mode).await?;
    Ok(HttpResponse::Ok().json(CalculateResponse {
        success: true,
        videos_processed: Some(report.videos_processed),
        errors: Some(report.errors),
        message: format!(
            "Processed {} of {} videos ({} errors)",
            report.videos_processed, report.videos_selected, report.errors
        ),
    }))
}

/// Current earnings and latest ledger entries for the caller
pub async fn get_my_revenue(
    state: web::Data<AppState>,
    user_id: UserId,
    query: web::Query<RecentQuery>,
) -> Result<HttpResponse> {
    let profile = state.profile_of(user_id).await?;
    let player_id = profile
        .player_id
        .ok_or_else(|| AppError::NotFound("No player profile for this user".to_string()))?;

    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    let earnings = state.earnings.get_player_earnings(player_id).await?;
    let recent_distributions = state
        .earnings
        .get_recent_distributions(player_id, limit)
        .await?;

    Ok(HttpResponse::Ok().json(MyRevenueResponse {
        earnings,
        recent_distributions,
    }))
}

/// Current entry set for one video (admin or owner)
pub async fn get_video_distributions(
    state: web::Data<AppState>,
    user_id: UserId,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let video_id = path.into_inner();
    let profile = state.profile_of(user_id).await?;
    let video = state
        .store
        .videos
        .find_video(video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("video {}", video_id)))?;

    if !profile.is_admin() && profile.player_id != Some(video.owner_player_id) {
        return Err(AppError::Forbidden(
            "Only the video owner can view its distributions".to_string(),
        ));
    }

    let distributions = state.earnings.get_video_distributions(video_id).await?;
    Ok(HttpResponse::Ok().json(VideoDistributionsResponse {
        video_id,
        total_cents: distributions.iter().map(|d| d.amount_cents).sum(),
        distributions,
    }))
}
