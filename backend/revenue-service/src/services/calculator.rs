//! Revenue calculator
//!
//! Reads a video's activity and tag set and turns them into the distribution
//! entries for one pass. Nothing is written here; the ledger commits.

use super::policy::{RevenuePolicy, RevenueSplit};
use crate::db::{ActivityReader, TagDirectory, VideoDirectory};
use crate::error::{RevenueError, RevenueResult};
use crate::models::{DistributionType, NewDistribution, VideoActivity, Visibility};
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

/// Entries for one video and the gross they were split from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDistribution {
    pub video_id: Uuid,
    pub owner_player_id: Uuid,
    pub activity: VideoActivity,
    pub gross_cents: i64,
    pub entries: Vec<NewDistribution>,
}

impl VideoDistribution {
    pub fn total_cents(&self) -> i64 {
        self.entries.iter().map(|e| e.amount_cents).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalculationOutcome {
    Computed(VideoDistribution),
    /// The video exists but is not public; nothing to distribute
    NotEligible { video_id: Uuid, visibility: Visibility },
}

pub struct RevenueCalculator {
    policy: RevenuePolicy,
    videos: Arc<dyn VideoDirectory>,
    activity: Arc<dyn ActivityReader>,
    tags: Arc<dyn TagDirectory>,
}

impl RevenueCalculator {
    pub fn new(
        policy: RevenuePolicy,
        videos: Arc<dyn VideoDirectory>,
        activity: Arc<dyn ActivityReader>,
        tags: Arc<dyn TagDirectory>,
    ) -> Self {
        Self {
            policy,
            videos,
            activity,
            tags,
        }
    }

    pub fn policy(&self) -> &RevenuePolicy {
        &self.policy
    }

    pub async fn compute_distributions(&self, video_id: Uuid) -> RevenueResult<CalculationOutcome> {
        let video = self
            .videos
            .find_video(video_id)
            .await?
            .ok_or_else(|| RevenueError::NotFound(format!("video {}", video_id)))?;

        if video.visibility != Visibility::Public {
            return Ok(CalculationOutcome::NotEligible {
                video_id,
                visibility: video.visibility,
            });
        }

        let activity = self
            .activity
            .video_activity(video_id, self.policy.min_watch_seconds)
            .await?;
        let tagged = self.tags.tagged_players(video_id).await?;

        let gross_cents = self.policy.gross_cents(activity.eligible_view_count)?;
        let entries = build_entries(
            &self.policy,
            video_id,
            video.owner_player_id,
            &tagged,
            gross_cents,
        )?;

        Ok(CalculationOutcome::Computed(VideoDistribution {
            video_id,
            owner_player_id: video.owner_player_id,
            activity,
            gross_cents,
            entries,
        }))
    }
}

/// Build the entry set for one video
///
/// Teammates are de-duplicated, the owner is dropped from the list and the
/// rest are ordered by player id so repeated passes emit identical sets.
/// A zero gross still yields the full set, with every amount zero.
pub fn build_entries(
    policy: &RevenuePolicy,
    video_id: Uuid,
    owner_player_id: Uuid,
    tagged: &[Uuid],
    gross_cents: i64,
) -> RevenueResult<Vec<NewDistribution>> {
    let teammates: Vec<Uuid> = tagged
        .iter()
        .copied()
        .filter(|id| *id != owner_player_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let RevenueSplit {
        platform_cents,
        publisher_cents,
        owner_cents,
        team_cents,
        ..
    } = policy.split(gross_cents, teammates.len())?;

    let entry = |recipient: Option<Uuid>, distribution_type, amount_cents| NewDistribution {
        video_id,
        source_player_id: owner_player_id,
        recipient_player_id: recipient,
        distribution_type,
        amount_cents,
    };

    let mut entries = Vec::with_capacity(3 + teammates.len());
    entries.push(entry(None, DistributionType::Platform, platform_cents));
    entries.push(entry(
        policy.publisher_account_id,
        DistributionType::Publisher,
        publisher_cents,
    ));
    entries.push(entry(
        Some(owner_player_id),
        DistributionType::OwnVideo,
        owner_cents,
    ));
    for (player_id, amount) in teammates.into_iter().zip(team_cents) {
        entries.push(entry(Some(player_id), DistributionType::TeamPool, amount));
    }

    Ok(entries)
}
