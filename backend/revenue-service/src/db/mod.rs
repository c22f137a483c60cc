/// Storage access layer
///
/// The engine talks to storage only through the traits below so that the
/// PostgreSQL implementation (`postgres`) and the in-process one (`memory`)
/// are interchangeable.
///
/// - `VideoDirectory`, `ActivityReader`, `TagDirectory`, `ProfileDirectory`:
///   read-only collaborators owned by other platform services
/// - `DistributionLedger`: the only writer of ledger rows and earnings rollups
/// - `EarningsReader`, `SummaryStore`: reporting reads and the daily snapshot
pub mod memory;
pub mod postgres;

use crate::error::{RevenueError, RevenueResult};
use crate::models::{
    AdminRevenueSummary, DistributionEntry, DistributionType, NewDistribution, PlayerEarnings,
    Profile, RevenueSummary, VideoActivity, VideoRecord,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

pub use memory::MemoryRevenueStore;
pub use postgres::PgRevenueStore;

#[async_trait]
pub trait VideoDirectory: Send + Sync {
    async fn find_video(&self, video_id: Uuid) -> RevenueResult<Option<VideoRecord>>;

    /// Public videos owned by a player, oldest first
    async fn public_videos_by_owner(&self, player_id: Uuid) -> RevenueResult<Vec<Uuid>>;

    /// Public videos ordered by creation time then id
    async fn public_videos(&self, limit: i64, offset: i64) -> RevenueResult<Vec<Uuid>>;
}

#[async_trait]
pub trait ActivityReader: Send + Sync {
    /// Aggregate views for a video; views shorter than `min_watch_seconds`
    /// are counted in `view_count` but not in `eligible_view_count`
    async fn video_activity(
        &self,
        video_id: Uuid,
        min_watch_seconds: i32,
    ) -> RevenueResult<VideoActivity>;
}

#[async_trait]
pub trait TagDirectory: Send + Sync {
    /// Players tagged on a video. May include the owner; callers filter.
    async fn tagged_players(&self, video_id: Uuid) -> RevenueResult<Vec<Uuid>>;
}

#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn find_profile(&self, user_id: Uuid) -> RevenueResult<Option<Profile>>;
}

#[async_trait]
pub trait DistributionLedger: Send + Sync {
    /// Replace every entry for `video_id` with `entries` and refresh the
    /// earnings of every player touched by the old or new set, atomically.
    ///
    /// Returns the number of entries committed. On error nothing changes.
    async fn apply_distributions(
        &self,
        video_id: Uuid,
        entries: &[NewDistribution],
    ) -> RevenueResult<u64>;

    /// Recompute all earnings rollups from the ledger; returns rows written
    async fn rebuild_player_earnings(&self) -> RevenueResult<u64>;

    /// Cheap reachability probe for readiness checks
    async fn ping(&self) -> RevenueResult<()>;
}

#[async_trait]
pub trait EarningsReader: Send + Sync {
    async fn player_earnings(&self, player_id: Uuid) -> RevenueResult<Option<PlayerEarnings>>;

    /// Newest first. `None` means entries for every recipient.
    async fn recent_distributions(
        &self,
        recipient_player_id: Option<Uuid>,
        limit: i64,
    ) -> RevenueResult<Vec<DistributionEntry>>;

    /// Players with non-zero earnings, highest first, ties by player id
    async fn top_earners(&self, limit: i64) -> RevenueResult<Vec<PlayerEarnings>>;

    async fn platform_total_cents(&self) -> RevenueResult<i64>;

    async fn video_distributions(&self, video_id: Uuid) -> RevenueResult<Vec<DistributionEntry>>;
}

#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Totals for entries created within `[start, end]` (inclusive, UTC days)
    async fn summarize(&self, start: NaiveDate, end: NaiveDate) -> RevenueResult<RevenueSummary>;

    /// Insert or overwrite the row for `summary.summary_date`
    async fn upsert_daily_summary(
        &self,
        summary: &AdminRevenueSummary,
    ) -> RevenueResult<AdminRevenueSummary>;

    async fn daily_summaries(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RevenueResult<Vec<AdminRevenueSummary>>;
}

/// Bundle of store handles shared by services and handlers
#[derive(Clone)]
pub struct RevenueStore {
    pub videos: Arc<dyn VideoDirectory>,
    pub activity: Arc<dyn ActivityReader>,
    pub tags: Arc<dyn TagDirectory>,
    pub profiles: Arc<dyn ProfileDirectory>,
    pub ledger: Arc<dyn DistributionLedger>,
    pub earnings: Arc<dyn EarningsReader>,
    pub summaries: Arc<dyn SummaryStore>,
}

impl RevenueStore {
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        Self::from_shared(Arc::new(PgRevenueStore::new(pool)))
    }

    pub fn memory(store: Arc<MemoryRevenueStore>) -> Self {
        Self::from_shared(store)
    }

    fn from_shared<T>(store: Arc<T>) -> Self
    where
        T: VideoDirectory
            + ActivityReader
            + TagDirectory
            + ProfileDirectory
            + DistributionLedger
            + EarningsReader
            + SummaryStore
            + 'static,
    {
        Self {
            videos: store.clone(),
            activity: store.clone(),
            tags: store.clone(),
            profiles: store.clone(),
            ledger: store.clone(),
            earnings: store.clone(),
            summaries: store,
        }
    }
}

/// UTC day bounds `[start 00:00, end+1 00:00)` for an inclusive date range
pub(crate) fn day_window(
    start: NaiveDate,
    end: NaiveDate,
) -> (chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>) {
    let from = start.and_time(chrono::NaiveTime::MIN).and_utc();
    let until = end
        .succ_opt()
        .unwrap_or(NaiveDate::MAX)
        .and_time(chrono::NaiveTime::MIN)
        .and_utc();
    (from, until)
}

/// Reject entry sets that would break ledger invariants before any write
pub(crate) fn validate_entries(video_id: Uuid, entries: &[NewDistribution]) -> RevenueResult<()> {
    for entry in entries {
        if entry.video_id != video_id {
            return Err(RevenueError::InvalidInput(format!(
                "entry for video {} submitted under video {}",
                entry.video_id, video_id
            )));
        }
        if entry.amount_cents < 0 {
            return Err(RevenueError::InvalidInput(format!(
                "negative amount {} on {} entry",
                entry.amount_cents, entry.distribution_type
            )));
        }
        if entry.distribution_type == DistributionType::TeamPool
            && entry.recipient_player_id == Some(entry.source_player_id)
        {
            return Err(RevenueError::InvalidInput(
                "team pool entry credits the video owner".to_string(),
            ));
        }
        if entry.distribution_type.is_player_earning() && entry.recipient_player_id.is_none() {
            return Err(RevenueError::InvalidInput(format!(
                "{} entry has no recipient",
                entry.distribution_type
            )));
        }
    }
    Ok(())
}
