//! In-process implementation of the revenue store
//!
//! Used when `REVENUE_STORE=memory` (local development) and by the test
//! suites. A ledger pass builds the complete next state of the affected rows
//! while holding the write lock and only then swaps it in, so readers never
//! observe entries without their matching earnings.

use super::{
    day_window, validate_entries, ActivityReader, DistributionLedger, EarningsReader,
    ProfileDirectory, SummaryStore, TagDirectory, VideoDirectory,
};
use crate::error::RevenueResult;
use crate::models::{
    AdminRevenueSummary, DistributionEntry, DistributionType, NewDistribution, PlayerEarnings,
    Profile, RevenueSummary, VideoActivity, VideoRecord, Visibility,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    videos: HashMap<Uuid, VideoRecord>,
    views: HashMap<Uuid, Vec<i32>>,
    tags: HashMap<Uuid, BTreeSet<Uuid>>,
    profiles: HashMap<Uuid, Profile>,
    distributions: Vec<DistributionEntry>,
    earnings: HashMap<Uuid, PlayerEarnings>,
    summaries: BTreeMap<NaiveDate, AdminRevenueSummary>,
}

impl MemoryState {
    fn earnings_from_ledger(&self, player_id: Uuid) -> PlayerEarnings {
        let mut own = 0;
        let mut team = 0;
        for entry in self
            .distributions
            .iter()
            .filter(|e| e.recipient_player_id == Some(player_id))
        {
            match entry.distribution_type {
                DistributionType::OwnVideo => own += entry.amount_cents,
                DistributionType::TeamPool => team += entry.amount_cents,
                DistributionType::Publisher | DistributionType::Platform => {}
            }
        }
        PlayerEarnings::from_parts(player_id, own, team)
    }
}

fn player_recipient(entry_type: DistributionType, recipient: Option<Uuid>) -> Option<Uuid> {
    if entry_type.is_player_earning() {
        recipient
    } else {
        None
    }
}

#[derive(Default)]
pub struct MemoryRevenueStore {
    state: RwLock<MemoryState>,
}

impl MemoryRevenueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_video(&self, video: VideoRecord) {
        self.state.write().await.videos.insert(video.id, video);
    }

    pub async fn set_visibility(&self, video_id: Uuid, visibility: Visibility) {
        if let Some(video) = self.state.write().await.videos.get_mut(&video_id) {
            video.visibility = visibility;
        }
    }

    pub async fn record_view(&self, video_id: Uuid, seconds_watched: i32) {
        self.record_views(video_id, 1, seconds_watched).await;
    }

    pub async fn record_views(&self, video_id: Uuid, count: usize, seconds_watched: i32) {
        let mut state = self.state.write().await;
        state
            .views
            .entry(video_id)
            .or_default()
            .extend(std::iter::repeat(seconds_watched.max(0)).take(count));
    }

    pub async fn tag_player(&self, video_id: Uuid, player_id: Uuid) {
        self.state
            .write()
            .await
            .tags
            .entry(video_id)
            .or_default()
            .insert(player_id);
    }

    pub async fn untag_player(&self, video_id: Uuid, player_id: Uuid) {
        if let Some(tags) = self.state.write().await.tags.get_mut(&video_id) {
            tags.remove(&player_id);
        }
    }

    pub async fn insert_profile(&self, profile: Profile) {
        self.state
            .write()
            .await
            .profiles
            .insert(profile.user_id, profile);
    }

    /// Every earnings row, ordered by player id
    pub async fn all_player_earnings(&self) -> Vec<PlayerEarnings> {
        let state = self.state.read().await;
        let mut rows: Vec<PlayerEarnings> = state.earnings.values().cloned().collect();
        rows.sort_by_key(|row| row.player_id);
        rows
    }

    pub async fn daily_summary_count(&self) -> usize {
        self.state.read().await.summaries.len()
    }
}

#[async_trait]
impl VideoDirectory for MemoryRevenueStore {
    async fn find_video(&self, video_id: Uuid) -> RevenueResult<Option<VideoRecord>> {
        Ok(self.state.read().await.videos.get(&video_id).cloned())
    }

    async fn public_videos_by_owner(&self, player_id: Uuid) -> RevenueResult<Vec<Uuid>> {
        let state = self.state.read().await;
        let mut videos: Vec<&VideoRecord> = state
            .videos
            .values()
            .filter(|v| v.owner_player_id == player_id && v.visibility == Visibility::Public)
            .collect();
        videos.sort_by_key(|v| (v.created_at, v.id));
        Ok(videos.into_iter().map(|v| v.id).collect())
    }

    async fn public_videos(&self, limit: i64, offset: i64) -> RevenueResult<Vec<Uuid>> {
        let state = self.state.read().await;
        let mut videos: Vec<&VideoRecord> = state
            .videos
            .values()
            .filter(|v| v.visibility == Visibility::Public)
            .collect();
        videos.sort_by_key(|v| (v.created_at, v.id));
        Ok(videos
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|v| v.id)
            .collect())
    }
}

#[async_trait]
impl ActivityReader for MemoryRevenueStore {
    async fn video_activity(
        &self,
        video_id: Uuid,
        min_watch_seconds: i32,
    ) -> RevenueResult<VideoActivity> {
        let state = self.state.read().await;
        let views = state.views.get(&video_id).map(Vec::as_slice).unwrap_or(&[]);
        Ok(VideoActivity {
            view_count: views.len() as i64,
            eligible_view_count: views.iter().filter(|s| **s >= min_watch_seconds).count() as i64,
            total_seconds_watched: views.iter().map(|s| *s as i64).sum(),
        })
    }
}

#[async_trait]
impl TagDirectory for MemoryRevenueStore {
    async fn tagged_players(&self, video_id: Uuid) -> RevenueResult<Vec<Uuid>> {
        let state = self.state.read().await;
        Ok(state
            .tags
            .get(&video_id)
            .map(|tags| tags.iter().copied().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ProfileDirectory for MemoryRevenueStore {
    async fn find_profile(&self, user_id: Uuid) -> RevenueResult<Option<Profile>> {
        Ok(self.state.read().await.profiles.get(&user_id).cloned())
    }
}

#[async_trait]
impl DistributionLedger for MemoryRevenueStore {
    async fn apply_distributions(
        &self,
        video_id: Uuid,
        entries: &[NewDistribution],
    ) -> RevenueResult<u64> {
        validate_entries(video_id, entries)?;

        let calculation_id = Uuid::new_v4();
        let now = Utc::now();
        let mut state = self.state.write().await;

        let mut touched: BTreeSet<Uuid> = state
            .distributions
            .iter()
            .filter(|e| e.video_id == video_id)
            .filter_map(|e| player_recipient(e.distribution_type, e.recipient_player_id))
            .collect();

        let mut next: Vec<DistributionEntry> = state
            .distributions
            .iter()
            .filter(|e| e.video_id != video_id)
            .cloned()
            .collect();
        for entry in entries {
            if let Some(player_id) =
                player_recipient(entry.distribution_type, entry.recipient_player_id)
            {
                touched.insert(player_id);
            }
            next.push(DistributionEntry {
                id: Uuid::new_v4(),
                calculation_id,
                video_id,
                source_player_id: entry.source_player_id,
                recipient_player_id: entry.recipient_player_id,
                distribution_type: entry.distribution_type,
                amount_cents: entry.amount_cents,
                created_at: now,
            });
        }

        state.distributions = next;
        let refreshed: Vec<PlayerEarnings> = touched
            .iter()
            .map(|player_id| state.earnings_from_ledger(*player_id))
            .collect();
        for earnings in refreshed {
            state.earnings.insert(earnings.player_id, earnings);
        }

        Ok(entries.len() as u64)
    }

    async fn rebuild_player_earnings(&self) -> RevenueResult<u64> {
        let mut state = self.state.write().await;
        let mut players: HashSet<Uuid> = state.earnings.keys().copied().collect();
        players.extend(
            state
                .distributions
                .iter()
                .filter_map(|e| player_recipient(e.distribution_type, e.recipient_player_id)),
        );

        let rebuilt: Vec<PlayerEarnings> = players
            .iter()
            .map(|player_id| state.earnings_from_ledger(*player_id))
            .collect();
        let written = rebuilt.len() as u64;
        state.earnings = rebuilt.into_iter().map(|e| (e.player_id, e)).collect();
        Ok(written)
    }

    async fn ping(&self) -> RevenueResult<()> {
        Ok(())
    }
}

#[async_trait]
impl EarningsReader for MemoryRevenueStore {
    async fn player_earnings(&self, player_id: Uuid) -> RevenueResult<Option<PlayerEarnings>> {
        Ok(self.state.read().await.earnings.get(&player_id).cloned())
    }

    async fn recent_distributions(
        &self,
        recipient_player_id: Option<Uuid>,
        limit: i64,
    ) -> RevenueResult<Vec<DistributionEntry>> {
        let state = self.state.read().await;
        let mut rows: Vec<DistributionEntry> = state
            .distributions
            .iter()
            .filter(|e| {
                recipient_player_id.is_none() || e.recipient_player_id == recipient_player_id
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn top_earners(&self, limit: i64) -> RevenueResult<Vec<PlayerEarnings>> {
        let state = self.state.read().await;
        let mut rows: Vec<PlayerEarnings> = state
            .earnings
            .values()
            .filter(|e| e.total_earnings_cents > 0)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.total_earnings_cents
                .cmp(&a.total_earnings_cents)
                .then(a.player_id.cmp(&b.player_id))
        });
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn platform_total_cents(&self) -> RevenueResult<i64> {
        let state = self.state.read().await;
        Ok(state
            .distributions
            .iter()
            .filter(|e| e.distribution_type == DistributionType::Platform)
            .map(|e| e.amount_cents)
            .sum())
    }

    async fn video_distributions(&self, video_id: Uuid) -> RevenueResult<Vec<DistributionEntry>> {
        let state = self.state.read().await;
        let mut rows: Vec<DistributionEntry> = state
            .distributions
            .iter()
            .filter(|e| e.video_id == video_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.distribution_type
                .as_str()
                .cmp(b.distribution_type.as_str())
                .then(a.recipient_player_id.cmp(&b.recipient_player_id))
                .then(a.id.cmp(&b.id))
        });
        Ok(rows)
    }
}

#[async_trait]
impl SummaryStore for MemoryRevenueStore {
    async fn summarize(&self, start: NaiveDate, end: NaiveDate) -> RevenueResult<RevenueSummary> {
        let (from, until) = day_window(start, end);
        let state = self.state.read().await;

        let mut summary = RevenueSummary {
            start_date: start,
            end_date: end,
            platform_cents: 0,
            publisher_cents: 0,
            player_cents: 0,
            team_pool_cents: 0,
            total_cents: 0,
            videos_processed: 0,
        };
        let mut videos = HashSet::new();
        for entry in state
            .distributions
            .iter()
            .filter(|e| e.created_at >= from && e.created_at < until)
        {
            match entry.distribution_type {
                DistributionType::Platform => summary.platform_cents += entry.amount_cents,
                DistributionType::Publisher => summary.publisher_cents += entry.amount_cents,
                DistributionType::OwnVideo => summary.player_cents += entry.amount_cents,
                DistributionType::TeamPool => summary.team_pool_cents += entry.amount_cents,
            }
            summary.total_cents += entry.amount_cents;
            videos.insert(entry.video_id);
        }
        summary.videos_processed = videos.len() as i64;
        Ok(summary)
    }

    async fn upsert_daily_summary(
        &self,
        summary: &AdminRevenueSummary,
    ) -> RevenueResult<AdminRevenueSummary> {
        let mut state = self.state.write().await;
        let stored = state
            .summaries
            .entry(summary.summary_date)
            .and_modify(|existing| {
                if !existing.same_totals(summary) {
                    *existing = summary.clone();
                }
            })
            .or_insert_with(|| summary.clone());
        Ok(stored.clone())
    }

    async fn daily_summaries(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RevenueResult<Vec<AdminRevenueSummary>> {
        if start > end {
            return Ok(Vec::new());
        }
        let state = self.state.read().await;
        Ok(state.summaries.range(start..=end).map(|(_, s)| s.clone()).collect())
    }
}
