//! Read-side services over the ledger: per-player earnings, leaderboards and
//! the admin date-range rollup.

use crate::db::{EarningsReader, SummaryStore};
use crate::error::{RevenueError, RevenueResult};
use crate::models::{AdminRevenueSummary, DistributionEntry, PlayerEarnings, RevenueSummary};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const MAX_QUERY_LIMIT: i64 = 100;

fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(1, MAX_QUERY_LIMIT)
}

/// Pure reads; an empty ledger yields zeros and empty lists
#[derive(Clone)]
pub struct EarningsAggregator {
    earnings: Arc<dyn EarningsReader>,
}

impl EarningsAggregator {
    pub fn new(earnings: Arc<dyn EarningsReader>) -> Self {
        Self { earnings }
    }

    pub async fn get_player_earnings(&self, player_id: Uuid) -> RevenueResult<PlayerEarnings> {
        Ok(self
            .earnings
            .player_earnings(player_id)
            .await?
            .unwrap_or_else(|| PlayerEarnings::zero(player_id)))
    }

    pub async fn get_recent_distributions(
        &self,
        player_id: Uuid,
        limit: i64,
    ) -> RevenueResult<Vec<DistributionEntry>> {
        self.earnings
            .recent_distributions(Some(player_id), clamp_limit(limit))
            .await
    }

    /// Latest entries across every recipient, for the admin report
    pub async fn get_recent_ledger_activity(
        &self,
        limit: i64,
    ) -> RevenueResult<Vec<DistributionEntry>> {
        self.earnings
            .recent_distributions(None, clamp_limit(limit))
            .await
    }

    pub async fn get_top_earners(&self, limit: i64) -> RevenueResult<Vec<PlayerEarnings>> {
        self.earnings.top_earners(clamp_limit(limit)).await
    }

    pub async fn get_platform_total_revenue(&self) -> RevenueResult<i64> {
        self.earnings.platform_total_cents().await
    }

    pub async fn get_video_distributions(
        &self,
        video_id: Uuid,
    ) -> RevenueResult<Vec<DistributionEntry>> {
        self.earnings.video_distributions(video_id).await
    }
}

#[derive(Clone)]
pub struct SummaryRollup {
    summaries: Arc<dyn SummaryStore>,
}

impl SummaryRollup {
    pub fn new(summaries: Arc<dyn SummaryStore>) -> Self {
        Self { summaries }
    }

    pub async fn summarize(&self, start: NaiveDate, end: NaiveDate) -> RevenueResult<RevenueSummary> {
        if start > end {
            return Err(RevenueError::InvalidInput(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        self.summaries.summarize(start, end).await
    }

    /// Compute the totals for `date` and overwrite that day's stored row
    pub async fn persist_daily_summary(&self, date: NaiveDate) -> RevenueResult<AdminRevenueSummary> {
        let summary = self.summarize(date, date).await?;
        let stored = self
            .summaries
            .upsert_daily_summary(&AdminRevenueSummary::from_summary(date, &summary))
            .await?;

        info!(
            summary_date = %date,
            platform_cents = stored.platform_cents,
            player_cents = stored.player_cents,
            videos_processed = stored.videos_processed,
            "daily revenue summary stored"
        );
        Ok(stored)
    }

    pub async fn daily_summaries(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RevenueResult<Vec<AdminRevenueSummary>> {
        if start > end {
            return Err(RevenueError::InvalidInput(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        self.summaries.daily_summaries(start, end).await
    }
}
