//! Batch driver
//!
//! Selects videos by mode and runs the engine over each one with bounded
//! parallelism. A failing video is logged and counted; the batch carries on.
//!
//! Dropping the future returned by [`BatchDriver::run`] cancels the batch.
//! Videos already committed stay committed, the in-flight ones roll back with
//! their transactions, and the rest are simply never visited.

use super::engine::{ProcessOutcome, RevenueEngine};
use crate::db::VideoDirectory;
use crate::error::{RevenueError, RevenueResult};
use crate::metrics;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Hard cap on videos selected by an `AllPublic` run
    pub max_videos: i64,
    pub concurrency: usize,
    pub item_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_videos: 100,
            concurrency: 4,
            item_delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    Single(Uuid),
    ByPlayer(Uuid),
    /// Public videos in creation order; `limit` is clamped to the configured cap
    AllPublic { limit: i64, offset: i64 },
}

impl BatchMode {
    pub fn label(&self) -> &'static str {
        match self {
            BatchMode::Single(_) => "single",
            BatchMode::ByPlayer(_) => "by_player",
            BatchMode::AllPublic { .. } => "all_public",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub videos_selected: usize,
    pub videos_processed: usize,
    pub not_eligible: usize,
    pub errors: usize,
}

pub struct BatchDriver {
    engine: Arc<RevenueEngine>,
    videos: Arc<dyn VideoDirectory>,
    config: BatchConfig,
}

impl BatchDriver {
    pub fn new(
        engine: Arc<RevenueEngine>,
        videos: Arc<dyn VideoDirectory>,
        config: BatchConfig,
    ) -> Self {
        Self {
            engine,
            videos,
            config,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    async fn select(&self, mode: BatchMode) -> RevenueResult<Vec<Uuid>> {
        match mode {
            BatchMode::Single(video_id) => Ok(vec![video_id]),
            BatchMode::ByPlayer(player_id) => self.videos.public_videos_by_owner(player_id).await,
            BatchMode::AllPublic { limit, offset } => {
                if offset < 0 {
                    return Err(RevenueError::InvalidInput(format!(
                        "offset must not be negative, got {}",
                        offset
                    )));
                }
                let limit = limit.clamp(0, self.config.max_videos);
                self.videos.public_videos(limit, offset).await
            }
        }
    }

    /// Run one batch. Selection failures are returned; per-video failures are counted.
    pub async fn run(&self, mode: BatchMode) -> RevenueResult<BatchReport> {
        metrics::record_batch_run(mode.label());
        let video_ids = self.select(mode).await?;

        let mut report = BatchReport {
            videos_selected: video_ids.len(),
            ..BatchReport::default()
        };

        let delay = self.config.item_delay;
        let engine = &self.engine;
        let mut results = stream::iter(video_ids)
            .map(|video_id| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                (video_id, engine.process_video(video_id).await)
            })
            .buffer_unordered(self.config.concurrency.max(1));

        while let Some((video_id, result)) = results.next().await {
            match result {
                Ok(ProcessOutcome::Committed { .. }) => report.videos_processed += 1,
                Ok(ProcessOutcome::NotEligible { .. }) => report.not_eligible += 1,
                Err(e) => {
                    report.errors += 1;
                    metrics::record_batch_error();
                    warn!(
                        video_id = %video_id,
                        mode = mode.label(),
                        error = %e,
                        transient = e.is_transient(),
                        "video skipped in revenue batch"
                    );
                }
            }
        }

        info!(
            mode = mode.label(),
            selected = report.videos_selected,
            processed = report.videos_processed,
            not_eligible = report.not_eligible,
            errors = report.errors,
            "revenue batch finished"
        );

        Ok(report)
    }
}
