//! Per-video calculate-and-commit
//!
//! One call to [`RevenueEngine::process_video`] is the unit of atomicity:
//! the calculator runs and the ledger commits while a lock keyed by the video
//! id is held, so two recalculations of the same video never interleave.
//! Different videos proceed in parallel.

use super::calculator::{CalculationOutcome, RevenueCalculator};
use crate::db::DistributionLedger;
use crate::error::RevenueResult;
use crate::metrics;
use crate::models::Visibility;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Keyed mutexes, one per video currently being processed
#[derive(Clone, Default)]
pub struct VideoLocks {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

pub struct VideoLockGuard {
    video_id: Uuid,
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl VideoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, video_id: Uuid) -> VideoLockGuard {
        let mutex = self
            .locks
            .entry(video_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        VideoLockGuard {
            video_id,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Number of videos with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for VideoLockGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map itself still holds the mutex: nobody is waiting
        self.locks
            .remove_if(&self.video_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Committed {
        video_id: Uuid,
        gross_cents: i64,
        entries: u64,
    },
    NotEligible {
        video_id: Uuid,
        visibility: Visibility,
    },
}

pub struct RevenueEngine {
    calculator: RevenueCalculator,
    ledger: Arc<dyn DistributionLedger>,
    locks: VideoLocks,
}

impl RevenueEngine {
    pub fn new(calculator: RevenueCalculator, ledger: Arc<dyn DistributionLedger>) -> Self {
        Self {
            calculator,
            ledger,
            locks: VideoLocks::new(),
        }
    }

    pub fn calculator(&self) -> &RevenueCalculator {
        &self.calculator
    }

    pub fn locks(&self) -> &VideoLocks {
        &self.locks
    }

    /// Recalculate one video and replace its ledger entries
    pub async fn process_video(&self, video_id: Uuid) -> RevenueResult<ProcessOutcome> {
        let _lock = self.locks.acquire(video_id).await;

        let outcome = match self.calculator.compute_distributions(video_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics::record_calculation("error");
                warn!(video_id = %video_id, error = %e, "revenue calculation failed");
                return Err(e);
            }
        };

        let distribution = match outcome {
            CalculationOutcome::NotEligible {
                video_id,
                visibility,
            } => {
                metrics::record_calculation("not_eligible");
                debug!(
                    video_id = %video_id,
                    visibility = visibility.as_str(),
                    "video not eligible for revenue"
                );
                return Ok(ProcessOutcome::NotEligible {
                    video_id,
                    visibility,
                });
            }
            CalculationOutcome::Computed(distribution) => distribution,
        };

        let started = Instant::now();
        let committed = match self
            .ledger
            .apply_distributions(video_id, &distribution.entries)
            .await
        {
            Ok(committed) => committed,
            Err(e) => {
                metrics::record_calculation("error");
                warn!(video_id = %video_id, error = %e, "ledger commit failed, nothing applied");
                return Err(e);
            }
        };
        metrics::record_ledger_commit(started.elapsed());
        metrics::record_calculation("committed");
        for entry in &distribution.entries {
            metrics::record_distributed(entry.distribution_type.as_str(), entry.amount_cents);
        }

        info!(
            video_id = %video_id,
            owner_player_id = %distribution.owner_player_id,
            views = distribution.activity.view_count,
            eligible_views = distribution.activity.eligible_view_count,
            gross_cents = distribution.gross_cents,
            entries = committed,
            "revenue distributed"
        );

        Ok(ProcessOutcome::Committed {
            video_id,
            gross_cents: distribution.gross_cents,
            entries: committed,
        })
    }
}
