//! Shared fixtures for revenue-service integration tests
//!
//! Everything runs against `MemoryRevenueStore`; fault injection wraps the
//! store's collaborator traits.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use revenue_service::db::{ActivityReader, MemoryRevenueStore, RevenueStore};
use revenue_service::error::{RevenueError, RevenueResult};
use revenue_service::models::{Profile, Role, VideoActivity, VideoRecord, Visibility};
use revenue_service::services::{
    BatchConfig, BatchDriver, RevenueCalculator, RevenueEngine, RevenuePolicy,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Batch limits without the inter-item pause
pub fn fast_batch_config() -> BatchConfig {
    BatchConfig {
        item_delay: std::time::Duration::ZERO,
        ..BatchConfig::default()
    }
}

/// Insert a public video created `age_minutes` ago and give it `views` full views
pub async fn seed_video(
    store: &MemoryRevenueStore,
    owner: Uuid,
    views: usize,
    tagged: &[Uuid],
    age_minutes: i64,
) -> Uuid {
    let video_id = Uuid::new_v4();
    store
        .insert_video(VideoRecord {
            id: video_id,
            owner_player_id: owner,
            visibility: Visibility::Public,
            created_at: Utc::now() - Duration::minutes(age_minutes),
        })
        .await;
    store.record_views(video_id, views, 30).await;
    for player in tagged {
        store.tag_player(video_id, *player).await;
    }
    video_id
}

/// Register a user profile and return the user id
pub async fn seed_profile(store: &MemoryRevenueStore, player_id: Option<Uuid>, role: Role) -> Uuid {
    let user_id = Uuid::new_v4();
    store
        .insert_profile(Profile {
            user_id,
            player_id,
            role,
        })
        .await;
    user_id
}

/// Activity reader that fails for selected videos and defers to the store otherwise
pub struct FlakyActivity {
    inner: Arc<MemoryRevenueStore>,
    failing: Mutex<HashSet<Uuid>>,
}

impl FlakyActivity {
    pub fn new(inner: Arc<MemoryRevenueStore>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_for(&self, video_id: Uuid) {
        self.failing.lock().unwrap().insert(video_id);
    }

    pub fn recover(&self, video_id: Uuid) {
        self.failing.lock().unwrap().remove(&video_id);
    }
}

#[async_trait]
impl ActivityReader for FlakyActivity {
    async fn video_activity(
        &self,
        video_id: Uuid,
        min_watch_seconds: i32,
    ) -> RevenueResult<VideoActivity> {
        if self.failing.lock().unwrap().contains(&video_id) {
            return Err(RevenueError::Transient(format!(
                "activity reader unavailable for {}",
                video_id
            )));
        }
        self.inner.video_activity(video_id, min_watch_seconds).await
    }
}

/// Engine and batch driver over a memory store, with a swappable activity reader
pub struct Harness {
    pub store: Arc<MemoryRevenueStore>,
    pub handles: RevenueStore,
    pub activity: Arc<FlakyActivity>,
    pub engine: Arc<RevenueEngine>,
    pub batch: BatchDriver,
}

impl Harness {
    pub fn new(policy: RevenuePolicy) -> Self {
        let store = Arc::new(MemoryRevenueStore::new());
        let handles = RevenueStore::memory(store.clone());
        let activity = Arc::new(FlakyActivity::new(store.clone()));
        let calculator = RevenueCalculator::new(
            policy,
            handles.videos.clone(),
            activity.clone(),
            handles.tags.clone(),
        );
        let engine = Arc::new(RevenueEngine::new(calculator, handles.ledger.clone()));
        let batch = BatchDriver::new(engine.clone(), handles.videos.clone(), fast_batch_config());

        Self {
            store,
            handles,
            activity,
            engine,
            batch,
        }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(RevenuePolicy::default())
    }
}
