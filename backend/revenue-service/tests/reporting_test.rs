mod common;

use chrono::{Duration, Utc};
use common::{seed_video, Harness};
use revenue_service::db::EarningsReader;
use revenue_service::models::DistributionType;
use revenue_service::services::{EarningsAggregator, SummaryRollup};
use uuid::Uuid;

#[tokio::test]
async fn test_top_earners_ordering_and_ties() {
    let h = Harness::default();
    let big = Uuid::new_v4();
    let tie_a = Uuid::new_v4();
    let tie_b = Uuid::new_v4();

    for (owner, views) in [(big, 1_000), (tie_a, 100), (tie_b, 100)] {
        let video = seed_video(&h.store, owner, views, &[], 0).await;
        h.engine.process_video(video).await.unwrap();
    }

    let aggregator = EarningsAggregator::new(h.handles.earnings.clone());
    let top = aggregator.get_top_earners(10).await.unwrap();
    let ids: Vec<Uuid> = top.iter().map(|e| e.player_id).collect();

    let (first_tie, second_tie) = if tie_a < tie_b {
        (tie_a, tie_b)
    } else {
        (tie_b, tie_a)
    };
    assert_eq!(ids, vec![big, first_tie, second_tie]);
    assert_eq!(top[0].total_earnings_cents, 700);

    let limited = aggregator.get_top_earners(1).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn test_recent_distributions_only_for_recipient() {
    let h = Harness::default();
    let owner = Uuid::new_v4();
    let mate = Uuid::new_v4();
    let video = seed_video(&h.store, owner, 1_000, &[mate], 0).await;
    h.engine.process_video(video).await.unwrap();

    let aggregator = EarningsAggregator::new(h.handles.earnings.clone());
    let recent = aggregator.get_recent_distributions(mate, 10).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].distribution_type, DistributionType::TeamPool);
    assert_eq!(recent[0].recipient_player_id, Some(mate));
}

#[tokio::test]
async fn test_platform_total_accumulates_across_videos() {
    let h = Harness::default();
    let owner = Uuid::new_v4();
    for views in [1_000, 500] {
        let video = seed_video(&h.store, owner, views, &[], 0).await;
        h.engine.process_video(video).await.unwrap();
    }

    let aggregator = EarningsAggregator::new(h.handles.earnings.clone());
    assert_eq!(aggregator.get_platform_total_revenue().await.unwrap(), 150);
}

#[tokio::test]
async fn test_summary_groups_by_type() {
    let h = Harness::default();
    let owner = Uuid::new_v4();
    let mates = [Uuid::new_v4(), Uuid::new_v4()];
    let video = seed_video(&h.store, owner, 1_000, &mates, 0).await;
    h.engine.process_video(video).await.unwrap();

    let today = Utc::now().date_naive();
    let rollup = SummaryRollup::new(h.handles.summaries.clone());
    let summary = rollup.summarize(today, today).await.unwrap();

    assert_eq!(summary.platform_cents, 100);
    assert_eq!(summary.publisher_cents, 200);
    assert_eq!(summary.player_cents, 420);
    assert_eq!(summary.team_pool_cents, 280);
    assert_eq!(summary.total_cents, 1_000);
    assert_eq!(summary.videos_processed, 1);

    let yesterday = today - Duration::days(1);
    let empty = rollup.summarize(yesterday, yesterday).await.unwrap();
    assert_eq!(empty.total_cents, 0);
    assert_eq!(empty.videos_processed, 0);
}

#[tokio::test]
async fn test_persist_daily_summary_upserts() {
    let h = Harness::default();
    let video = seed_video(&h.store, Uuid::new_v4(), 1_000, &[], 0).await;
    h.engine.process_video(video).await.unwrap();

    let today = Utc::now().date_naive();
    let rollup = SummaryRollup::new(h.handles.summaries.clone());
    let first = rollup.persist_daily_summary(today).await.unwrap();
    let second = rollup.persist_daily_summary(today).await.unwrap();

    assert_eq!(h.store.daily_summary_count().await, 1);
    assert_eq!(first, second);

    let stored = rollup.daily_summaries(today, today).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].player_cents, 700);
}

#[tokio::test]
async fn test_persist_daily_summary_restamps_when_totals_move() {
    let h = Harness::default();
    let owner = Uuid::new_v4();
    let first_video = seed_video(&h.store, owner, 1_000, &[], 0).await;
    h.engine.process_video(first_video).await.unwrap();

    let today = Utc::now().date_naive();
    let rollup = SummaryRollup::new(h.handles.summaries.clone());
    let before = rollup.persist_daily_summary(today).await.unwrap();

    let second_video = seed_video(&h.store, owner, 500, &[], 0).await;
    h.engine.process_video(second_video).await.unwrap();
    let after = rollup.persist_daily_summary(today).await.unwrap();

    assert_eq!(after.videos_processed, 2);
    assert_eq!(after.player_cents, 1_050);
    assert!(after.updated_at >= before.updated_at);
    assert_eq!(rollup.daily_summaries(today, today).await.unwrap(), vec![after]);
}

#[tokio::test]
async fn test_zero_view_video_counts_as_processed() {
    let h = Harness::default();
    let video = seed_video(&h.store, Uuid::new_v4(), 0, &[], 0).await;
    h.engine.process_video(video).await.unwrap();

    let entries = h.handles.earnings.video_distributions(video).await.unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.amount_cents == 0));

    let today = Utc::now().date_naive();
    let summary = SummaryRollup::new(h.handles.summaries.clone())
        .summarize(today, today)
        .await
        .unwrap();
    assert_eq!(summary.videos_processed, 1);
    assert_eq!(summary.total_cents, 0);
}
