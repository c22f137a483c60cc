//! PostgreSQL implementation of the revenue store
//!
//! Ledger writes for one video run inside a single transaction that first
//! takes `pg_advisory_xact_lock` on the video id, so concurrent
//! recalculations of the same video serialize across service instances too.
//! Before refreshing earnings it also locks every touched player, in player id
//! order, so passes for different videos that share a player refresh one after
//! the other and each refresh reads the other's committed entries.
//! Dropping the transaction on any error rolls every step back.

use super::{
    day_window, validate_entries, ActivityReader, DistributionLedger, EarningsReader,
    ProfileDirectory, SummaryStore, TagDirectory, VideoDirectory,
};
use crate::error::{RevenueError, RevenueResult};
use crate::models::{
    AdminRevenueSummary, DistributionEntry, DistributionType, NewDistribution, PlayerEarnings,
    Profile, Role, RevenueSummary, VideoActivity, VideoRecord, Visibility,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::collections::BTreeSet;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgRevenueStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct DistributionRow {
    id: Uuid,
    calculation_id: Uuid,
    video_id: Uuid,
    source_player_id: Uuid,
    recipient_player_id: Option<Uuid>,
    distribution_type: String,
    amount_cents: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<DistributionRow> for DistributionEntry {
    type Error = RevenueError;

    fn try_from(row: DistributionRow) -> Result<Self, Self::Error> {
        Ok(DistributionEntry {
            id: row.id,
            calculation_id: row.calculation_id,
            video_id: row.video_id,
            source_player_id: row.source_player_id,
            recipient_player_id: row.recipient_player_id,
            distribution_type: row
                .distribution_type
                .parse()
                .map_err(RevenueError::Internal)?,
            amount_cents: row.amount_cents,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EarningsRow {
    player_id: Uuid,
    total_earnings_cents: i64,
    own_video_cents: i64,
    team_pool_cents: i64,
    updated_at: DateTime<Utc>,
}

impl From<EarningsRow> for PlayerEarnings {
    fn from(row: EarningsRow) -> Self {
        PlayerEarnings {
            player_id: row.player_id,
            total_earnings_cents: row.total_earnings_cents,
            own_video_cents: row.own_video_cents,
            team_pool_cents: row.team_pool_cents,
            updated_at: Some(row.updated_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    summary_date: NaiveDate,
    platform_cents: i64,
    publisher_cents: i64,
    player_cents: i64,
    team_pool_cents: i64,
    videos_processed: i64,
    updated_at: DateTime<Utc>,
}

impl From<SummaryRow> for AdminRevenueSummary {
    fn from(row: SummaryRow) -> Self {
        AdminRevenueSummary {
            summary_date: row.summary_date,
            platform_cents: row.platform_cents,
            publisher_cents: row.publisher_cents,
            player_cents: row.player_cents,
            team_pool_cents: row.team_pool_cents,
            videos_processed: row.videos_processed,
            updated_at: row.updated_at,
        }
    }
}

const DISTRIBUTION_COLUMNS: &str = "id, calculation_id, video_id, source_player_id, \
     recipient_player_id, distribution_type, amount_cents, created_at";

/// Upserts earnings for the given players from their current ledger rows.
/// Players without rows are written as zero.
const REFRESH_EARNINGS_SQL: &str = r#"
    INSERT INTO player_earnings (player_id, total_earnings_cents, own_video_cents, team_pool_cents, updated_at)
    SELECT p.player_id,
           COALESCE(SUM(d.amount_cents), 0)::BIGINT,
           COALESCE(SUM(d.amount_cents) FILTER (WHERE d.distribution_type = 'own_video'), 0)::BIGINT,
           COALESCE(SUM(d.amount_cents) FILTER (WHERE d.distribution_type = 'team_pool'), 0)::BIGINT,
           NOW()
    FROM UNNEST($1::uuid[]) AS p(player_id)
    LEFT JOIN revenue_distributions d
           ON d.recipient_player_id = p.player_id
          AND d.distribution_type IN ('own_video', 'team_pool')
    GROUP BY p.player_id
    ON CONFLICT (player_id) DO UPDATE
       SET total_earnings_cents = EXCLUDED.total_earnings_cents,
           own_video_cents      = EXCLUDED.own_video_cents,
           team_pool_cents      = EXCLUDED.team_pool_cents,
           updated_at           = EXCLUDED.updated_at
"#;

impl PgRevenueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn lock_video(tx: &mut Transaction<'_, Postgres>, video_id: Uuid) -> RevenueResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("video:{}", video_id))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Takes one transaction-scoped lock per player.
    ///
    /// Callers pass players in ascending order so two passes never wait on
    /// each other in opposite directions.
    async fn lock_players(
        tx: &mut Transaction<'_, Postgres>,
        players: &BTreeSet<Uuid>,
    ) -> RevenueResult<()> {
        for player_id in players {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(format!("player:{}", player_id))
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl VideoDirectory for PgRevenueStore {
    async fn find_video(&self, video_id: Uuid) -> RevenueResult<Option<VideoRecord>> {
        let row = sqlx::query(
            "SELECT id, owner_player_id, visibility, created_at FROM videos WHERE id = $1",
        )
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> RevenueResult<VideoRecord> {
            let visibility: String = row.try_get("visibility")?;
            Ok(VideoRecord {
                id: row.try_get("id")?,
                owner_player_id: row.try_get("owner_player_id")?,
                visibility: visibility.parse().map_err(RevenueError::Internal)?,
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn public_videos_by_owner(&self, player_id: Uuid) -> RevenueResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM videos
            WHERE owner_player_id = $1 AND visibility = $2
            ORDER BY created_at, id
            "#,
        )
        .bind(player_id)
        .bind(Visibility::Public.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn public_videos(&self, limit: i64, offset: i64) -> RevenueResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM videos
            WHERE visibility = $1
            ORDER BY created_at, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(Visibility::Public.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

#[async_trait]
impl ActivityReader for PgRevenueStore {
    async fn video_activity(
        &self,
        video_id: Uuid,
        min_watch_seconds: i32,
    ) -> RevenueResult<VideoActivity> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*)::BIGINT AS view_count,
                   COUNT(*) FILTER (WHERE seconds_watched >= $2)::BIGINT AS eligible_view_count,
                   COALESCE(SUM(seconds_watched), 0)::BIGINT AS total_seconds_watched
            FROM video_views
            WHERE video_id = $1
            "#,
        )
        .bind(video_id)
        .bind(min_watch_seconds)
        .fetch_one(&self.pool)
        .await
        // Every activity read failure is retryable from the engine's view
        .map_err(|e| RevenueError::Transient(format!("activity read failed: {}", e)))?;

        Ok(VideoActivity {
            view_count: row.try_get("view_count")?,
            eligible_view_count: row.try_get("eligible_view_count")?,
            total_seconds_watched: row.try_get("total_seconds_watched")?,
        })
    }
}

#[async_trait]
impl TagDirectory for PgRevenueStore {
    async fn tagged_players(&self, video_id: Uuid) -> RevenueResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT player_id FROM video_tags WHERE video_id = $1 ORDER BY player_id",
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

#[async_trait]
impl ProfileDirectory for PgRevenueStore {
    async fn find_profile(&self, user_id: Uuid) -> RevenueResult<Option<Profile>> {
        let row = sqlx::query("SELECT user_id, player_id, role FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> RevenueResult<Profile> {
            let role: String = row.try_get("role")?;
            Ok(Profile {
                user_id: row.try_get("user_id")?,
                player_id: row.try_get("player_id")?,
                role: Role::parse(&role),
            })
        })
        .transpose()
    }
}

#[async_trait]
impl DistributionLedger for PgRevenueStore {
    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    async fn apply_distributions(
        &self,
        video_id: Uuid,
        entries: &[NewDistribution],
    ) -> RevenueResult<u64> {
        validate_entries(video_id, entries)?;

        let calculation_id = Uuid::new_v4();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        Self::lock_video(&mut tx, video_id).await?;

        let removed = sqlx::query(
            r#"
            DELETE FROM revenue_distributions
            WHERE video_id = $1
            RETURNING recipient_player_id, distribution_type
            "#,
        )
        .bind(video_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut touched: BTreeSet<Uuid> = BTreeSet::new();
        for row in &removed {
            let recipient: Option<Uuid> = row.try_get("recipient_player_id")?;
            let ty: String = row.try_get("distribution_type")?;
            if let (Some(player_id), Ok(ty)) = (recipient, ty.parse::<DistributionType>()) {
                if ty.is_player_earning() {
                    touched.insert(player_id);
                }
            }
        }

        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO revenue_distributions
                    (id, calculation_id, video_id, source_player_id, recipient_player_id,
                     distribution_type, amount_cents, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(calculation_id)
            .bind(entry.video_id)
            .bind(entry.source_player_id)
            .bind(entry.recipient_player_id)
            .bind(entry.distribution_type.as_str())
            .bind(entry.amount_cents)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if entry.distribution_type.is_player_earning() {
                if let Some(player_id) = entry.recipient_player_id {
                    touched.insert(player_id);
                }
            }
        }

        // The refresh below runs as a new statement, so once these locks are
        // held its snapshot includes entries committed by earlier holders
        Self::lock_players(&mut tx, &touched).await?;

        let players: Vec<Uuid> = touched.into_iter().collect();
        if !players.is_empty() {
            sqlx::query(REFRESH_EARNINGS_SQL)
                .bind(&players)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(
            video_id = %video_id,
            %calculation_id,
            removed = removed.len(),
            inserted = entries.len(),
            players = players.len(),
            "ledger pass committed"
        );

        Ok(entries.len() as u64)
    }

    async fn rebuild_player_earnings(&self) -> RevenueResult<u64> {
        let mut tx = self.pool.begin().await?;

        let players = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT player_id FROM player_earnings
            UNION
            SELECT DISTINCT recipient_player_id FROM revenue_distributions
            WHERE recipient_player_id IS NOT NULL
              AND distribution_type IN ('own_video', 'team_pool')
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let players: BTreeSet<Uuid> = players.into_iter().collect();
        Self::lock_players(&mut tx, &players).await?;
        let players: Vec<Uuid> = players.into_iter().collect();

        let written = if players.is_empty() {
            0
        } else {
            sqlx::query(REFRESH_EARNINGS_SQL)
                .bind(&players)
                .execute(&mut *tx)
                .await?
                .rows_affected()
        };

        tx.commit().await?;
        Ok(written)
    }

    async fn ping(&self) -> RevenueResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl EarningsReader for PgRevenueStore {
    async fn player_earnings(&self, player_id: Uuid) -> RevenueResult<Option<PlayerEarnings>> {
        let row = sqlx::query_as::<_, EarningsRow>(
            r#"
            SELECT player_id, total_earnings_cents, own_video_cents, team_pool_cents, updated_at
            FROM player_earnings
            WHERE player_id = $1
            "#,
        )
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(PlayerEarnings::from))
    }

    async fn recent_distributions(
        &self,
        recipient_player_id: Option<Uuid>,
        limit: i64,
    ) -> RevenueResult<Vec<DistributionEntry>> {
        let rows = sqlx::query_as::<_, DistributionRow>(&format!(
            r#"
            SELECT {}
            FROM revenue_distributions
            WHERE ($1::uuid IS NULL OR recipient_player_id = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
            DISTRIBUTION_COLUMNS
        ))
        .bind(recipient_player_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DistributionEntry::try_from).collect()
    }

    async fn top_earners(&self, limit: i64) -> RevenueResult<Vec<PlayerEarnings>> {
        let rows = sqlx::query_as::<_, EarningsRow>(
            r#"
            SELECT player_id, total_earnings_cents, own_video_cents, team_pool_cents, updated_at
            FROM player_earnings
            WHERE total_earnings_cents > 0
            ORDER BY total_earnings_cents DESC, player_id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PlayerEarnings::from).collect())
    }

    async fn platform_total_cents(&self) -> RevenueResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0)::BIGINT
            FROM revenue_distributions
            WHERE distribution_type = 'platform'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn video_distributions(&self, video_id: Uuid) -> RevenueResult<Vec<DistributionEntry>> {
        let rows = sqlx::query_as::<_, DistributionRow>(&format!(
            r#"
            SELECT {}
            FROM revenue_distributions
            WHERE video_id = $1
            ORDER BY distribution_type, recipient_player_id NULLS FIRST, id
            "#,
            DISTRIBUTION_COLUMNS
        ))
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DistributionEntry::try_from).collect()
    }
}

#[async_trait]
impl SummaryStore for PgRevenueStore {
    async fn summarize(&self, start: NaiveDate, end: NaiveDate) -> RevenueResult<RevenueSummary> {
        let (from, until) = day_window(start, end);
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE(SUM(amount_cents) FILTER (WHERE distribution_type = 'platform'), 0)::BIGINT  AS platform_cents,
                COALESCE(SUM(amount_cents) FILTER (WHERE distribution_type = 'publisher'), 0)::BIGINT AS publisher_cents,
                COALESCE(SUM(amount_cents) FILTER (WHERE distribution_type = 'own_video'), 0)::BIGINT AS player_cents,
                COALESCE(SUM(amount_cents) FILTER (WHERE distribution_type = 'team_pool'), 0)::BIGINT AS team_pool_cents,
                COUNT(DISTINCT video_id)::BIGINT AS videos_processed
            FROM revenue_distributions
            WHERE created_at >= $1 AND created_at < $2
            "#,
        )
        .bind(from)
        .bind(until)
        .fetch_one(&self.pool)
        .await?;

        let platform_cents: i64 = row.try_get("platform_cents")?;
        let publisher_cents: i64 = row.try_get("publisher_cents")?;
        let player_cents: i64 = row.try_get("player_cents")?;
        let team_pool_cents: i64 = row.try_get("team_pool_cents")?;

        Ok(RevenueSummary {
            start_date: start,
            end_date: end,
            platform_cents,
            publisher_cents,
            player_cents,
            team_pool_cents,
            total_cents: platform_cents + publisher_cents + player_cents + team_pool_cents,
            videos_processed: row.try_get("videos_processed")?,
        })
    }

    async fn upsert_daily_summary(
        &self,
        summary: &AdminRevenueSummary,
    ) -> RevenueResult<AdminRevenueSummary> {
        let row = sqlx::query_as::<_, SummaryRow>(
            r#"
            INSERT INTO admin_revenue_summaries
                (summary_date, platform_cents, publisher_cents, player_cents,
                 team_pool_cents, videos_processed, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (summary_date) DO UPDATE
               SET platform_cents   = EXCLUDED.platform_cents,
                   publisher_cents  = EXCLUDED.publisher_cents,
                   player_cents     = EXCLUDED.player_cents,
                   team_pool_cents  = EXCLUDED.team_pool_cents,
                   videos_processed = EXCLUDED.videos_processed,
                   updated_at       = CASE
                       WHEN (admin_revenue_summaries.platform_cents,
                             admin_revenue_summaries.publisher_cents,
                             admin_revenue_summaries.player_cents,
                             admin_revenue_summaries.team_pool_cents,
                             admin_revenue_summaries.videos_processed)
                            IS DISTINCT FROM
                            (EXCLUDED.platform_cents, EXCLUDED.publisher_cents,
                             EXCLUDED.player_cents, EXCLUDED.team_pool_cents,
                             EXCLUDED.videos_processed)
                       THEN EXCLUDED.updated_at
                       ELSE admin_revenue_summaries.updated_at
                   END
            RETURNING summary_date, platform_cents, publisher_cents, player_cents,
                      team_pool_cents, videos_processed, updated_at
            "#,
        )
        .bind(summary.summary_date)
        .bind(summary.platform_cents)
        .bind(summary.publisher_cents)
        .bind(summary.player_cents)
        .bind(summary.team_pool_cents)
        .bind(summary.videos_processed)
        .bind(summary.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn daily_summaries(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RevenueResult<Vec<AdminRevenueSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT summary_date, platform_cents, publisher_cents, player_cents,
                   team_pool_cents, videos_processed, updated_at
            FROM admin_revenue_summaries
            WHERE summary_date BETWEEN $1 AND $2
            ORDER BY summary_date
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(AdminRevenueSummary::from).collect())
    }
}
