/// Data structures for the revenue ledger and its collaborators
///
/// All monetary amounts are integer cents. Nothing in this crate stores or
/// computes money as floating point.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Which party a distribution entry credits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionType {
    OwnVideo,
    TeamPool,
    Publisher,
    Platform,
}

impl DistributionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionType::OwnVideo => "own_video",
            DistributionType::TeamPool => "team_pool",
            DistributionType::Publisher => "publisher",
            DistributionType::Platform => "platform",
        }
    }

    /// Types that count toward a player's earnings rollup
    pub fn is_player_earning(&self) -> bool {
        matches!(self, DistributionType::OwnVideo | DistributionType::TeamPool)
    }
}

impl fmt::Display for DistributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistributionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "own_video" => Ok(DistributionType::OwnVideo),
            "team_pool" => Ok(DistributionType::TeamPool),
            "publisher" => Ok(DistributionType::Publisher),
            "platform" => Ok(DistributionType::Platform),
            other => Err(format!("unknown distribution type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Unlisted,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Unlisted => "unlisted",
            Visibility::Private => "private",
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "unlisted" => Ok(Visibility::Unlisted),
            "private" => Ok(Visibility::Private),
            other => Err(format!("unknown visibility '{}'", other)),
        }
    }
}

/// A video as seen by the revenue engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoRecord {
    pub id: Uuid,
    pub owner_player_id: Uuid,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

/// Aggregated view activity for one video
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VideoActivity {
    pub view_count: i64,
    /// Views that met the minimum watched-seconds threshold
    pub eligible_view_count: i64,
    pub total_seconds_watched: i64,
}

/// An entry produced by the calculator, not yet written to the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDistribution {
    pub video_id: Uuid,
    pub source_player_id: Uuid,
    pub recipient_player_id: Option<Uuid>,
    pub distribution_type: DistributionType,
    pub amount_cents: i64,
}

/// One committed ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionEntry {
    pub id: Uuid,
    pub calculation_id: Uuid,
    pub video_id: Uuid,
    pub source_player_id: Uuid,
    pub recipient_player_id: Option<Uuid>,
    pub distribution_type: DistributionType,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// Per-player earnings rollup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerEarnings {
    pub player_id: Uuid,
    pub total_earnings_cents: i64,
    pub own_video_cents: i64,
    pub team_pool_cents: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PlayerEarnings {
    /// Zeroed row for a player with no ledger entries
    pub fn zero(player_id: Uuid) -> Self {
        Self {
            player_id,
            total_earnings_cents: 0,
            own_video_cents: 0,
            team_pool_cents: 0,
            updated_at: None,
        }
    }

    pub fn from_parts(player_id: Uuid, own_video_cents: i64, team_pool_cents: i64) -> Self {
        Self {
            player_id,
            total_earnings_cents: own_video_cents + team_pool_cents,
            own_video_cents,
            team_pool_cents,
            updated_at: Some(Utc::now()),
        }
    }
}

/// Totals over a date window, grouped by distribution type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevenueSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub platform_cents: i64,
    pub publisher_cents: i64,
    pub player_cents: i64,
    pub team_pool_cents: i64,
    pub total_cents: i64,
    pub videos_processed: i64,
}

/// Persisted per-day snapshot
///
/// Re-persisting a day with unchanged totals keeps the stored `updated_at`,
/// so repeated snapshots of a settled day are identical rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminRevenueSummary {
    pub summary_date: NaiveDate,
    pub platform_cents: i64,
    pub publisher_cents: i64,
    pub player_cents: i64,
    pub team_pool_cents: i64,
    pub videos_processed: i64,
    pub updated_at: DateTime<Utc>,
}

impl AdminRevenueSummary {
    pub fn from_summary(date: NaiveDate, summary: &RevenueSummary) -> Self {
        Self {
            summary_date: date,
            platform_cents: summary.platform_cents,
            publisher_cents: summary.publisher_cents,
            player_cents: summary.player_cents,
            team_pool_cents: summary.team_pool_cents,
            videos_processed: summary.videos_processed,
            updated_at: Utc::now(),
        }
    }

    /// Totals and video count match, ignoring `updated_at`
    pub fn same_totals(&self, other: &AdminRevenueSummary) -> bool {
        self.summary_date == other.summary_date
            && self.platform_cents == other.platform_cents
            && self.publisher_cents == other.publisher_cents
            && self.player_cents == other.player_cents
            && self.team_pool_cents == other.team_pool_cents
            && self.videos_processed == other.videos_processed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Player,
    Viewer,
}

impl Role {
    /// Unknown role names fall back to the least privileged role
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "player" => Role::Player,
            _ => Role::Viewer,
        }
    }
}

/// Caller profile resolved from an authenticated user id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub player_id: Option<Uuid>,
    pub role: Role,
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Render cents as a decimal currency string, e.g. `1234 -> "12.34"`
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
