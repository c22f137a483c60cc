//! Revenue policy and split arithmetic
//!
//! Pure integer math, no I/O. Fractions are basis points (1/10_000) and the
//! per-view rate is in micro-units (1/1_000_000 of the currency), so a rate of
//! `10_000` micros is one cent per view.
//!
//! Conservation: `platform + publisher + player == gross` and
//! `owner + sum(team) == player` hold exactly for every input. Shares are
//! floored; what flooring leaves behind lands on the player share first and
//! then on the owner's entry.

use crate::error::{RevenueError, RevenueResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const BPS_DENOMINATOR: i64 = 10_000;
const MICROS_PER_CENT: i64 = 10_000;

/// Configured monetary policy for turning views into revenue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenuePolicy {
    pub per_view_rate_micros: i64,
    pub min_watch_seconds: i32,
    pub platform_bps: i64,
    pub publisher_bps: i64,
    /// Owner's reserved fraction of the player share when teammates are tagged
    pub owner_floor_bps: i64,
    /// Recipient recorded on `publisher` entries, if the publisher has an account
    pub publisher_account_id: Option<Uuid>,
}

impl Default for RevenuePolicy {
    fn default() -> Self {
        Self {
            per_view_rate_micros: 10_000,
            min_watch_seconds: 0,
            platform_bps: 1_000,
            publisher_bps: 2_000,
            owner_floor_bps: 6_000,
            publisher_account_id: None,
        }
    }
}

/// Result of splitting one video's gross revenue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevenueSplit {
    pub gross_cents: i64,
    pub platform_cents: i64,
    pub publisher_cents: i64,
    pub player_cents: i64,
    /// Owner's `own_video` amount, including any division remainder
    pub owner_cents: i64,
    /// One amount per tagged teammate, in the order they were supplied
    pub team_cents: Vec<i64>,
}

impl RevenuePolicy {
    pub fn validate(&self) -> RevenueResult<()> {
        if self.per_view_rate_micros < 0 {
            return Err(RevenueError::InvalidPolicy(
                "per-view rate must not be negative".to_string(),
            ));
        }
        if self.min_watch_seconds < 0 {
            return Err(RevenueError::InvalidPolicy(
                "minimum watch seconds must not be negative".to_string(),
            ));
        }
        for (name, bps) in [
            ("platform", self.platform_bps),
            ("publisher", self.publisher_bps),
            ("owner floor", self.owner_floor_bps),
        ] {
            if !(0..=BPS_DENOMINATOR).contains(&bps) {
                return Err(RevenueError::InvalidPolicy(format!(
                    "{} share must be between 0 and {} bps, got {}",
                    name, BPS_DENOMINATOR, bps
                )));
            }
        }
        if self.platform_bps + self.publisher_bps > BPS_DENOMINATOR {
            return Err(RevenueError::InvalidPolicy(format!(
                "platform ({}) and publisher ({}) shares exceed 100%",
                self.platform_bps, self.publisher_bps
            )));
        }
        Ok(())
    }

    /// Gross revenue in cents for a number of eligible views (floored)
    pub fn gross_cents(&self, eligible_views: i64) -> RevenueResult<i64> {
        if eligible_views < 0 {
            return Err(RevenueError::InvalidInput(format!(
                "negative view count {}",
                eligible_views
            )));
        }
        let gross =
            eligible_views as i128 * self.per_view_rate_micros as i128 / MICROS_PER_CENT as i128;
        i64::try_from(gross).map_err(|_| {
            RevenueError::Internal(format!("gross revenue overflow for {} views", eligible_views))
        })
    }

    /// Split `gross_cents` across platform, publisher, owner and `teammates` recipients
    pub fn split(&self, gross_cents: i64, teammates: usize) -> RevenueResult<RevenueSplit> {
        if gross_cents < 0 {
            return Err(RevenueError::InvalidInput(format!(
                "negative gross revenue {}",
                gross_cents
            )));
        }

        let platform_cents = share_of(gross_cents, self.platform_bps);
        let publisher_cents = share_of(gross_cents, self.publisher_bps);
        let player_cents = gross_cents - platform_cents - publisher_cents;

        let (owner_cents, team_cents) = if teammates == 0 {
            (player_cents, Vec::new())
        } else {
            let owner_floor = share_of(player_cents, self.owner_floor_bps);
            let pool = player_cents - owner_floor;
            let count = teammates as i64;
            let each = pool / count;
            let remainder = pool % count;
            (owner_floor + remainder, vec![each; teammates])
        };

        Ok(RevenueSplit {
            gross_cents,
            platform_cents,
            publisher_cents,
            player_cents,
            owner_cents,
            team_cents,
        })
    }
}

fn share_of(amount: i64, bps: i64) -> i64 {
    (amount as i128 * bps as i128 / BPS_DENOMINATOR as i128) as i64
}
