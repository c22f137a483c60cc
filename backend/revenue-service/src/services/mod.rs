/// Business logic layer for revenue-service
///
/// - policy: split math over integer cents
/// - calculator: per-video entry sets
/// - engine: per-video serialized calculate-and-commit
/// - batch: mode selection and bounded fan-out
/// - reporting: earnings reads and admin rollups
pub mod batch;
pub mod calculator;
pub mod engine;
pub mod policy;
pub mod reporting;

pub use batch::{BatchConfig, BatchDriver, BatchMode, BatchReport};
pub use calculator::{CalculationOutcome, RevenueCalculator, VideoDistribution};
pub use engine::{ProcessOutcome, RevenueEngine, VideoLocks};
pub use policy::{RevenuePolicy, RevenueSplit};
pub use reporting::{EarningsAggregator, SummaryRollup};
