pub mod checkin;
pub mod reconcile;
pub mod stats;

pub use checkin::{CheckInError, CheckInService};
pub use reconcile::{ReconcileReport, ReconciliationJob};
pub use stats::{EventStatistics, StatisticsAggregator, StatsError};
