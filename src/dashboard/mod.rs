mod filter;
mod metrics;

pub use filter::{DashboardFilter, DateRange, ExamType, Subject, ALL, MAX_SCORE};
pub use metrics::{Bucket, DashboardCards, MetricsSnapshot, NeetReadiness, RiskBreakdown, ScoreDistribution};
