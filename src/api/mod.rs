//! Clients for the grading backend.
//!
//! [`Backend`] covers the upload workflow (submission, test listing, health).
//! [`MetricsSource`] covers the read-only `/excelhandler/*` dashboard endpoints,
//! which only a live backend provides.

mod http;
mod mock;

use async_trait::async_trait;
use serde_json::Value;

use crate::dashboard::{DashboardCards, DashboardFilter, NeetReadiness, RiskBreakdown, ScoreDistribution};
use crate::error::ApiError;
use crate::registry::{RefreshReason, TestListResponse};
use crate::upload::{SubmissionBatch, UploadReceipt};

pub use http::HttpBackend;
pub use mock::MockBackend;

#[cfg(test)]
pub use mock::MockFailures;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Sends every file of the batch in one multipart request.
    async fn upload_test(&self, batch: &SubmissionBatch) -> Result<UploadReceipt, ApiError>;

    async fn list_tests(&self, reason: &RefreshReason) -> Result<TestListResponse, ApiError>;

    async fn health(&self) -> Result<(), ApiError>;
}

#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn dashboard_cards(&self, filter: &DashboardFilter) -> Result<DashboardCards, ApiError>;

    async fn neet_readiness(&self, filter: &DashboardFilter) -> Result<NeetReadiness, ApiError>;

    async fn risk_breakdown(&self, filter: &DashboardFilter) -> Result<RiskBreakdown, ApiError>;

    async fn score_distribution(&self, filter: &DashboardFilter) -> Result<ScoreDistribution, ApiError>;

    async fn overall_performance(&self, filter: &DashboardFilter) -> Result<Value, ApiError>;

    async fn trend_graph(&self, filter: &DashboardFilter) -> Result<Value, ApiError>;

    async fn dashboard_all_metrics(&self, filter: &DashboardFilter) -> Result<Value, ApiError>;
}
