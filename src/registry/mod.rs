//! The list of tests already submitted, kept fresh by a background poll.

mod poller;
mod types;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, warn};

use crate::error::{ApiError, RegistryError};

pub use poller::{RegistryPoller, RegistryUpdate};
pub use types::{
    RawTest, RefreshReason, SortDirection, SortField, SortOrder, TestListResponse, TestProgress,
    TestRecord,
};

/// Fills in display defaults for a raw backend row.
pub fn normalize(raw: RawTest) -> TestRecord {
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    TestRecord {
        test_number: raw.test_num,
        title: non_empty(raw.title).unwrap_or_else(|| format!("Test {}", raw.test_num)),
        subject: non_empty(raw.subject).unwrap_or_else(|| "Unknown".to_string()),
        uploaded_by: non_empty(raw.uploaded_by).unwrap_or_else(|| "Unknown".to_string()),
        created_at: raw.date,
        progress: TestProgress::parse(raw.status.as_deref().unwrap_or_default()),
    }
}

/// Holds the latest test list. Every poll replaces it wholesale.
#[derive(Debug, Default)]
pub struct TestRegistry {
    records: Vec<TestRecord>,
    last_error: Option<RegistryError>,
}

impl TestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }

    pub fn last_error(&self) -> Option<&RegistryError> {
        self.last_error.as_ref()
    }

    /// Takes the result of one fetch. Any failure empties the list rather than
    /// leaving stale rows on screen.
    pub fn apply(&mut self, fetched: Result<TestListResponse, ApiError>) -> Result<usize, RegistryError> {
        let outcome = match fetched {
            Ok(TestListResponse { error: Some(error), .. }) => Err(RegistryError::Backend(error)),
            Ok(TestListResponse { tests: None, .. }) => Err(RegistryError::MissingTests),
            Ok(TestListResponse { tests: Some(tests), .. }) => Ok(tests),
            Err(ApiError::Backend(error)) => Err(RegistryError::Backend(error)),
            Err(e) => Err(RegistryError::Fetch(e.to_string())),
        };

        match outcome {
            Ok(tests) => {
                self.records = tests.into_iter().map(normalize).collect();
                self.last_error = None;
                debug!(count = self.records.len(), "test list refreshed");
                Ok(self.records.len())
            }
            Err(e) => {
                warn!(error = %e, "test list refresh failed");
                self.records.clear();
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    pub fn sorted(&self, order: SortOrder) -> Vec<&TestRecord> {
        let mut rows: Vec<&TestRecord> = self.records.iter().collect();
        rows.sort_by(|a, b| {
            let ordering = match order.field {
                SortField::TestNumber => a.test_number.cmp(&b.test_number),
                SortField::CreatedAt => timestamp(&a.created_at).cmp(&timestamp(&b.created_at)),
                SortField::Progress => a.progress.rank().cmp(&b.progress.rank()),
            };
            match order.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
        rows
    }
}

/// Milliseconds since the epoch for the date formats the backend emits.
fn timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}
