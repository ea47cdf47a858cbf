use std::fmt;

use serde::{Deserialize, Serialize};

use crate::upload::UploadReceipt;

/// A test row exactly as the backend lists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTest {
    pub test_num: i64,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub uploaded_by: Option<String>,
}

/// Body of the tests listing endpoint: `{tests: [...]}` or `{error}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestListResponse {
    #[serde(default)]
    pub tests: Option<Vec<RawTest>>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestProgress {
    Processing,
    Analyzing,
    Successful,
    Failed,
    Unknown(String),
}

impl TestProgress {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "processing" => TestProgress::Processing,
            "analyzing" => TestProgress::Analyzing,
            "successful" => TestProgress::Successful,
            "failed" => TestProgress::Failed,
            other => TestProgress::Unknown(other.to_string()),
        }
    }

    /// Sort rank used by the tests table; unknown statuses sort first.
    pub fn rank(&self) -> u8 {
        match self {
            TestProgress::Unknown(_) => 0,
            TestProgress::Processing => 1,
            TestProgress::Analyzing => 2,
            TestProgress::Successful => 3,
            TestProgress::Failed => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TestProgress::Processing => "Processing...",
            TestProgress::Analyzing => "Analyzing",
            TestProgress::Successful => "Completed",
            TestProgress::Failed => "Failed",
            TestProgress::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for TestProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestProgress::Processing => f.write_str("processing"),
            TestProgress::Analyzing => f.write_str("analyzing"),
            TestProgress::Successful => f.write_str("successful"),
            TestProgress::Failed => f.write_str("failed"),
            TestProgress::Unknown(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRecord {
    pub test_number: i64,
    pub title: String,
    pub subject: String,
    pub uploaded_by: String,
    pub created_at: String,
    pub progress: TestProgress,
}

/// Why the registry is being refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshReason {
    Initial,
    Scheduled,
    Manual,
    /// A submission was just accepted by the backend.
    SubmissionCompleted(UploadReceipt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    TestNumber,
    CreatedAt,
    Progress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Column and direction of the tests table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            field: SortField::TestNumber,
            direction: SortDirection::Descending,
        }
    }
}

impl SortOrder {
    /// Clicking the active column flips it; a new column starts ascending.
    pub fn toggle(&mut self, field: SortField) {
        if self.field == field {
            self.direction = self.direction.flipped();
        } else {
            self.field = field;
            self.direction = SortDirection::Ascending;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_lower_cased() {
        assert_eq!(TestProgress::parse("Successful"), TestProgress::Successful);
        assert_eq!(TestProgress::parse("PROCESSING"), TestProgress::Processing);
        assert_eq!(
            TestProgress::parse("Queued"),
            TestProgress::Unknown("queued".to_string())
        );
        assert_eq!(TestProgress::parse("Queued").to_string(), "queued");
    }

    #[test]
    fn listing_body_accepts_error_only() {
        let body: TestListResponse = serde_json::from_str(r#"{"error":"no token"}"#).unwrap();
        assert_eq!(body.error.as_deref(), Some("no token"));
        assert!(body.tests.is_none());
    }

    #[test]
    fn raw_test_tolerates_missing_fields() {
        let raw: RawTest = serde_json::from_str(r#"{"test_num":7}"#).unwrap();
        assert_eq!(raw.test_num, 7);
        assert!(raw.title.is_none());
        assert!(raw.date.is_empty());
    }

    #[test]
    fn sort_toggle_flips_then_resets() {
        let mut order = SortOrder::default();
        order.toggle(SortField::TestNumber);
        assert_eq!(order.direction, SortDirection::Ascending);
        order.toggle(SortField::Progress);
        assert_eq!(
            order,
            SortOrder {
                field: SortField::Progress,
                direction: SortDirection::Ascending
            }
        );
    }
}
