use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use super::Backend;
use crate::error::ApiError;
use crate::registry::{RawTest, RefreshReason, TestListResponse};
use crate::upload::{SubmissionBatch, UploadReceipt};

/// Which calls the mock should fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockFailures {
    pub upload: bool,
    pub listing: bool,
    pub health: bool,
}

/// In-process stand-in for the backend, for demos and tests.
///
/// Uploads succeed after a fixed latency. When a listing is requested because a
/// submission completed, one synthetic successful test is prepended.
pub struct MockBackend {
    upload_latency: Duration,
    list_latency: Duration,
    tests: Mutex<Vec<RawTest>>,
    failures: Mutex<MockFailures>,
    upload_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new(upload_latency: Duration) -> Self {
        Self {
            upload_latency,
            list_latency: Duration::from_millis(400),
            tests: Mutex::new(vec![RawTest {
                test_num: 1,
                date: Utc::now().to_rfc3339(),
                status: Some("Successful".to_string()),
                title: Some("Sample Test 1".to_string()),
                subject: Some("Math".to_string()),
                uploaded_by: Some("Demo User".to_string()),
            }]),
            failures: Mutex::new(MockFailures::default()),
            upload_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }
}

#[cfg(test)]
impl MockBackend {
    pub fn with_list_latency(mut self, latency: Duration) -> Self {
        self.list_latency = latency;
        self
    }

    pub async fn set_failures(&self, failures: MockFailures) {
        *self.failures.lock().await = failures;
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(Duration::from_millis(1200))
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn upload_test(&self, batch: &SubmissionBatch) -> Result<UploadReceipt, ApiError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.upload_latency).await;

        if self.failures.lock().await.upload {
            return Err(ApiError::Status {
                status: 500,
                message: "Upload failed".to_string(),
            });
        }

        let stored_files = batch
            .files
            .values()
            .flatten()
            .map(|file| file.name.clone())
            .collect();
        debug!(files = batch.file_count(), "mock upload accepted");
        Ok(UploadReceipt {
            message: "Files uploaded successfully! (mocked)".to_string(),
            stored_files,
        })
    }

    async fn list_tests(&self, reason: &RefreshReason) -> Result<TestListResponse, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.list_latency).await;

        if self.failures.lock().await.listing {
            return Ok(TestListResponse {
                tests: None,
                error: Some("mock listing failure".to_string()),
            });
        }

        let mut tests = self.tests.lock().await;
        if let RefreshReason::SubmissionCompleted(_) = reason {
            let test_num = tests.iter().map(|t| t.test_num).max().unwrap_or(0) + 1;
            tests.insert(
                0,
                RawTest {
                    test_num,
                    date: Utc::now().to_rfc3339(),
                    status: Some("Successful".to_string()),
                    title: Some(format!("Uploaded Test {}", test_num)),
                    subject: Some("Science".to_string()),
                    uploaded_by: Some("Desk Demo".to_string()),
                },
            );
        }

        Ok(TestListResponse {
            tests: Some(tests.clone()),
            error: None,
        })
    }

    async fn health(&self) -> Result<(), ApiError> {
        if self.failures.lock().await.health {
            return Err(ApiError::UnexpectedBody("DOWN".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn scheduled_listing_does_not_add_rows() {
        let backend = MockBackend::default();
        let first = backend.list_tests(&RefreshReason::Scheduled).await.unwrap();
        let second = backend.list_tests(&RefreshReason::Scheduled).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.list_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn completed_submission_adds_one_successful_row() {
        let backend = MockBackend::default();
        let reason = RefreshReason::SubmissionCompleted(UploadReceipt::default());
        let tests = backend.list_tests(&reason).await.unwrap().tests.unwrap();

        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].test_num, 2);
        assert_eq!(tests[0].status.as_deref(), Some("Successful"));
    }

    #[tokio::test(start_paused = true)]
    async fn upload_waits_for_latency() {
        let backend = MockBackend::new(Duration::from_millis(1200));
        let start = tokio::time::Instant::now();
        backend
            .upload_test(&SubmissionBatch {
                files: Default::default(),
            })
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(1200));
        assert_eq!(backend.upload_calls(), 1);
    }

    #[tokio::test]
    async fn configured_failures_are_reported() {
        let backend = MockBackend::new(Duration::ZERO).with_list_latency(Duration::ZERO);
        backend
            .set_failures(MockFailures {
                upload: true,
                listing: true,
                health: true,
            })
            .await;

        let batch = SubmissionBatch {
            files: Default::default(),
        };
        assert!(backend.upload_test(&batch).await.is_err());
        assert!(backend.health().await.is_err());
        let listing = backend.list_tests(&RefreshReason::Manual).await.unwrap();
        assert!(listing.error.is_some());
    }
}
