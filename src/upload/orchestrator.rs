use tracing::{info, warn};

use crate::api::Backend;
use crate::error::{ApiError, OrchestratorError};
use crate::upload::store::UploadStore;
use crate::upload::types::{SlotKey, SlotStatuses, SubmissionBatch, UploadReceipt, UploadStatus};

#[derive(Debug)]
pub enum SubmitOutcome {
    Uploaded(UploadReceipt),
    Failed(String),
    /// The attempt was refused before any network call.
    NotStarted(OrchestratorError),
}

impl SubmitOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, SubmitOutcome::Uploaded(_))
    }
}

/// Runs one batch submission at a time and tracks per-slot status.
///
/// [`submit`](Self::submit) runs [`begin`](Self::begin), the network call and
/// [`finish`](Self::finish) in order. The desk moves the orchestrator onto the
/// runtime for the call and takes it back with the outcome.
#[derive(Debug, Default)]
pub struct UploadOrchestrator {
    statuses: SlotStatuses,
    in_flight: bool,
    last_error: Option<String>,
}

impl UploadOrchestrator {
    pub fn statuses(&self) -> &SlotStatuses {
        &self.statuses
    }

    pub fn status(&self, key: SlotKey) -> UploadStatus {
        self.statuses.get(&key).copied().unwrap_or_default()
    }

    pub fn is_uploading(&self) -> bool {
        self.in_flight
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Forgets statuses of a previous cycle. Ignored while a submission is in flight.
    pub fn reset(&mut self) {
        if !self.in_flight {
            self.statuses.clear();
            self.last_error = None;
        }
    }

    /// Marks every filled slot `Uploading` and snapshots the files to send.
    pub fn begin(&mut self, store: &UploadStore) -> Result<SubmissionBatch, OrchestratorError> {
        if self.in_flight {
            warn!("submit ignored: an upload is already in flight");
            return Err(OrchestratorError::AlreadyInFlight);
        }

        let batch = store.snapshot();
        if batch.files.is_empty() {
            return Err(OrchestratorError::NothingToSubmit);
        }

        self.statuses = batch.keys().map(|key| (key, UploadStatus::Uploading)).collect();
        self.in_flight = true;
        self.last_error = None;
        info!(slots = batch.files.len(), files = batch.file_count(), "upload started");
        Ok(batch)
    }

    /// Applies the result of the network call. On success the store is cleared,
    /// on failure it is left as it was so the user can retry.
    pub fn finish(
        &mut self,
        store: &mut UploadStore,
        batch: &SubmissionBatch,
        outcome: &Result<UploadReceipt, ApiError>,
    ) -> bool {
        self.in_flight = false;

        let (status, succeeded) = match outcome {
            Ok(receipt) => {
                info!(message = %receipt.message, stored = receipt.stored_files.len(), "upload finished");
                store.clear();
                (UploadStatus::Uploaded, true)
            }
            Err(e) => {
                warn!(error = %e, "upload failed");
                self.last_error = Some(e.to_string());
                (UploadStatus::Error, false)
            }
        };

        self.statuses = batch.keys().map(|key| (key, status)).collect();
        succeeded
    }

    /// Submits every filled slot with exactly one backend call.
    ///
    /// `on_status` sees the statuses after each phase change.
    pub async fn submit<B, F>(
        &mut self,
        store: &mut UploadStore,
        backend: &B,
        mut on_status: F,
    ) -> SubmitOutcome
    where
        B: Backend + ?Sized,
        F: FnMut(&SlotStatuses),
    {
        let batch = match self.begin(store) {
            Ok(batch) => batch,
            Err(e) => return SubmitOutcome::NotStarted(e),
        };
        on_status(&self.statuses);

        let outcome = backend.upload_test(&batch).await;
        self.finish(store, &batch, &outcome);
        on_status(&self.statuses);

        match outcome {
            Ok(receipt) => SubmitOutcome::Uploaded(receipt),
            Err(e) => SubmitOutcome::Failed(e.to_string()),
        }
    }
}
