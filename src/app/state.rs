use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use derivative::Derivative;

use crate::dashboard::{DashboardFilter, MetricsSnapshot};
use crate::error::ApiError;
use crate::registry::{RegistryUpdate, SortOrder, TestRegistry};
use crate::upload::{
    SlotKey, SlotStatuses, StepWizard, SubmitOutcome, UploadOrchestrator, UploadStatus, UploadStore,
};

pub const NOTICE_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Page {
    #[default]
    Uploads,
    Metrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A transient message shown in the footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub created: Instant,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum MetricsView {
    #[default]
    NotLoaded,
    Loading,
    Loaded(MetricsSnapshot),
    Failed(String),
    Unavailable,
}

/// Progress reported by a submission running on the runtime.
pub enum UploadEvent {
    Status(SlotStatuses),
    /// The orchestrator and store come back with the outcome applied.
    Finished {
        outcome: SubmitOutcome,
        orchestrator: UploadOrchestrator,
        store: UploadStore,
    },
}

#[derive(Derivative, Default)]
#[derivative(Debug)]
pub struct DeskState {
    pub page: Page,
    pub store: UploadStore,
    pub orchestrator: UploadOrchestrator,
    /// Statuses of the submission in flight, while its orchestrator is on the runtime.
    pub live_statuses: SlotStatuses,
    pub wizard: StepWizard,
    /// Inline validation messages, per slot.
    pub slot_errors: BTreeMap<SlotKey, String>,
    pub registry: TestRegistry,
    pub initial_load_done: bool,
    pub sort: SortOrder,
    pub filter: DashboardFilter,
    pub date_inputs: (String, String),
    pub metrics: MetricsView,
    pub backend_healthy: Option<bool>,
    pub notices: Vec<Notice>,
    #[derivative(Debug = "ignore")]
    pub upload_receiver: Option<Receiver<UploadEvent>>,
    #[derivative(Debug = "ignore")]
    pub registry_receiver: Option<Receiver<RegistryUpdate>>,
    #[derivative(Debug = "ignore")]
    pub metrics_receiver: Option<Receiver<Result<MetricsSnapshot, ApiError>>>,
    #[derivative(Debug = "ignore")]
    pub export_receiver: Option<Receiver<Result<PathBuf, ApiError>>>,
    #[derivative(Debug = "ignore")]
    pub health_receiver: Option<Receiver<Result<(), ApiError>>>,
}

impl DeskState {
    pub fn push_notice(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.notices.push(Notice {
            level,
            text: text.into(),
            created: Instant::now(),
        });
    }

    pub fn prune_notices(&mut self, now: Instant) {
        self.notices
            .retain(|notice| now.saturating_duration_since(notice.created) < NOTICE_TTL);
    }

    pub fn is_uploading(&self) -> bool {
        self.upload_receiver.is_some() || self.wizard.is_submitting()
    }

    /// Submit is offered on the last step once its slot holds a file.
    pub fn submit_enabled(&self) -> bool {
        !self.is_uploading() && self.wizard.is_last_step() && self.wizard.can_proceed(&self.store)
    }

    pub fn slot_status(&self, key: SlotKey) -> UploadStatus {
        self.live_statuses
            .get(&key)
            .copied()
            .unwrap_or_else(|| self.orchestrator.status(key))
    }

    pub fn reset_date_inputs(&mut self) {
        self.date_inputs = (
            self.filter.date_range.from.format("%Y-%m-%d").to_string(),
            self.filter.date_range.to.format("%Y-%m-%d").to_string(),
        );
    }

    /// One line summarising the last submission cycle.
    pub fn get_status_text(&self) -> String {
        let statuses = if self.live_statuses.is_empty() {
            self.orchestrator.statuses()
        } else {
            &self.live_statuses
        };
        if statuses.is_empty() {
            return String::new();
        }
        let count = |wanted: UploadStatus| statuses.values().filter(|s| **s == wanted).count();
        format!(
            "Slots: {} | ⏳ Uploading: {} | ✅ Uploaded: {} | ❌ Failed: {}",
            statuses.len(),
            count(UploadStatus::Uploading),
            count(UploadStatus::Uploaded),
            count(UploadStatus::Error)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_expire_after_ttl() {
        let mut state = DeskState::default();
        state.push_notice(NoticeLevel::Warning, "Cannot close while uploading.");
        let created = state.notices[0].created;

        state.prune_notices(created + Duration::from_secs(1));
        assert_eq!(state.notices.len(), 1);
        state.prune_notices(created + NOTICE_TTL);
        assert!(state.notices.is_empty());
    }

    #[test]
    fn status_text_is_empty_before_first_submission() {
        assert_eq!(DeskState::default().get_status_text(), "");
    }

    #[test]
    fn live_statuses_win_while_uploading() {
        let mut state = DeskState::default();
        assert_eq!(state.slot_status(SlotKey::AnswerKey), UploadStatus::Idle);

        state.live_statuses.insert(SlotKey::AnswerKey, UploadStatus::Uploading);
        assert_eq!(state.slot_status(SlotKey::AnswerKey), UploadStatus::Uploading);
        assert!(state.get_status_text().contains("Uploading: 1"));
    }

    #[test]
    fn date_inputs_follow_filter() {
        let mut state = DeskState::default();
        state.filter = DashboardFilter::for_day(chrono::NaiveDate::from_ymd_opt(2026, 5, 31).unwrap());
        state.reset_date_inputs();
        assert_eq!(state.date_inputs, ("2026-05-02".to_string(), "2026-05-31".to_string()));
    }
}
