mod state;
mod ui;

use std::path::PathBuf;
use std::sync::mpsc::{self as std_mpsc, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use eframe::{egui, App};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::api::{Backend, MetricsSource};
use crate::dashboard::{DateRange, MetricsSnapshot};
use crate::error::{ApiError, WizardError};
use crate::registry::{RefreshReason, RegistryPoller, RegistryUpdate, SortField, TestRegistry};
use crate::upload::{SelectedFile, SlotKey, SubmitOutcome, UploadOrchestrator, UploadStore, WizardEvent};
pub use state::{DeskState, MetricsView, NoticeLevel, Page, UploadEvent};

const REPAINT_INTERVAL: Duration = Duration::from_millis(250);

pub struct ExamDesk {
    runtime: Runtime,
    backend: Arc<dyn Backend>,
    metrics_source: Option<Arc<dyn MetricsSource>>,
    poll_interval: Duration,
    poller: Option<RegistryPoller>,
    state: DeskState,
}

impl ExamDesk {
    pub fn new(
        runtime: Runtime,
        backend: Arc<dyn Backend>,
        metrics_source: Option<Arc<dyn MetricsSource>>,
        poll_interval: Duration,
    ) -> Self {
        info!(live_metrics = metrics_source.is_some(), "initializing exam desk");
        let mut desk = Self {
            runtime,
            backend,
            metrics_source,
            poll_interval,
            poller: None,
            state: DeskState::default(),
        };
        desk.state.reset_date_inputs();
        desk.check_health();
        desk.start_polling();
        desk
    }

    fn check_health(&mut self) {
        let (sender, receiver) = std_mpsc::channel();
        self.state.health_receiver = Some(receiver);
        let backend = self.backend.clone();
        self.runtime.spawn(async move {
            let _ = sender.send(backend.health().await);
        });
    }

    fn start_polling(&mut self) {
        if self.poller.is_some() {
            return;
        }
        let (sender, receiver) = std_mpsc::channel();
        self.state.registry_receiver = Some(receiver);
        self.poller = Some(RegistryPoller::start(
            self.runtime.handle(),
            self.backend.clone(),
            self.poll_interval,
            sender,
        ));
    }

    /// Cancels the poll and forgets the fetched list.
    fn stop_polling(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
        self.state.registry_receiver = None;
        self.state.registry = TestRegistry::new();
        self.state.initial_load_done = false;
    }

    pub fn show_page(&mut self, page: Page) {
        if page == self.state.page {
            return;
        }
        if self.state.is_uploading() {
            self.state
                .push_notice(NoticeLevel::Warning, "Wait for the upload to finish first.");
            return;
        }
        debug!(?page, "switching page");
        self.state.page = page;
        match page {
            Page::Uploads => self.start_polling(),
            Page::Metrics => {
                self.stop_polling();
                if self.state.metrics == MetricsView::NotLoaded {
                    self.load_metrics();
                }
            }
        }
    }

    pub fn refresh_tests(&mut self, reason: RefreshReason) {
        match &self.poller {
            Some(poller) if poller.is_running() && poller.refresh_now(reason.clone()) => {}
            _ => debug!(?reason, "no active poll; refresh dropped"),
        }
    }

    pub fn toggle_sort(&mut self, field: SortField) {
        self.state.sort.toggle(field);
    }

    fn warn_rejected(&mut self, error: WizardError) {
        self.state.push_notice(NoticeLevel::Warning, error.to_string());
    }

    fn navigate(&mut self, event: WizardEvent) -> bool {
        match self.state.wizard.dispatch(event, &self.state.store) {
            Ok(_) => true,
            Err(e) => {
                self.warn_rejected(e);
                false
            }
        }
    }

    pub fn open_wizard(&mut self) {
        if self.state.wizard.is_open() {
            return;
        }
        self.state.orchestrator.reset();
        self.state.slot_errors.clear();
        self.navigate(WizardEvent::Open);
    }

    pub fn next_step(&mut self) {
        self.navigate(WizardEvent::Next);
    }

    pub fn previous_step(&mut self) {
        self.navigate(WizardEvent::Back);
    }

    pub fn go_to_step(&mut self, step: usize) {
        self.navigate(WizardEvent::GoTo(step));
    }

    pub fn close_wizard(&mut self) {
        if self.navigate(WizardEvent::Close) {
            self.state.slot_errors.clear();
        }
    }

    /// Validates `file` for the slot on screen and keeps it if it passes.
    pub fn add_file(&mut self, file: SelectedFile) -> bool {
        if self.state.is_uploading() {
            self.state
                .push_notice(NoticeLevel::Warning, "Files cannot change while uploading.");
            return false;
        }
        let Some(slot) = self.state.wizard.current_slot().cloned() else {
            return false;
        };

        match self.state.store.add(&slot, file) {
            Ok(()) => {
                self.state.slot_errors.remove(&slot.key);
                true
            }
            Err(e) => {
                self.state.slot_errors.insert(slot.key, e.to_string());
                self.state.push_notice(NoticeLevel::Warning, e.to_string());
                false
            }
        }
    }

    pub fn add_path(&mut self, path: PathBuf) -> bool {
        match std::fs::metadata(&path) {
            Ok(meta) => self.add_file(SelectedFile::from_path(path, meta.len())),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read picked file");
                self.state
                    .push_notice(NoticeLevel::Error, format!("Could not read {}: {}", path.display(), e));
                false
            }
        }
    }

    pub fn add_dropped_files(&mut self, files: Vec<egui::DroppedFile>) {
        for file in files {
            if let Some(path) = file.path {
                self.add_path(path);
            } else if let Some(bytes) = file.bytes {
                self.add_file(SelectedFile::from_bytes(file.name, bytes));
            } else {
                debug!(name = %file.name, "dropped file carried neither path nor content");
            }
        }
    }

    pub fn remove_file(&mut self, key: SlotKey, index: usize) {
        if self.state.is_uploading() {
            return;
        }
        if let Some(file) = self.state.store.remove(key, index) {
            debug!(slot = %key, file = %file.name, "file removed");
        }
    }

    /// Empties the slot on screen.
    pub fn clear_slot(&mut self) {
        if self.state.is_uploading() {
            return;
        }
        let Some(slot) = self.state.wizard.current_slot().cloned() else {
            return;
        };
        if self.state.store.set(&slot, Vec::new()).is_ok() {
            self.state.slot_errors.remove(&slot.key);
            debug!(slot = %slot.key, "slot cleared");
        }
    }

    /// Starts the submission of every filled slot. The orchestrator runs on the
    /// runtime with a copy of the store; both come back through
    /// [`update_state`](Self::update_state).
    pub fn submit(&mut self) {
        if !self.navigate(WizardEvent::Submit) {
            return;
        }

        let (sender, receiver) = std_mpsc::channel();
        self.state.upload_receiver = Some(receiver);
        self.state.live_statuses.clear();

        let mut orchestrator = std::mem::take(&mut self.state.orchestrator);
        let mut store = self.state.store.clone();
        let backend = self.backend.clone();
        self.runtime.spawn(async move {
            let status_sender = sender.clone();
            let outcome = orchestrator
                .submit(&mut store, &*backend, move |statuses| {
                    let _ = status_sender.send(UploadEvent::Status(statuses.clone()));
                })
                .await;
            let _ = sender.send(UploadEvent::Finished {
                outcome,
                orchestrator,
                store,
            });
        });
    }

    fn finish_upload(&mut self, outcome: SubmitOutcome, orchestrator: UploadOrchestrator, store: UploadStore) {
        self.state.orchestrator = orchestrator;
        self.state.store = store;
        self.state.live_statuses.clear();

        let success = outcome.succeeded();
        if let Err(e) = self
            .state
            .wizard
            .dispatch(WizardEvent::SubmitFinished { success }, &self.state.store)
        {
            warn!(state = ?self.state.wizard.state(), error = %e, "wizard out of step with upload");
        }

        match outcome {
            SubmitOutcome::Uploaded(receipt) => {
                self.state
                    .push_notice(NoticeLevel::Success, "Test uploaded successfully!");
                self.refresh_tests(RefreshReason::SubmissionCompleted(receipt));
            }
            SubmitOutcome::Failed(message) => {
                self.state
                    .push_notice(NoticeLevel::Error, format!("Upload failed: {}", message));
            }
            SubmitOutcome::NotStarted(e) => {
                self.state.push_notice(NoticeLevel::Warning, e.to_string());
            }
        }
    }

    /// The upload task went away without reporting. The store on screen was
    /// never handed over, so the files are still there for a retry.
    fn abandon_upload(&mut self) {
        warn!("upload task ended without a result");
        self.state.live_statuses.clear();
        let _ = self
            .state
            .wizard
            .dispatch(WizardEvent::SubmitFinished { success: false }, &self.state.store);
        self.state
            .push_notice(NoticeLevel::Error, "Upload failed: the upload task ended unexpectedly.");
    }

    fn apply_registry_update(&mut self, update: RegistryUpdate) {
        self.state.initial_load_done = true;
        debug!(reason = ?update.reason, ok = update.fetched.is_ok(), "registry update");
        let previous = self.state.registry.last_error().cloned();
        if let Err(e) = self.state.registry.apply(update.fetched) {
            // A backend that stays down reports once, not on every tick.
            if previous.as_ref() != Some(&e) {
                self.state.push_notice(NoticeLevel::Error, e.to_string());
            }
        }
    }

    /// Copies the date text fields into the filter.
    pub fn apply_date_inputs(&mut self) -> bool {
        match parse_date_range(&self.state.date_inputs.0, &self.state.date_inputs.1) {
            Ok(range) => {
                self.state.filter.date_range = range;
                true
            }
            Err(message) => {
                self.state.push_notice(NoticeLevel::Warning, message);
                false
            }
        }
    }

    pub fn reset_filter(&mut self) {
        self.state.filter.reset();
        self.state.reset_date_inputs();
        self.load_metrics();
    }

    pub fn load_metrics(&mut self) {
        let Some(source) = self.metrics_source.clone() else {
            self.state.metrics = MetricsView::Unavailable;
            return;
        };
        if !self.apply_date_inputs() {
            return;
        }

        let filter = self.state.filter.clone();
        let (sender, receiver) = std_mpsc::channel();
        self.state.metrics_receiver = Some(receiver);
        self.state.metrics = MetricsView::Loading;

        self.runtime.spawn(async move {
            let result = tokio::try_join!(
                source.dashboard_cards(&filter),
                source.neet_readiness(&filter),
                source.risk_breakdown(&filter),
                source.score_distribution(&filter),
                source.overall_performance(&filter),
                source.trend_graph(&filter),
            )
            .map(|(cards, readiness, risk, distribution, overall, trend)| MetricsSnapshot {
                cards,
                readiness,
                risk,
                distribution,
                overall,
                trend,
            });
            let _ = sender.send(result);
        });
    }

    /// Fetches the combined metrics payload and writes it to `path` as JSON.
    pub fn export_metrics(&mut self, path: PathBuf) {
        let Some(source) = self.metrics_source.clone() else {
            self.state
                .push_notice(NoticeLevel::Warning, "Export needs a live backend.");
            return;
        };
        if !self.apply_date_inputs() {
            return;
        }

        let filter = self.state.filter.clone();
        let (sender, receiver) = std_mpsc::channel();
        self.state.export_receiver = Some(receiver);
        self.runtime.spawn(async move {
            let result = async move {
                let metrics = source.dashboard_all_metrics(&filter).await?;
                tokio::fs::write(&path, serde_json::to_vec_pretty(&metrics)?).await?;
                Ok::<_, ApiError>(path)
            }
            .await;
            let _ = sender.send(result);
        });
    }

    /// Drains every background channel. Returns whether anything changed.
    pub fn update_state(&mut self) -> bool {
        let mut changed = false;

        let mut events = Vec::new();
        let mut disconnected = false;
        if let Some(receiver) = &self.state.upload_receiver {
            loop {
                match receiver.try_recv() {
                    Ok(event) => events.push(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        disconnected = true;
                        break;
                    }
                }
            }
        }
        for event in events {
            changed = true;
            match event {
                UploadEvent::Status(statuses) => self.state.live_statuses = statuses,
                UploadEvent::Finished {
                    outcome,
                    orchestrator,
                    store,
                } => {
                    self.state.upload_receiver = None;
                    self.finish_upload(outcome, orchestrator, store);
                }
            }
        }
        if disconnected && self.state.upload_receiver.take().is_some() {
            self.abandon_upload();
            changed = true;
        }

        let updates: Vec<RegistryUpdate> = self
            .state
            .registry_receiver
            .as_ref()
            .map(|r| r.try_iter().collect())
            .unwrap_or_default();
        for update in updates {
            self.apply_registry_update(update);
            changed = true;
        }

        if let Some(Ok(result)) = self.state.metrics_receiver.as_ref().map(|r| r.try_recv()) {
            self.state.metrics_receiver = None;
            self.state.metrics = match result {
                Ok(snapshot) => MetricsView::Loaded(snapshot),
                Err(e) => {
                    warn!(error = %e, "metrics fetch failed");
                    self.state.push_notice(NoticeLevel::Error, e.to_string());
                    MetricsView::Failed(e.to_string())
                }
            };
            changed = true;
        }

        if let Some(Ok(result)) = self.state.export_receiver.as_ref().map(|r| r.try_recv()) {
            self.state.export_receiver = None;
            match result {
                Ok(path) => {
                    info!(path = %path.display(), "metrics exported");
                    self.state
                        .push_notice(NoticeLevel::Success, format!("Metrics saved to {}", path.display()));
                }
                Err(e) => {
                    warn!(error = %e, "metrics export failed");
                    self.state
                        .push_notice(NoticeLevel::Error, format!("Export failed: {}", e));
                }
            }
            changed = true;
        }

        if let Some(Ok(result)) = self.state.health_receiver.as_ref().map(|r| r.try_recv()) {
            self.state.health_receiver = None;
            let healthy = match result {
                Ok(()) => {
                    info!("backend health check passed");
                    true
                }
                Err(e) => {
                    warn!(error = %e, "backend health check failed");
                    false
                }
            };
            self.state.backend_healthy = Some(healthy);
            changed = true;
        }

        let before = self.state.notices.len();
        self.state.prune_notices(Instant::now());
        changed |= before != self.state.notices.len();
        changed
    }
}

fn parse_date_range(from: &str, to: &str) -> Result<DateRange, String> {
    let parse = |raw: &str| {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map_err(|_| format!("Invalid date '{}', expected YYYY-MM-DD.", raw.trim()))
    };
    let range = DateRange {
        from: parse(from)?,
        to: parse(to)?,
    };
    if range.from > range.to {
        return Err("Start date must not be after end date.".to_string());
    }
    Ok(range)
}

impl App for ExamDesk {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.update_state() {
            ctx.request_repaint();
        }

        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        if !dropped.is_empty() && self.state.wizard.is_open() {
            self.add_dropped_files(dropped);
        }

        self.render(ctx);
        ctx.request_repaint_after(REPAINT_INTERVAL);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.stop_polling();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockBackend, MockFailures};
    use crate::registry::TestProgress;
    use crate::upload::{UploadStatus, WizardState};

    fn desk(backend: Arc<MockBackend>) -> ExamDesk {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        ExamDesk::new(runtime, backend, None, Duration::from_secs(30))
    }

    fn csv(name: &str) -> SelectedFile {
        SelectedFile::from_bytes(name, Arc::from(&b"q,a\n1,B\n"[..]))
    }

    /// Pumps `update_state` until `done` holds or five seconds pass.
    fn pump_until(desk: &mut ExamDesk, done: impl Fn(&DeskState) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            desk.update_state();
            if done(&desk.state) {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("condition not reached: {:?}", desk.state);
    }

    fn fill_both_slots(desk: &mut ExamDesk) {
        desk.open_wizard();
        assert!(desk.add_file(csv("key.csv")));
        desk.next_step();
        assert!(desk.add_file(csv("sheet.csv")));
        assert!(desk.state.wizard.is_last_step());
    }

    #[test]
    fn successful_submission_closes_wizard_and_lists_new_test() {
        let backend = Arc::new(MockBackend::new(Duration::from_millis(300)).with_list_latency(Duration::ZERO));
        let mut desk = desk(backend.clone());
        pump_until(&mut desk, |s| s.registry.records().len() == 1);

        fill_both_slots(&mut desk);
        desk.submit();
        assert!(desk.state.wizard.is_submitting());
        assert!(desk.state.is_uploading());
        pump_until(&mut desk, |s| s.slot_status(SlotKey::AnswerKey) == UploadStatus::Uploading);
        assert!(!desk.state.store.is_empty());

        desk.close_wizard();
        assert!(desk.state.wizard.is_submitting());
        assert_eq!(
            desk.state.notices.last().map(|n| n.text.as_str()),
            Some("Cannot close while uploading.")
        );

        pump_until(&mut desk, |s| s.registry.records().len() == 2);
        assert_eq!(desk.state.wizard.state(), WizardState::Closed);
        assert!(desk.state.store.is_empty());
        assert!(!desk.state.is_uploading());
        assert_eq!(desk.state.slot_status(SlotKey::ResponseSheets), UploadStatus::Uploaded);
        assert_eq!(backend.upload_calls(), 1);

        let newest = desk.state.registry.sorted(desk.state.sort)[0];
        assert_eq!(newest.progress, TestProgress::Successful);
    }

    #[test]
    fn failed_submission_keeps_files_and_returns_to_last_step() {
        let backend = Arc::new(MockBackend::new(Duration::from_millis(20)).with_list_latency(Duration::ZERO));
        let mut desk = desk(backend.clone());
        desk.runtime.block_on(backend.set_failures(MockFailures {
            upload: true,
            ..Default::default()
        }));

        fill_both_slots(&mut desk);
        desk.submit();
        desk.submit();
        pump_until(&mut desk, |s| !s.is_uploading());

        assert_eq!(backend.upload_calls(), 1);
        assert_eq!(desk.state.wizard.state(), WizardState::AtStep(1));
        assert!(desk.state.store.is_filled(SlotKey::AnswerKey));
        assert!(desk.state.store.is_filled(SlotKey::ResponseSheets));
        assert_eq!(desk.state.slot_status(SlotKey::AnswerKey), UploadStatus::Error);
        assert!(desk.state.orchestrator.last_error().is_some());
        assert!(desk
            .state
            .notices
            .iter()
            .any(|n| n.level == NoticeLevel::Error && n.text.starts_with("Upload failed")));

        desk.close_wizard();
        assert_eq!(desk.state.wizard.state(), WizardState::Closed);
        assert!(desk.state.store.is_filled(SlotKey::AnswerKey));
        assert!(desk.state.store.is_filled(SlotKey::ResponseSheets));
        assert_eq!(desk.state.store.get(SlotKey::ResponseSheets)[0].name, "sheet.csv");
    }

    #[test]
    fn submit_waits_for_the_last_slot() {
        let backend = Arc::new(MockBackend::new(Duration::ZERO));
        let mut desk = desk(backend.clone());
        desk.open_wizard();
        assert!(desk.add_file(csv("key.csv")));
        assert!(!desk.state.submit_enabled());
        desk.next_step();
        assert!(!desk.state.submit_enabled());

        desk.submit();
        assert!(!desk.state.is_uploading());
        assert_eq!(backend.upload_calls(), 0);

        assert!(desk.add_file(csv("sheet.csv")));
        assert!(desk.state.submit_enabled());
        desk.submit();
        assert!(!desk.state.submit_enabled());
    }

    #[test]
    fn clearing_a_slot_keeps_the_others() {
        let mut desk = desk(Arc::new(MockBackend::default()));
        fill_both_slots(&mut desk);
        assert!(desk.add_file(csv("sheet-2.csv")));
        assert_eq!(desk.state.store.get(SlotKey::ResponseSheets).len(), 2);

        desk.clear_slot();
        assert!(!desk.state.store.is_filled(SlotKey::ResponseSheets));
        assert!(desk.state.store.is_filled(SlotKey::AnswerKey));
        assert!(!desk.state.wizard.can_proceed(&desk.state.store));
    }

    #[test]
    fn rejected_file_shows_inline_error() {
        let mut desk = desk(Arc::new(MockBackend::default()));
        desk.open_wizard();

        assert!(!desk.add_file(csv("key.xlsx")));
        assert!(desk.state.slot_errors.contains_key(&SlotKey::AnswerKey));
        assert!(!desk.state.store.is_filled(SlotKey::AnswerKey));

        assert!(desk.add_file(csv("key.csv")));
        assert!(desk.state.slot_errors.is_empty());
    }

    #[test]
    fn leaving_uploads_page_discards_the_list() {
        let backend = Arc::new(MockBackend::new(Duration::ZERO).with_list_latency(Duration::ZERO));
        let mut desk = desk(backend);
        pump_until(&mut desk, |s| s.initial_load_done);

        desk.show_page(Page::Metrics);
        assert!(desk.poller.is_none());
        assert!(desk.state.registry.records().is_empty());
        assert_eq!(desk.state.metrics, MetricsView::Unavailable);

        desk.show_page(Page::Uploads);
        pump_until(&mut desk, |s| s.registry.records().len() == 1);
    }

    #[test]
    fn listing_failure_is_reported_once() {
        let backend = Arc::new(MockBackend::new(Duration::ZERO).with_list_latency(Duration::ZERO));
        let mut desk = desk(backend.clone());
        pump_until(&mut desk, |s| s.initial_load_done);
        desk.runtime.block_on(backend.set_failures(MockFailures {
            listing: true,
            ..Default::default()
        }));

        desk.refresh_tests(RefreshReason::Manual);
        pump_until(&mut desk, |s| s.registry.last_error().is_some());
        desk.refresh_tests(RefreshReason::Manual);
        pump_until(&mut desk, |_| backend.list_calls() >= 3);
        std::thread::sleep(Duration::from_millis(50));
        desk.update_state();

        let errors = desk
            .state
            .notices
            .iter()
            .filter(|n| n.level == NoticeLevel::Error)
            .count();
        assert_eq!(errors, 1);
    }

    #[test]
    fn date_range_parsing() {
        assert!(parse_date_range("2026-01-01", "2026-01-31").is_ok());
        assert!(parse_date_range("01/01/2026", "2026-01-31").is_err());
        assert!(parse_date_range("2026-02-01", "2026-01-31").is_err());
    }
}
