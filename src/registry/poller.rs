use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::types::{RefreshReason, TestListResponse};
use crate::api::Backend;
use crate::error::ApiError;

/// One fetch result, handed to the owner of the [`TestRegistry`](super::TestRegistry).
#[derive(Debug)]
pub struct RegistryUpdate {
    pub reason: RefreshReason,
    pub fetched: Result<TestListResponse, ApiError>,
}

/// Background task fetching the test list on a fixed interval.
///
/// The first fetch happens immediately. The task is aborted by [`stop`](Self::stop)
/// or when the poller is dropped.
pub struct RegistryPoller {
    commands: mpsc::UnboundedSender<RefreshReason>,
    task: JoinHandle<()>,
}

impl RegistryPoller {
    pub fn start(
        runtime: &Handle,
        backend: Arc<dyn Backend>,
        interval: Duration,
        sink: Sender<RegistryUpdate>,
    ) -> Self {
        let (commands, mut requests) = mpsc::unbounded_channel();
        info!(interval_secs = interval.as_secs(), "test list polling started");

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut first_tick = true;

            loop {
                let reason = tokio::select! {
                    _ = ticker.tick() => {
                        if std::mem::take(&mut first_tick) {
                            RefreshReason::Initial
                        } else {
                            RefreshReason::Scheduled
                        }
                    }
                    request = requests.recv() => match request {
                        Some(reason) => reason,
                        None => break,
                    },
                };

                let fetched = backend.list_tests(&reason).await;
                if sink.send(RegistryUpdate { reason, fetched }).is_err() {
                    debug!("registry receiver gone; polling ends");
                    break;
                }
            }
        });

        Self { commands, task }
    }

    /// Asks for a fetch outside the regular schedule.
    pub fn refresh_now(&self, reason: RefreshReason) -> bool {
        self.commands.send(reason).is_ok()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn stop(&mut self) {
        if !self.task.is_finished() {
            info!("test list polling stopped");
        }
        self.task.abort();
    }
}

impl Drop for RegistryPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockBackend;
    use crate::upload::UploadReceipt;
    use std::sync::mpsc::{channel, Receiver};

    fn drain(receiver: &Receiver<RegistryUpdate>) -> Vec<RegistryUpdate> {
        receiver.try_iter().collect()
    }

    #[tokio::test(start_paused = true)]
    async fn polls_immediately_then_on_interval() {
        let backend = Arc::new(MockBackend::default());
        let (sender, receiver) = channel();
        let mut poller = RegistryPoller::start(
            &Handle::current(),
            backend.clone(),
            Duration::from_secs(30),
            sender,
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        let updates = drain(&receiver);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].reason, RefreshReason::Initial);

        tokio::time::sleep(Duration::from_secs(30)).await;
        let updates = drain(&receiver);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].reason, RefreshReason::Scheduled);

        poller.stop();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(drain(&receiver).is_empty());
        assert_eq!(backend.list_calls(), 2);
        assert!(!poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_refresh_carries_its_reason() {
        let backend = Arc::new(MockBackend::default());
        let (sender, receiver) = channel();
        let poller = RegistryPoller::start(
            &Handle::current(),
            backend.clone(),
            Duration::from_secs(30),
            sender,
        );
        tokio::time::sleep(Duration::from_secs(1)).await;
        drain(&receiver);

        let reason = RefreshReason::SubmissionCompleted(UploadReceipt::default());
        assert!(poller.refresh_now(reason.clone()));
        tokio::time::sleep(Duration::from_secs(1)).await;

        let updates = drain(&receiver);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].reason, reason);
        let tests = updates[0].fetched.as_ref().unwrap().tests.clone().unwrap();
        assert_eq!(tests.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_poller_cancels_the_task() {
        let backend = Arc::new(MockBackend::default());
        let (sender, receiver) = channel();
        let poller = RegistryPoller::start(
            &Handle::current(),
            backend.clone(),
            Duration::from_secs(30),
            sender,
        );
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(poller);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(drain(&receiver).len(), 1);
        assert_eq!(backend.list_calls(), 1);
    }
}
