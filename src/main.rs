mod api;
mod app;
mod config;
mod dashboard;
mod error;
mod registry;
mod upload;
mod utils;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::{Backend, HttpBackend, MetricsSource, MockBackend};
use crate::app::ExamDesk;
use crate::config::AppConfig;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,exam_desk=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

type Backends = (Arc<dyn Backend>, Option<Arc<dyn MetricsSource>>);

fn build_backends(config: &AppConfig) -> Result<Backends, error::ApiError> {
    if config.use_mock {
        info!(latency_ms = config.mock_latency.as_millis() as u64, "using mock backend");
        let backend: Arc<dyn Backend> = Arc::new(MockBackend::new(config.mock_latency));
        return Ok((backend, None));
    }

    info!(url = %config.api.base_url, "using live backend");
    let http = Arc::new(HttpBackend::new(&config.api)?);
    let backend: Arc<dyn Backend> = http.clone();
    let metrics: Arc<dyn MetricsSource> = http;
    Ok((backend, Some(metrics)))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = AppConfig::load()?;
    if let Some(storage) = &config.storage {
        info!(bucket = %storage.bucket, region = %storage.region, "object storage credentials present; uploads still go through the API");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("exam-desk-io")
        .build()?;
    let (backend, metrics) = build_backends(&config)?;
    if metrics.is_none() {
        warn!("metrics panel disabled without a live backend");
    }

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([960.0, 680.0])
            .with_min_inner_size([640.0, 480.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    let poll_interval = config.poll_interval;
    eframe::run_native(
        "Exam Desk",
        options,
        Box::new(move |_cc: &eframe::CreationContext| {
            Box::new(ExamDesk::new(runtime, backend, metrics, poll_interval))
        }),
    )?;
    Ok(())
}
