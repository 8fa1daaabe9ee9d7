use std::sync::Arc;

use tmj_core::TaskStore;
use tmj_parsing::{ExtractorConfigBuilder, SectionExtractor};
use tmj_pdf_mupdf::MupdfBackend;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

mod app;
mod error;
mod handlers;
mod models;
mod settings;
mod state;
mod upload;

use settings::Settings;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let log_filter = init_tracing();

    let config = tmj_core::config_file::load_config();
    let settings = Settings::resolve(&config);
    settings.report_rejected();
    if let Some(handle) = log_filter {
        handle.reload(EnvFilter::new(&settings.log_level))?;
    }

    let extraction = config.extraction.clone().unwrap_or_default();
    let extractor_config = ExtractorConfigBuilder::from_config_file(&extraction).build()?;
    let extractor = SectionExtractor::with_config(&extractor_config)?;

    let state = Arc::new(AppState {
        tasks: Arc::new(TaskStore::new(settings.task_retention)),
        extractor,
        backend: Arc::new(MupdfBackend),
        max_upload_mb: settings.max_upload_mb,
    });

    let app = app::router(state);

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        max_upload_mb = settings.max_upload_mb,
        retention_secs = settings.task_retention.as_secs(),
        min_digits = extractor_config.min_digits(),
        "listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

/// Must run before the config is read. Without `RUST_LOG`, the returned handle
/// swaps in `logging.level` once it is known.
fn init_tracing() -> Option<reload::Handle<EnvFilter, Registry>> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
            None
        }
        Err(_) => {
            let (filter, handle) =
                reload::Layer::new(EnvFilter::new(settings::DEFAULT_LOG_LEVEL));
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
            Some(handle)
        }
    }
}
