pub mod api; // HTTP session surface
pub mod config;
pub mod export; // CSV + XLSX writers
pub mod grid; // Copy-on-write table model
pub mod pipeline; // Upload → payload → extraction
pub mod session; // Session state machine

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::api::{ApiContext, ServerError};
use crate::config::{AppConfig, ConfigError};
use crate::pipeline::extraction::OllamaInference;
use crate::pipeline::{ExtractionClient, InferenceError, PayloadFitter, UploadPipeline};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("Inference backend: {0}")]
    Inference(#[from] InferenceError),
    #[error("{0}")]
    Server(#[from] ServerError),
    #[error("Runtime error: {0}")]
    Io(#[from] std::io::Error),
}

/// Process entry point: logging, configuration, runtime, server.
pub fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let app_config = AppConfig::from_env()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(serve(app_config))
}

/// Serve the session API until Ctrl-C.
pub async fn serve(app_config: AppConfig) -> Result<(), StartupError> {
    let backend = OllamaInference::new(
        &app_config.ollama_url,
        &app_config.model,
        app_config.request_timeout_secs,
    )?;
    tracing::info!(
        url = %app_config.ollama_url,
        model = %app_config.model,
        "Inference backend configured"
    );

    let client = ExtractionClient::new(Arc::new(backend));
    let pipeline = UploadPipeline::new(PayloadFitter::new(app_config.payload_budget), client);
    let ctx = ApiContext::new(pipeline, app_config.upload_limits.clone());

    let mut server = api::start_server(ctx, app_config.bind_addr).await?;
    tracing::info!(
        addr = %server.session.server_addr,
        session_id = %server.session.session_id,
        started_at = %server.session.started_at,
        "Ready for uploads"
    );

    tokio::signal::ctrl_c().await?;
    server.shutdown();
    server.wait().await;
    Ok(())
}
