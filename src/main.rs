//! Server binary: environment configuration in, API server out.

use audio_dl::{AcquisitionPipeline, Config, api};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(Config::from_env()?);
    let pipeline = Arc::new(AcquisitionPipeline::new(&config.pipeline)?);

    tracing::info!(
        max_concurrent = config.pipeline.max_concurrent,
        deadline_secs = config.pipeline.deadline_secs,
        "Starting audio-dl"
    );

    api::start_api_server(pipeline, config).await?;
    Ok(())
}
