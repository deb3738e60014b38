//! Kumo Uploadr - upload a local file through the hub
//!
//! Submits one upload, waits for its callback and exits with the outcome.

use anyhow::Context;
use clap::Parser;
use kumo_uploadr::fileupload::{CallbackContext, IotHubEventCallback, UploadSource};
use kumo_uploadr::{config::Config, logging, metrics, DeviceClient, IotHubStatusCode};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::info;

/// Kumo Uploadr - asynchronous device file upload
#[derive(Parser, Debug)]
#[command(name = "kumo-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "kumo.yaml")]
    config: PathBuf,

    /// Name of the blob to create in the hub's storage container
    #[arg(short, long)]
    blob_name: String,

    /// Local file to upload
    #[arg(short, long)]
    file: PathBuf,

    /// Log level, overrides logging.level from the configuration
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("failed to load {:?}", args.config))?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    logging::init_subscriber(&config.logging)?;
    info!("Starting Kumo Uploadr v{}", kumo_uploadr::VERSION);
    info!("Loaded configuration from {:?}", args.config);

    let metrics_enabled = config.metrics.enabled;
    metrics::set_enabled(metrics_enabled);
    let client = DeviceClient::new(Arc::new(config));

    let file = tokio::fs::File::open(&args.file)
        .await
        .with_context(|| format!("failed to open {:?}", args.file))?;
    let length = file.metadata().await?.len();
    let length = i64::try_from(length).context("file too large")?;

    let (tx, rx) = oneshot::channel();
    let tx = parking_lot::Mutex::new(Some(tx));
    let callback: Arc<dyn IotHubEventCallback> =
        Arc::new(move |status: IotHubStatusCode, _: Option<CallbackContext>| {
            if let Some(tx) = tx.lock().take() {
                let _ = tx.send(status);
            }
        });

    let source: Box<dyn UploadSource> = Box::new(file);
    let task_id =
        client.upload_to_blob_async(&args.blob_name, Some(source), length, Some(callback), None)?;
    info!(task.id = %task_id, blob.name = %args.blob_name, bytes = length, "File upload started");

    let status = rx.await.context("upload task ended without reporting")?;
    client.close_file_upload();

    if metrics_enabled {
        tracing::debug!(metrics = %metrics::encode_metrics(), "Upload metrics");
    }

    if status.is_success() {
        info!(status = %status, "File upload succeeded");
        Ok(())
    } else {
        anyhow::bail!("file upload failed with status {}", status)
    }
}
