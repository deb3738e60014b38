//! File upload module
//!
//! Uploads files to the storage account associated with the hub. Each call
//! to [`FileUpload::submit_upload`] validates its arguments, creates one
//! [`FileUploadTask`] and spawns it on its own tokio task, so uploads run in
//! the background independently of each other and of the caller.
//!
//! # Example
//!
//! ```no_run
//! use kumo_uploadr::config::Config;
//! use kumo_uploadr::fileupload::{CallbackContext, FileUpload, IotHubEventCallback, UploadSource};
//! use kumo_uploadr::status::IotHubStatusCode;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(Config::load("kumo.yaml")?);
//! let file_upload = FileUpload::new(config)?;
//!
//! let file = tokio::fs::File::open("readme.txt").await?;
//! let length = file.metadata().await?.len() as i64;
//! let callback: Arc<dyn IotHubEventCallback> =
//!     Arc::new(|status: IotHubStatusCode, _ctx: Option<CallbackContext>| {
//!         println!("upload finished with {}", status);
//!     });
//!
//! let source: Box<dyn UploadSource> = Box::new(file);
//! file_upload.submit_upload("readme.txt", Some(source), length, Some(callback), None)?;
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::transport::{HttpsTransportManager, IotHubTransportManager, TransportError};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::Instrument;
use uuid::Uuid;

pub mod blob;
pub mod protocol;
pub mod request;
pub mod source;
pub mod task;

pub use blob::{BlobError, BlobUploader, HttpBlobUploader};
pub use request::{CallbackContext, IotHubEventCallback, UploadRequest};
pub use source::UploadSource;
pub use task::{FileUploadTask, UploadState};

/// Errors reported synchronously to the caller of an upload
#[derive(Error, Debug)]
pub enum FileUploadError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No tokio runtime available to schedule the upload")]
    RuntimeUnavailable,
}

/// Entry point for asynchronous blob uploads
///
/// All tasks spawned from one `FileUpload` share its transport manager;
/// nothing else is shared between uploads.
pub struct FileUpload {
    device_id: String,
    transport: Arc<dyn IotHubTransportManager>,
    blob_uploader: Arc<dyn BlobUploader>,
    runtime: Option<Handle>,
}

impl FileUpload {
    /// Create a file upload coordinator for the configured device
    ///
    /// Builds and opens an [`HttpsTransportManager`]. Any error from that is
    /// returned as is.
    pub fn new(config: Arc<Config>) -> Result<Self, TransportError> {
        let transport = HttpsTransportManager::new(config.clone())?;
        transport.open()?;

        let blob_uploader = HttpBlobUploader::new(&config.upload)
            .map_err(|e| TransportError::ConfigError(e.to_string()))?;

        tracing::info!(
            device_id = %config.device.device_id,
            "FileUpload created"
        );

        Ok(Self::with_transport(
            config.device.device_id.clone(),
            Arc::new(transport),
            Arc::new(blob_uploader),
        ))
    }

    /// Create a coordinator over existing collaborators
    pub fn with_transport(
        device_id: impl Into<String>,
        transport: Arc<dyn IotHubTransportManager>,
        blob_uploader: Arc<dyn BlobUploader>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            transport,
            blob_uploader,
            runtime: Handle::try_current().ok(),
        }
    }

    /// Validate and schedule one upload
    ///
    /// Returns as soon as the upload is scheduled; the outcome is delivered
    /// only through `callback`. Invalid arguments are reported here and the
    /// callback is never invoked for them.
    pub fn submit_upload(
        &self,
        blob_name: &str,
        source: Option<Box<dyn UploadSource>>,
        stream_length: i64,
        callback: Option<Arc<dyn IotHubEventCallback>>,
        context: Option<CallbackContext>,
    ) -> Result<Uuid, FileUploadError> {
        let request = UploadRequest::new(blob_name, source, stream_length, callback, context)?;
        self.submit(request)
    }

    /// Schedule an already validated request
    pub fn submit(&self, request: UploadRequest) -> Result<Uuid, FileUploadError> {
        let runtime = match &self.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| FileUploadError::RuntimeUnavailable)?,
        };

        let task = FileUploadTask::new(
            request,
            self.device_id.clone(),
            self.transport.clone(),
            self.blob_uploader.clone(),
        );
        let id = task.id();

        let span = tracing::info_span!(
            "fileupload.task",
            task.id = %id,
            blob.name = %task.blob_name()
        );
        tracing::debug!(task.id = %id, blob.name = %task.blob_name(), "Upload scheduled");

        runtime.spawn(task.run().instrument(span));

        Ok(id)
    }

    /// Close the shared transport
    ///
    /// Uploads still in flight fail with `MESSAGE_CANCELLED_ONCLOSE` on their
    /// next control-plane call.
    pub fn close_now(&self) {
        self.transport.close();
    }
}
