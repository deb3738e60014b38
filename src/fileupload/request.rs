//! Upload requests and completion callbacks

use super::source::UploadSource;
use super::FileUploadError;
use crate::status::IotHubStatusCode;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque caller-owned value handed back to the callback unmodified
pub type CallbackContext = Arc<dyn Any + Send + Sync>;

/// Receives the terminal status of an asynchronous operation
///
/// Called exactly once per upload, from the task that ran it.
pub trait IotHubEventCallback: Send + Sync {
    fn execute(&self, status: IotHubStatusCode, context: Option<CallbackContext>);
}

impl<F> IotHubEventCallback for F
where
    F: Fn(IotHubStatusCode, Option<CallbackContext>) + Send + Sync,
{
    fn execute(&self, status: IotHubStatusCode, context: Option<CallbackContext>) {
        self(status, context)
    }
}

/// A validated request to upload one blob
pub struct UploadRequest {
    pub(crate) blob_name: String,
    pub(crate) source: Box<dyn UploadSource>,
    pub(crate) length: u64,
    pub(crate) callback: Arc<dyn IotHubEventCallback>,
    pub(crate) context: Option<CallbackContext>,
}

impl UploadRequest {
    /// Validate the arguments of an upload
    ///
    /// Checks run in order and the first violation is returned: blob name
    /// non-empty, source present, length non-negative, callback present.
    /// The context is opaque and never inspected.
    pub fn new(
        blob_name: &str,
        source: Option<Box<dyn UploadSource>>,
        stream_length: i64,
        callback: Option<Arc<dyn IotHubEventCallback>>,
        context: Option<CallbackContext>,
    ) -> Result<Self, FileUploadError> {
        if blob_name.is_empty() {
            return Err(FileUploadError::InvalidArgument(
                "blobName is null or empty".into(),
            ));
        }

        let source = source.ok_or_else(|| {
            FileUploadError::InvalidArgument("inputStream is null or empty".into())
        })?;

        if stream_length < 0 {
            return Err(FileUploadError::InvalidArgument(
                "streamLength is negative".into(),
            ));
        }

        let callback = callback.ok_or_else(|| {
            FileUploadError::InvalidArgument("statusCallback is null".into())
        })?;

        Ok(Self {
            blob_name: blob_name.to_string(),
            source,
            length: stream_length as u64,
            callback,
            context,
        })
    }

    pub fn blob_name(&self) -> &str {
        &self.blob_name
    }

    pub fn length(&self) -> u64 {
        self.length
    }
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("blob_name", &self.blob_name)
            .field("length", &self.length)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}
