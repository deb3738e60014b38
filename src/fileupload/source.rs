//! Content sources for uploads

use bytes::Bytes;
use std::io::Cursor;
use tokio::io::AsyncRead;

/// A readable byte stream handed over to an upload task
///
/// The task owns the source exclusively, reads it once from start to end
/// and calls [`close`](UploadSource::close) exactly once when it is done.
pub trait UploadSource: AsyncRead + Send + Unpin {
    /// Release the underlying resource
    fn close(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl UploadSource for tokio::fs::File {}

impl UploadSource for Cursor<Vec<u8>> {}

impl UploadSource for Cursor<Bytes> {}

/// Owns a source and guarantees it is closed exactly once
pub(crate) struct SourceGuard {
    source: Option<Box<dyn UploadSource>>,
}

impl SourceGuard {
    pub(crate) fn new(source: Box<dyn UploadSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// The source, or `None` once closed
    pub(crate) fn get_mut(&mut self) -> Option<&mut (dyn UploadSource + 'static)> {
        self.source.as_deref_mut()
    }

    pub(crate) fn close(&mut self) {
        if let Some(mut source) = self.source.take() {
            if let Err(e) = source.close() {
                tracing::warn!(error = %e, "Failed to close upload source");
            }
        }
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        self.close();
    }
}
