//! Storage data-plane client
//!
//! Writes the content of an upload to the pre-authorized blob locator
//! returned by the hub. This leg talks to the storage endpoint directly and
//! does not go through the transport manager.

use super::source::UploadSource;
use crate::config::UploadConfig;
use crate::metrics;
use crate::status::IotHubStatusCode;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use std::time::Instant;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;

/// Chunks buffered between the source reader and the request body
const BODY_CHANNEL_DEPTH: usize = 4;

type BodyChunk = Result<Bytes, std::io::Error>;

/// Data-plane errors
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: u64, actual: u64 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Storage returned HTTP {0}")]
    StatusError(u16),
}

impl BlobError {
    /// HTTP status reported by storage, if the failure came from a response
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::StatusError(code) => Some(*code),
            _ => None,
        }
    }

    pub fn status(&self) -> IotHubStatusCode {
        match self {
            Self::StatusError(code) => IotHubStatusCode::from_http(*code),
            _ => IotHubStatusCode::Error,
        }
    }
}

/// Writes bytes to a blob locator
#[async_trait]
pub trait BlobUploader: Send + Sync {
    /// Read exactly `length` bytes from `source` and store them at `blob_uri`
    ///
    /// Returns the HTTP status reported by storage.
    async fn upload(
        &self,
        blob_uri: &str,
        source: &mut (dyn UploadSource + 'static),
        length: u64,
    ) -> Result<u16, BlobError>;
}

/// [`BlobUploader`] over plain HTTPS `PUT`
pub struct HttpBlobUploader {
    blob_type: String,
    http_client: reqwest::Client,
}

impl HttpBlobUploader {
    pub fn new(config: &UploadConfig) -> Result<Self, BlobError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.storage_timeout())
            .build()
            .map_err(|e| BlobError::ConfigError(e.to_string()))?;

        Ok(Self {
            blob_type: config.blob_type.clone(),
            http_client,
        })
    }
}

#[async_trait]
impl BlobUploader for HttpBlobUploader {
    #[tracing::instrument(
        name = "fileupload.blob_put",
        skip(self, blob_uri, source),
        fields(
            upload.bytes = length,
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn upload(
        &self,
        blob_uri: &str,
        source: &mut (dyn UploadSource + 'static),
        length: u64,
    ) -> Result<u16, BlobError> {
        let start_time = Instant::now();

        // The body is fed from a channel so the borrowed source can be read
        // while the request is in flight.
        let (tx, rx) = mpsc::channel::<BodyChunk>(BODY_CHANNEL_DEPTH);
        let body = reqwest::Body::wrap_stream(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        }));

        let request = self
            .http_client
            .put(blob_uri)
            .header("x-ms-blob-type", self.blob_type.as_str())
            .header(CONTENT_LENGTH, length)
            .body(body)
            .send();

        let (pumped, response) = tokio::join!(pump_source(source, length, tx), request);

        // A failed read also aborts the request; report the read failure.
        pumped?;
        let response = response.map_err(|e| BlobError::RequestError(e.to_string()))?;

        let status = response.status().as_u16();
        tracing::Span::current().record("http.status_code", status);

        if !response.status().is_success() {
            return Err(BlobError::StatusError(status));
        }

        metrics::record_upload_bytes(length);
        tracing::debug!(
            bytes = length,
            duration_ms = start_time.elapsed().as_millis(),
            "Blob written"
        );

        Ok(status)
    }
}

/// Forward exactly `length` bytes of `source` into the request body
///
/// A short read or I/O error is pushed into the body as an error, so the
/// request never completes with truncated content.
async fn pump_source(
    source: &mut (dyn UploadSource + 'static),
    length: u64,
    tx: mpsc::Sender<BodyChunk>,
) -> Result<(), BlobError> {
    let mut chunks = ReaderStream::new((&mut *source).take(length));
    let mut sent: u64 = 0;

    while let Some(chunk) = chunks.next().await {
        match chunk {
            Ok(bytes) => {
                sent += bytes.len() as u64;
                if tx.send(Ok(bytes)).await.is_err() {
                    // Request already finished; its result decides the outcome
                    return Ok(());
                }
            }
            Err(e) => {
                let _ = tx
                    .send(Err(std::io::Error::new(e.kind(), e.to_string())))
                    .await;
                return Err(BlobError::IoError(e));
            }
        }
    }

    if sent != length {
        let _ = tx
            .send(Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "upload source ended before the declared length",
            )))
            .await;
        return Err(BlobError::ShortRead {
            expected: length,
            actual: sent,
        });
    }

    Ok(())
}
