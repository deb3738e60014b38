//! Upload task
//!
//! Runs the three legs of one upload in order:
//!
//! ```text
//! CREATED → AUTHORIZING → TRANSFERRING → NOTIFYING → COMPLETED
//!                 │              │             │
//!                 └──────────────┴─────────────┴──────→ FAILED
//! ```
//!
//! The notify leg runs whatever happened before it, so the hub can finalize
//! or discard the blob. The first failure decides the status passed to the
//! callback. The content source is closed before the callback runs.

use super::blob::BlobUploader;
use super::protocol::{
    authorization_path, notification_path, FileUploadRequest, FileUploadStatus,
    UploadAuthorization, JSON_CONTENT_TYPE,
};
use super::request::{CallbackContext, IotHubEventCallback, UploadRequest};
use super::source::SourceGuard;
use crate::metrics;
use crate::status::IotHubStatusCode;
use crate::transport::{IotHubMethod, IotHubTransportManager, Message, TransportError};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Status code reported to the hub when a failure has no HTTP status
const UNKNOWN_STATUS_CODE: i32 = -1;

/// Protocol state of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    Created,
    Authorizing,
    Transferring {
        authorization: UploadAuthorization,
    },
    Notifying {
        correlation_id: String,
        failure: Option<LegFailure>,
        storage_status: Option<u16>,
    },
    Completed,
    Failed(IotHubStatusCode),
}

impl UploadState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Authorizing => "AUTHORIZING",
            Self::Transferring { .. } => "TRANSFERRING",
            Self::Notifying { .. } => "NOTIFYING",
            Self::Completed => "COMPLETED",
            Self::Failed(_) => "FAILED",
        }
    }
}

/// Why a leg did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegFailure {
    pub status: IotHubStatusCode,
    pub http_status: Option<u16>,
    pub description: String,
}

impl LegFailure {
    fn from_transport(leg: &str, error: &TransportError) -> Self {
        let status = match error {
            TransportError::NotOpen => IotHubStatusCode::MessageCancelledOnClose,
            TransportError::TimeoutError(_) => IotHubStatusCode::MessageExpired,
            _ => IotHubStatusCode::Error,
        };
        Self {
            status,
            http_status: None,
            description: format!("{} failed: {}", leg, error),
        }
    }

    fn from_response(leg: &str, status_code: u16, body: &[u8]) -> Self {
        Self {
            status: IotHubStatusCode::from_http(status_code),
            http_status: Some(status_code),
            description: format!(
                "{} rejected with HTTP {}: {}",
                leg,
                status_code,
                String::from_utf8_lossy(body)
            ),
        }
    }

    fn local(leg: &str, status: IotHubStatusCode, detail: impl std::fmt::Display) -> Self {
        Self {
            status,
            http_status: None,
            description: format!("{} failed: {}", leg, detail),
        }
    }
}

/// One upload, owned by the context that runs it
pub struct FileUploadTask {
    id: Uuid,
    device_id: String,
    blob_name: String,
    length: u64,
    source: SourceGuard,
    completion: Option<Completion>,
    transport: Arc<dyn IotHubTransportManager>,
    blob_uploader: Arc<dyn BlobUploader>,
    bytes_transferred: u64,
}

struct Completion {
    callback: Arc<dyn IotHubEventCallback>,
    context: Option<CallbackContext>,
}

impl FileUploadTask {
    pub fn new(
        request: UploadRequest,
        device_id: impl Into<String>,
        transport: Arc<dyn IotHubTransportManager>,
        blob_uploader: Arc<dyn BlobUploader>,
    ) -> Self {
        let UploadRequest {
            blob_name,
            source,
            length,
            callback,
            context,
        } = request;

        Self {
            id: Uuid::new_v4(),
            device_id: device_id.into(),
            blob_name,
            length,
            source: SourceGuard::new(source),
            completion: Some(Completion { callback, context }),
            transport,
            blob_uploader,
            bytes_transferred: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn blob_name(&self) -> &str {
        &self.blob_name
    }

    /// Run the protocol to completion and fire the callback
    ///
    /// Returns the status delivered to the callback.
    pub async fn run(mut self) -> IotHubStatusCode {
        let start_time = Instant::now();
        let mut state = UploadState::Created;

        let status = loop {
            let from = state.name();
            let next = match state {
                UploadState::Created => UploadState::Authorizing,
                UploadState::Authorizing => match self.authorize().await {
                    Ok(authorization) => UploadState::Transferring { authorization },
                    Err(failure) => {
                        self.source.close();
                        UploadState::Notifying {
                            correlation_id: String::new(),
                            failure: Some(failure),
                            storage_status: None,
                        }
                    }
                },
                UploadState::Transferring { authorization } => {
                    let result = self.transfer(&authorization).await;
                    self.source.close();
                    let (failure, storage_status) = match result {
                        Ok(code) => (None, Some(code)),
                        Err(failure) => {
                            let http_status = failure.http_status;
                            (Some(failure), http_status)
                        }
                    };
                    UploadState::Notifying {
                        correlation_id: authorization.correlation_id,
                        failure,
                        storage_status,
                    }
                }
                UploadState::Notifying {
                    correlation_id,
                    failure,
                    storage_status,
                } => {
                    let notified = self
                        .notify(&correlation_id, failure.as_ref(), storage_status)
                        .await;
                    match (failure, notified) {
                        (Some(first), _) => UploadState::Failed(first.status),
                        (None, Err(failure)) => UploadState::Failed(failure.status),
                        (None, Ok(())) => UploadState::Completed,
                    }
                }
                UploadState::Completed => break IotHubStatusCode::Ok,
                UploadState::Failed(status) => break status,
            };

            tracing::debug!(
                task.id = %self.id,
                from,
                to = next.name(),
                "Upload state transition"
            );
            state = next;
        };

        self.finish(status, start_time);
        status
    }

    fn finish(&mut self, status: IotHubStatusCode, start_time: Instant) {
        self.source.close();

        let duration = start_time.elapsed();
        metrics::record_upload_outcome(status.as_str(), duration.as_secs_f64());

        if status.is_success() {
            tracing::info!(
                task.id = %self.id,
                blob.name = %self.blob_name,
                bytes = self.bytes_transferred,
                duration_ms = duration.as_millis(),
                "File upload completed"
            );
        } else {
            metrics::record_error("file_upload");
            tracing::warn!(
                task.id = %self.id,
                blob.name = %self.blob_name,
                status = %status,
                duration_ms = duration.as_millis(),
                "File upload failed"
            );
        }

        if let Some(Completion { callback, context }) = self.completion.take() {
            callback.execute(status, context);
        }
    }

    #[tracing::instrument(
        name = "fileupload.authorize",
        skip(self),
        fields(task.id = %self.id, blob.name = %self.blob_name),
        err(Debug)
    )]
    async fn authorize(&mut self) -> Result<UploadAuthorization, LegFailure> {
        let body = serde_json::to_vec(&FileUploadRequest {
            blob_name: self.blob_name.clone(),
        })
        .map_err(|e| LegFailure::local("authorization", IotHubStatusCode::Error, e))?;

        let message = Message::request(
            IotHubMethod::Post,
            authorization_path(&self.device_id),
            body,
        )
        .with_content_type(JSON_CONTENT_TYPE);

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| LegFailure::from_transport("authorization", &e))?;

        if !response.status().is_success() {
            return Err(LegFailure::from_response(
                "authorization",
                response.status_code,
                &response.body,
            ));
        }

        let authorization: UploadAuthorization = serde_json::from_slice(&response.body)
            .map_err(|e| LegFailure::local("authorization", IotHubStatusCode::BadFormat, e))?;

        tracing::debug!(
            correlation_id = %authorization.correlation_id,
            container = %authorization.container_name,
            "Upload authorized"
        );

        Ok(authorization)
    }

    #[tracing::instrument(
        name = "fileupload.transfer",
        skip(self, authorization),
        fields(
            task.id = %self.id,
            correlation_id = %authorization.correlation_id,
            upload.bytes = self.length
        ),
        err(Debug)
    )]
    async fn transfer(&mut self, authorization: &UploadAuthorization) -> Result<u16, LegFailure> {
        let source = self.source.get_mut().ok_or_else(|| {
            LegFailure::local("transfer", IotHubStatusCode::Error, "content source already closed")
        })?;

        match self
            .blob_uploader
            .upload(&authorization.blob_uri(), source, self.length)
            .await
        {
            Ok(code) => {
                self.bytes_transferred = self.length;
                Ok(code)
            }
            Err(e) => Err(LegFailure {
                status: e.status(),
                http_status: e.http_status(),
                description: format!("transfer failed: {}", e),
            }),
        }
    }

    #[tracing::instrument(
        name = "fileupload.notify",
        skip(self, failure, storage_status),
        fields(
            task.id = %self.id,
            correlation_id = %correlation_id,
            upload.success = failure.is_none()
        ),
        err(Debug)
    )]
    async fn notify(
        &mut self,
        correlation_id: &str,
        failure: Option<&LegFailure>,
        storage_status: Option<u16>,
    ) -> Result<(), LegFailure> {
        let notification = match failure {
            None => FileUploadStatus {
                correlation_id: correlation_id.to_string(),
                is_success: true,
                status_code: storage_status.map(i32::from).unwrap_or(UNKNOWN_STATUS_CODE),
                status_description: "Succeed to upload to storage.".into(),
            },
            Some(failure) => FileUploadStatus {
                correlation_id: correlation_id.to_string(),
                is_success: false,
                status_code: failure
                    .http_status
                    .map(i32::from)
                    .unwrap_or(UNKNOWN_STATUS_CODE),
                status_description: failure.description.clone(),
            },
        };

        let body = serde_json::to_vec(&notification)
            .map_err(|e| LegFailure::local("notification", IotHubStatusCode::Error, e))?;

        let message = Message::request(
            IotHubMethod::Post,
            notification_path(&self.device_id),
            body,
        )
        .with_content_type(JSON_CONTENT_TYPE);

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| LegFailure::from_transport("notification", &e))?;

        if !response.status().is_success() {
            return Err(LegFailure::from_response(
                "notification",
                response.status_code,
                &response.body,
            ));
        }

        Ok(())
    }
}

impl Drop for FileUploadTask {
    // A task dropped before running (runtime shut down) still reports once
    fn drop(&mut self) {
        if let Some(Completion { callback, context }) = self.completion.take() {
            self.source.close();
            tracing::warn!(task.id = %self.id, "Upload dropped before completion");
            callback.execute(IotHubStatusCode::MessageCancelledOnClose, context);
        }
    }
}
