//! Device client
//!
//! Application-facing handle for a device. Telemetry, twin and method
//! traffic belong to other transports; this client only exposes file
//! uploads, which it forwards to a lazily created [`FileUpload`].

use crate::config::Config;
use crate::fileupload::{
    CallbackContext, FileUpload, FileUploadError, IotHubEventCallback, UploadRequest, UploadSource,
};
use crate::transport::TransportError;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Device client errors
#[derive(Error, Debug)]
pub enum DeviceClientError {
    #[error(transparent)]
    FileUpload(#[from] FileUploadError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A device connected to the hub
pub struct DeviceClient {
    config: Arc<Config>,
    file_upload: Mutex<Option<Arc<FileUpload>>>,
}

impl DeviceClient {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            file_upload: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Upload a stream to a blob in the background
    ///
    /// Arguments are validated before anything else happens, so a rejected
    /// call never opens a connection.
    pub fn upload_to_blob_async(
        &self,
        blob_name: &str,
        source: Option<Box<dyn UploadSource>>,
        stream_length: i64,
        callback: Option<Arc<dyn IotHubEventCallback>>,
        context: Option<CallbackContext>,
    ) -> Result<Uuid, DeviceClientError> {
        let request = UploadRequest::new(blob_name, source, stream_length, callback, context)?;
        let file_upload = self.file_upload()?;
        Ok(file_upload.submit(request)?)
    }

    /// Close the file upload transport, if one was created
    pub fn close_file_upload(&self) {
        if let Some(file_upload) = self.file_upload.lock().take() {
            file_upload.close_now();
        }
    }

    fn file_upload(&self) -> Result<Arc<FileUpload>, TransportError> {
        let mut slot = self.file_upload.lock();
        match slot.as_ref() {
            Some(file_upload) => Ok(file_upload.clone()),
            None => {
                let file_upload = Arc::new(FileUpload::new(self.config.clone())?);
                *slot = Some(file_upload.clone());
                Ok(file_upload)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::IotHubStatusCode;
    use std::io::Cursor;

    fn callback() -> Option<Arc<dyn IotHubEventCallback>> {
        Some(Arc::new(|_: IotHubStatusCode, _: Option<CallbackContext>| {}))
    }

    #[test]
    fn test_invalid_arguments_do_not_create_file_upload() {
        let client = DeviceClient::new(Arc::new(Config::for_device("hub", "device-1", "sas")));

        let result = client.upload_to_blob_async("", None, 0, callback(), None);

        assert!(matches!(
            result,
            Err(DeviceClientError::FileUpload(FileUploadError::InvalidArgument(_)))
        ));
        assert!(client.file_upload.lock().is_none());
    }

    #[test]
    fn test_bad_config_surfaces_transport_error() {
        let client = DeviceClient::new(Arc::new(Config::for_device("hub", "device-1", "")));

        let result = client.upload_to_blob_async(
            "a.txt",
            Some(Box::new(Cursor::new(vec![1u8]))),
            1,
            callback(),
            None,
        );

        assert!(matches!(
            result,
            Err(DeviceClientError::Transport(TransportError::ConfigError(_)))
        ));
    }

    #[tokio::test]
    async fn test_file_upload_is_reused_and_closed() {
        let mut config = Config::for_device("hub", "device-1", "sas");
        config.device.endpoint = Some("http://127.0.0.1:9".into());
        let client = DeviceClient::new(Arc::new(config));

        let first = client.file_upload().unwrap();
        let second = client.file_upload().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        client.close_file_upload();
        assert!(client.file_upload.lock().is_none());
        client.close_file_upload();
    }
}
