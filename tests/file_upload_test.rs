//! File Upload Integration Tests
//!
//! Drives complete uploads through `FileUpload` against a mock hub. The
//! control plane and the storage endpoint share one mock server: the
//! authorization response points `hostName` back at it.
//!
//! ## Test Coverage
//!
//! - Successful upload with authorize, PUT and notify legs
//! - Argument validation before any traffic
//! - Concurrent uploads with independent contexts
//! - Authorization and storage failures still notify the hub
//! - Uploads after close are cancelled
//! - Uploading a real file from disk

#[cfg(test)]
mod tests {
    use kumo_uploadr::config::Config;
    use kumo_uploadr::fileupload::{
        CallbackContext, FileUpload, FileUploadError, IotHubEventCallback, UploadSource,
    };
    use kumo_uploadr::status::IotHubStatusCode;
    use kumo_uploadr::DeviceClient;
    use serde_json::json;
    use std::io::{Cursor, Write};
    use std::sync::Arc;
    use tokio::sync::{mpsc, oneshot};
    use wiremock::matchers::{body_bytes, body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DEVICE_ID: &str = "device-1";
    const AUTHORIZE_PATH: &str = "/devices/device-1/files";
    const NOTIFY_PATH: &str = "/devices/device-1/files/notifications";

    type Outcome = (IotHubStatusCode, Option<CallbackContext>);

    fn config_for(server: &MockServer) -> Arc<Config> {
        let mut config = Config::for_device("hub.example.net", DEVICE_ID, "SharedAccessSignature sr=hub");
        config.device.endpoint = Some(server.uri());
        Arc::new(config)
    }

    fn channel_callback(tx: mpsc::UnboundedSender<Outcome>) -> Option<Arc<dyn IotHubEventCallback>> {
        Some(Arc::new(
            move |status: IotHubStatusCode, context: Option<CallbackContext>| {
                let _ = tx.send((status, context));
            },
        ))
    }

    fn oneshot_callback(tx: oneshot::Sender<Outcome>) -> Option<Arc<dyn IotHubEventCallback>> {
        let tx = parking_lot::Mutex::new(Some(tx));
        Some(Arc::new(
            move |status: IotHubStatusCode, context: Option<CallbackContext>| {
                if let Some(tx) = tx.lock().take() {
                    let _ = tx.send((status, context));
                }
            },
        ))
    }

    fn source(data: &[u8]) -> Option<Box<dyn UploadSource>> {
        Some(Box::new(Cursor::new(data.to_vec())))
    }

    async fn mount_authorization(server: &MockServer, blob_name: &str, correlation_id: &str) {
        Mock::given(method("POST"))
            .and(path(AUTHORIZE_PATH))
            .and(body_partial_json(json!({ "blobName": blob_name })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "correlationId": correlation_id,
                "hostName": server.uri(),
                "containerName": "uploads",
                "blobName": format!("{}/{}", DEVICE_ID, blob_name),
                "sasToken": "?sv=2018-03-28&sig=abc"
            })))
            .mount(server)
            .await;
    }

    // ========================================================================
    // TEST: Successful Upload
    // ========================================================================

    #[tokio::test]
    async fn test_upload_runs_all_three_legs() {
        let server = MockServer::start().await;
        let content = vec![b'r'; 42];

        Mock::given(method("POST"))
            .and(path(AUTHORIZE_PATH))
            .and(query_param("api-version", "2016-11-14"))
            .and(header("authorization", "SharedAccessSignature sr=hub"))
            .and(header("content-type", "application/json;charset=utf-8"))
            .and(body_partial_json(json!({ "blobName": "readme.txt" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "correlationId": "corr-1",
                "hostName": server.uri(),
                "containerName": "uploads",
                "blobName": "device-1/readme.txt",
                "sasToken": "?sv=2018-03-28&sig=abc"
            })))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/uploads/device-1/readme.txt"))
            .and(query_param("sig", "abc"))
            .and(header("x-ms-blob-type", "BlockBlob"))
            .and(body_bytes(content.clone()))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path(NOTIFY_PATH))
            .and(body_partial_json(json!({
                "correlationId": "corr-1",
                "isSuccess": true,
                "statusCode": 201
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let file_upload = FileUpload::new(config_for(&server)).unwrap();
        let (tx, rx) = oneshot::channel();
        let context: CallbackContext = Arc::new(String::from("readme-context"));

        file_upload
            .submit_upload(
                "readme.txt",
                source(&content),
                42,
                oneshot_callback(tx),
                Some(context),
            )
            .unwrap();

        let (status, context) = rx.await.unwrap();
        assert_eq!(status, IotHubStatusCode::Ok);
        assert_eq!(
            context.unwrap().downcast_ref::<String>().unwrap(),
            "readme-context"
        );
    }

    // ========================================================================
    // TEST: Argument Validation
    // ========================================================================

    #[tokio::test]
    async fn test_empty_blob_name_is_rejected_without_traffic() {
        let server = MockServer::start().await;
        let file_upload = FileUpload::new(config_for(&server)).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result = file_upload.submit_upload("", source(b"abc"), 3, channel_callback(tx), None);

        match result {
            Err(FileUploadError::InvalidArgument(message)) => {
                assert_eq!(message, "blobName is null or empty")
            }
            other => panic!("expected InvalidArgument, got {:?}", other),
        }
        assert!(rx.recv().await.is_none(), "callback must not fire");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    // ========================================================================
    // TEST: Concurrent Uploads
    // ========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_uploads_report_their_own_context() {
        let server = MockServer::start().await;
        const UPLOADS: usize = 8;

        for i in 0..UPLOADS {
            mount_authorization(&server, &format!("file-{}.bin", i), &format!("corr-{}", i)).await;
        }
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201))
            .expect(UPLOADS as u64)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(NOTIFY_PATH))
            .respond_with(ResponseTemplate::new(204))
            .expect(UPLOADS as u64)
            .mount(&server)
            .await;

        let file_upload = FileUpload::new(config_for(&server)).unwrap();
        let mut receivers = Vec::new();
        for i in 0..UPLOADS {
            let (tx, rx) = oneshot::channel();
            let context: CallbackContext = Arc::new(i);
            file_upload
                .submit_upload(
                    &format!("file-{}.bin", i),
                    source(&vec![i as u8; 16 * (i + 1)]),
                    16 * (i as i64 + 1),
                    oneshot_callback(tx),
                    Some(context),
                )
                .unwrap();
            receivers.push(rx);
        }

        let outcomes = futures::future::join_all(receivers).await;
        for (i, outcome) in outcomes.into_iter().enumerate() {
            let (status, context) = outcome.unwrap();
            assert_eq!(status, IotHubStatusCode::Ok);
            assert_eq!(*context.unwrap().downcast_ref::<usize>().unwrap(), i);
        }

        let notifications: Vec<serde_json::Value> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == NOTIFY_PATH)
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect();
        let mut correlation_ids: Vec<String> = notifications
            .iter()
            .map(|n| n["correlationId"].as_str().unwrap().to_string())
            .collect();
        correlation_ids.sort();
        correlation_ids.dedup();
        assert_eq!(correlation_ids.len(), UPLOADS);
    }

    // ========================================================================
    // TEST: Failure Paths
    // ========================================================================

    #[tokio::test]
    async fn test_authorization_failure_skips_storage_and_notifies() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(AUTHORIZE_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(NOTIFY_PATH))
            .and(body_partial_json(json!({ "correlationId": "", "isSuccess": false })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let file_upload = FileUpload::new(config_for(&server)).unwrap();
        let (tx, rx) = oneshot::channel();
        file_upload
            .submit_upload("denied.txt", source(b"nope"), 4, oneshot_callback(tx), None)
            .unwrap();

        let (status, context) = rx.await.unwrap();
        assert_eq!(status, IotHubStatusCode::Unauthorized);
        assert!(context.is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported_to_hub() {
        let server = MockServer::start().await;

        mount_authorization(&server, "broken.bin", "corr-broken").await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(NOTIFY_PATH))
            .and(body_partial_json(json!({
                "correlationId": "corr-broken",
                "isSuccess": false,
                "statusCode": 500
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let file_upload = FileUpload::new(config_for(&server)).unwrap();
        let (tx, rx) = oneshot::channel();
        file_upload
            .submit_upload("broken.bin", source(&[0u8; 10]), 10, oneshot_callback(tx), None)
            .unwrap();

        let (status, _) = rx.await.unwrap();
        assert_eq!(status, IotHubStatusCode::InternalServerError);
    }

    #[tokio::test]
    async fn test_upload_after_close_is_cancelled() {
        let server = MockServer::start().await;
        let file_upload = FileUpload::new(config_for(&server)).unwrap();
        file_upload.close_now();

        let (tx, rx) = oneshot::channel();
        file_upload
            .submit_upload("late.txt", source(b"late"), 4, oneshot_callback(tx), None)
            .unwrap();

        let (status, _) = rx.await.unwrap();
        assert_eq!(status, IotHubStatusCode::MessageCancelledOnClose);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    // ========================================================================
    // TEST: Files From Disk
    // ========================================================================

    #[tokio::test]
    async fn test_device_client_uploads_file_from_disk() {
        let server = MockServer::start().await;
        let content = b"line one\nline two\n".repeat(100);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&content).unwrap();
        file.flush().unwrap();

        mount_authorization(&server, "log.txt", "corr-disk").await;
        Mock::given(method("PUT"))
            .and(path("/uploads/device-1/log.txt"))
            .and(body_bytes(content.clone()))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(NOTIFY_PATH))
            .and(body_partial_json(json!({ "correlationId": "corr-disk", "isSuccess": true })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = DeviceClient::new(config_for(&server));
        let disk_file = tokio::fs::File::open(file.path()).await.unwrap();
        let length = disk_file.metadata().await.unwrap().len() as i64;
        assert_eq!(length, content.len() as i64);

        let (tx, rx) = oneshot::channel();
        client
            .upload_to_blob_async(
                "log.txt",
                Some(Box::new(disk_file)),
                length,
                oneshot_callback(tx),
                None,
            )
            .unwrap();

        let (status, _) = rx.await.unwrap();
        assert_eq!(status, IotHubStatusCode::Ok);
        client.close_file_upload();
    }

    #[tokio::test]
    async fn test_declared_length_longer_than_file_fails() {
        let server = MockServer::start().await;

        mount_authorization(&server, "short.bin", "corr-short").await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(NOTIFY_PATH))
            .and(body_partial_json(json!({
                "correlationId": "corr-short",
                "isSuccess": false,
                "statusCode": -1
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let file_upload = FileUpload::new(config_for(&server)).unwrap();
        let (tx, rx) = oneshot::channel();
        file_upload
            .submit_upload("short.bin", source(&[1u8; 5]), 50, oneshot_callback(tx), None)
            .unwrap();

        let (status, _) = rx.await.unwrap();
        assert_eq!(status, IotHubStatusCode::Error);
    }
}
