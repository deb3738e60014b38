//! Kumo Uploadr Library
//!
//! Asynchronous device-to-cloud file uploads over HTTPS.
//!
//! # Features
//!
//! - **Background Uploads**: every upload runs on its own tokio task
//! - **Three-Leg Protocol**: authorize with the hub, write to storage, notify the hub
//! - **Exactly-Once Callbacks**: every accepted upload reports one terminal status
//! - **Uniform Transport Contract**: HTTPS behind `IotHubTransportManager`
//!
//! # Example
//!
//! ```no_run
//! use kumo_uploadr::{client::DeviceClient, config::Config};
//! use kumo_uploadr::fileupload::{CallbackContext, IotHubEventCallback, UploadSource};
//! use kumo_uploadr::status::IotHubStatusCode;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("kumo.yaml")?;
//!     let client = DeviceClient::new(Arc::new(config));
//!
//!     let (tx, rx) = std::sync::mpsc::channel();
//!     let callback: Arc<dyn IotHubEventCallback> =
//!         Arc::new(move |status: IotHubStatusCode, _: Option<CallbackContext>| {
//!             let _ = tx.send(status);
//!         });
//!
//!     let source: Box<dyn UploadSource> = Box::new(std::io::Cursor::new(b"hello".to_vec()));
//!     client.upload_to_blob_async("hello.txt", Some(source), 5, Some(callback), None)?;
//!     println!("status: {:?}", tokio::task::spawn_blocking(move || rx.recv()).await?);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod fileupload;
pub mod logging;
pub mod metrics;
pub mod status;
pub mod transport;

// Re-export commonly used types
pub use client::DeviceClient;
pub use config::Config;
pub use fileupload::FileUpload;
pub use status::IotHubStatusCode;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
