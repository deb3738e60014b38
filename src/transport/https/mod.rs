//! HTTPS transport
//!
//! Composes an [`HttpsIotHubConnection`] with the HTTPS message mapper behind
//! the [`IotHubTransportManager`] contract.
//!
//! # Concurrency
//!
//! The active connection is held as `Arc<HttpsIotHubConnection>` behind a
//! read/write lock. `send` clones the `Arc` and releases the lock before any
//! I/O, so concurrent senders never wait on each other and an in-flight
//! exchange completes even if `close` runs meanwhile.
//!
//! # Example
//!
//! ```no_run
//! use kumo_uploadr::config::Config;
//! use kumo_uploadr::transport::{HttpsTransportManager, IotHubMethod, IotHubTransportManager, Message};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(Config::load("kumo.yaml")?);
//! let manager = HttpsTransportManager::new(config)?;
//! manager.open()?;
//!
//! let message = Message::request(IotHubMethod::Get, "/devices/my-device", "");
//! let response = manager.send(message).await?;
//! println!("status: {}", response.status());
//!
//! manager.close();
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::transport::{IotHubTransportManager, Message, ResponseMessage, TransportError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

pub mod connection;
pub mod message;

pub use connection::HttpsIotHubConnection;
pub use message::{HttpsMethod, HttpsSingleMessage};

/// Transport manager for HTTPS
pub struct HttpsTransportManager {
    config: Arc<Config>,
    connection: RwLock<Option<Arc<HttpsIotHubConnection>>>,
}

impl HttpsTransportManager {
    /// Create a manager for the given configuration
    ///
    /// The configuration is validated here so that a bad configuration is
    /// reported at construction rather than on the first `open`.
    pub fn new(config: Arc<Config>) -> Result<Self, TransportError> {
        config
            .validate()
            .map_err(|e| TransportError::ConfigError(e.to_string()))?;

        Ok(Self {
            config,
            connection: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn active_connection(&self) -> Result<Arc<HttpsIotHubConnection>, TransportError> {
        self.connection
            .read()
            .as_ref()
            .cloned()
            .ok_or(TransportError::NotOpen)
    }
}

#[async_trait]
impl IotHubTransportManager for HttpsTransportManager {
    fn open(&self) -> Result<(), TransportError> {
        let mut connection = self.connection.write();
        if connection.is_none() {
            *connection = Some(Arc::new(HttpsIotHubConnection::new(self.config.clone())?));
            tracing::debug!(
                device_id = %self.config.device.device_id,
                "HTTPS transport opened"
            );
        }
        Ok(())
    }

    fn close(&self) {
        if self.connection.write().take().is_some() {
            tracing::debug!(
                device_id = %self.config.device.device_id,
                "HTTPS transport closed"
            );
        }
    }

    fn is_open(&self) -> bool {
        self.connection.read().is_some()
    }

    async fn send(&self, message: Message) -> Result<ResponseMessage, TransportError> {
        let method = HttpsMethod::from_iothub(message.method())?;
        let https_message = HttpsSingleMessage::parse(&message);
        let connection = self.active_connection()?;

        connection
            .send_https_message(&https_message, method, message.uri_path())
            .await
    }

    /// HTTPS is request/response only; the hub never pushes messages here.
    async fn receive(&self) -> Result<Option<Message>, TransportError> {
        Ok(None)
    }
}
