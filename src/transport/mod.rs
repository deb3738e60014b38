//! Transport module
//!
//! Defines the uniform contract every hub transport implements and the
//! abstract messages that flow through it. The HTTPS implementation lives in
//! [`https`].

use thiserror::Error;

pub mod https;
pub mod message;

pub use https::HttpsTransportManager;
pub use message::{IotHubMethod, Message, ResponseMessage};

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport is not open")]
    NotOpen,

    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Request timed out: {0}")]
    TimeoutError(String),

    #[error("Response error: {0}")]
    ResponseError(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::TimeoutError(e.to_string())
        } else if e.is_body() || e.is_decode() {
            TransportError::ResponseError(e.to_string())
        } else {
            TransportError::RequestError(e.to_string())
        }
    }
}

/// Uniform contract for a connection to the hub
///
/// `send` and `receive` are valid only between a successful `open` and the
/// next `close`. Implementations must be safe to share between concurrently
/// running upload tasks.
#[async_trait::async_trait]
pub trait IotHubTransportManager: Send + Sync {
    /// Establish the underlying connection
    fn open(&self) -> Result<(), TransportError>;

    /// Establish the connection and subscribe to the given topics
    ///
    /// Transports without a subscription model ignore `topics`.
    fn open_with_topics(&self, _topics: &[&str]) -> Result<(), TransportError> {
        self.open()
    }

    /// Tear down the connection. Always safe to call.
    fn close(&self);

    fn is_open(&self) -> bool;

    /// Send a message and wait for the response
    async fn send(&self, message: Message) -> Result<ResponseMessage, TransportError>;

    /// Poll for a message pushed by the hub
    async fn receive(&self) -> Result<Option<Message>, TransportError>;
}
