//! HTTPS message mapping
//!
//! Converts abstract [`Message`]s into HTTPS requests and HTTP responses
//! back into [`ResponseMessage`]s.

use crate::transport::{IotHubMethod, Message, ResponseMessage, TransportError};
use bytes::Bytes;

/// Prefix applied to application properties when sent as HTTP headers
pub const APP_PROPERTY_PREFIX: &str = "iothub-app-";

/// Content type used when a message does not carry one
pub const DEFAULT_CONTENT_TYPE: &str = "binary/octet-stream";

/// HTTP verbs the HTTPS transport can issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpsMethod {
    Get,
    Post,
}

impl HttpsMethod {
    /// Map an abstract method onto an HTTP verb
    ///
    /// A message without a method cannot be sent over HTTPS; this is reported
    /// as [`TransportError::UnsupportedMethod`] without touching the network.
    pub fn from_iothub(method: Option<IotHubMethod>) -> Result<Self, TransportError> {
        match method {
            Some(IotHubMethod::Get) => Ok(Self::Get),
            Some(IotHubMethod::Post) => Ok(Self::Post),
            None => Err(TransportError::UnsupportedMethod(
                "message has no IoT Hub method".into(),
            )),
        }
    }

    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
        }
    }
}

/// A single message in its HTTPS form: body, content type and headers
#[derive(Debug, Clone)]
pub struct HttpsSingleMessage {
    body: Bytes,
    content_type: String,
    properties: Vec<(String, String)>,
}

impl HttpsSingleMessage {
    /// Parse an abstract message into its HTTPS form
    pub fn parse(message: &Message) -> Self {
        Self {
            body: message.body().clone(),
            content_type: message
                .content_type()
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
            properties: message
                .properties()
                .iter()
                .map(|(k, v)| (format!("{}{}", APP_PROPERTY_PREFIX, k), v.clone()))
                .collect(),
        }
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Application properties as HTTP header name/value pairs
    pub fn headers(&self) -> &[(String, String)] {
        &self.properties
    }

    /// Convert the message back into abstract form
    ///
    /// Header names without the application prefix are not properties and
    /// are dropped.
    pub fn to_message(&self) -> Message {
        self.properties.iter().fold(
            Message::new(self.body.clone()).with_content_type(self.content_type.clone()),
            |message, (name, value)| match name.strip_prefix(APP_PROPERTY_PREFIX) {
                Some(key) => message.with_property(key, value.clone()),
                None => message,
            },
        )
    }
}

/// Read an HTTP response into a [`ResponseMessage`]
pub(crate) async fn parse_response(
    response: reqwest::Response,
) -> Result<ResponseMessage, TransportError> {
    let status_code = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .map_err(|e| TransportError::ResponseError(e.to_string()))?;
    Ok(ResponseMessage::new(status_code, body))
}
