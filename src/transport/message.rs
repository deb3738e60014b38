//! Transport-neutral messages
//!
//! A [`Message`] describes what to ask the hub for; each transport maps it
//! onto its own wire representation.

use crate::status::IotHubStatusCode;
use bytes::Bytes;

/// Abstract request kind understood by the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IotHubMethod {
    /// Retrieve a resource
    Get,
    /// Submit data to a resource
    Post,
}

impl IotHubMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Abstract message sent through a transport manager
///
/// Messages built for telemetry carry no method; a transport that needs
/// one rejects them at `send` time.
#[derive(Debug, Clone, Default)]
pub struct Message {
    method: Option<IotHubMethod>,
    uri_path: String,
    body: Bytes,
    content_type: Option<String>,
    properties: Vec<(String, String)>,
}

impl Message {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    /// Build a request message with method and target path set
    pub fn request(method: IotHubMethod, uri_path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            method: Some(method),
            uri_path: uri_path.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: IotHubMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_uri_path(mut self, uri_path: impl Into<String>) -> Self {
        self.uri_path = uri_path.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Add an application property; a later value for the same key replaces the earlier one
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.properties.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.properties.push((key, value)),
        }
        self
    }

    pub fn method(&self) -> Option<IotHubMethod> {
        self.method
    }

    pub fn uri_path(&self) -> &str {
        &self.uri_path
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Response to a message sent over a request/response transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMessage {
    pub status_code: u16,
    pub body: Bytes,
}

impl ResponseMessage {
    pub fn new(status_code: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }

    pub fn status(&self) -> IotHubStatusCode {
        IotHubStatusCode::from_http(self.status_code)
    }
}
