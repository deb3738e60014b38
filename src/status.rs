//! Status codes reported by the hub
//!
//! Every asynchronous outcome is delivered to application code as an
//! [`IotHubStatusCode`], whether it came from an HTTP response or from a
//! local failure.

use std::fmt;

/// Terminal status of an operation against the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IotHubStatusCode {
    Ok,
    OkEmpty,
    BadFormat,
    Unauthorized,
    TooManyDevices,
    HubOrDeviceIdNotFound,
    PreconditionFailed,
    RequestEntityTooLarge,
    Throttled,
    InternalServerError,
    ServerBusy,
    Error,
    MessageExpired,
    MessageCancelledOnClose,
}

impl IotHubStatusCode {
    /// Map an HTTP status code onto the hub vocabulary
    pub fn from_http(code: u16) -> Self {
        match code {
            200 => Self::Ok,
            204 => Self::OkEmpty,
            400 => Self::BadFormat,
            401 => Self::Unauthorized,
            403 => Self::TooManyDevices,
            404 => Self::HubOrDeviceIdNotFound,
            412 => Self::PreconditionFailed,
            413 => Self::RequestEntityTooLarge,
            429 => Self::Throttled,
            500 => Self::InternalServerError,
            503 => Self::ServerBusy,
            // Other 2xx codes (e.g. 201 Created from storage) are successes
            201..=299 => Self::Ok,
            _ => Self::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Ok | Self::OkEmpty)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::OkEmpty => "OK_EMPTY",
            Self::BadFormat => "BAD_FORMAT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::TooManyDevices => "TOO_MANY_DEVICES",
            Self::HubOrDeviceIdNotFound => "HUB_OR_DEVICE_ID_NOT_FOUND",
            Self::PreconditionFailed => "PRECONDITION_FAILED",
            Self::RequestEntityTooLarge => "REQUEST_ENTITY_TOO_LARGE",
            Self::Throttled => "THROTTLED",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
            Self::ServerBusy => "SERVER_BUSY",
            Self::Error => "ERROR",
            Self::MessageExpired => "MESSAGE_EXPIRED",
            Self::MessageCancelledOnClose => "MESSAGE_CANCELLED_ONCLOSE",
        }
    }
}

impl fmt::Display for IotHubStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
