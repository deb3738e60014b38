//! File upload control-plane contract
//!
//! Request and response bodies exchanged with the hub's device file-upload
//! endpoints:
//!
//! | Leg | Request | Path |
//! |-----|---------|------|
//! | authorize | `POST` [`FileUploadRequest`] → [`UploadAuthorization`] | `/devices/{id}/files` |
//! | notify | `POST` [`FileUploadStatus`] | `/devices/{id}/files/notifications` |

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};

/// Content type of every control-plane request body
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

/// Characters escaped inside a single path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/');

/// Characters escaped inside a blob name; `/` is kept as a virtual directory separator
const BLOB_NAME: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Path of the upload authorization endpoint
pub fn authorization_path(device_id: &str) -> String {
    format!(
        "/devices/{}/files",
        utf8_percent_encode(device_id, PATH_SEGMENT)
    )
}

/// Path of the upload notification endpoint
pub fn notification_path(device_id: &str) -> String {
    format!(
        "/devices/{}/files/notifications",
        utf8_percent_encode(device_id, PATH_SEGMENT)
    )
}

/// Body of the authorization request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadRequest {
    pub blob_name: String,
}

/// Authorization returned by the hub: where to write and how to report back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAuthorization {
    pub correlation_id: String,
    pub host_name: String,
    pub container_name: String,
    pub blob_name: String,
    pub sas_token: String,
}

impl UploadAuthorization {
    /// Pre-authorized locator the content is written to
    pub fn blob_uri(&self) -> String {
        let host = self.host_name.trim_end_matches('/');
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        };

        format!(
            "{}/{}/{}{}",
            base,
            utf8_percent_encode(&self.container_name, PATH_SEGMENT),
            utf8_percent_encode(&self.blob_name, BLOB_NAME),
            self.sas_token
        )
    }
}

/// Body of the outcome notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUploadStatus {
    pub correlation_id: String,
    pub is_success: bool,
    pub status_code: i32,
    pub status_description: String,
}
