//! HTTPS connection to the hub
//!
//! Owns the HTTP client used to reach the control-plane service. The client
//! pools sockets internally and is safe to use from concurrent tasks.

use super::message::{parse_response, HttpsMethod, HttpsSingleMessage};
use crate::config::Config;
use crate::metrics;
use crate::transport::{ResponseMessage, TransportError};
use std::sync::Arc;

/// A live HTTPS session with the hub
pub struct HttpsIotHubConnection {
    config: Arc<Config>,
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpsIotHubConnection {
    /// Create a new connection from the device configuration
    pub fn new(config: Arc<Config>) -> Result<Self, TransportError> {
        config
            .validate()
            .map_err(|e| TransportError::ConfigError(e.to_string()))?;

        let http_client = reqwest::Client::builder()
            .timeout(config.transport.request_timeout())
            .user_agent(config.transport.user_agent.clone())
            .build()
            .map_err(|e| TransportError::ConfigError(e.to_string()))?;

        Ok(Self {
            base_url: config.service_url(),
            config,
            http_client,
        })
    }

    /// Base URL all paths are resolved against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one HTTPS request and read the whole response
    #[tracing::instrument(
        name = "https.send",
        skip(self, message),
        fields(
            http.method = ?method,
            http.path = %path,
            http.request_bytes = message.body().len(),
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    pub async fn send_https_message(
        &self,
        message: &HttpsSingleMessage,
        method: HttpsMethod,
        path: &str,
    ) -> Result<ResponseMessage, TransportError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .http_client
            .request(method.as_reqwest(), &url)
            .query(&[("api-version", self.config.transport.api_version.as_str())])
            .header("authorization", &self.config.device.sas_token)
            .header("iothub-to", path)
            .header("content-type", message.content_type());

        for (name, value) in message.headers() {
            request = request.header(name.as_str(), value.as_str());
        }

        let result = match request.body(message.body().clone()).send().await {
            Ok(response) => parse_response(response).await,
            Err(e) => Err(TransportError::from(e)),
        };

        match &result {
            Ok(response) => {
                tracing::Span::current().record("http.status_code", response.status_code);
                metrics::record_transport_request(&format!("{:?}", method), response.status_code);
                tracing::debug!(
                    status_code = response.status_code,
                    response_bytes = response.body.len(),
                    "HTTPS exchange completed"
                );
            }
            Err(_) => {
                metrics::record_error("transport");
            }
        }

        result
    }
}

impl std::fmt::Debug for HttpsIotHubConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The SAS token is deliberately left out
        f.debug_struct("HttpsIotHubConnection")
            .field("base_url", &self.base_url)
            .field("device_id", &self.config.device.device_id)
            .finish()
    }
}
