//! Configuration module for Kumo Uploadr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation. The resulting [`Config`] is
//! the device configuration provider consumed by the transport layer.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// # Examples
///
/// ```ignore
/// std::env::set_var("MY_VAR", "value");
/// let result = expand_env_vars("prefix-${MY_VAR}-suffix");
/// assert_eq!(result, "prefix-value-suffix");
///
/// let result = expand_env_vars("${MISSING:-default}");
/// assert_eq!(result, "default");
/// ```
pub(crate) fn expand_env_vars(s: &str) -> String {
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") {
        Ok(re) => re,
        Err(_) => return s.to_string(),
    };
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);

    result
}

/// Custom deserializer for strings with environment variable expansion.
fn deserialize_with_env<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(expand_env_vars(&s))
}

fn deserialize_option_with_env<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let s = Option::<String>::deserialize(deserializer)?;
    Ok(s.map(|s| expand_env_vars(&s)))
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Build a configuration for a device with every other section defaulted
    pub fn for_device(
        hostname: impl Into<String>,
        device_id: impl Into<String>,
        sas_token: impl Into<String>,
    ) -> Self {
        Self {
            device: DeviceConfig {
                hostname: hostname.into(),
                device_id: device_id.into(),
                sas_token: sas_token.into(),
                endpoint: None,
            },
            transport: TransportConfig::default(),
            upload: UploadConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }

    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let device = &self.device;

        if device.hostname.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "device.hostname cannot be empty".into(),
            ));
        }

        if device.device_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "device.device_id cannot be empty".into(),
            ));
        }

        if device.sas_token.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "device.sas_token cannot be empty".into(),
            ));
        }

        if let Some(ref endpoint) = device.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid endpoint '{}': must start with http:// or https://",
                    endpoint
                )));
            }
        }

        if self.transport.api_version.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "transport.api_version cannot be empty".into(),
            ));
        }

        if self.transport.request_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "transport.request_timeout_seconds must be greater than 0".into(),
            ));
        }

        if self.upload.storage_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "upload.storage_timeout_seconds must be greater than 0".into(),
            ));
        }

        match self.logging.format.as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid logging format '{}': must be 'json' or 'pretty'",
                    self.logging.format
                )))
            }
        }

        Ok(())
    }

    /// Base URL of the control-plane service
    ///
    /// Uses the configured endpoint override when present, otherwise
    /// `https://{hostname}`.
    pub fn service_url(&self) -> String {
        self.device
            .endpoint
            .clone()
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("https://{}", self.device.hostname))
    }
}

/// Device identity and authentication material
#[derive(Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Fully qualified hub host name
    #[serde(deserialize_with = "deserialize_with_env")]
    pub hostname: String,
    #[serde(deserialize_with = "deserialize_with_env")]
    pub device_id: String,
    /// Shared access signature presented in the `authorization` header
    #[serde(deserialize_with = "deserialize_with_env")]
    pub sas_token: String,
    /// Optional override of the control-plane base URL
    #[serde(default, deserialize_with = "deserialize_option_with_env")]
    pub endpoint: Option<String>,
}

impl std::fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("hostname", &self.hostname)
            .field("device_id", &self.device_id)
            .field("sas_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// HTTPS transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl TransportConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            request_timeout_seconds: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_api_version() -> String {
    "2016-11-14".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("kumo-uploadr/{}", env!("CARGO_PKG_VERSION"))
}

/// Storage data-plane configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_storage_timeout")]
    pub storage_timeout_seconds: u64,
    #[serde(default = "default_blob_type")]
    pub blob_type: String,
}

impl UploadConfig {
    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_seconds)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            storage_timeout_seconds: default_storage_timeout(),
            blob_type: default_blob_type(),
        }
    }
}

fn default_storage_timeout() -> u64 {
    300
}

fn default_blob_type() -> String {
    "BlockBlob".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}
