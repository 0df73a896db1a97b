//! Error types for the Asana adapter and datasource configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by an [`AsanaApi`](crate::asana::AsanaApi) call.
///
/// None of these ever reach the host: the polling datasource logs them and
/// drops the fetch cycle.
#[derive(Debug, Error)]
pub enum AsanaError {
    /// The API rejected the credentials (401 / 403).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure (DNS, TLS, connection reset, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Any other non-success status.
    #[error("Asana returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// The configured API root cannot carry a path.
    #[error("invalid API base URL: {0}")]
    BaseUrl(String),
}

/// Errors raised while loading or validating datasource settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No plugin is registered under this type name.
    #[error("unknown datasource type `{0}`")]
    UnknownType(String),

    /// A required setting is absent or empty.
    #[error("datasource `{source_name}` is missing required setting `{field}`")]
    MissingField {
        source_name: String,
        field: &'static str,
    },

    /// A setting is present but has an unusable value.
    #[error("datasource `{source_name}`: {message}")]
    Invalid {
        source_name: String,
        message: String,
    },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
