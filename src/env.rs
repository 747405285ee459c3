/// Environment variable names read by [`crate::config::PublisherConfig::from_env`].
///
/// These are purely helpers for running as a sidecar; the publisher itself
/// never touches the environment.

/// Directory watched for telemetry files.
pub const FILE_PUBLISHER_DIRECTORY_ENV: &str = "FILE_PUBLISHER_DIRECTORY";

/// Collector URL batches are POSTed to.
pub const FILE_PUBLISHER_ENDPOINT_ENV: &str = "FILE_PUBLISHER_ENDPOINT";

/// Flush interval in milliseconds.
pub const FILE_PUBLISHER_FLUSH_INTERVAL_MS_ENV: &str = "FILE_PUBLISHER_FLUSH_INTERVAL_MS";

/// Per-request timeout in milliseconds.
pub const FILE_PUBLISHER_REQUEST_TIMEOUT_MS_ENV: &str = "FILE_PUBLISHER_REQUEST_TIMEOUT_MS";

/// Optional `Content-Type` override.
pub const FILE_PUBLISHER_CONTENT_TYPE_ENV: &str = "FILE_PUBLISHER_CONTENT_TYPE";

/// Optional extension filter, e.g. `json`.
pub const FILE_PUBLISHER_EXTENSION_ENV: &str = "FILE_PUBLISHER_EXTENSION";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable, treating unset and blank the same.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
