use std::path::PathBuf;
use std::time::Duration;

use crate::env::{
    env_opt, env_or, FILE_PUBLISHER_CONTENT_TYPE_ENV, FILE_PUBLISHER_DIRECTORY_ENV,
    FILE_PUBLISHER_ENDPOINT_ENV, FILE_PUBLISHER_EXTENSION_ENV,
    FILE_PUBLISHER_FLUSH_INTERVAL_MS_ENV, FILE_PUBLISHER_REQUEST_TIMEOUT_MS_ENV,
};

const DEFAULT_DIRECTORY: &str = "./telemetry";
const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/";
const DEFAULT_CONTENT_TYPE: &str = "application/x-ndjson";

const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(10);
const MIN_REQUEST_TIMEOUT: Duration = Duration::from_millis(100);

/// Publisher configuration.
///
/// **Fields**
/// - `directory`: flat directory the producer drops telemetry files into.
/// - `endpoint`: collector URL every batch is POSTed to.
/// - `flush_interval`: time between flush cycles; also the retry interval
///   after a failed delivery.
/// - `request_timeout`: bound for one HTTP request, which also bounds how
///   long a shutdown can wait on an in-flight delivery.
/// - `content_type`: `Content-Type` header of the POST.
/// - `extension`: when set, only files with this extension are shipped.
#[derive(Clone, Debug)]
pub struct PublisherConfig {
    pub directory: PathBuf,
    pub endpoint: String,
    pub flush_interval: Duration,
    pub request_timeout: Duration,
    pub content_type: String,
    pub extension: Option<String>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_DIRECTORY),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            flush_interval: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            extension: None,
        }
    }
}

/// Error type returned when reading configuration from the environment.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{key} must be a whole number of milliseconds, got {value:?}")]
    InvalidMillis { key: &'static str, value: String },
}

impl PublisherConfig {
    /// Build a configuration from `FILE_PUBLISHER_*` environment variables,
    /// using [`PublisherConfig::default`] for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let directory = env_opt(FILE_PUBLISHER_DIRECTORY_ENV)
            .map(PathBuf::from)
            .unwrap_or(defaults.directory);
        let endpoint = env_or(FILE_PUBLISHER_ENDPOINT_ENV, DEFAULT_ENDPOINT);
        let flush_interval = millis_from_env(FILE_PUBLISHER_FLUSH_INTERVAL_MS_ENV)?
            .unwrap_or(defaults.flush_interval);
        let request_timeout = millis_from_env(FILE_PUBLISHER_REQUEST_TIMEOUT_MS_ENV)?
            .unwrap_or(defaults.request_timeout);
        let content_type = env_opt(FILE_PUBLISHER_CONTENT_TYPE_ENV).unwrap_or(defaults.content_type);
        let extension = env_opt(FILE_PUBLISHER_EXTENSION_ENV);

        Ok(Self {
            directory,
            endpoint,
            flush_interval,
            request_timeout,
            content_type,
            extension,
        }
        .normalized())
    }

    /// Enforce minimal thresholds to avoid degenerate configs.
    pub fn normalized(mut self) -> Self {
        self.flush_interval = self.flush_interval.max(MIN_FLUSH_INTERVAL);
        self.request_timeout = self.request_timeout.max(MIN_REQUEST_TIMEOUT);
        self
    }
}

fn millis_from_env(key: &'static str) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = env_opt(key) else {
        return Ok(None);
    };
    parse_millis(key, &value).map(Some)
}

fn parse_millis(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidMillis {
            key,
            value: value.to_string(),
        })
}
