use std::sync::Arc;

use crate::config::PublisherConfig;
use crate::delivery::DeliveryClient;

/// Error type returned when parsing an endpoint URL.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum EndpointError {
    #[error("endpoint URL is empty")]
    Empty,

    #[error("unknown or unsupported endpoint scheme in {0:?}")]
    UnknownScheme(String),

    #[error("endpoint URL {0:?} has no host")]
    MissingHost(String),
}

/// Error type returned when building a delivery client from configuration.
#[derive(thiserror::Error, Debug)]
pub enum ClientBuildError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("http feature is not enabled")]
    HttpFeatureDisabled,

    #[cfg(feature = "http")]
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Validate a collector URL and return it with surrounding whitespace
/// removed. Only `http://` and `https://` URLs with a host are accepted.
///
/// Examples:
/// - "http://127.0.0.1:8080/ingest"
/// - "https://collector.example.com/api/telemetry"
pub fn parse_endpoint(url: &str) -> Result<String, EndpointError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(EndpointError::Empty);
    }

    let lower = trimmed.to_ascii_lowercase();
    let rest = if lower.starts_with("http://") {
        &trimmed["http://".len()..]
    } else if lower.starts_with("https://") {
        &trimmed["https://".len()..]
    } else {
        return Err(EndpointError::UnknownScheme(trimmed.to_string()));
    };

    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    if host.is_empty() {
        return Err(EndpointError::MissingHost(trimmed.to_string()));
    }

    Ok(trimmed.to_string())
}

/// Create the [`DeliveryClient`] described by a [`PublisherConfig`].
///
/// This is the entry point used by [`crate::publisher::Publisher::from_config`];
/// callers that need a custom transport construct a client themselves and
/// use [`crate::publisher::Publisher::new`].
pub fn make_client_from_config(
    cfg: &PublisherConfig,
) -> Result<Arc<dyn DeliveryClient>, ClientBuildError> {
    let url = parse_endpoint(&cfg.endpoint)?;

    #[cfg(feature = "http")]
    {
        use crate::http::{HttpDeliveryClient, HttpDeliveryConfig};

        let client = HttpDeliveryClient::new(HttpDeliveryConfig {
            url,
            timeout: cfg.request_timeout,
            content_type: cfg.content_type.clone(),
        })?;
        Ok(Arc::new(client) as Arc<dyn DeliveryClient>)
    }

    #[cfg(not(feature = "http"))]
    {
        let _ = url;
        Err(ClientBuildError::HttpFeatureDisabled)
    }
}
