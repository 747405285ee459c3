use crate::delivery::{DeliveryClient, DeliveryError, DeliveryOutcome};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

/// Content type used for newline-delimited JSON batches.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Longest slice of an error response body kept in [`DeliveryError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Configuration for [`HttpDeliveryClient`].
#[derive(Clone, Debug)]
pub struct HttpDeliveryConfig {
    /// Full collector URL, e.g. "http://127.0.0.1:8080/ingest".
    pub url: String,
    /// Upper bound for a whole request, connect included.
    pub timeout: Duration,
    pub content_type: String,
}

/// [`DeliveryClient`] that POSTs each batch to a collector over HTTP.
#[derive(Clone)]
pub struct HttpDeliveryClient {
    client: Client,
    config: HttpDeliveryConfig,
}

impl HttpDeliveryClient {
    /// Build a client with its own `reqwest` connection pool.
    ///
    /// **Returns**
    /// - `Err(..)` if the underlying TLS backend cannot be initialized.
    pub fn new(config: HttpDeliveryConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Use a caller-built `reqwest::Client` for custom transport settings.
    ///
    /// `config.timeout` is still applied to every request.
    pub fn with_client(client: Client, config: HttpDeliveryConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn send(&self, payload: &[u8]) -> DeliveryOutcome {
        let result = self
            .client
            .post(&self.config.url)
            .header(CONTENT_TYPE, &self.config.content_type)
            .timeout(self.config.timeout)
            .body(payload.to_vec())
            .send()
            .await;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => return DeliveryOutcome::Failed(DeliveryError::Transport(Box::new(e))),
        };

        if resp.status().is_success() {
            return DeliveryOutcome::Delivered;
        }

        let status = resp.status().as_u16();
        let mut body = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
        truncate_at_char_boundary(&mut body, MAX_ERROR_BODY);
        DeliveryOutcome::Failed(DeliveryError::Status { status, body })
    }
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
