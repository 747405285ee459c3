use async_trait::async_trait;
use std::error::Error;

/// Reason a delivery attempt failed.
#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    /// The request never produced a response (connection refused, timeout,
    /// DNS failure, ...).
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn Error + Send + Sync>),

    /// The collector answered with a non-2xx status.
    #[error("collector responded with status {status}: {body}")]
    Status { status: u16, body: String },
}

/// Result of one attempt to send a batch.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(DeliveryError),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Destination for joined batches.
///
/// Implementations perform exactly one attempt per call. Retrying is the
/// publisher's job: a failed batch stays on disk and is collected again on
/// the next tick.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Send `payload` to the remote endpoint.
    ///
    /// **Returns**
    /// - [`DeliveryOutcome::Delivered`] if the endpoint accepted the body;
    /// - [`DeliveryOutcome::Failed`] on any transport error or rejection.
    async fn send(&self, payload: &[u8]) -> DeliveryOutcome;
}
