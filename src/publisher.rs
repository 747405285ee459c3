use crate::config::PublisherConfig;
use crate::delivery::{DeliveryClient, DeliveryOutcome};
use crate::endpoint::{make_client_from_config, ClientBuildError};
use crate::record::Batch;
use crate::source::{CollectError, DirectorySource, RecordSource};
use std::error::Error;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Value sent on the shutdown channel.
///
/// `None` is a plain stop request; `Some(err)` carries the caller's reason,
/// which the publisher only logs.
pub type ShutdownSignal = Option<Box<dyn Error + Send + Sync>>;

/// Lifecycle of a running [`Publisher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherState {
    /// Waiting for the next tick or a shutdown signal.
    Idle,
    /// Running a flush cycle.
    Flushing,
    /// Shutdown was requested; the final flush is running.
    ShuttingDown,
    /// The run loop has returned.
    Stopped,
}

/// What a single flush cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReport {
    /// Nothing to send; no request was made.
    Empty,
    /// The source could not be listed; retried on the next tick.
    Skipped,
    /// The batch was accepted and its files removed.
    Delivered { records: usize, bytes: usize },
    /// The batch was rejected or never reached the collector; files kept.
    Failed { records: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum PublisherError {
    #[error("record source is unusable: {0}")]
    InvalidSource(#[source] CollectError),

    #[error(transparent)]
    Client(#[from] ClientBuildError),

    #[error("publisher task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Ships records from a [`RecordSource`] to a [`DeliveryClient`] on a fixed
/// interval.
///
/// Each tick runs one flush cycle: collect everything pending, join it into
/// one batch, send it, and discard the source records only if the batch was
/// delivered. A failed batch stays in the source and is picked up again on
/// the next tick, so the interval doubles as the retry interval.
///
/// Cycles never overlap. [`Publisher::run`] takes the publisher by value,
/// so once it is running nothing else can start a cycle.
pub struct Publisher {
    source: Arc<dyn RecordSource>,
    client: Arc<dyn DeliveryClient>,
    flush_interval: Duration,
    state: watch::Sender<PublisherState>,
}

impl Publisher {
    /// Create a publisher from explicit collaborators.
    ///
    /// `flush_interval` is clamped to at least 10ms.
    pub fn new(
        source: Arc<dyn RecordSource>,
        client: Arc<dyn DeliveryClient>,
        flush_interval: Duration,
    ) -> Self {
        let flush_interval = flush_interval.max(Duration::from_millis(10));
        let (state, _) = watch::channel(PublisherState::Idle);
        Self {
            source,
            client,
            flush_interval,
            state,
        }
    }

    /// Create a publisher watching `config.directory` and posting to
    /// `config.endpoint`.
    pub fn from_config(config: PublisherConfig) -> Result<Self, PublisherError> {
        let config = config.normalized();
        let client = make_client_from_config(&config)?;

        let mut source = DirectorySource::new(&config.directory);
        if let Some(ext) = &config.extension {
            source = source.with_extension(ext.clone());
        }

        Ok(Self::new(Arc::new(source), client, config.flush_interval))
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Subscribe to lifecycle changes.
    pub fn subscribe_state(&self) -> watch::Receiver<PublisherState> {
        self.state.subscribe()
    }

    /// Run a single flush cycle now.
    pub async fn flush(&self) -> FlushReport {
        self.state.send_replace(PublisherState::Flushing);
        let report = self.flush_cycle().await;
        self.state.send_replace(PublisherState::Idle);
        report
    }

    /// Spawn the run loop on the current tokio runtime.
    ///
    /// Must be called from within a runtime.
    pub fn start(self) -> PublisherHandle {
        let (tx, rx) = mpsc::channel(1);
        let state = self.subscribe_state();
        let task = tokio::spawn(self.run(rx));
        PublisherHandle {
            shutdown: tx,
            state,
            task,
        }
    }

    /// Drive flush cycles until a shutdown signal arrives.
    ///
    /// The loop exits when a value is received on `shutdown` or every
    /// sender is dropped. It then runs one final flush so records written
    /// just before shutdown still get a delivery attempt.
    ///
    /// **Returns**
    /// - `Ok(())` after a graceful stop;
    /// - `Err(PublisherError::InvalidSource)` if the source failed its
    ///   startup check. No cycle runs in that case.
    pub async fn run(
        self,
        mut shutdown: mpsc::Receiver<ShutdownSignal>,
    ) -> Result<(), PublisherError> {
        if let Err(e) = self.source.validate().await {
            error!(error = %e, "record source unusable, publisher not started");
            self.state.send_replace(PublisherState::Stopped);
            return Err(PublisherError::InvalidSource(e));
        }

        // First cycle one full interval after start.
        let mut ticker = interval_at(Instant::now() + self.flush_interval, self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval = ?self.flush_interval, "publisher started");

        loop {
            tokio::select! {
                biased;

                signal = shutdown.recv() => {
                    match signal {
                        Some(Some(reason)) => debug!(reason = %reason, "shutdown requested"),
                        Some(None) => debug!("shutdown requested"),
                        None => debug!("all shutdown senders dropped"),
                    }
                    break;
                }
                _ = ticker.tick() => {
                    self.flush().await;
                }
            }
        }

        self.state.send_replace(PublisherState::ShuttingDown);
        drop(ticker);

        let report = self.flush_cycle().await;
        debug!(?report, "final flush finished");

        self.state.send_replace(PublisherState::Stopped);
        info!("publisher stopped");
        Ok(())
    }

    async fn flush_cycle(&self) -> FlushReport {
        let records = match self.source.collect().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "failed to collect telemetry records, retrying next tick");
                return FlushReport::Skipped;
            }
        };

        if records.is_empty() {
            return FlushReport::Empty;
        }

        let batch = Batch::from_records(records);
        if batch.payload.is_empty() {
            // Only blank files; they hold no records.
            self.source.discard(&batch.ids).await;
            return FlushReport::Empty;
        }

        let records = batch.ids.len();
        let bytes = batch.payload.len();
        debug!(records, bytes, "sending telemetry batch");

        match self.client.send(&batch.payload).await {
            DeliveryOutcome::Delivered => {
                self.source.discard(&batch.ids).await;
                debug!(records, bytes, "telemetry batch delivered");
                FlushReport::Delivered { records, bytes }
            }
            DeliveryOutcome::Failed(e) => {
                warn!(error = %e, records, "failed to deliver telemetry batch, keeping files for retry");
                FlushReport::Failed { records }
            }
        }
    }
}

/// Control handle for a publisher started with [`Publisher::start`].
pub struct PublisherHandle {
    shutdown: mpsc::Sender<ShutdownSignal>,
    state: watch::Receiver<PublisherState>,
    task: JoinHandle<Result<(), PublisherError>>,
}

impl PublisherHandle {
    /// A sender other parts of the process can use to request shutdown.
    pub fn shutdown_sender(&self) -> mpsc::Sender<ShutdownSignal> {
        self.shutdown.clone()
    }

    pub fn state(&self) -> PublisherState {
        *self.state.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal shutdown and wait for the final flush to finish.
    pub async fn shutdown(self, reason: ShutdownSignal) -> Result<(), PublisherError> {
        // Fails only if the loop already returned; join reports why.
        let _ = self.shutdown.send(reason).await;
        self.join().await
    }

    /// Wait for the run loop to exit without requesting it.
    pub async fn join(self) -> Result<(), PublisherError> {
        let PublisherHandle { shutdown, task, .. } = self;
        let result = task.await;
        drop(shutdown);
        result?
    }
}
