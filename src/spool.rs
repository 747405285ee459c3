use chrono::Utc;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, warn};

use crate::record::join_payloads;

/// Spooler tuning.
///
/// **Fields**
/// - `channel_buffer`: records queued before new ones are dropped.
/// - `batch_size`: records per spool file.
/// - `flush_interval`: longest time a record waits in memory before it is
///   written, even when the batch is not full.
#[derive(Clone, Debug)]
pub struct SpoolConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SpoolError {
    #[error("spool channel is full, record dropped")]
    Full,

    #[error("spool writer has stopped")]
    Closed,

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Counters shared between a [`Spooler`] and its writer task.
#[derive(Debug, Default)]
pub struct SpoolStats {
    /// Records accepted into the channel.
    pub enqueued: AtomicU64,
    /// Records dropped because the channel was full, or because writes
    /// kept failing and the retained backlog outgrew `channel_buffer`.
    pub dropped: AtomicU64,
    /// Spool files renamed into the watched directory.
    pub files_written: AtomicU64,
    /// Spool file writes that failed and were left for a retry.
    pub write_failures: AtomicU64,
}

/// Producer-side writer for the watched directory.
///
/// Records are pushed without blocking into a bounded channel; a
/// background task groups them and writes each group as one file. Files
/// are written under a hidden temporary name and renamed into place, so a
/// [`crate::source::DirectorySource`] never reads a partial file.
///
/// The writer task ends after every clone of the spooler is dropped,
/// writing whatever is still buffered first.
#[derive(Clone)]
pub struct Spooler {
    sender: mpsc::Sender<String>,
    stats: Arc<SpoolStats>,
}

impl Spooler {
    /// Create a spooler for `directory` and spawn its writer task.
    ///
    /// Minimal thresholds are enforced for `channel_buffer`, `batch_size`
    /// and `flush_interval`.
    pub fn new(directory: impl Into<PathBuf>, config: SpoolConfig) -> (Self, JoinHandle<()>) {
        let buffer = config.channel_buffer.max(16);
        let batch_size = config.batch_size.max(1);
        let flush_interval = config.flush_interval.max(Duration::from_millis(10));
        let max_retained = buffer.max(batch_size);

        let (tx, mut rx) = mpsc::channel::<String>(buffer);
        let stats = Arc::new(SpoolStats::default());

        let stats_bg = Arc::clone(&stats);
        let writer = SpoolWriter::new(directory.into());

        let handle = tokio::spawn(async move {
            let mut batch = Vec::with_capacity(batch_size);
            // Time by which the oldest buffered record must be written, or
            // of the next retry after a failed write.
            let mut deadline = Instant::now();
            let mut backing_off = false;

            loop {
                tokio::select! {
                    record = rx.recv() => {
                        let Some(record) = record else {
                            break;
                        };
                        if batch.is_empty() {
                            deadline = Instant::now() + flush_interval;
                        }
                        batch.push(record);
                        retain_newest(&mut batch, max_retained, &stats_bg);

                        if batch.len() >= batch_size
                            && !backing_off
                            && !writer.write_batch(&mut batch, &stats_bg).await
                        {
                            backing_off = true;
                            deadline = Instant::now() + flush_interval;
                        }
                    }
                    _ = sleep_until(deadline), if !batch.is_empty() => {
                        backing_off = !writer.write_batch(&mut batch, &stats_bg).await;
                        if backing_off {
                            deadline = Instant::now() + flush_interval;
                        }
                    }
                }
            }

            if !batch.is_empty() {
                writer.write_batch(&mut batch, &stats_bg).await;
            }
            debug!("spool writer stopped");
        });

        (Self { sender: tx, stats }, handle)
    }

    /// Queue an already-serialized record.
    pub fn push(&self, record: impl Into<String>) -> Result<(), SpoolError> {
        match self.sender.try_send(record.into()) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(SpoolError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SpoolError::Closed),
        }
    }

    /// Serialize `record` as a single JSON line and queue it.
    pub fn push_json<T: Serialize>(&self, record: &T) -> Result<(), SpoolError> {
        let line = serde_json::to_string(record)?;
        self.push(line)
    }

    pub fn stats(&self) -> &SpoolStats {
        &self.stats
    }
}

struct SpoolWriter {
    directory: PathBuf,
    sequence: AtomicU64,
}

impl SpoolWriter {
    fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            sequence: AtomicU64::new(0),
        }
    }

    /// Write and clear `batch`. On failure the records stay buffered for a
    /// retry and `false` is returned.
    async fn write_batch(&self, batch: &mut Vec<String>, stats: &SpoolStats) -> bool {
        let body = join_payloads(batch.iter());
        if body.is_empty() {
            batch.clear();
            return true;
        }

        let name = self.next_name();
        match write_atomic(&self.directory, &name, &body).await {
            Ok(()) => {
                stats.files_written.fetch_add(1, Ordering::Relaxed);
                debug!(file = %name, records = batch.len(), "spooled telemetry records");
                batch.clear();
                true
            }
            Err(e) => {
                stats.write_failures.fetch_add(1, Ordering::Relaxed);
                warn!(file = %name, error = %e, records = batch.len(), "failed to spool telemetry records");
                false
            }
        }
    }

    /// `<UTC timestamp>-<sequence>.json`, sortable in write order.
    fn next_name(&self) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}-{:06}.json", Utc::now().format("%Y%m%dT%H%M%S%.6fZ"), seq)
    }
}

/// Drop the oldest records once more than `max` are held in memory.
fn retain_newest(batch: &mut Vec<String>, max: usize, stats: &SpoolStats) {
    if batch.len() > max {
        let excess = batch.len() - max;
        batch.drain(..excess);
        stats.dropped.fetch_add(excess as u64, Ordering::Relaxed);
    }
}

/// Write `contents` to `directory/name` via a hidden temporary file and a
/// rename, so readers see either nothing or the whole file.
pub async fn write_atomic(directory: &Path, name: &str, contents: &[u8]) -> io::Result<()> {
    let tmp = directory.join(format!(".{}.tmp", name));
    let dest = directory.join(name);

    if let Err(e) = tokio::fs::write(&tmp, contents).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&tmp, &dest).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
