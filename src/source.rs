use crate::record::{Record, RecordId};
use async_trait::async_trait;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Error returned when a whole collection pass fails.
///
/// Per-file problems never surface here; they are logged and the file is
/// left out of the batch.
#[derive(thiserror::Error, Debug)]
pub enum CollectError {
    #[error("failed to list directory {path}: {source}")]
    ListDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} is not a directory")]
    NotADirectory { path: PathBuf },
}

/// Where the publisher takes pending records from.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Check once, before the first cycle, that the source is usable at all.
    ///
    /// Default implementation accepts everything.
    async fn validate(&self) -> Result<(), CollectError> {
        Ok(())
    }

    /// Read every pending record without removing anything.
    ///
    /// **Returns**
    /// - records in a deterministic order (lexicographic by identifier);
    /// - `Err(..)` only when the source as a whole could not be listed.
    async fn collect(&self) -> Result<Vec<Record>, CollectError>;

    /// Permanently remove the given records from the source.
    ///
    /// Failures are handled per record; a record that is already gone
    /// counts as removed.
    async fn discard(&self, ids: &[RecordId]);
}

/// Default age after which a zero-byte file is treated as abandoned.
const DEFAULT_EMPTY_FILE_GRACE: Duration = Duration::from_secs(60);

/// [`RecordSource`] backed by a flat directory of telemetry files.
///
/// Regular files and symlinks to regular files are collected; hidden
/// files and subdirectories are not. Zero-byte files are left alone until
/// they are older than the empty-file grace period, then handed out as
/// records without content so a delivered cycle removes them.
#[derive(Clone, Debug)]
pub struct DirectorySource {
    directory: PathBuf,
    extension: Option<String>,
    empty_file_grace: Duration,
}

impl DirectorySource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        DirectorySource {
            directory: directory.into(),
            extension: None,
            empty_file_grace: DEFAULT_EMPTY_FILE_GRACE,
        }
    }

    /// Only collect files whose extension equals `extension` (no dot).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.extension = Some(extension.trim_start_matches('.').to_string());
        self
    }

    /// How long a zero-byte file may sit in the directory before it is
    /// considered abandoned rather than still being written.
    pub fn with_empty_file_grace(mut self, grace: Duration) -> Self {
        self.empty_file_grace = grace;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn accepts(&self, name: &str) -> bool {
        // Dotfiles are in-progress writes (see `spool`).
        if name.starts_with('.') {
            return false;
        }
        match &self.extension {
            Some(ext) => Path::new(name)
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| e == ext),
            None => true,
        }
    }

    fn is_abandoned(&self, meta: &Metadata) -> bool {
        let age = meta
            .modified()
            .ok()
            .and_then(|m| SystemTime::now().duration_since(m).ok())
            .unwrap_or(Duration::ZERO);
        age >= self.empty_file_grace
    }

    async fn list(&self) -> io::Result<Vec<(String, Metadata)>> {
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                warn!(path = %entry.path().display(), "skipping file with non UTF-8 name");
                continue;
            };
            if !self.accepts(&name) {
                continue;
            }
            // Follows symlinks.
            let meta = match tokio::fs::metadata(entry.path()).await {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "cannot stat telemetry file");
                    continue;
                }
            };
            if meta.is_file() {
                files.push((name, meta));
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }
}

#[async_trait]
impl RecordSource for DirectorySource {
    async fn validate(&self) -> Result<(), CollectError> {
        match tokio::fs::metadata(&self.directory).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(CollectError::NotADirectory {
                path: self.directory.clone(),
            }),
            Err(source) => Err(CollectError::ListDirectory {
                path: self.directory.clone(),
                source,
            }),
        }
    }

    async fn collect(&self) -> Result<Vec<Record>, CollectError> {
        let files = self.list().await.map_err(|source| CollectError::ListDirectory {
            path: self.directory.clone(),
            source,
        })?;

        let mut records = Vec::with_capacity(files.len());
        for (name, meta) in files {
            let path = self.directory.join(&name);
            match tokio::fs::read(&path).await {
                Ok(payload) if payload.is_empty() && !self.is_abandoned(&meta) => {
                    debug!(file = %name, "skipping empty telemetry file");
                }
                Ok(payload) => records.push(Record::new(name, payload)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(file = %name, "telemetry file vanished before it was read");
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "failed to read telemetry file, leaving it out of this batch");
                }
            }
        }

        Ok(records)
    }

    async fn discard(&self, ids: &[RecordId]) {
        for id in ids {
            let path = self.directory.join(id.as_str());
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(file = %id, error = %e, "failed to remove delivered telemetry file");
                }
            }
        }
    }
}
