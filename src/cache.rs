//! JSON snapshot of the last analysis report.
//!
//! A snapshot is all-or-nothing: it is either reused as a whole or replaced
//! by a fresh run. Each write goes through its own temporary file in the same
//! directory, persisted over the target with a rename. A [`CacheLock`] makes
//! the check-recompute-save sequence exclusive between processes.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::ml::EventDescriptor;
use crate::report::AnalysisReport;
use crate::traits::Clock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSnapshot {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub report: AnalysisReport,
}

impl ReportSnapshot {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(report: AnalysisReport, clock: &impl Clock) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            generated_at: clock.now_utc(),
            report,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let dir = ensure_parent(path)?;
        let json = serde_json::to_string_pretty(self)?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;
        tmp.write_all(json.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|source| CacheError::Io {
                path: tmp.path().to_path_buf(),
                source,
            })?;
        tmp.persist(path).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: e.error,
        })?;

        tracing::info!("Saved report snapshot to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, CacheError> {
        if !path.exists() {
            return Err(CacheError::NotFound(path.to_path_buf()));
        }

        let json = fs::read_to_string(path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot: Self = serde_json::from_str(&json)?;

        if snapshot.version > Self::CURRENT_VERSION {
            return Err(CacheError::VersionMismatch {
                expected: Self::CURRENT_VERSION,
                found: snapshot.version,
            });
        }

        Ok(snapshot)
    }

    /// Load `path` if it holds a usable snapshot, `None` if there is none.
    pub fn load_optional(path: &Path) -> Result<Option<Self>, CacheError> {
        match Self::load(path) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(CacheError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn age_hours(&self, clock: &impl Clock) -> i64 {
        (clock.now_utc() - self.generated_at).num_hours()
    }

    pub fn is_stale(&self, max_age_hours: i64, clock: &impl Clock) -> bool {
        self.age_hours(clock) > max_age_hours
    }

    /// Fresh and generated for the same event.
    pub fn is_reusable_for(
        &self,
        event: &EventDescriptor,
        max_age_hours: i64,
        clock: &impl Clock,
    ) -> bool {
        self.report.event == *event && !self.is_stale(max_age_hours, clock)
    }

    pub fn summary(&self) -> String {
        format!(
            "Snapshot v{}: {} on {}, generated {}",
            self.version,
            self.report.event.event_type,
            self.report
                .event
                .date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "an unscheduled date".to_string()),
            self.generated_at.format("%Y-%m-%d %H:%M UTC")
        )
    }
}

/// Exclusive hold on a snapshot location, released when dropped.
///
/// The lock lives in a `<snapshot>.lock` file next to the snapshot. A second
/// holder blocks in [`CacheLock::acquire`] until the first one is dropped.
#[derive(Debug)]
pub struct CacheLock {
    _file: File,
    path: PathBuf,
}

impl CacheLock {
    pub fn acquire(snapshot: &Path) -> Result<Self, CacheError> {
        ensure_parent(snapshot)?;
        let path = lock_path(snapshot);
        let io_err = |source| CacheError::Io {
            path: path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(io_err)?;
        file.lock().map_err(io_err)?;
        tracing::debug!("Acquired snapshot lock {}", path.display());

        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn lock_path(snapshot: &Path) -> PathBuf {
    let mut name = snapshot
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "snapshot".into());
    name.push(".lock");
    snapshot.with_file_name(name)
}

/// Create the directory holding `path` and return it.
fn ensure_parent(path: &Path) -> Result<PathBuf, CacheError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("snapshot not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("snapshot I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("snapshot version mismatch: expected v{expected}, found v{found}")]
    VersionMismatch { expected: u32, found: u32 },
}
