use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Terminal state of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    Completed,
    Cancelled,
    Error,
    AlreadyRunning,
    FolderNotFound,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Completed => "completed",
            SyncStatus::Cancelled => "cancelled",
            SyncStatus::Error => "error",
            SyncStatus::AlreadyRunning => "already-running",
            SyncStatus::FolderNotFound => "folder-not-found",
        }
    }

    /// Completed is the only status that changed (or confirmed) the catalog
    pub fn is_success(&self) -> bool {
        matches!(self, SyncStatus::Completed)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("Unknown sync status: {0}")]
pub struct ParseSyncStatusError(String);

impl FromStr for SyncStatus {
    type Err = ParseSyncStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(SyncStatus::Completed),
            "cancelled" => Ok(SyncStatus::Cancelled),
            "error" => Ok(SyncStatus::Error),
            "already-running" => Ok(SyncStatus::AlreadyRunning),
            "folder-not-found" => Ok(SyncStatus::FolderNotFound),
            other => Err(ParseSyncStatusError(other.to_string())),
        }
    }
}

/// Running counters for one run. Lives only inside the engine.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Tally {
    pub added: u64,
    pub updated: u64,
    pub removed: u64,
    pub skipped: u64,
    pub errors: u64,
}

/// Summary of one sync run. Built once when the run ends and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    folder: String,
    started_at: DateTime<Utc>,
    added: u64,
    updated: u64,
    removed: u64,
    skipped: u64,
    errors: u64,
    elapsed: Duration,
    status: SyncStatus,
    message: Option<String>,
}

impl SyncOutcome {
    pub(crate) fn new(
        folder: String,
        started_at: DateTime<Utc>,
        tally: Tally,
        elapsed: Duration,
        status: SyncStatus,
        message: Option<String>,
    ) -> Self {
        Self {
            folder,
            started_at,
            added: tally.added,
            updated: tally.updated,
            removed: tally.removed,
            skipped: tally.skipped,
            errors: tally.errors,
            elapsed,
            status,
            message,
        }
    }

    /// Zero-count outcome for a request that never started a run, or whose worker died
    pub(crate) fn rejected(folder: String, status: SyncStatus, message: Option<String>) -> Self {
        Self::new(folder, Utc::now(), Tally::default(), Duration::ZERO, status, message)
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn added(&self) -> u64 {
        self.added
    }

    pub fn updated(&self) -> u64 {
        self.updated
    }

    pub fn removed(&self) -> u64 {
        self.removed
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// added + updated + removed. Skips and errors are not "processed".
    pub fn total_processed(&self) -> u64 {
        self.added + self.updated + self.removed
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] added={} updated={} removed={} skipped={} errors={} in {:.2?}",
            self.folder,
            self.status,
            self.added,
            self.updated,
            self.removed,
            self.skipped,
            self.errors,
            self.elapsed
        )?;
        if let Some(message) = &self.message {
            write!(f, " ({})", message)?;
        }
        Ok(())
    }
}

/// One row of the sync audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncAuditEntry {
    pub folder_path: String,
    pub timestamp: DateTime<Utc>,
    pub added: u64,
    pub updated: u64,
    pub removed: u64,
    pub skipped: u64,
    pub errors: u64,
    pub elapsed_ms: u64,
    pub status: SyncStatus,
    pub message: Option<String>,
}

impl From<&SyncOutcome> for SyncAuditEntry {
    fn from(outcome: &SyncOutcome) -> Self {
        Self {
            folder_path: outcome.folder.clone(),
            timestamp: outcome.started_at,
            added: outcome.added,
            updated: outcome.updated,
            removed: outcome.removed,
            skipped: outcome.skipped,
            errors: outcome.errors,
            elapsed_ms: outcome.elapsed.as_millis() as u64,
            status: outcome.status,
            message: outcome.message.clone(),
        }
    }
}
