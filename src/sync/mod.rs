// Sync engine - reconciles a folder tree with the catalog
// Mark-and-sweep inside one transaction: walk + fingerprint marks what's present,
// anything under the folder that wasn't marked is gone from disk

pub mod outcome;  // immutable run summary + audit log rows
pub mod progress; // events pushed to the caller while a run works


pub use outcome::{ParseSyncStatusError, SyncAuditEntry, SyncOutcome, SyncStatus};
pub use progress::{NoopProgress, ProgressSink, SyncEvent};

use crate::audio::{FingerprintExtractor, FolderScanner};
use crate::catalog::{CatalogStore, TrackRecord};
use crate::error::{CatalogError, CatalogResult};
use chrono::{DateTime, Utc};
use outcome::Tally;
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Every run gets a fresh id; a cancel names the run it was aimed at,
/// so a request that lands after its run ended can't stop the next one.
#[derive(Debug, Default)]
struct RunState {
    running: AtomicBool,
    next_run_id: AtomicU64,
    // 0 while idle or while a run is still starting up
    active_run: AtomicU64,
    cancel_run: AtomicU64,
}

impl RunState {
    fn active_run(&self) -> u64 {
        self.active_run.load(Ordering::Acquire)
    }

    fn request_cancel(&self, run_id: u64) {
        if run_id != 0 {
            self.cancel_run.store(run_id, Ordering::Release);
        }
    }
}

/// Held for the lifetime of a run. Dropping it (normally or by unwinding) frees the engine.
struct RunGuard {
    state: Arc<RunState>,
    run_id: u64,
}

impl RunGuard {
    fn acquire(state: &Arc<RunState>) -> Option<Self> {
        state
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        let run_id = state.next_run_id.fetch_add(1, Ordering::AcqRel) + 1;
        state.active_run.store(run_id, Ordering::Release);
        Some(Self {
            state: Arc::clone(state),
            run_id,
        })
    }

    fn cancel_requested(&self) -> bool {
        self.state.cancel_run.load(Ordering::Acquire) == self.run_id
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.state.active_run.store(0, Ordering::Release);
        self.state.running.store(false, Ordering::Release);
    }
}

/// How the per-file pass ended
enum Pass {
    Swept,
    Cancelled,
}

/// The library synchronization engine.
///
/// One instance per catalog. At most one run is in flight at a time; a second
/// request is rejected with [`SyncStatus::AlreadyRunning`], never queued.
///
/// The catalog lock is held for the whole run, so [`LibrarySync::catalog`] and
/// [`LibrarySync::history`] block until the current run commits or rolls back.
pub struct LibrarySync<S: CatalogStore> {
    catalog: Mutex<S>,
    scanner: FolderScanner,
    extractor: FingerprintExtractor,
    state: Arc<RunState>,
}

impl<S: CatalogStore> LibrarySync<S> {
    pub fn new(catalog: S) -> Self {
        Self::with_components(catalog, FolderScanner::new(), FingerprintExtractor::new())
    }

    pub fn with_components(
        catalog: S,
        scanner: FolderScanner,
        extractor: FingerprintExtractor,
    ) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            scanner,
            extractor,
            state: Arc::new(RunState::default()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::Acquire)
    }

    /// Ask the active run to stop. Cooperative: the flag is polled once per
    /// file, so an in-flight fingerprint + tag read always finishes first.
    /// No effect when idle or once the run has committed. A request aimed at a
    /// run that has since finished never carries over to the next one.
    pub fn cancel(&self) {
        let run_id = self.state.active_run();
        if run_id != 0 {
            info!(run_id, "Sync cancellation requested");
            self.state.request_cancel(run_id);
        }
    }

    /// Direct access to the store. Blocks while a run is in flight.
    pub fn catalog(&self) -> MutexGuard<'_, S> {
        self.lock_catalog()
    }

    /// Most recent audit log rows, newest first
    pub fn history(&self, limit: usize) -> CatalogResult<Vec<SyncAuditEntry>> {
        self.lock_catalog().recent_syncs(limit)
    }

    /// Blocking sync without progress reporting
    pub fn sync<P: AsRef<Path>>(&self, folder: P) -> SyncOutcome {
        self.sync_with_progress(folder, &NoopProgress)
    }

    /// Blocking sync. Events are delivered to `sink` on the calling thread.
    pub fn sync_with_progress<P: AsRef<Path>>(
        &self,
        folder: P,
        sink: &dyn ProgressSink,
    ) -> SyncOutcome {
        let folder = folder.as_ref();
        match RunGuard::acquire(&self.state) {
            Some(guard) => self.run(folder, sink, guard),
            None => self.reject_busy(folder, sink),
        }
    }

    fn reject_busy(&self, folder: &Path, sink: &dyn ProgressSink) -> SyncOutcome {
        info!("Sync of {} rejected: another sync is running", folder.display());
        let outcome = SyncOutcome::rejected(
            folder.to_string_lossy().into_owned(),
            SyncStatus::AlreadyRunning,
            None,
        );
        sink.on_event(&SyncEvent::Completed {
            outcome: outcome.clone(),
        });
        outcome
    }

    fn run(&self, folder: &Path, sink: &dyn ProgressSink, guard: RunGuard) -> SyncOutcome {
        let started_at = Utc::now();
        let clock = Instant::now();
        // Deletion scope is a raw prefix match on the folder exactly as supplied
        let folder_key = folder.to_string_lossy().into_owned();

        info!("Sync started for {}", folder_key);

        let files = match self.scanner.scan(folder) {
            Ok(files) => files,
            Err(e) => {
                warn!("Sync of {} aborted before any change: {}", folder_key, e);
                let outcome = SyncOutcome::new(
                    folder_key,
                    started_at,
                    Tally::default(),
                    clock.elapsed(),
                    SyncStatus::FolderNotFound,
                    Some(e.to_string()),
                );
                let mut catalog = self.lock_catalog();
                return self.finish(&mut *catalog, outcome, sink);
            }
        };

        sink.on_event(&SyncEvent::Started {
            total_files: files.len(),
        });

        let mut catalog = self.lock_catalog();
        let mut tally = Tally::default();

        let (status, message) =
            match self.reconcile(&mut *catalog, &guard, &folder_key, &files, sink, &mut tally) {
                Ok(Pass::Swept) => (SyncStatus::Completed, None),
                Ok(Pass::Cancelled) => (SyncStatus::Cancelled, None),
                Err(e) => {
                    log_storage_failure(&folder_key, started_at, &e);
                    (SyncStatus::Error, Some(e.to_string()))
                }
            };

        let outcome = SyncOutcome::new(
            folder_key,
            started_at,
            tally,
            clock.elapsed(),
            status,
            message,
        );
        self.finish(&mut *catalog, outcome, sink)
    }

    /// Steps that touch the store. Commits on a full pass; any other exit
    /// leaves the catalog exactly as it was before `begin_transaction`.
    fn reconcile(
        &self,
        catalog: &mut S,
        guard: &RunGuard,
        folder_key: &str,
        files: &[PathBuf],
        sink: &dyn ProgressSink,
        tally: &mut Tally,
    ) -> CatalogResult<Pass> {
        let existing_paths = catalog.find_all_paths()?;

        catalog.begin_transaction()?;

        let result = self
            .apply_changes(catalog, guard, folder_key, &existing_paths, files, sink, tally)
            .and_then(|pass| match pass {
                Pass::Swept => catalog.commit().map(|_| Pass::Swept),
                Pass::Cancelled => catalog.rollback().map(|_| Pass::Cancelled),
            });

        if result.is_err() {
            if let Err(e) = catalog.rollback() {
                error!("Rollback after failed sync of {} also failed: {}", folder_key, e);
            }
        }

        result
    }

    fn apply_changes(
        &self,
        catalog: &mut S,
        guard: &RunGuard,
        folder_key: &str,
        existing_paths: &BTreeSet<String>,
        files: &[PathBuf],
        sink: &dyn ProgressSink,
        tally: &mut Tally,
    ) -> CatalogResult<Pass> {
        let total = files.len();
        let mut seen: HashSet<String> = HashSet::with_capacity(total);

        // Mark: every file that is on disk right now
        for (index, file) in files.iter().enumerate() {
            if guard.cancel_requested() {
                info!("Sync of {} cancelled after {} of {} files", folder_key, index, total);
                return Ok(Pass::Cancelled);
            }

            let path_key = file.to_string_lossy().into_owned();

            match self.extractor.extract(file) {
                Ok(extracted) => {
                    match catalog.find_by_path(&path_key)? {
                        None => {
                            catalog.insert(&TrackRecord::new(path_key.clone(), extracted))?;
                            tally.added += 1;
                            debug!("Added {}", path_key);
                            sink.on_event(&SyncEvent::Added { path: file.clone() });
                        }
                        Some(mut record) if record.fingerprint != extracted.fingerprint => {
                            record.refresh_from(extracted);
                            catalog.update(&record)?;
                            tally.updated += 1;
                            debug!("Updated {}", path_key);
                            sink.on_event(&SyncEvent::Updated { path: file.clone() });
                        }
                        Some(_) => tally.skipped += 1,
                    }
                    seen.insert(path_key);
                }
                Err(e) => {
                    tally.errors += 1;
                    warn!("Skipping {}: {}", path_key, e);
                    sink.on_event(&SyncEvent::Error {
                        path: file.clone(),
                        message: e.to_string(),
                    });
                    // Unreadable but present keeps its record; gone since the walk gets swept
                    if file.exists() {
                        seen.insert(path_key);
                    }
                }
            }

            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            sink.on_event(&SyncEvent::FileProcessed {
                current: index + 1,
                total,
                file_name,
            });
        }

        if guard.cancel_requested() {
            info!("Sync of {} cancelled before removing stale tracks", folder_key);
            return Ok(Pass::Cancelled);
        }

        // Sweep: catalogued under this folder but not seen means gone from disk
        for path in existing_paths
            .iter()
            .filter(|path| path.starts_with(folder_key) && !seen.contains(path.as_str()))
        {
            if catalog.delete_by_path(path)? {
                tally.removed += 1;
                debug!("Removed {}", path);
                sink.on_event(&SyncEvent::Removed {
                    path: PathBuf::from(path),
                });
            }
        }

        Ok(Pass::Swept)
    }

    /// Audit, announce, hand back
    fn finish(&self, catalog: &mut S, outcome: SyncOutcome, sink: &dyn ProgressSink) -> SyncOutcome {
        if let Err(e) = catalog.append_sync(&SyncAuditEntry::from(&outcome)) {
            warn!("Failed to record sync history for {}: {}", outcome.folder(), e);
        }

        info!("Sync finished: {}", outcome);
        sink.on_event(&SyncEvent::Completed {
            outcome: outcome.clone(),
        });
        outcome
    }

    fn lock_catalog(&self) -> MutexGuard<'_, S> {
        match self.catalog.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // A run panicked mid-transaction; throw its writes away before reuse
                warn!("Catalog lock poisoned by an earlier panic, rolling back leftovers");
                let mut guard = poisoned.into_inner();
                if let Err(e) = guard.rollback() {
                    error!("Rollback of abandoned transaction failed: {}", e);
                }
                self.catalog.clear_poison();
                guard
            }
        }
    }
}

impl<S: CatalogStore + 'static> LibrarySync<S> {
    /// Run the sync on the blocking worker pool. Must be called inside a Tokio runtime.
    pub fn sync_async<P: Into<PathBuf>>(
        self: &Arc<Self>,
        folder: P,
    ) -> impl Future<Output = SyncOutcome> + Send + 'static {
        self.sync_async_with_progress(folder, Arc::new(NoopProgress))
    }

    /// The run guard is taken before this returns, so `is_running()` and
    /// `cancel()` see the run immediately even if the worker hasn't started yet.
    pub fn sync_async_with_progress<P: Into<PathBuf>>(
        self: &Arc<Self>,
        folder: P,
        sink: Arc<dyn ProgressSink>,
    ) -> impl Future<Output = SyncOutcome> + Send + 'static {
        let folder: PathBuf = folder.into();
        let engine = Arc::clone(self);

        let task = RunGuard::acquire(&self.state).map(|guard| {
            let engine = Arc::clone(self);
            let folder = folder.clone();
            let sink = Arc::clone(&sink);
            tokio::task::spawn_blocking(move || engine.run(&folder, sink.as_ref(), guard))
        });

        async move {
            let Some(handle) = task else {
                return engine.reject_busy(&folder, sink.as_ref());
            };

            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Sync worker for {} died: {}", folder.display(), e);
                    let outcome = SyncOutcome::rejected(
                        folder.to_string_lossy().into_owned(),
                        SyncStatus::Error,
                        Some(format!("sync worker failed: {}", e)),
                    );
                    // The lock comes back poisoned; taking it rolls the dead run back
                    let mut catalog = engine.lock_catalog();
                    engine.finish(&mut *catalog, outcome, sink.as_ref())
                }
            }
        }
    }
}

fn log_storage_failure(folder: &str, started_at: DateTime<Utc>, e: &CatalogError) {
    error!(
        folder = %folder,
        run_started = %started_at.to_rfc3339(),
        "Catalog write failed, sync rolled back: {}",
        e
    );
}
