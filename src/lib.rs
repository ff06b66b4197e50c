// BangSync Library - keeps the track catalog in step with what's actually on disk
// Scanner and extractor feed the engine, the engine owns the transaction

pub mod audio;    // folder walking, fingerprints, tag reading
pub mod catalog;  // track records + sqlite store + audit log
pub mod config;   // settings and preferences
pub mod error;    // error types shared across modules
pub mod logging;  // tracing subscriber setup for the binaries
pub mod sync;     // reconciliation engine + progress events

// Export the stuff callers actually use
pub use audio::{ExtractedTrack, FingerprintExtractor, FolderScanner, ScanOptions};
pub use catalog::{AuditLog, CatalogStore, SqliteCatalog, TrackRecord};
pub use config::Config;
pub use error::{CatalogError, ExtractError, ScanError, TagError};
pub use sync::{
    LibrarySync, NoopProgress, ProgressSink, SyncAuditEntry, SyncEvent, SyncOutcome, SyncStatus,
};
