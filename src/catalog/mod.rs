// Catalog - the persisted mirror of what's on disk
// The sync engine only talks to the CatalogStore trait; sqlite is the shipped backend

pub mod database;

pub use database::SqliteCatalog;

use crate::audio::ExtractedTrack;
use crate::error::CatalogResult;
use crate::sync::SyncAuditEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: Uuid,
    pub path: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: u64,
    pub fingerprint: String,
    pub rating: u8, // 0-5, owned by the UI side, never written by sync
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackRecord {
    /// First sighting of a path
    pub fn new(path: impl Into<String>, extracted: ExtractedTrack) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            title: extracted.title,
            artist: extracted.artist,
            album: extracted.album,
            duration_ms: extracted.duration_ms,
            fingerprint: extracted.fingerprint,
            rating: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the file-derived fields after a fingerprint change.
    /// Rating, id and created_at stay as they were.
    pub fn refresh_from(&mut self, extracted: ExtractedTrack) {
        self.title = extracted.title;
        self.artist = extracted.artist;
        self.album = extracted.album;
        self.duration_ms = extracted.duration_ms;
        self.fingerprint = extracted.fingerprint;
        self.updated_at = Utc::now();
    }
}

/// Durable history of sync runs
pub trait AuditLog {
    fn append_sync(&mut self, entry: &SyncAuditEntry) -> CatalogResult<()>;

    /// Newest first
    fn recent_syncs(&self, limit: usize) -> CatalogResult<Vec<SyncAuditEntry>>;
}

/// Transactional track table keyed by path.
///
/// `update` must only rewrite title/artist/album/duration/fingerprint/updated_at;
/// rating and tag links belong to other collaborators. Deleting a track is
/// expected to cascade to its tag and playlist links.
pub trait CatalogStore: AuditLog + Send {
    fn find_all_paths(&self) -> CatalogResult<BTreeSet<String>>;
    fn find_by_path(&self, path: &str) -> CatalogResult<Option<TrackRecord>>;
    fn insert(&mut self, record: &TrackRecord) -> CatalogResult<()>;
    fn update(&mut self, record: &TrackRecord) -> CatalogResult<()>;
    fn delete_by_path(&mut self, path: &str) -> CatalogResult<bool>;

    fn begin_transaction(&mut self) -> CatalogResult<()>;
    fn commit(&mut self) -> CatalogResult<()>;
    fn rollback(&mut self) -> CatalogResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extracted(fingerprint: &str, title: &str) -> ExtractedTrack {
        ExtractedTrack {
            fingerprint: fingerprint.to_string(),
            title: Some(title.to_string()),
            artist: Some("Artist".to_string()),
            album: None,
            duration_ms: 1000,
        }
    }

    #[test]
    fn test_refresh_keeps_identity_and_rating() {
        let mut record = TrackRecord::new("/music/a.mp3", extracted("aaaa", "Old"));
        record.rating = 4;
        let id = record.id;
        let created = record.created_at;

        record.refresh_from(extracted("bbbb", "New"));

        assert_eq!(record.id, id);
        assert_eq!(record.rating, 4);
        assert_eq!(record.created_at, created);
        assert_eq!(record.title.as_deref(), Some("New"));
        assert_eq!(record.fingerprint, "bbbb");
        assert!(record.updated_at >= created);
    }
}
