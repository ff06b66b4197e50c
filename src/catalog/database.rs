use super::{AuditLog, CatalogStore, TrackRecord, MAX_RATING};
use crate::error::{CatalogError, CatalogResult};
use crate::sync::{SyncAuditEntry, SyncStatus};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use uuid::Uuid;

const TRACK_COLUMNS: &str =
    "id, path, title, artist, album, duration_ms, fingerprint, rating, created_at, updated_at";

pub struct SqliteCatalog {
    conn: Connection,
}

impl SqliteCatalog {
    pub fn open<P: AsRef<Path>>(db_path: P) -> CatalogResult<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| CatalogError::Backend(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> CatalogResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> CatalogResult<Self> {
        // Cascades on tracks -> track_tags / playlist_tracks depend on this
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self { conn };
        db.initialize_tables()?;
        Ok(db)
    }

    fn initialize_tables(&self) -> CatalogResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tracks (
                id TEXT PRIMARY KEY,
                path TEXT NOT NULL UNIQUE,
                title TEXT,
                artist TEXT,
                album TEXT,
                duration_ms INTEGER NOT NULL DEFAULT 0,
                fingerprint TEXT NOT NULL,
                rating INTEGER NOT NULL DEFAULT 0 CHECK (rating BETWEEN 0 AND 5),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS track_tags (
                track_id TEXT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
                tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                PRIMARY KEY (track_id, tag_id)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS playlist_tracks (
                playlist_id TEXT NOT NULL,
                track_id TEXT NOT NULL REFERENCES tracks(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                PRIMARY KEY (playlist_id, position)
            )",
            [],
        )?;

        // Audit log of sync runs
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS sync_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                folder_path TEXT NOT NULL,
                started_at TEXT NOT NULL,
                added INTEGER NOT NULL DEFAULT 0,
                updated INTEGER NOT NULL DEFAULT 0,
                removed INTEGER NOT NULL DEFAULT 0,
                skipped INTEGER NOT NULL DEFAULT 0,
                errors INTEGER NOT NULL DEFAULT 0,
                elapsed_ms INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                message TEXT
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sync_history_folder ON sync_history(folder_path, started_at)",
            [],
        )?;

        Ok(())
    }

    pub fn track_count(&self) -> CatalogResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Returns false when no track has that path
    pub fn set_rating(&mut self, path: &str, rating: u8) -> CatalogResult<bool> {
        if rating > MAX_RATING {
            return Err(CatalogError::InvalidRating(rating));
        }
        let changed = self.conn.execute(
            "UPDATE tracks SET rating = ?1 WHERE path = ?2",
            params![rating, path],
        )?;
        Ok(changed > 0)
    }

    /// Link a tag (created on demand) to the track at `path`
    pub fn tag_track(&mut self, path: &str, tag: &str) -> CatalogResult<bool> {
        self.conn
            .execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![tag])?;
        let linked = self.conn.execute(
            "INSERT OR IGNORE INTO track_tags (track_id, tag_id)
             SELECT t.id, g.id FROM tracks t, tags g WHERE t.path = ?1 AND g.name = ?2",
            params![path, tag],
        )?;
        Ok(linked > 0)
    }

    pub fn tags_for(&self, path: &str) -> CatalogResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT g.name FROM tags g
             JOIN track_tags tt ON tt.tag_id = g.id
             JOIN tracks t ON t.id = tt.track_id
             WHERE t.path = ?1 ORDER BY g.name",
        )?;

        let tags = stmt
            .query_map(params![path], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(tags)
    }

    /// Number of tag links across all tracks; cascades show up here
    pub fn tag_link_count(&self) -> CatalogResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM track_tags", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn row_to_track(row: &Row) -> rusqlite::Result<TrackRecord> {
        let id_str: String = row.get(0)?;
        let id = Uuid::parse_str(&id_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

        Ok(TrackRecord {
            id,
            path: row.get(1)?,
            title: row.get(2)?,
            artist: row.get(3)?,
            album: row.get(4)?,
            duration_ms: row.get::<_, i64>(5)?.max(0) as u64,
            fingerprint: row.get(6)?,
            rating: row.get(7)?,
            created_at: parse_timestamp(row, 8)?,
            updated_at: parse_timestamp(row, 9)?,
        })
    }

    fn row_to_audit_entry(row: &Row) -> rusqlite::Result<SyncAuditEntry> {
        let status_str: String = row.get(8)?;
        let status = status_str
            .parse::<SyncStatus>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;

        Ok(SyncAuditEntry {
            folder_path: row.get(0)?,
            timestamp: parse_timestamp(row, 1)?,
            added: row.get::<_, i64>(2)? as u64,
            updated: row.get::<_, i64>(3)? as u64,
            removed: row.get::<_, i64>(4)? as u64,
            skipped: row.get::<_, i64>(5)? as u64,
            errors: row.get::<_, i64>(6)? as u64,
            elapsed_ms: row.get::<_, i64>(7)? as u64,
            status,
            message: row.get(9)?,
        })
    }
}

fn parse_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl CatalogStore for SqliteCatalog {
    fn find_all_paths(&self) -> CatalogResult<BTreeSet<String>> {
        let mut stmt = self.conn.prepare("SELECT path FROM tracks")?;
        let paths = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<BTreeSet<String>, _>>()?;
        Ok(paths)
    }

    fn find_by_path(&self, path: &str) -> CatalogResult<Option<TrackRecord>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT {} FROM tracks WHERE path = ?1", TRACK_COLUMNS))?;
        let record = stmt
            .query_row(params![path], Self::row_to_track)
            .optional()?;
        Ok(record)
    }

    fn insert(&mut self, record: &TrackRecord) -> CatalogResult<()> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "INSERT INTO tracks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            TRACK_COLUMNS
        ))?;
        stmt.execute(params![
            record.id.to_string(),
            record.path,
            record.title,
            record.artist,
            record.album,
            record.duration_ms as i64,
            record.fingerprint,
            record.rating,
            record.created_at.to_rfc3339(),
            record.updated_at.to_rfc3339(),
        ])?;
        Ok(())
    }

    fn update(&mut self, record: &TrackRecord) -> CatalogResult<()> {
        // rating and tag links are deliberately absent from this statement
        let mut stmt = self.conn.prepare_cached(
            "UPDATE tracks
             SET title = ?1, artist = ?2, album = ?3, duration_ms = ?4,
                 fingerprint = ?5, updated_at = ?6
             WHERE path = ?7",
        )?;
        stmt.execute(params![
            record.title,
            record.artist,
            record.album,
            record.duration_ms as i64,
            record.fingerprint,
            record.updated_at.to_rfc3339(),
            record.path,
        ])?;
        Ok(())
    }

    fn delete_by_path(&mut self, path: &str) -> CatalogResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM tracks WHERE path = ?1", params![path])?;
        Ok(deleted > 0)
    }

    fn begin_transaction(&mut self) -> CatalogResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> CatalogResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> CatalogResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}

impl AuditLog for SqliteCatalog {
    fn append_sync(&mut self, entry: &SyncAuditEntry) -> CatalogResult<()> {
        self.conn.execute(
            "INSERT INTO sync_history
             (folder_path, started_at, added, updated, removed, skipped, errors,
              elapsed_ms, status, message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.folder_path,
                entry.timestamp.to_rfc3339(),
                entry.added as i64,
                entry.updated as i64,
                entry.removed as i64,
                entry.skipped as i64,
                entry.errors as i64,
                entry.elapsed_ms as i64,
                entry.status.as_str(),
                entry.message,
            ],
        )?;
        Ok(())
    }

    fn recent_syncs(&self, limit: usize) -> CatalogResult<Vec<SyncAuditEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT folder_path, started_at, added, updated, removed, skipped, errors,
                    elapsed_ms, status, message
             FROM sync_history ORDER BY id DESC LIMIT ?1",
        )?;

        let entries = stmt
            .query_map(params![limit as i64], Self::row_to_audit_entry)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ExtractedTrack;
    use tempfile::tempdir;

    fn record(path: &str, fingerprint: &str) -> TrackRecord {
        TrackRecord::new(
            path,
            ExtractedTrack {
                fingerprint: fingerprint.to_string(),
                title: Some("Title".to_string()),
                artist: Some("Artist".to_string()),
                album: Some("Album".to_string()),
                duration_ms: 215_000,
            },
        )
    }

    #[test]
    fn test_insert_and_find_round_trip() {
        let mut db = SqliteCatalog::open_in_memory().unwrap();
        let original = record("/music/a.mp3", "0011223344556677");
        db.insert(&original).unwrap();

        let found = db.find_by_path("/music/a.mp3").unwrap().unwrap();
        assert_eq!(found.id, original.id);
        assert_eq!(found.fingerprint, original.fingerprint);
        assert_eq!(found.duration_ms, 215_000);
        assert_eq!(found.rating, 0);
        assert_eq!(found.created_at.timestamp(), original.created_at.timestamp());

        assert!(db.find_by_path("/music/missing.mp3").unwrap().is_none());
        assert_eq!(
            db.find_all_paths().unwrap().into_iter().collect::<Vec<_>>(),
            vec!["/music/a.mp3".to_string()]
        );
    }

    #[test]
    fn test_duplicate_path_is_rejected() {
        let mut db = SqliteCatalog::open_in_memory().unwrap();
        db.insert(&record("/music/a.mp3", "aa")).unwrap();
        assert!(db.insert(&record("/music/a.mp3", "bb")).is_err());
        assert_eq!(db.track_count().unwrap(), 1);
    }

    #[test]
    fn test_update_leaves_rating_and_tags_alone() {
        let mut db = SqliteCatalog::open_in_memory().unwrap();
        let mut track = record("/music/a.mp3", "aa");
        db.insert(&track).unwrap();
        assert!(db.set_rating("/music/a.mp3", 5).unwrap());
        assert!(db.tag_track("/music/a.mp3", "workout").unwrap());

        // stale in-memory rating must not leak into the row
        track.rating = 1;
        track.fingerprint = "bb".to_string();
        track.title = Some("Retitled".to_string());
        db.update(&track).unwrap();

        let stored = db.find_by_path("/music/a.mp3").unwrap().unwrap();
        assert_eq!(stored.rating, 5);
        assert_eq!(stored.fingerprint, "bb");
        assert_eq!(stored.title.as_deref(), Some("Retitled"));
        assert_eq!(db.tags_for("/music/a.mp3").unwrap(), vec!["workout".to_string()]);
    }

    #[test]
    fn test_delete_cascades_tag_links() {
        let mut db = SqliteCatalog::open_in_memory().unwrap();
        db.insert(&record("/music/a.mp3", "aa")).unwrap();
        db.insert(&record("/music/b.mp3", "bb")).unwrap();
        db.tag_track("/music/a.mp3", "chill").unwrap();
        db.tag_track("/music/b.mp3", "chill").unwrap();
        assert_eq!(db.tag_link_count().unwrap(), 2);

        assert!(db.delete_by_path("/music/a.mp3").unwrap());
        assert!(!db.delete_by_path("/music/a.mp3").unwrap());
        assert_eq!(db.tag_link_count().unwrap(), 1);
    }

    #[test]
    fn test_rollback_discards_writes() {
        let mut db = SqliteCatalog::open_in_memory().unwrap();
        db.insert(&record("/music/keep.mp3", "aa")).unwrap();

        db.begin_transaction().unwrap();
        db.insert(&record("/music/new.mp3", "bb")).unwrap();
        db.delete_by_path("/music/keep.mp3").unwrap();
        db.rollback().unwrap();

        let paths: Vec<_> = db.find_all_paths().unwrap().into_iter().collect();
        assert_eq!(paths, vec!["/music/keep.mp3".to_string()]);

        // no open transaction: rollback is a no-op
        db.rollback().unwrap();
    }

    #[test]
    fn test_invalid_rating_is_refused() {
        let mut db = SqliteCatalog::open_in_memory().unwrap();
        db.insert(&record("/music/a.mp3", "aa")).unwrap();
        assert!(matches!(
            db.set_rating("/music/a.mp3", 6),
            Err(CatalogError::InvalidRating(6))
        ));
        assert!(!db.set_rating("/music/nope.mp3", 3).unwrap());
    }

    #[test]
    fn test_audit_log_newest_first() {
        let mut db = SqliteCatalog::open_in_memory().unwrap();
        for (i, status) in [SyncStatus::Completed, SyncStatus::Cancelled, SyncStatus::Error]
            .into_iter()
            .enumerate()
        {
            db.append_sync(&SyncAuditEntry {
                folder_path: "/music".to_string(),
                timestamp: Utc::now(),
                added: i as u64,
                updated: 0,
                removed: 0,
                skipped: 0,
                errors: 0,
                elapsed_ms: 12,
                status,
                message: (status == SyncStatus::Error).then(|| "disk full".to_string()),
            })
            .unwrap();
        }

        let entries = db.recent_syncs(2).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, SyncStatus::Error);
        assert_eq!(entries[0].message.as_deref(), Some("disk full"));
        assert_eq!(entries[0].added, 2);
        assert_eq!(entries[1].status, SyncStatus::Cancelled);
    }

    #[test]
    fn test_open_creates_parent_directories_and_persists() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested/dir/catalog.db");

        {
            let mut db = SqliteCatalog::open(&db_path).unwrap();
            db.insert(&record("/music/a.mp3", "aa")).unwrap();
        }

        let db = SqliteCatalog::open(&db_path).unwrap();
        assert_eq!(db.track_count().unwrap(), 1);
    }
}
