use std::path::PathBuf;
use thiserror::Error;

/// Input errors - the folder handed to a sync run is unusable.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Folder not found: {}", .0.display())]
    FolderNotFound(PathBuf),

    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
}

/// Per-file failure while fingerprinting. Always carries the offending path.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ExtractError::Io { path, .. } => path,
        }
    }
}

/// Tag-reading failures. The extractor absorbs these and falls back to the filename.
#[derive(Error, Debug)]
pub enum TagError {
    #[error("ID3 error: {0}")]
    Id3(#[from] id3::Error),

    #[error("MP4 tag error: {0}")]
    Mp4(#[from] mp4ameta::Error),

    #[error("Tag error: {0}")]
    Lofty(#[from] lofty::error::LoftyError),

    #[error("No tag reader for {}", .0.display())]
    Unsupported(PathBuf),
}

/// Storage failures. Any of these aborts the run and rolls the transaction back.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Rating must be between 0 and 5, got {0}")]
    InvalidRating(u8),

    #[error("Storage backend failure: {0}")]
    Backend(String),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
