use super::DEFAULT_EXTENSIONS;
use crate::error::ScanError;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Lower-case extensions without the leading dot
    pub extensions: Vec<String>,
    pub follow_links: bool,
    /// Opt-in: skip dotfiles and dot-directories
    pub skip_hidden: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            follow_links: true,
            skip_hidden: false,
        }
    }
}

/// Walks a folder tree and collects the audio files the catalog should know about.
#[derive(Debug, Clone, Default)]
pub struct FolderScanner {
    options: ScanOptions,
}

impl FolderScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut options: ScanOptions) -> Self {
        options.extensions = options
            .extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { options }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Recursively list supported files under `root`.
    ///
    /// Unreadable directories, permission errors and broken links are skipped;
    /// only a missing or non-directory root is an error. Output is sorted by
    /// file name within each directory so repeated scans come back in the same order.
    pub fn scan<P: AsRef<Path>>(&self, root: P) -> Result<Vec<PathBuf>, ScanError> {
        let root = root.as_ref();

        if !root.exists() {
            return Err(ScanError::FolderNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let skip_hidden = self.options.skip_hidden;
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(self.options.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !(skip_hidden && entry.depth() > 0 && is_hidden(entry)));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };

            if entry.file_type().is_file() && self.is_supported_file(entry.path()) {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    pub fn is_supported_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let normalized = ext.to_ascii_lowercase();
                self.options.extensions.contains(&normalized)
            })
            .unwrap_or(false)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map_or(false, |name| name.starts_with('.'))
}
