pub mod fingerprint;
pub mod scanner;
pub mod tags;

pub use fingerprint::{ExtractedTrack, Fingerprint, FingerprintExtractor};
pub use scanner::{FolderScanner, ScanOptions};
pub use tags::{FileTagReader, TagInfo, TagReader};

use std::path::Path;

/// Extensions picked up by a default scan
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "oga", "opus", "mp4", "m4a", "aac", "wav",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Flac,
    Ogg,
    Mp4,
    Wav,
    Unknown,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp3" => AudioFormat::Mp3,
            "flac" => AudioFormat::Flac,
            "ogg" | "oga" | "opus" => AudioFormat::Ogg,
            "mp4" | "m4a" | "aac" => AudioFormat::Mp4,
            "wav" => AudioFormat::Wav,
            _ => AudioFormat::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(AudioFormat::from_extension)
            .unwrap_or(AudioFormat::Unknown)
    }
}

/// File stem used as a stand-in title when tags are missing or unreadable
pub(crate) fn fallback_title(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(AudioFormat::from_extension("MP3"), AudioFormat::Mp3);
        assert_eq!(AudioFormat::from_extension("m4a"), AudioFormat::Mp4);
        assert_eq!(AudioFormat::from_extension("opus"), AudioFormat::Ogg);
        assert_eq!(AudioFormat::from_extension("txt"), AudioFormat::Unknown);
    }

    #[test]
    fn test_fallback_title_strips_extension() {
        assert_eq!(fallback_title(Path::new("/music/Some Song.live.flac")), "Some Song.live");
        assert_eq!(fallback_title(Path::new("/music/noext")), "noext");
    }
}
