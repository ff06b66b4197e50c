use super::fallback_title;
use super::tags::{FileTagReader, TagReader};
use crate::error::ExtractError;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use xxhash_rust::xxh64::Xxh64;

/// 1 MiB. Tag rewrites and re-encodes land inside this window in practice.
pub const DEFAULT_PREFIX_BYTES: u64 = 1024 * 1024;

const READ_CHUNK: usize = 64 * 1024;

/// xxhash64 over a bounded prefix of the file.
///
/// Only a change-detection token: equal means "assume unchanged", nothing more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// What the engine needs from one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTrack {
    pub fingerprint: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: u64,
}

#[derive(Clone)]
pub struct FingerprintExtractor {
    prefix_bytes: u64,
    tag_reader: Arc<dyn TagReader>,
}

impl FingerprintExtractor {
    pub fn new() -> Self {
        Self {
            prefix_bytes: DEFAULT_PREFIX_BYTES,
            tag_reader: Arc::new(FileTagReader::new()),
        }
    }

    pub fn with_prefix_bytes(mut self, prefix_bytes: u64) -> Self {
        self.prefix_bytes = prefix_bytes.max(1);
        self
    }

    pub fn with_tag_reader<R: TagReader + 'static>(mut self, reader: R) -> Self {
        self.tag_reader = Arc::new(reader);
        self
    }

    pub fn prefix_bytes(&self) -> u64 {
        self.prefix_bytes
    }

    /// Hash at most `prefix_bytes` from the start of the file
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint, ExtractError> {
        let io_err = |source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(io_err)?;
        let mut reader = file.take(self.prefix_bytes);
        let mut hasher = Xxh64::new(0);
        let mut buffer = vec![0u8; READ_CHUNK];

        loop {
            let read = reader.read(&mut buffer).map_err(io_err)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(Fingerprint(hasher.digest()))
    }

    /// Fingerprint plus descriptive fields.
    ///
    /// Only I/O on the file itself fails this call. A tag read failure falls back
    /// to the file stem as title with everything else empty.
    pub fn extract(&self, path: &Path) -> Result<ExtractedTrack, ExtractError> {
        let fingerprint = self.fingerprint(path)?;

        let tags = match self.tag_reader.read_tags(path) {
            Ok(tags) => tags,
            Err(e) => {
                debug!("Tag read failed for {}, using filename: {}", path.display(), e);
                Default::default()
            }
        };

        Ok(ExtractedTrack {
            fingerprint: fingerprint.to_hex(),
            title: Some(tags.title.unwrap_or_else(|| fallback_title(path))),
            artist: tags.artist,
            album: tags.album,
            duration_ms: tags.duration_ms.unwrap_or(0),
        })
    }
}

impl Default for FingerprintExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FingerprintExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FingerprintExtractor")
            .field("prefix_bytes", &self.prefix_bytes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::TagInfo;
    use crate::error::TagError;
    use std::fs;
    use tempfile::tempdir;
    use xxhash_rust::xxh64::xxh64;

    struct FixedTags(TagInfo);

    impl TagReader for FixedTags {
        fn read_tags(&self, _path: &Path) -> Result<TagInfo, TagError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenTags;

    impl TagReader for BrokenTags {
        fn read_tags(&self, path: &Path) -> Result<TagInfo, TagError> {
            Err(TagError::Unsupported(path.to_path_buf()))
        }
    }

    #[test]
    fn test_fingerprint_matches_one_shot_hash_of_prefix() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("long.flac");
        let bytes: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &bytes).unwrap();

        let extractor = FingerprintExtractor::new().with_prefix_bytes(100_000);
        let fp = extractor.fingerprint(&path).unwrap();
        assert_eq!(fp.0, xxh64(&bytes[..100_000], 0));
        assert_eq!(fp.to_hex().len(), 16);
    }

    #[test]
    fn test_changes_past_the_prefix_are_invisible() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("song.mp3");
        let mut bytes = vec![7u8; 4096];
        fs::write(&path, &bytes).unwrap();

        let extractor = FingerprintExtractor::new().with_prefix_bytes(1024);
        let before = extractor.fingerprint(&path).unwrap();

        bytes[3000] = 9;
        fs::write(&path, &bytes).unwrap();
        assert_eq!(extractor.fingerprint(&path).unwrap(), before);

        bytes[10] = 9;
        fs::write(&path, &bytes).unwrap();
        assert_ne!(extractor.fingerprint(&path).unwrap(), before);
    }

    #[test]
    fn test_short_file_hashes_whole_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tiny.wav");
        fs::write(&path, b"abc").unwrap();

        let fp = FingerprintExtractor::new().fingerprint(&path).unwrap();
        assert_eq!(fp.0, xxh64(b"abc", 0));
    }

    #[test]
    fn test_tag_failure_falls_back_to_file_stem() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("Artist - Title.mp3");
        fs::write(&path, b"garbage").unwrap();

        let extracted = FingerprintExtractor::new()
            .with_tag_reader(BrokenTags)
            .extract(&path)
            .unwrap();

        assert_eq!(extracted.title.as_deref(), Some("Artist - Title"));
        assert_eq!(extracted.artist, None);
        assert_eq!(extracted.album, None);
        assert_eq!(extracted.duration_ms, 0);
        assert_eq!(extracted.fingerprint, format!("{:016x}", xxh64(b"garbage", 0)));
    }

    #[test]
    fn test_tags_are_carried_through() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.ogg");
        fs::write(&path, b"data").unwrap();

        let extractor = FingerprintExtractor::new().with_tag_reader(FixedTags(TagInfo {
            title: None,
            artist: Some("Artist".into()),
            album: Some("Album".into()),
            duration_ms: Some(1234),
        }));
        let extracted = extractor.extract(&path).unwrap();

        assert_eq!(extracted.title.as_deref(), Some("x"));
        assert_eq!(extracted.artist.as_deref(), Some("Artist"));
        assert_eq!(extracted.album.as_deref(), Some("Album"));
        assert_eq!(extracted.duration_ms, 1234);
    }

    #[test]
    fn test_missing_file_is_an_error_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.mp3");

        let err = FingerprintExtractor::new().extract(&path).unwrap_err();
        assert_eq!(err.path(), &path);
    }
}
