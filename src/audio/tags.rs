use super::AudioFormat;
use crate::error::TagError;
use id3::TagLike;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::tag::Accessor;
use std::path::Path;

/// The handful of descriptive fields the catalog keeps per track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: Option<u64>,
}

/// Reads descriptive tags from a single file. May fail per file.
pub trait TagReader: Send + Sync {
    fn read_tags(&self, path: &Path) -> Result<TagInfo, TagError>;
}

/// Default reader: id3 for MP3, mp4ameta for the MP4 family, lofty for everything else
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTagReader;

impl FileTagReader {
    pub fn new() -> Self {
        Self
    }

    fn read_id3(&self, path: &Path) -> Result<TagInfo, TagError> {
        let tag = id3::Tag::read_from_path(path)?;
        Ok(TagInfo {
            title: non_empty(tag.title()),
            artist: non_empty(tag.artist()),
            album: non_empty(tag.album()),
            duration_ms: tag.duration().map(|d| d as u64),
        })
    }

    fn read_mp4(&self, path: &Path) -> Result<TagInfo, TagError> {
        let tag = mp4ameta::Tag::read_from_path(path)?;
        Ok(TagInfo {
            title: non_empty(tag.title()),
            artist: non_empty(tag.artist()),
            album: non_empty(tag.album()),
            duration_ms: tag.duration().map(|d| d.as_millis() as u64),
        })
    }

    fn read_lofty(&self, path: &Path) -> Result<TagInfo, TagError> {
        let tagged = lofty::read_from_path(path)?;
        let duration = tagged.properties().duration();
        let duration_ms = (!duration.is_zero()).then(|| duration.as_millis() as u64);

        let mut info = TagInfo {
            duration_ms,
            ..TagInfo::default()
        };

        if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
            info.title = non_empty(tag.title().as_deref());
            info.artist = non_empty(tag.artist().as_deref());
            info.album = non_empty(tag.album().as_deref());
        }

        Ok(info)
    }

    /// Feature-gated duration probing using symphonia codec
    #[cfg(feature = "probe")]
    fn probe_duration_ms(&self, path: &Path) -> Option<u64> {
        use symphonia::core::codecs::CODEC_TYPE_NULL;
        use symphonia::core::formats::FormatOptions;
        use symphonia::core::io::MediaSourceStream;
        use symphonia::core::meta::MetadataOptions;
        use symphonia::core::probe::Hint;

        let file = std::fs::File::open(path).ok()?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .ok()?;

        let track = probed
            .format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)?;

        let (time_base, n_frames) = (track.codec_params.time_base?, track.codec_params.n_frames?);
        let time = time_base.calc_time(n_frames);
        Some(time.seconds * 1000 + (time.frac * 1000.0) as u64)
    }
}

impl TagReader for FileTagReader {
    fn read_tags(&self, path: &Path) -> Result<TagInfo, TagError> {
        #[allow(unused_mut)]
        let mut info = match AudioFormat::from_path(path) {
            AudioFormat::Mp3 => self.read_id3(path)?,
            AudioFormat::Mp4 => self.read_mp4(path)?,
            AudioFormat::Flac | AudioFormat::Ogg | AudioFormat::Wav => self.read_lofty(path)?,
            AudioFormat::Unknown => return Err(TagError::Unsupported(path.to_path_buf())),
        };

        #[cfg(feature = "probe")]
        {
            if info.duration_ms.is_none() {
                info.duration_ms = self.probe_duration_ms(path);
            }
        }

        Ok(info)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_garbage_mp3_is_an_error_not_a_panic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.mp3");
        fs::write(&path, b"definitely not an mpeg stream").unwrap();

        assert!(FileTagReader::new().read_tags(&path).is_err());
    }

    #[test]
    fn test_garbage_flac_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.flac");
        fs::write(&path, b"fLaC but then nothing sensible").unwrap();

        assert!(FileTagReader::new().read_tags(&path).is_err());
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        let result = FileTagReader::new().read_tags(Path::new("/tmp/readme.txt"));
        assert!(matches!(result, Err(TagError::Unsupported(_))));
    }

    #[test]
    fn test_id3_tags_are_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tagged.mp3");
        fs::write(&path, b"").unwrap();

        let mut tag = id3::Tag::new();
        tag.set_title("Beach Weather");
        tag.set_artist("The Maine");
        tag.set_album("  ");
        tag.set_duration(183_000);
        tag.write_to_path(&path, id3::Version::Id3v24).unwrap();

        let info = FileTagReader::new().read_tags(&path).unwrap();
        assert_eq!(info.title.as_deref(), Some("Beach Weather"));
        assert_eq!(info.artist.as_deref(), Some("The Maine"));
        assert_eq!(info.album, None);
        assert_eq!(info.duration_ms, Some(183_000));
    }

    #[test]
    fn test_non_empty_trims() {
        assert_eq!(non_empty(Some("  x ")), Some("x".to_string()));
        assert_eq!(non_empty(Some("   ")), None);
        assert_eq!(non_empty(None), None);
    }
}
