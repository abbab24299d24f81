//! Media kind classification

use crate::convert::metadata::is_heif_signature;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Supported image extensions that need no conversion
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "tiff", "tif", "bmp", "dng", "raw",
];

/// Supported video extensions
pub const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "m4v", "avi", "3gp"];

/// HEIC/HEIF extensions
pub const HEIC_EXTENSIONS: &[&str] = &["heic", "heif"];

/// Bytes read from the start of a file to sniff its container
const SNIFF_LEN: usize = 64;

/// Inferred kind of a media file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaKind {
    /// HEIC/HEIF still image, converted to JPEG
    ImageHeic,
    /// Image already in a directly-usable format
    ImageOther,
    Video,
    Unknown,
}

impl MediaKind {
    /// Classify from extension alone
    pub fn from_extension(path: &Path) -> Self {
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_lowercase(),
            None => return MediaKind::Unknown,
        };

        if HEIC_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::ImageHeic
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::ImageOther
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Unknown
        }
    }

    /// Classify from extension and the first bytes of the file
    ///
    /// A HEIF signature wins over the extension. A `.heic` file without the
    /// signature stays `ImageHeic`; the converter rejects it later so the
    /// failure is recorded against the file.
    pub fn classify_bytes(path: &Path, header: &[u8]) -> Self {
        if is_heif_signature(header) {
            return MediaKind::ImageHeic;
        }
        Self::from_extension(path)
    }

    /// Classify a file on disk, reading only its header
    pub fn classify(path: &Path) -> Self {
        let mut header = [0u8; SNIFF_LEN];
        let read = File::open(path)
            .and_then(|mut f| read_up_to(&mut f, &mut header))
            .unwrap_or(0);
        Self::classify_bytes(path, &header[..read])
    }

    /// Whether files of this kind go through the converter
    pub fn is_convertible(&self) -> bool {
        matches!(self, MediaKind::ImageHeic)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MediaKind::ImageHeic => "HEIC",
            MediaKind::ImageOther => "Image",
            MediaKind::Video => "Video",
            MediaKind::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Fill as much of `buf` as the file provides
fn read_up_to(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_heic, write_file};
    use tempfile::TempDir;

    #[test]
    fn test_extension_classification() {
        let cases = [
            ("IMG_0001.HEIC", MediaKind::ImageHeic),
            ("img.heif", MediaKind::ImageHeic),
            ("IMG_0002.JPG", MediaKind::ImageOther),
            ("shot.png", MediaKind::ImageOther),
            ("IMG_0003.DNG", MediaKind::ImageOther),
            ("VID_0004.MOV", MediaKind::Video),
            ("clip.mp4", MediaKind::Video),
            ("IMG_0005.AAE", MediaKind::Unknown),
            ("README", MediaKind::Unknown),
        ];

        for (name, expected) in cases {
            assert_eq!(MediaKind::from_extension(Path::new(name)), expected, "{}", name);
        }
    }

    #[test]
    fn test_signature_overrides_extension() {
        let heic = sample_heic();
        assert_eq!(
            MediaKind::classify_bytes(Path::new("IMG_0001.JPG"), &heic),
            MediaKind::ImageHeic
        );
        assert_eq!(
            MediaKind::classify_bytes(Path::new("noext"), &heic),
            MediaKind::ImageHeic
        );
    }

    #[test]
    fn test_heic_extension_without_signature() {
        assert_eq!(
            MediaKind::classify_bytes(Path::new("IMG_0002.HEIC"), b"corrupted"),
            MediaKind::ImageHeic
        );
    }

    #[test]
    fn test_classify_reads_file_header() {
        let dir = TempDir::new().unwrap();
        let disguised = dir.path().join("photo.jpeg");
        write_file(&disguised, &sample_heic());
        assert_eq!(MediaKind::classify(&disguised), MediaKind::ImageHeic);

        let tiny = dir.path().join("a.mov");
        write_file(&tiny, b"x");
        assert_eq!(MediaKind::classify(&tiny), MediaKind::Video);

        assert_eq!(MediaKind::classify(&dir.path().join("gone.png")), MediaKind::ImageOther);
    }

    #[test]
    fn test_only_heic_is_convertible() {
        assert!(MediaKind::ImageHeic.is_convertible());
        assert!(!MediaKind::ImageOther.is_convertible());
        assert!(!MediaKind::Video.is_convertible());
        assert!(!MediaKind::Unknown.is_convertible());
    }
}
