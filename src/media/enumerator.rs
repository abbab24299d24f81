//! Media enumeration
//!
//! Walks a device root and yields one `MediaCandidate` per visible, non-empty
//! media file. The walk is lazy and sorted by file name at every directory
//! level, so two passes over an unchanged device produce the same sequence.

use crate::device::traits::DeviceRoot;
use crate::media::kind::MediaKind;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// One file discovered on the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCandidate {
    /// Absolute source path
    pub path: PathBuf,
    pub kind: MediaKind,
    pub size: u64,
    pub file_name: String,
    /// Path relative to the device root, for diagnostics
    pub relative_path: PathBuf,
}

impl MediaCandidate {
    /// Build a candidate for a single local file
    pub fn from_path(path: &Path, root: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            kind: MediaKind::classify(path),
            size: metadata.len(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            relative_path: path.strip_prefix(root).unwrap_or(path).to_path_buf(),
        })
    }
}

/// Enumeration settings
#[derive(Debug, Clone, Default)]
pub struct EnumerationOptions {
    /// Also yield files whose kind could not be determined
    pub include_unknown: bool,
}

/// Counters for one enumeration pass
#[derive(Debug, Clone, Default)]
pub struct EnumerationStats {
    pub yielded: usize,
    pub skipped_empty: usize,
    pub skipped_unknown: usize,
    pub walk_errors: usize,
}

type VisibleEntries = walkdir::FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>;

/// Lazy iterator over the media files below a device root
pub struct MediaEnumerator {
    walker: VisibleEntries,
    root: PathBuf,
    options: EnumerationOptions,
    stats: EnumerationStats,
}

impl MediaEnumerator {
    /// Counters so far
    pub fn stats(&self) -> &EnumerationStats {
        &self.stats
    }

    fn candidate(&mut self, entry: DirEntry) -> Option<MediaCandidate> {
        if !entry.file_type().is_file() {
            return None;
        }

        let size = match entry.metadata() {
            Ok(m) => m.len(),
            Err(e) => {
                warn!("Cannot stat {}: {}", entry.path().display(), e);
                self.stats.walk_errors += 1;
                return None;
            }
        };

        if size == 0 {
            debug!("Skipping empty file {}", entry.path().display());
            self.stats.skipped_empty += 1;
            return None;
        }

        let kind = MediaKind::classify(entry.path());
        if kind == MediaKind::Unknown && !self.options.include_unknown {
            debug!("Skipping unrecognized file {}", entry.path().display());
            self.stats.skipped_unknown += 1;
            return None;
        }

        let path = entry.into_path();
        let relative_path = path.strip_prefix(&self.root).unwrap_or(&path).to_path_buf();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.stats.yielded += 1;
        Some(MediaCandidate {
            path,
            kind,
            size,
            file_name,
            relative_path,
        })
    }
}

impl Iterator for MediaEnumerator {
    type Item = MediaCandidate;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    self.stats.walk_errors += 1;
                    continue;
                }
            };

            if let Some(candidate) = self.candidate(entry) {
                return Some(candidate);
            }
        }
    }
}

/// Enumerate the media files below `root`
///
/// Each call starts a fresh walk of the device.
pub fn enumerate(root: &DeviceRoot, options: EnumerationOptions) -> MediaEnumerator {
    enumerate_path(root.path(), options)
}

/// Enumerate the media files below a plain directory
pub fn enumerate_path(root: &Path, options: EnumerationOptions) -> MediaEnumerator {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(is_visible as fn(&DirEntry) -> bool);

    MediaEnumerator {
        walker,
        root: root.to_path_buf(),
        options,
        stats: EnumerationStats::default(),
    }
}

/// The root itself is always visible; below it, hidden entries are pruned
fn is_visible(entry: &DirEntry) -> bool {
    entry.depth() == 0 || !is_hidden(entry)
}

fn is_hidden(entry: &DirEntry) -> bool {
    if entry.file_name().to_string_lossy().starts_with('.') {
        return true;
    }
    has_hidden_attribute(entry)
}

#[cfg(windows)]
fn has_hidden_attribute(entry: &DirEntry) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    const FILE_ATTRIBUTE_SYSTEM: u32 = 0x4;

    entry
        .metadata()
        .map(|m| m.file_attributes() & (FILE_ATTRIBUTE_HIDDEN | FILE_ATTRIBUTE_SYSTEM) != 0)
        .unwrap_or(false)
}

#[cfg(not(windows))]
fn has_hidden_attribute(_entry: &DirEntry) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{device_tree, sample_heic, write_file};

    fn names(candidates: &[MediaCandidate]) -> Vec<String> {
        candidates
            .iter()
            .map(|c| c.relative_path.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    fn root_of(dir: &tempfile::TempDir) -> DeviceRoot {
        DeviceRoot::local(dir.path().join("DCIM"))
    }

    #[test]
    fn test_deterministic_sorted_order() {
        let heic = sample_heic();
        let device = device_tree(&[
            ("101APPLE/IMG_0100.JPG", b"jpeg"),
            ("100APPLE/IMG_0002.MOV", b"mov"),
            ("100APPLE/IMG_0001.HEIC", &heic),
        ]);
        let root = root_of(&device);

        let first: Vec<_> = enumerate(&root, EnumerationOptions::default()).collect();
        let second: Vec<_> = enumerate(&root, EnumerationOptions::default()).collect();

        assert_eq!(
            names(&first),
            vec![
                "100APPLE/IMG_0001.HEIC",
                "100APPLE/IMG_0002.MOV",
                "101APPLE/IMG_0100.JPG"
            ]
        );
        assert_eq!(first, second);
        assert_eq!(first[0].kind, MediaKind::ImageHeic);
        assert_eq!(first[1].kind, MediaKind::Video);
        assert_eq!(first[2].kind, MediaKind::ImageOther);
        assert_eq!(first[2].size, 4);
        assert_eq!(first[2].file_name, "IMG_0100.JPG");
    }

    #[test]
    fn test_hidden_and_empty_files_excluded() {
        let device = device_tree(&[
            ("100APPLE/IMG_0001.JPG", b"jpeg"),
            ("100APPLE/._IMG_0001.JPG", b"appledouble"),
            ("100APPLE/IMG_0002.JPG", b""),
            (".thumbnails/IMG_0003.JPG", b"thumb"),
        ]);

        let mut enumerator = enumerate(&root_of(&device), EnumerationOptions::default());
        let found: Vec<_> = enumerator.by_ref().collect();

        assert_eq!(names(&found), vec!["100APPLE/IMG_0001.JPG"]);
        assert_eq!(enumerator.stats().skipped_empty, 1);
        assert_eq!(enumerator.stats().yielded, 1);
    }

    #[test]
    fn test_unknown_files_need_opt_in() {
        let device = device_tree(&[
            ("100APPLE/IMG_0001.JPG", b"jpeg"),
            ("100APPLE/IMG_0001.AAE", b"<plist/>"),
        ]);
        let root = root_of(&device);

        let default: Vec<_> = enumerate(&root, EnumerationOptions::default()).collect();
        assert_eq!(default.len(), 1);

        let all: Vec<_> = enumerate(
            &root,
            EnumerationOptions {
                include_unknown: true,
            },
        )
        .collect();
        assert_eq!(names(&all), vec!["100APPLE/IMG_0001.AAE", "100APPLE/IMG_0001.JPG"]);
        assert_eq!(all[0].kind, MediaKind::Unknown);
    }

    #[test]
    fn test_restartable_sees_new_files() {
        let device = device_tree(&[("100APPLE/IMG_0001.JPG", b"jpeg")]);
        let root = root_of(&device);

        assert_eq!(enumerate(&root, EnumerationOptions::default()).count(), 1);
        write_file(&device.path().join("DCIM/100APPLE/IMG_0002.JPG"), b"jpeg");
        assert_eq!(enumerate(&root, EnumerationOptions::default()).count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_not_followed() {
        let outside = tempfile::TempDir::new().unwrap();
        write_file(&outside.path().join("IMG_9999.JPG"), b"outside");

        let device = device_tree(&[("100APPLE/IMG_0001.JPG", b"jpeg")]);
        std::os::unix::fs::symlink(outside.path(), device.path().join("DCIM/linked")).unwrap();

        let found: Vec<_> = enumerate(&root_of(&device), EnumerationOptions::default()).collect();
        assert_eq!(names(&found), vec!["100APPLE/IMG_0001.JPG"]);
    }

    #[test]
    fn test_candidate_from_path() {
        let device = device_tree(&[("100APPLE/IMG_0001.HEIC", &sample_heic())]);
        let root = device.path().join("DCIM");
        let path = root.join("100APPLE/IMG_0001.HEIC");

        let candidate = MediaCandidate::from_path(&path, &root).unwrap();
        assert_eq!(candidate.kind, MediaKind::ImageHeic);
        assert_eq!(candidate.file_name, "IMG_0001.HEIC");
        assert_eq!(candidate.relative_path, Path::new("100APPLE").join("IMG_0001.HEIC"));
    }
}
