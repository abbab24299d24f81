//! Output directory handling
//!
//! Every file lands in the output directory through a temporary file in the
//! same directory that is flushed and then renamed into place, so a crash or
//! a full disk never leaves a partially written photo under a real name.
//! Temporary files are hidden (dot-prefixed) so the enumerator and file
//! browsers ignore any that survive a crash.

use crate::core::error::{Result, TransferError};
use crate::media::enumerator::MediaCandidate;
use log::{debug, trace};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::NamedTempFile;

/// Prefix of in-flight temporary files
pub const TEMP_PREFIX: &str = ".partial-";

/// A prepared, writable output directory
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
    quarantine: PathBuf,
}

impl OutputDir {
    /// Create the directory if needed and check it is writable
    pub fn prepare(root: &Path, quarantine_name: &str) -> io::Result<Self> {
        fs::create_dir_all(root)?;

        // Creating and dropping a temp file proves we can write here
        tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(root)?;

        Ok(Self {
            root: root.to_path_buf(),
            quarantine: root.join(quarantine_name),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn quarantine_dir(&self) -> &Path {
        &self.quarantine
    }

    pub fn target_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Copy `source` into a temporary file inside the output directory
    ///
    /// The source is only ever opened for reading.
    pub fn stage_copy(&self, source: &Path) -> Result<StagedFile> {
        let copy_failure = |message: String| TransferError::CopyFailure {
            filename: source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            message,
        };

        let mut input = File::open(source).map_err(|e| copy_failure(format!("cannot open source: {}", e)))?;
        let modified = input.metadata().and_then(|m| m.modified()).ok();

        let mut temp = new_temp(&self.root).map_err(|e| copy_failure(format!("cannot create temporary file: {}", e)))?;
        let bytes = io::copy(&mut input, temp.as_file_mut()).map_err(|e| copy_failure(e.to_string()))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| copy_failure(format!("flush failed: {}", e)))?;

        trace!("Staged {} bytes from {}", bytes, source.display());
        Ok(StagedFile {
            file: temp,
            bytes,
            modified,
        })
    }

    /// Move a staged copy to its final name in the output directory
    pub fn persist(&self, staged: StagedFile, name: &str) -> Result<PathBuf> {
        self.persist_to(staged, self.target_path(name))
    }

    /// Keep a staged original in the quarantine directory
    pub fn quarantine(&self, staged: StagedFile, name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.quarantine)?;
        let path = self.quarantine.join(name);
        let kept = self.persist_to(staged, path)?;
        debug!("Kept original at {}", kept.display());
        Ok(kept)
    }

    /// Write `bytes` under `name` through a temporary file
    pub fn write_atomic(&self, name: &str, bytes: &[u8], modified: Option<SystemTime>) -> Result<PathBuf> {
        let path = self.target_path(name);
        let write_failure = |message: String| TransferError::EncodeFailure {
            path: path.clone(),
            message,
        };

        let mut temp = new_temp(&self.root).map_err(|e| write_failure(e.to_string()))?;
        temp.write_all(bytes).map_err(|e| write_failure(e.to_string()))?;
        temp.as_file().sync_all().map_err(|e| write_failure(e.to_string()))?;

        if let Some(time) = modified {
            set_modified(temp.as_file(), time);
        }

        temp.persist(&path)
            .map_err(|e| write_failure(e.error.to_string()))?;
        Ok(path)
    }

    fn persist_to(&self, staged: StagedFile, path: PathBuf) -> Result<PathBuf> {
        if let Some(time) = staged.modified {
            set_modified(staged.file.as_file(), time);
        }

        staged
            .file
            .persist(&path)
            .map_err(|e| TransferError::CopyFailure {
                filename: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                message: format!("rename into place failed: {}", e.error),
            })?;
        Ok(path)
    }
}

fn new_temp(dir: &Path) -> io::Result<NamedTempFile> {
    let temp = tempfile::Builder::new().prefix(TEMP_PREFIX).tempfile_in(dir)?;

    // tempfile creates 0600 files; photos should get normal permissions
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file().set_permissions(fs::Permissions::from_mode(0o644))?;
    }

    Ok(temp)
}

fn set_modified(file: &File, time: SystemTime) {
    if let Err(e) = file.set_modified(time) {
        debug!("Could not carry over modification time: {}", e);
    }
}

/// A complete copy of a source file, not yet visible under a real name
///
/// Dropping it deletes the temporary file.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    bytes: u64,
    modified: Option<SystemTime>,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    pub fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(self.file.path())
    }
}

// ============================================================================
// Target naming
// ============================================================================

/// Name a candidate gets in the flat output directory
///
/// HEIC images get a `JPG` extension in the case of the source extension.
pub fn target_name(candidate: &MediaCandidate) -> String {
    if !candidate.kind.is_convertible() {
        return candidate.file_name.clone();
    }

    let path = Path::new(&candidate.file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| candidate.file_name.clone());

    let uppercase = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| !e.chars().any(|c| c.is_lowercase()))
        .unwrap_or(false);

    format!("{}.{}", stem, if uppercase { "JPG" } else { "jpg" })
}

/// Name for a retained original: the claimed target's stem with the
/// source's extension
pub fn retained_name(target: &str, source_file_name: &str) -> String {
    let stem = Path::new(target)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| target.to_string());

    match Path::new(source_file_name).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

/// Insert a `_N` counter before the extension
pub fn with_suffix(name: &str, counter: usize) -> String {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    match path.extension().and_then(|s| s.to_str()) {
        Some(extension) => format!("{}_{}.{}", stem, counter, extension),
        None => format!("{}_{}", stem, counter),
    }
}

/// Names claimed so far in one session
///
/// Two device folders often hold the same file name (`100APPLE/IMG_0001.JPG`
/// and `101APPLE/IMG_0001.JPG`); later claims get a `_1`, `_2`... suffix.
/// Comparison ignores case because the output may be on a case-insensitive
/// filesystem.
#[derive(Debug, Default)]
pub struct TargetNames {
    claimed: HashSet<String>,
}

impl TargetNames {
    pub fn claim(&mut self, desired: &str) -> String {
        if self.claimed.insert(desired.to_lowercase()) {
            return desired.to_string();
        }

        let mut counter = 1;
        loop {
            let candidate = with_suffix(desired, counter);
            if self.claimed.insert(candidate.to_lowercase()) {
                return candidate;
            }
            counter += 1;
        }
    }
}
