//! Probe abstraction traits for testability
//!
//! This module defines the trait every discovery strategy implements, along
//! with the values strategies report back to the probe chain. Real strategies
//! (media API mounts, volume scan, USB bus, mount paths) and fake strategies
//! used in tests are interchangeable.
//!
//! # Architecture
//!
//! - `ProbeStrategy` - One independent way of locating the device
//! - `ProbeResult` - What a single attempt produced
//! - `ProbeAttempt` - The chain's record of an attempt, kept for diagnostics
//! - `DeviceRoot` - The validated media root handed to the rest of the pipeline
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use photo_transfer_tool::device::traits::{Confidence, ProbeResult, ProbeStrategy};
//! use std::path::PathBuf;
//!
//! struct FixedPath(PathBuf);
//!
//! impl ProbeStrategy for FixedPath {
//!     fn name(&self) -> &str {
//!         "fixed"
//!     }
//!
//!     fn attempt(&self) -> ProbeResult {
//!         ProbeResult::found(self.0.clone(), Confidence::High)
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};

/// Identifiers that mark a name or label as belonging to an Apple device
pub const APPLE_KEYWORDS: &[&str] = &["iphone", "ipad", "ipod", "apple"];

/// Check whether a volume name, mount point or USB product string looks like
/// an Apple device
pub fn looks_like_apple(label: &str) -> bool {
    let lower = label.to_lowercase();
    APPLE_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

/// How sure a strategy is that its candidate is the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    /// Matched by vendor/product identifiers
    High,
    /// Plausible location without an identifier match
    Low,
}

impl Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Low => write!(f, "low"),
        }
    }
}

/// A path a strategy believes to be the device's media root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCandidate {
    pub path: PathBuf,
    pub confidence: Confidence,
}

/// Result of a single strategy attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// The strategy located a candidate root
    Found(ProbeCandidate),
    /// The strategy does not apply on this platform or in this situation
    NotApplicable(String),
    /// The strategy applied but could not produce a candidate
    Failed(String),
}

impl ProbeResult {
    /// Convenience constructor for `Found`
    pub fn found(path: impl Into<PathBuf>, confidence: Confidence) -> Self {
        ProbeResult::Found(ProbeCandidate {
            path: path.into(),
            confidence,
        })
    }

    pub fn not_applicable(reason: impl Into<String>) -> Self {
        ProbeResult::NotApplicable(reason.into())
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        ProbeResult::Failed(reason.into())
    }
}

/// One independent way of locating the device's media root
///
/// Implementations must not write anything and must not hold state between
/// calls. The chain runs each attempt on its own thread, so an attempt may
/// block on slow platform calls without stalling discovery.
pub trait ProbeStrategy: Send + Sync {
    /// Stable name, used in diagnostics and to disable the strategy by config
    fn name(&self) -> &str;

    /// Attempt to locate the device
    fn attempt(&self) -> ProbeResult;
}

/// What happened when the chain ran one strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum AttemptOutcome {
    /// Candidate passed validation and became the device root
    Accepted { path: PathBuf },
    /// Candidate was produced but failed validation
    Rejected { path: PathBuf, reason: String },
    NotApplicable { reason: String },
    Failed { reason: String },
    /// The strategy overran its time budget and was abandoned
    TimedOut { after_ms: u64 },
}

impl AttemptOutcome {
    pub fn not_applicable(reason: impl Into<String>) -> Self {
        AttemptOutcome::NotApplicable {
            reason: reason.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        AttemptOutcome::Failed {
            reason: reason.into(),
        }
    }

    /// Whether this attempt produced the device root
    pub fn is_accepted(&self) -> bool {
        matches!(self, AttemptOutcome::Accepted { .. })
    }
}

impl Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Accepted { path } => write!(f, "found {}", path.display()),
            AttemptOutcome::Rejected { path, reason } => {
                write!(f, "rejected {}: {}", path.display(), reason)
            }
            AttemptOutcome::NotApplicable { reason } => write!(f, "not applicable: {}", reason),
            AttemptOutcome::Failed { reason } => write!(f, "failed: {}", reason),
            AttemptOutcome::TimedOut { after_ms } => write!(f, "timed out after {} ms", after_ms),
        }
    }
}

/// The chain's record of one strategy attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeAttempt {
    pub strategy: String,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

impl ProbeAttempt {
    pub fn new(strategy: impl Into<String>, outcome: AttemptOutcome) -> Self {
        Self {
            strategy: strategy.into(),
            outcome,
        }
    }
}

impl Display for ProbeAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.outcome)
    }
}

/// Handle to the device's media directory as seen by the host filesystem
///
/// Established once per session by the probe chain and never modified
/// afterwards. Nothing in the crate writes below this path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRoot {
    path: PathBuf,
    mount_path: PathBuf,
    strategy: String,
    confidence: Confidence,
}

impl DeviceRoot {
    pub fn new(
        path: impl Into<PathBuf>,
        mount_path: impl Into<PathBuf>,
        strategy: impl Into<String>,
        confidence: Confidence,
    ) -> Self {
        Self {
            path: path.into(),
            mount_path: mount_path.into(),
            strategy: strategy.into(),
            confidence,
        }
    }

    /// A local folder treated as a device root (used by `convert`)
    pub fn local(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(path.clone(), path, "local", Confidence::High)
    }

    /// Media root to enumerate (the `DCIM` directory when one exists)
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the strategy originally reported
    pub fn mount_path(&self) -> &Path {
        &self.mount_path
    }

    /// Name of the strategy that produced this root
    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }
}

impl Display for DeviceRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (via {}, {} confidence)",
            self.path.display(),
            self.strategy,
            self.confidence
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_apple() {
        assert!(looks_like_apple("Apple iPhone"));
        assert!(looks_like_apple("/Volumes/IPAD"));
        assert!(looks_like_apple("gphoto2:host=Apple_Inc._iPhone_abc"));
        assert!(!looks_like_apple("SanDisk Ultra"));
        assert!(!looks_like_apple("Pixel 8"));
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::High < Confidence::Low);
        let mut levels = vec![Confidence::Low, Confidence::High];
        levels.sort();
        assert_eq!(levels, vec![Confidence::High, Confidence::Low]);
    }

    #[test]
    fn test_attempt_display() {
        let attempt = ProbeAttempt::new("usb-bus", AttemptOutcome::TimedOut { after_ms: 3000 });
        assert_eq!(attempt.to_string(), "usb-bus: timed out after 3000 ms");

        let attempt = ProbeAttempt::new("media-api", AttemptOutcome::not_applicable("no gvfs"));
        assert_eq!(attempt.to_string(), "media-api: not applicable: no gvfs");
        assert!(!attempt.outcome.is_accepted());
    }

    #[test]
    fn test_attempt_serializes_flat() {
        let attempt = ProbeAttempt::new("volume-scan", AttemptOutcome::failed("no volumes"));
        let json = serde_json::to_string(&attempt).unwrap();
        assert!(json.contains("\"strategy\":\"volume-scan\""));
        assert!(json.contains("\"status\":\"failed\""));
        assert!(json.contains("\"reason\":\"no volumes\""));
    }

    #[test]
    fn test_device_root_accessors() {
        let root = DeviceRoot::new("/mnt/phone/DCIM", "/mnt/phone", "mount-paths", Confidence::Low);
        assert_eq!(root.path(), Path::new("/mnt/phone/DCIM"));
        assert_eq!(root.mount_path(), Path::new("/mnt/phone"));
        assert_eq!(root.strategy(), "mount-paths");
        assert_eq!(root.confidence(), Confidence::Low);

        let local = DeviceRoot::local("/tmp/photos");
        assert_eq!(local.strategy(), "local");
        assert_eq!(local.path(), local.mount_path());
    }
}
