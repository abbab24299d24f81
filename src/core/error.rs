//! Error types for the photo transfer tool
//!
//! Each layer has its own error type. Only discovery errors and an unusable
//! output directory stop a session; everything else is recorded against the
//! file it happened to.

use crate::device::traits::ProbeAttempt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// No usable device root could be established
#[derive(Error, Debug, Clone)]
pub enum DiscoveryError {
    /// Every probe strategy was tried and none produced a valid root
    #[error(
        "No device found. Make sure your iPhone is connected, unlocked and trusted.\n{}",
        format_attempts(.attempts)
    )]
    NotFound { attempts: Vec<ProbeAttempt> },

    /// The manually supplied device path cannot be read
    #[error("Device path '{}' is not usable: {reason}", path.display())]
    InvalidManualPath { path: PathBuf, reason: String },
}

impl DiscoveryError {
    /// Strategies attempted before giving up (empty for manual paths)
    pub fn attempts(&self) -> &[ProbeAttempt] {
        match self {
            DiscoveryError::NotFound { attempts } => attempts,
            DiscoveryError::InvalidManualPath { .. } => &[],
        }
    }
}

fn format_attempts(attempts: &[ProbeAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("  - {}", a))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Category of a conversion failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionErrorKind {
    /// Container is corrupt, unsupported, or not HEIF at all
    DecodeFailure,
    /// The Exif block does not fit in a single JPEG APP1 segment
    MetadataOverflow,
    /// The converted image could not be encoded or written out
    EncodeFailure,
}

impl fmt::Display for ConversionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversionErrorKind::DecodeFailure => "decode failure",
            ConversionErrorKind::MetadataOverflow => "metadata overflow",
            ConversionErrorKind::EncodeFailure => "encode failure",
        };
        f.write_str(name)
    }
}

/// Error returned by the format converter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ConversionError {
    pub kind: ConversionErrorKind,
    pub message: String,
}

impl ConversionError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: ConversionErrorKind::DecodeFailure,
            message: message.into(),
        }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self {
            kind: ConversionErrorKind::EncodeFailure,
            message: message.into(),
        }
    }

    pub fn metadata_overflow(message: impl Into<String>) -> Self {
        Self {
            kind: ConversionErrorKind::MetadataOverflow,
            message: message.into(),
        }
    }
}

/// Per-file transfer errors
#[derive(Error, Debug)]
pub enum TransferError {
    /// Source unreadable or the staged copy could not be written
    #[error("Copy failed for '{filename}': {message}")]
    CopyFailure { filename: String, message: String },

    /// Converted output could not be written under its final name
    #[error("Failed to write '{}': {message}", path.display())]
    EncodeFailure { path: PathBuf, message: String },

    /// General I/O error
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type alias for per-file transfer work
pub type Result<T> = std::result::Result<T, TransferError>;

impl From<std::io::Error> for TransferError {
    fn from(err: std::io::Error) -> Self {
        TransferError::IoError(err.to_string())
    }
}

/// Errors that prevent a session from running at all
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The output directory cannot be created or written
    #[error("Failed to prepare output directory '{}': {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The conversion worker pool could not be started
    #[error("Failed to start conversion workers: {0}")]
    WorkerPool(String),
}
