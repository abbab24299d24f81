//! Per-file outcomes and the session result

use crate::core::error::ConversionErrorKind;
use crate::device::traits::DeviceRoot;
use crate::media::enumerator::MediaCandidate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Terminal result for one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ConversionOutcome {
    /// Copied byte-for-byte under its original name
    CopiedUnchanged { output: PathBuf, bytes: u64 },
    /// Converted to JPEG
    Converted {
        output: PathBuf,
        metadata_preserved: bool,
        bytes: u64,
    },
    /// Source unreadable or the copy could not be written
    CopyFailed { reason: String },
    /// Copied but could not be converted
    ConvertFailed {
        kind: ConversionErrorKind,
        reason: String,
        /// Where the untouched original was kept
        retained: Option<PathBuf>,
    },
    /// Not transferred by choice
    Skipped { reason: String },
}

impl ConversionOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        ConversionOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ConversionOutcome::CopiedUnchanged { .. } | ConversionOutcome::Converted { .. }
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ConversionOutcome::CopyFailed { .. } | ConversionOutcome::ConvertFailed { .. }
        )
    }

    /// File written to the output directory, if any
    pub fn output(&self) -> Option<&PathBuf> {
        match self {
            ConversionOutcome::CopiedUnchanged { output, .. }
            | ConversionOutcome::Converted { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        match self {
            ConversionOutcome::CopiedUnchanged { bytes, .. }
            | ConversionOutcome::Converted { bytes, .. } => *bytes,
            _ => 0,
        }
    }
}

impl fmt::Display for ConversionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionOutcome::CopiedUnchanged { .. } => write!(f, "copied"),
            ConversionOutcome::Converted {
                metadata_preserved, ..
            } => {
                if *metadata_preserved {
                    write!(f, "converted")
                } else {
                    write!(f, "converted (no metadata)")
                }
            }
            ConversionOutcome::CopyFailed { reason } => write!(f, "copy failed: {}", reason),
            ConversionOutcome::ConvertFailed { kind, reason, .. } => {
                write!(f, "conversion failed ({}): {}", kind, reason)
            }
            ConversionOutcome::Skipped { reason } => write!(f, "skipped: {}", reason),
        }
    }
}

/// A candidate paired with its outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub candidate: MediaCandidate,
    pub outcome: ConversionOutcome,
}

/// Per-variant counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounts {
    pub converted: usize,
    pub copied_unchanged: usize,
    pub copy_failed: usize,
    pub convert_failed: usize,
    pub skipped: usize,
}

impl SessionCounts {
    fn record(&mut self, outcome: &ConversionOutcome) {
        match outcome {
            ConversionOutcome::CopiedUnchanged { .. } => self.copied_unchanged += 1,
            ConversionOutcome::Converted { .. } => self.converted += 1,
            ConversionOutcome::CopyFailed { .. } => self.copy_failed += 1,
            ConversionOutcome::ConvertFailed { .. } => self.convert_failed += 1,
            ConversionOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.converted + self.copied_unchanged
    }

    pub fn failed(&self) -> usize {
        self.copy_failed + self.convert_failed
    }

    pub fn total(&self) -> usize {
        self.succeeded() + self.failed() + self.skipped
    }
}

/// Everything a run produced
///
/// Records are in completion order. Built by a single collector and handed to
/// the caller by value once the run is over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub device: DeviceRoot,
    pub output_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub counts: SessionCounts,
    pub bytes_written: u64,
    /// Set when the caller stopped the run early
    pub stopped: bool,
    pub records: Vec<OutcomeRecord>,
}

impl SessionResult {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Records whose outcome is a failure
    pub fn failures(&self) -> impl Iterator<Item = &OutcomeRecord> {
        self.records.iter().filter(|r| r.outcome.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.counts.failed() > 0
    }
}

impl fmt::Display for SessionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} transferred, {} failed",
            format_count(self.counts.succeeded()),
            format_count(self.counts.failed())
        )?;
        if self.counts.skipped > 0 {
            write!(f, ", {} skipped", format_count(self.counts.skipped))?;
        }
        Ok(())
    }
}

/// Incremental builder owned by the collector thread
pub(crate) struct SessionResultBuilder {
    device: DeviceRoot,
    output_dir: PathBuf,
    started_at: DateTime<Utc>,
    counts: SessionCounts,
    bytes_written: u64,
    records: Vec<OutcomeRecord>,
}

impl SessionResultBuilder {
    pub(crate) fn new(device: DeviceRoot, output_dir: PathBuf, expected: usize) -> Self {
        Self {
            device,
            output_dir,
            started_at: Utc::now(),
            counts: SessionCounts::default(),
            bytes_written: 0,
            records: Vec::with_capacity(expected),
        }
    }

    pub(crate) fn record(&mut self, record: OutcomeRecord) -> &OutcomeRecord {
        self.counts.record(&record.outcome);
        self.bytes_written += record.outcome.bytes_written();
        self.records.push(record);
        &self.records[self.records.len() - 1]
    }

    pub(crate) fn completed(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn finish(self, stopped: bool) -> SessionResult {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        SessionResult {
            device: self.device,
            output_dir: self.output_dir,
            started_at: self.started_at,
            duration_ms: elapsed.num_milliseconds().max(0) as u64,
            counts: self.counts,
            bytes_written: self.bytes_written,
            stopped,
            records: self.records,
        }
    }
}

/// Format an integer with thousands separators (1203 -> "1,203")
pub fn format_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
