//! Progress bar utilities for CLI output
//!
//! Key features:
//! - Progress bars that suspend cleanly when logging
//! - Consistent visual styling across all operations

use crate::core::outcome::ConversionOutcome;
use crate::core::session::Progress;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::time::{Duration, Instant};

// ============================================================================
// Styles - Consistent visual appearance
// ============================================================================

/// Get the spinner style for discovery and scanning
fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷")
}

/// Get the progress bar style for transfers
fn progress_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {spinner:.green} [{bar:40.cyan/dim}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━╾─")
}

/// Get the style for completed progress bars
fn completed_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  ✓ [{bar:40.green/dim}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━━━")
}

// ============================================================================
// Console output helpers
// ============================================================================

/// Print a header section with a box
pub fn print_header(title: &str) {
    let width = 68;
    let title_padded = format!("{:^width$}", title, width = width - 4);
    println!();
    println!("╔{}╗", "═".repeat(width - 2));
    println!("║{}║", title_padded);
    println!("╚{}╝", "═".repeat(width - 2));
    println!();
}

/// Print a section divider
pub fn print_divider() {
    println!();
    println!("{}", "─".repeat(60));
    println!();
}

/// Print a success message with checkmark
pub fn print_success(msg: &str) {
    println!("  ✓ {}", msg);
}

/// Print an info message with bullet
pub fn print_info(msg: &str) {
    println!("  • {}", msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("  ⚠ {}", msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    println!("  ✗ {}", msg);
}

// ============================================================================
// Spinner for device discovery
// ============================================================================

/// Spinner shown while the probe chain runs
pub struct DiscoverySpinner {
    spinner: ProgressBar,
    start_time: Instant,
}

impl DiscoverySpinner {
    pub fn new(message: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.enable_steady_tick(Duration::from_millis(80));
        spinner.set_message(message.to_string());

        Self {
            spinner,
            start_time: Instant::now(),
        }
    }

    pub fn finish(&self, msg: &str) {
        self.spinner.finish_with_message(format!(
            "✓ {} ({:.1}s)",
            msg,
            self.start_time.elapsed().as_secs_f64()
        ));
    }

    pub fn finish_with_error(&self, msg: &str) {
        self.spinner.finish_with_message(format!("✗ {}", msg));
    }
}

// ============================================================================
// Transfer progress tracker
// ============================================================================

/// Progress bar driven by the session's progress callback
pub struct TransferProgress {
    progress_bar: ProgressBar,
    start_time: Instant,
    bytes_written: u64,
    failures: usize,
}

impl TransferProgress {
    /// Create a new transfer progress tracker
    pub fn new(total_files: u64) -> Self {
        let progress_bar = ProgressBar::new(total_files);
        progress_bar.set_style(progress_bar_style());
        progress_bar.enable_steady_tick(Duration::from_millis(100));
        progress_bar.set_message("Starting...");

        Self {
            progress_bar,
            start_time: Instant::now(),
            bytes_written: 0,
            failures: 0,
        }
    }

    /// Record one completed candidate
    pub fn update(&mut self, progress: &Progress<'_>) {
        if self.progress_bar.length() != Some(progress.total as u64) {
            self.progress_bar.set_length(progress.total as u64);
        }

        self.bytes_written += progress.outcome.bytes_written();
        self.progress_bar.set_position(progress.completed as u64);

        match progress.outcome {
            ConversionOutcome::CopyFailed { .. } | ConversionOutcome::ConvertFailed { .. } => {
                self.failures += 1;
                self.log_warning(&format!("{}: {}", progress.file_name, progress.outcome));
            }
            _ => {}
        }

        self.update_message(progress.file_name);
    }

    fn update_message(&self, file_name: &str) {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            self.bytes_written as f64 / elapsed / 1024.0 / 1024.0
        } else {
            0.0
        };

        self.progress_bar
            .set_message(format!("{:.1} MB/s  {}", rate, file_name));
    }

    /// Log a warning message while suspending the progress display
    pub fn log_warning(&self, msg: &str) {
        self.progress_bar.suspend(|| {
            println!("  ⚠ {}", msg);
        });
    }

    /// Finish the progress display
    pub fn finish(&self) {
        self.progress_bar.set_style(completed_style());
        let elapsed = self.start_time.elapsed();
        self.progress_bar.finish_with_message(format!(
            "Complete ({} in {:.1}s)",
            format_bytes(self.bytes_written),
            elapsed.as_secs_f64()
        ));
    }

    pub fn failures(&self) -> usize {
        self.failures
    }
}

// ============================================================================
// Utility functions
// ============================================================================

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Format duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        format!("{}h {}m", hours, mins)
    } else if secs >= 60 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

// ============================================================================
// Dual writer for file + console logging
// ============================================================================

/// A writer that writes to both console and file
///
/// Used for logging to both stderr and a log file simultaneously.
pub struct DualWriter {
    pub console: std::io::Stderr,
    pub file: std::fs::File,
}

impl Write for DualWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let _ = self.console.write(buf);
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let _ = self.console.flush();
        self.file.flush()
    }
}

// ============================================================================
// Tests
// ============================================================================
