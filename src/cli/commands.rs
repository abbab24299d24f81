//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::cli::progress::{
    format_bytes, format_duration, print_divider, print_error, print_header, print_info,
    print_success, print_warning, DiscoverySpinner, TransferProgress,
};
use crate::cli::{Args, Commands};
use crate::convert::heif_supported;
use crate::core::config::{init_config, Config};
use crate::core::error::DiscoveryError;
use crate::core::outcome::{format_count, SessionResult};
use crate::core::session::{PlannedAction, SessionOptions, TransferSession};
use crate::device::{DeviceRoot, ProbeChain};
use crate::media::enumerator::{enumerate, enumerate_path, EnumerationOptions, MediaCandidate};
use crate::media::MediaKind;
use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// How a command finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Everything the command attempted succeeded
    Clean,
    /// Some files failed
    PartialFailure,
}

impl RunStatus {
    fn from_result(result: &SessionResult) -> Self {
        if result.has_failures() {
            RunStatus::PartialFailure
        } else {
            RunStatus::Clean
        }
    }

    /// Process exit status; partial failure only fails the process in strict mode
    pub fn exit_status(self, strict: bool) -> u8 {
        match self {
            RunStatus::PartialFailure if strict => 2,
            _ => 0,
        }
    }

    pub fn exit_code(self, strict: bool) -> ExitCode {
        ExitCode::from(self.exit_status(strict))
    }
}

/// Run the appropriate command based on CLI arguments
pub fn run_command(args: &Args, config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<RunStatus> {
    match &args.command {
        None | Some(Commands::Transfer) => transfer(args, config, shutdown_flag),
        Some(Commands::Probe) => {
            probe(args, config)?;
            Ok(RunStatus::Clean)
        }
        Some(Commands::Scan) => {
            scan(args, config)?;
            Ok(RunStatus::Clean)
        }
        Some(Commands::Convert { inputs }) => convert(args, config, inputs, shutdown_flag),
        Some(Commands::Config { path }) => {
            handle_config_command(*path)?;
            Ok(RunStatus::Clean)
        }
        Some(Commands::GenerateConfig) => {
            generate_config_file(args.output.clone())?;
            Ok(RunStatus::Clean)
        }
        Some(Commands::ShowConfig) => {
            show_config(config);
            Ok(RunStatus::Clean)
        }
    }
}

// ============================================================================
// Discovery
// ============================================================================

/// Run the probe chain behind a spinner
fn discover_device(chain: &ProbeChain, quiet: bool) -> Result<DeviceRoot> {
    let spinner = (!quiet).then(|| DiscoverySpinner::new("Looking for a connected iPhone..."));

    match chain.discover() {
        Ok(root) => {
            if let Some(spinner) = &spinner {
                spinner.finish(&format!("Found device media at {}", root.path().display()));
            }
            info!("Device root: {}", root);
            Ok(root)
        }
        Err(e) => {
            if let Some(spinner) = &spinner {
                spinner.finish_with_error("No device found");
            }
            if !quiet {
                report_discovery_failure(&e);
            }
            Err(e.into())
        }
    }
}

fn report_discovery_failure(error: &DiscoveryError) {
    println!();
    for attempt in error.attempts() {
        print_info(&attempt.to_string());
    }
    if let DiscoveryError::InvalidManualPath { path, reason } = error {
        print_error(&format!("{}: {}", path.display(), reason));
        return;
    }
    println!();
    println!("  Make sure your iPhone is:");
    println!("    1. Connected via USB cable");
    println!("    2. Unlocked");
    println!("    3. Trusting this computer (tap 'Trust' when prompted)");
    println!();
    println!("  Or point at the device folder directly with --device-root <PATH>");
}

// ============================================================================
// transfer
// ============================================================================

/// Discover the device, then copy and convert everything on it
pub fn transfer(args: &Args, config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<RunStatus> {
    let chain = ProbeChain::from_config(&config.device);
    debug!("Probe order: {:?}", chain.strategy_names());

    let session = TransferSession::new(SessionOptions::from_config(config)).with_stop_flag(shutdown_flag);

    if !args.json {
        print_header("PHOTO TRANSFER");
    }
    let root = discover_device(&chain, args.json)?;

    if args.dry_run {
        show_plan(&session, &root, args.json)?;
        return Ok(RunStatus::Clean);
    }

    if !heif_supported() {
        warn!("Built without HEIC decoding; HEIC files will be kept unconverted");
    }

    let options = EnumerationOptions {
        include_unknown: config.enumeration.include_unknown,
    };
    let candidates: Vec<MediaCandidate> = enumerate(&root, options).collect();

    if candidates.is_empty() && !args.json {
        print_warning("No media files found on the device");
    }

    let result = run_with_progress(&session, root, candidates, args.json)?;
    report_result(&result, args.json)?;

    Ok(RunStatus::from_result(&result))
}

fn run_with_progress(
    session: &TransferSession,
    root: DeviceRoot,
    candidates: Vec<MediaCandidate>,
    quiet: bool,
) -> Result<SessionResult> {
    if quiet {
        return Ok(session.run_candidates(root, candidates, |_| {})?);
    }

    let mut tracker = TransferProgress::new(candidates.len() as u64);
    let result = session.run_candidates(root, candidates, |progress| tracker.update(progress));
    tracker.finish();

    Ok(result?)
}

fn show_plan(session: &TransferSession, root: &DeviceRoot, json: bool) -> Result<()> {
    let plan = session.plan(root);

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    print_divider();
    for entry in &plan {
        let action = match entry.action {
            PlannedAction::Convert => "convert",
            PlannedAction::Copy => "copy",
            PlannedAction::SkipExisting => "skip (exists)",
            PlannedAction::SkipPassthrough => "skip",
        };
        let target = entry.target.as_deref().unwrap_or("-");
        println!(
            "  {:<14} {:<40} -> {}",
            action,
            entry.candidate.relative_path.display(),
            target
        );
    }

    let writes = plan
        .iter()
        .filter(|p| matches!(p.action, PlannedAction::Convert | PlannedAction::Copy))
        .count();
    println!();
    print_info(&format!(
        "{} of {} files would be written to {}",
        format_count(writes),
        format_count(plan.len()),
        session.options().output_dir.display()
    ));
    Ok(())
}

fn report_result(result: &SessionResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    print_divider();
    if result.stopped {
        print_warning("Transfer stopped before all files were processed");
    }

    let counts = &result.counts;
    print_success(&format!("{} converted to JPEG", format_count(counts.converted)));
    print_success(&format!("{} copied unchanged", format_count(counts.copied_unchanged)));
    if counts.skipped > 0 {
        print_info(&format!("{} skipped", format_count(counts.skipped)));
    }
    if counts.failed() > 0 {
        print_error(&format!("{} failed", format_count(counts.failed())));
        for record in result.failures() {
            println!("      {}: {}", record.candidate.relative_path.display(), record.outcome);
        }
    }

    println!();
    print_info(&format!(
        "{} written to {} in {}",
        format_bytes(result.bytes_written),
        result.output_dir.display(),
        format_duration(result.duration())
    ));
    println!();
    Ok(())
}

// ============================================================================
// probe / scan
// ============================================================================

/// Run every discovery strategy and print what each found
pub fn probe(args: &Args, config: &Config) -> Result<()> {
    let chain = ProbeChain::from_config(&config.device);
    let attempts = chain.probe_report();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&attempts)?);
        return Ok(());
    }

    print_header("DEVICE DISCOVERY");
    for attempt in &attempts {
        if attempt.outcome.is_accepted() {
            print_success(&attempt.to_string());
        } else {
            print_info(&attempt.to_string());
        }
    }
    println!();

    if !attempts.iter().any(|a| a.outcome.is_accepted()) {
        print_warning("No strategy found a device");
    }
    Ok(())
}

/// List the media files on the discovered device
pub fn scan(args: &Args, config: &Config) -> Result<()> {
    let chain = ProbeChain::from_config(&config.device);
    let root = discover_device(&chain, args.json)?;

    let mut enumerator = enumerate(
        &root,
        EnumerationOptions {
            include_unknown: config.enumeration.include_unknown,
        },
    );
    let candidates: Vec<MediaCandidate> = enumerator.by_ref().collect();
    let stats = enumerator.stats().clone();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        return Ok(());
    }

    print_divider();
    for candidate in &candidates {
        println!(
            "  {:<8} {:>10}  {}",
            candidate.kind.display_name(),
            format_bytes(candidate.size),
            candidate.relative_path.display()
        );
    }

    println!();
    for kind in [MediaKind::ImageHeic, MediaKind::ImageOther, MediaKind::Video, MediaKind::Unknown] {
        let matching: Vec<&MediaCandidate> = candidates.iter().filter(|c| c.kind == kind).collect();
        if matching.is_empty() {
            continue;
        }
        let bytes: u64 = matching.iter().map(|c| c.size).sum();
        print_info(&format!(
            "{}: {} files ({})",
            kind.display_name(),
            format_count(matching.len()),
            format_bytes(bytes)
        ));
    }
    if stats.skipped_empty + stats.skipped_unknown + stats.walk_errors > 0 {
        print_info(&format!(
            "Ignored {} empty, {} unrecognized, {} unreadable",
            stats.skipped_empty, stats.skipped_unknown, stats.walk_errors
        ));
    }
    println!();
    Ok(())
}

// ============================================================================
// convert
// ============================================================================

/// Convert HEIC files already on this computer into the output directory
pub fn convert(
    args: &Args,
    config: &Config,
    inputs: &[PathBuf],
    shutdown_flag: Arc<AtomicBool>,
) -> Result<RunStatus> {
    let (root, candidates) = collect_local_candidates(inputs)?;

    if candidates.is_empty() {
        if !args.json {
            print_warning("No HEIC files found in the given inputs");
        }
        return Ok(RunStatus::Clean);
    }

    if args.dry_run {
        for candidate in &candidates {
            println!("  convert  {}", candidate.path.display());
        }
        return Ok(RunStatus::Clean);
    }

    if !heif_supported() {
        warn!("Built without HEIC decoding; files will be kept unconverted");
    }

    let options = SessionOptions::from_config(config).with_copy_passthrough(false);
    let session = TransferSession::new(options).with_stop_flag(shutdown_flag);

    if !args.json {
        print_header("HEIC CONVERSION");
    }
    let result = run_with_progress(&session, root, candidates, args.json)?;
    report_result(&result, args.json)?;

    Ok(RunStatus::from_result(&result))
}

/// Resolve files and folders given on the command line into HEIC candidates
///
/// Folders contribute every HEIC file below them. Files are taken as given so
/// a mislabeled file still gets an outcome.
pub fn collect_local_candidates(inputs: &[PathBuf]) -> Result<(DeviceRoot, Vec<MediaCandidate>)> {
    let first = match inputs.first() {
        Some(first) => first,
        None => bail!("No input files given"),
    };
    let root_path = if first.is_dir() {
        first.clone()
    } else {
        first.parent().map(Path::to_path_buf).unwrap_or_default()
    };

    let mut candidates = Vec::new();
    for input in inputs {
        if input.is_dir() {
            candidates.extend(
                enumerate_path(input, EnumerationOptions::default()).filter(|c| c.kind.is_convertible()),
            );
        } else {
            let candidate = MediaCandidate::from_path(input, &root_path)
                .with_context(|| format!("Cannot read {}", input.display()))?;
            candidates.push(candidate);
        }
    }

    Ok((DeviceRoot::local(root_path), candidates))
}

// ============================================================================
// Configuration commands
// ============================================================================

/// Show the config file location, creating a default file if there is none
pub fn handle_config_command(show_path: bool) -> Result<()> {
    if show_path {
        let path = Config::get_active_config_path();
        println!("{}", path.display());
        if path.exists() {
            info!("Config file exists at: {}", path.display());
        } else {
            info!("Config file would be created at: {}", path.display());
        }
        return Ok(());
    }

    let path = init_config()?;
    info!("Config file: {}", path.display());
    info!("Edit this file to change the transfer settings.");
    info!("Run 'photo-transfer show-config' to verify your settings.");
    Ok(())
}

/// Generate a configuration file at the specified or default location
pub fn generate_config_file(output: Option<PathBuf>) -> Result<()> {
    let output_path = match output {
        Some(path) => {
            std::fs::write(&path, Config::generate_default_config())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            path
        }
        None => init_config()?,
    };

    info!("Configuration file: {}", output_path.display());
    info!("Edit this file to customize the transfer settings.");
    Ok(())
}

/// Show the current configuration settings
pub fn show_config(config: &Config) {
    let config_path = Config::get_active_config_path();
    info!("Configuration file: {}", config_path.display());
    if !config_path.exists() {
        info!("(Using default settings - no config file found)");
    }
    info!("");
    info!("Current Configuration:");
    info!("----------------------");
    info!("[output]");
    info!("  directory = \"{}\"", config.output.directory.display());
    info!("  copy_passthrough = {}", config.output.copy_passthrough);
    info!("  skip_existing = {}", config.output.skip_existing);
    info!("  quarantine_dir = \"{}\"", config.output.quarantine_dir);
    info!("");
    info!("[device]");
    match &config.device.root_override {
        Some(root) => info!("  root_override = \"{}\"", root.display()),
        None => info!("  root_override = (auto)"),
    }
    info!("  probe_timeout_ms = {}", config.device.probe_timeout_ms);
    info!("  disabled_strategies = {:?}", config.device.disabled_strategies);
    info!("");
    info!("[enumeration]");
    info!("  include_unknown = {}", config.enumeration.include_unknown);
    info!("");
    info!("[conversion]");
    info!(
        "  workers = {} ({} effective)",
        config.conversion.workers,
        config.conversion.effective_workers()
    );
    info!("  heic_decoding = {}", if heif_supported() { "available" } else { "not built in" });
    info!("");
    info!("[logging]");
    info!("  level = \"{}\"", config.logging.level);
    info!("  log_to_file = {}", config.logging.log_to_file);
    info!("  log_file = \"{}\"", config.logging.log_file.display());
}
