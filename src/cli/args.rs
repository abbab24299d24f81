//! Command-line argument definitions
//!
//! This module defines all CLI arguments and subcommands using clap.

use crate::core::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Copy photos and videos from an iPhone/iPad and convert HEIC images to JPEG
#[derive(Parser, Debug)]
#[command(name = "photo-transfer")]
#[command(version)]
#[command(about = "Copy photos and videos from an iPhone/iPad and convert HEIC images to JPEG with their metadata", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output directory for transferred files (overrides config)
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Use this folder as the device instead of searching for it
    #[arg(short = 'r', long, global = true, value_name = "PATH")]
    pub device_root: Option<PathBuf>,

    /// Skip videos and non-HEIC images instead of copying them
    #[arg(long, global = true)]
    pub no_passthrough: bool,

    /// Also transfer files that are neither images nor videos
    #[arg(long, global = true)]
    pub include_unknown: bool,

    /// Number of conversion worker threads (0 = one per core)
    #[arg(long, global = true)]
    pub workers: Option<usize>,

    /// Time budget for each discovery strategy in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    pub probe_timeout_ms: Option<u64>,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Print results as JSON instead of a summary
    #[arg(long, global = true)]
    pub json: bool,

    /// Show what would be transferred without writing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Exit with an error status if any file failed
    #[arg(long, global = true)]
    pub strict: bool,
}

impl Args {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref output) = self.output {
            config.output.directory = output.clone();
        }
        if let Some(ref root) = self.device_root {
            config.device.root_override = Some(root.clone());
        }
        if self.no_passthrough {
            config.output.copy_passthrough = false;
        }
        if self.include_unknown {
            config.enumeration.include_unknown = true;
        }
        if let Some(workers) = self.workers {
            config.conversion.workers = workers;
        }
        if let Some(timeout) = self.probe_timeout_ms {
            config.device.probe_timeout_ms = timeout;
        }
        if let Some(ref level) = self.log_level {
            config.logging.level = level.clone();
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Find the device, copy its media and convert HEIC files (default)
    Transfer,

    /// Run every discovery strategy and report what each one found
    Probe,

    /// List the media files on the discovered device
    Scan,

    /// Convert HEIC files that are already on this computer
    Convert {
        /// Files or folders to convert
        #[arg(required = true, value_name = "FILES|DIRS")]
        inputs: Vec<PathBuf>,
    },

    /// Show the configuration file location, creating a default one if needed
    ///
    /// The config file is stored at:
    /// - Windows: %APPDATA%\photo_transfer_tool\config.toml
    /// - Linux: ~/.config/photo_transfer_tool/config.toml
    /// - macOS: ~/Library/Application Support/photo_transfer_tool/config.toml
    Config {
        /// Only print the config file path
        #[arg(long)]
        path: bool,
    },

    /// Write a commented default configuration file
    ///
    /// Written to `--output` when given, otherwise to the standard location.
    GenerateConfig,

    /// Show current configuration
    ShowConfig,
}
