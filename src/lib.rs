//! Photo Transfer Tool Library
//!
//! Copies photos and videos from an attached iPhone/iPad to a folder on the
//! host and converts HEIC images to JPEG, carrying the original Exif block
//! across unchanged.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`device`] - Probe chain that locates the device's media root through
//!   several independent strategies (media API mounts, mounted volumes, USB
//!   bus, well-known mount paths, manual path)
//! - [`media`] - Enumeration and classification of the files under that root
//! - [`convert`] - HEIC container parsing, Exif extraction, decoding and JPEG
//!   re-encoding
//! - [`core`] - Configuration, error types, and the transfer session that
//!   drives copy and conversion for every file
//! - [`cli`] - Command-line interface (only used by the binary)
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use photo_transfer_tool::core::config::Config;
//! use photo_transfer_tool::core::session::{SessionOptions, TransferSession};
//! use photo_transfer_tool::device::ProbeChain;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!
//!     let chain = ProbeChain::from_config(&config.device);
//!     let session = TransferSession::new(SessionOptions::from_config(&config));
//!
//!     let result = session.discover_and_run(&chain, |progress| {
//!         println!(
//!             "[{}/{}] {} -> {}",
//!             progress.completed, progress.total, progress.file_name, progress.outcome
//!         );
//!     })?;
//!
//!     println!("{}", result);
//!     Ok(())
//! }
//! ```
//!
//! # HEIC Decoding
//!
//! Decoding uses libheif through the `heif` feature, which is on by default.
//! Building with `--no-default-features` drops the libheif dependency. Then the
//! pipeline still runs: HEIC files are reported as conversion failures and their
//! originals are kept in the quarantine folder.

pub mod cli;
pub mod convert;
pub mod core;
pub mod device;
pub mod media;

#[cfg(test)]
pub(crate) mod test_support;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
