//! Device discovery module
//!
//! This module locates the media root of an attached iPhone/iPad as the host
//! filesystem sees it. No single platform mechanism is reliable, so discovery
//! is an ordered chain of independent strategies.
//!
//! # Submodules
//!
//! - `traits` - The `ProbeStrategy` trait and the values it reports
//! - `probes` - Built-in strategies (media API, volume scan, USB bus, mount paths, manual)
//! - `chain` - Ordered chain with per-strategy timeouts and root validation
//!
//! # Architecture
//!
//! The chain only depends on the `ProbeStrategy` trait, so tests inject fake
//! strategies to exercise fallback, timeout and failure reporting without a
//! real device attached.

pub mod chain;
pub mod probes;
pub mod traits;

pub use chain::{validate_root, ProbeChain, DEFAULT_PROBE_TIMEOUT};
pub use probes::{ManualPathProbe, MediaApiProbe, MountPathProbe, UsbBusProbe, VolumeScanProbe};
pub use traits::{
    AttemptOutcome, Confidence, DeviceRoot, ProbeAttempt, ProbeCandidate, ProbeResult,
    ProbeStrategy,
};
