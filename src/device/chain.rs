//! Ordered probe chain
//!
//! Runs discovery strategies in a fixed priority order and stops at the first
//! candidate that passes validation. Every strategy runs on its own thread with
//! a bounded time budget; an overrunning strategy is abandoned and recorded as
//! timed out.

use crate::core::config::DeviceConfig;
use crate::core::error::DiscoveryError;
use crate::device::probes::{
    ManualPathProbe, MediaApiProbe, MountPathProbe, UsbBusProbe, VolumeScanProbe,
};
use crate::device::traits::{
    AttemptOutcome, DeviceRoot, ProbeAttempt, ProbeCandidate, ProbeResult, ProbeStrategy,
};
use crossbeam_channel::RecvTimeoutError;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Default per-strategy time budget
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(3000);

/// Directory name that marks a media container on the device
pub const MEDIA_CONTAINER_DIR: &str = "DCIM";

/// Ordered list of discovery strategies
pub struct ProbeChain {
    strategies: Vec<Arc<dyn ProbeStrategy>>,
    timeout: Duration,
    manual: Option<PathBuf>,
}

impl ProbeChain {
    /// Create an empty chain
    pub fn new(timeout: Duration) -> Self {
        Self {
            strategies: Vec::new(),
            timeout,
            manual: None,
        }
    }

    /// The default chain: media API, volume scan, USB bus, mount paths
    pub fn with_default_strategies(timeout: Duration) -> Self {
        Self::new(timeout)
            .with_strategy(MediaApiProbe::default())
            .with_strategy(VolumeScanProbe)
            .with_strategy(UsbBusProbe::default())
            .with_strategy(MountPathProbe::default())
    }

    /// Build the default chain from the `[device]` config section
    pub fn from_config(config: &DeviceConfig) -> Self {
        let mut chain = Self::with_default_strategies(Duration::from_millis(config.probe_timeout_ms));

        if !config.disabled_strategies.is_empty() {
            chain.strategies.retain(|s| {
                let disabled = config
                    .disabled_strategies
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(s.name()));
                if disabled {
                    debug!("Probe strategy '{}' disabled by configuration", s.name());
                }
                !disabled
            });
        }

        match &config.root_override {
            Some(path) => chain.with_manual_override(path.clone()),
            None => chain,
        }
    }

    /// Append a strategy to the end of the chain
    pub fn with_strategy<S: ProbeStrategy + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    /// Use a caller-supplied path instead of the ordered chain
    pub fn with_manual_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.manual = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Names of the strategies in priority order
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn manual_override(&self) -> Option<&Path> {
        self.manual.as_deref()
    }

    /// Locate the device's media root
    ///
    /// With a manual override the ordered chain is skipped entirely.
    pub fn discover(&self) -> Result<DeviceRoot, DiscoveryError> {
        if let Some(path) = &self.manual {
            return self.discover_manual(path);
        }

        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let (attempt, root) = self.run_strategy(strategy);
            info!("Probe {}", attempt);
            attempts.push(attempt);

            if let Some(root) = root {
                return Ok(root);
            }
        }

        warn!("No device root found after {} probe strategies", attempts.len());
        Err(DiscoveryError::NotFound { attempts })
    }

    /// Run every strategy without stopping at the first success
    pub fn probe_report(&self) -> Vec<ProbeAttempt> {
        let mut attempts: Vec<ProbeAttempt> = self
            .strategies
            .iter()
            .map(|strategy| self.run_strategy(strategy).0)
            .collect();

        if let Some(path) = &self.manual {
            let outcome = match self.discover_manual(path) {
                Ok(root) => AttemptOutcome::Accepted {
                    path: root.path().to_path_buf(),
                },
                Err(e) => AttemptOutcome::failed(e.to_string()),
            };
            attempts.insert(0, ProbeAttempt::new(ManualPathProbe::NAME, outcome));
        }

        attempts
    }

    fn discover_manual(&self, path: &Path) -> Result<DeviceRoot, DiscoveryError> {
        let probe: Arc<dyn ProbeStrategy> = Arc::new(ManualPathProbe::new(path));

        let invalid = |reason: String| DiscoveryError::InvalidManualPath {
            path: path.to_path_buf(),
            reason,
        };

        let candidate = match run_with_timeout(probe, self.timeout) {
            Some(ProbeResult::Found(candidate)) => candidate,
            Some(ProbeResult::NotApplicable(reason)) | Some(ProbeResult::Failed(reason)) => {
                return Err(invalid(reason))
            }
            None => {
                return Err(invalid(format!(
                    "timed out after {} ms",
                    self.timeout.as_millis()
                )))
            }
        };

        let media_root = find_media_container(&candidate.path).unwrap_or_else(|| candidate.path.clone());
        info!("Using manual device path {}", media_root.display());

        Ok(DeviceRoot::new(
            media_root,
            candidate.path,
            ManualPathProbe::NAME,
            candidate.confidence,
        ))
    }

    fn run_strategy(&self, strategy: &Arc<dyn ProbeStrategy>) -> (ProbeAttempt, Option<DeviceRoot>) {
        let name = strategy.name().to_string();
        debug!("Running probe strategy '{}'", name);

        match run_with_timeout(Arc::clone(strategy), self.timeout) {
            None => (
                ProbeAttempt::new(
                    name,
                    AttemptOutcome::TimedOut {
                        after_ms: self.timeout.as_millis() as u64,
                    },
                ),
                None,
            ),
            Some(ProbeResult::NotApplicable(reason)) => {
                (ProbeAttempt::new(name, AttemptOutcome::NotApplicable { reason }), None)
            }
            Some(ProbeResult::Failed(reason)) => {
                (ProbeAttempt::new(name, AttemptOutcome::Failed { reason }), None)
            }
            Some(ProbeResult::Found(ProbeCandidate { path, confidence })) => {
                match validate_root(&path) {
                    Ok(media_root) => {
                        let attempt = ProbeAttempt::new(
                            name.clone(),
                            AttemptOutcome::Accepted {
                                path: media_root.clone(),
                            },
                        );
                        let root = DeviceRoot::new(media_root, path, name, confidence);
                        (attempt, Some(root))
                    }
                    Err(reason) => (
                        ProbeAttempt::new(name, AttemptOutcome::Rejected { path, reason }),
                        None,
                    ),
                }
            }
        }
    }
}

impl Default for ProbeChain {
    fn default() -> Self {
        Self::with_default_strategies(DEFAULT_PROBE_TIMEOUT)
    }
}

/// Run one attempt on a dedicated thread, giving up after `timeout`
///
/// A thread that overruns is detached and left to finish on its own.
fn run_with_timeout(strategy: Arc<dyn ProbeStrategy>, timeout: Duration) -> Option<ProbeResult> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let name = strategy.name().to_string();

    let spawned = thread::Builder::new()
        .name(format!("probe-{}", name))
        .spawn(move || {
            let _ = tx.send(strategy.attempt());
        });

    if let Err(e) = spawned {
        return Some(ProbeResult::failed(format!("could not start probe thread: {}", e)));
    }

    match rx.recv_timeout(timeout) {
        Ok(result) => Some(result),
        Err(RecvTimeoutError::Timeout) => {
            warn!("Probe '{}' did not finish within {} ms", name, timeout.as_millis());
            None
        }
        Err(RecvTimeoutError::Disconnected) => {
            Some(ProbeResult::failed("probe thread panicked"))
        }
    }
}

/// Validate a strategy's candidate and return the media root to enumerate
///
/// The path must be a readable directory that either is named `DCIM` or has
/// an immediate child named `DCIM` (case-insensitive).
pub fn validate_root(path: &Path) -> Result<PathBuf, String> {
    let metadata = fs::metadata(path).map_err(|e| format!("cannot access path: {}", e))?;
    if !metadata.is_dir() {
        return Err("not a directory".to_string());
    }
    fs::read_dir(path).map_err(|e| format!("directory not readable: {}", e))?;

    find_media_container(path).ok_or_else(|| format!("no {} folder found", MEDIA_CONTAINER_DIR))
}

/// Return `path` itself if it is the media container, else its `DCIM` child
pub fn find_media_container(path: &Path) -> Option<PathBuf> {
    let is_container = |p: &Path| {
        p.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.eq_ignore_ascii_case(MEDIA_CONTAINER_DIR))
            .unwrap_or(false)
    };

    if is_container(path) && path.is_dir() {
        return Some(path.to_path_buf());
    }

    fs::read_dir(path)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|child| is_container(child) && child.is_dir())
}
