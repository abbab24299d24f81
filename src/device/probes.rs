//! Built-in discovery strategies
//!
//! Each strategy looks for the device in a different place. None of them
//! validate their candidate beyond a quick `DCIM` check used for ranking; the
//! probe chain performs the authoritative validation.

use crate::device::chain::find_media_container;
use crate::device::traits::{looks_like_apple, Confidence, ProbeCandidate, ProbeResult, ProbeStrategy};
use log::{debug, trace};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Apple's USB vendor ID
pub const APPLE_VENDOR_ID: u16 = 0x05ac;

/// Product IDs used by iPhone, iPad and iPod touch models
pub const APPLE_MOBILE_PRODUCT_IDS: RangeInclusive<u16> = 0x1290..=0x12af;

/// gvfs backends that expose a phone's camera roll
const GVFS_BACKENDS: &[&str] = &["afc:", "gphoto2:", "mtp:"];

// ============================================================================
// Shared helpers
// ============================================================================

/// Pick the most confident candidate, preferring the earliest on ties
fn pick_best(mut hits: Vec<ProbeCandidate>) -> Option<ProbeCandidate> {
    hits.sort_by_key(|c| c.confidence);
    hits.into_iter().next()
}

/// Immediate subdirectories of `path`, sorted by name
fn sorted_subdirs(path: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = match fs::read_dir(path) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect(),
        Err(e) => {
            trace!("Cannot list {}: {}", path.display(), e);
            Vec::new()
        }
    };
    dirs.sort();
    dirs
}

fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// gvfs mount directories for the current user
fn gvfs_mount_dirs() -> Vec<PathBuf> {
    let mut roots = Vec::new();

    if let Some(runtime) = std::env::var_os("XDG_RUNTIME_DIR") {
        roots.push(PathBuf::from(runtime).join("gvfs"));
    }
    if let Some(uid) = current_uid() {
        let path = PathBuf::from(format!("/run/user/{}/gvfs", uid));
        if !roots.contains(&path) {
            roots.push(path);
        }
    }
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".gvfs"));
    }

    roots
}

#[cfg(unix)]
fn current_uid() -> Option<u32> {
    use std::os::unix::fs::MetadataExt;
    dirs::home_dir()
        .and_then(|home| fs::metadata(home).ok())
        .map(|m| m.uid())
}

#[cfg(not(unix))]
fn current_uid() -> Option<u32> {
    None
}

/// `/media/$USER` style directories where desktops auto-mount volumes
fn user_media_dirs() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(user) = std::env::var("USER") {
        roots.push(PathBuf::from("/media").join(&user));
        roots.push(PathBuf::from("/run/media").join(&user));
    }
    roots
}

// ============================================================================
// Media API (gvfs / Spotlight)
// ============================================================================

/// Platform media-access layer
///
/// On Linux this looks at GIO/gvfs mounts of the AFC, gphoto2 and MTP
/// backends. On macOS it asks Spotlight for iPhone volumes.
pub struct MediaApiProbe {
    gvfs_roots: Vec<PathBuf>,
    spotlight: bool,
}

impl MediaApiProbe {
    pub const NAME: &'static str = "media-api";

    /// Probe only the given gvfs mount directories
    pub fn with_gvfs_roots(gvfs_roots: Vec<PathBuf>) -> Self {
        Self {
            gvfs_roots,
            spotlight: false,
        }
    }

    fn gvfs_candidates(&self, root: &Path) -> Vec<ProbeCandidate> {
        let mut hits = Vec::new();

        for mount in sorted_subdirs(root) {
            let name = file_name_lossy(&mount);
            if !GVFS_BACKENDS.iter().any(|prefix| name.starts_with(prefix)) {
                continue;
            }

            let confidence = if name.starts_with("afc:") || looks_like_apple(&name) {
                Confidence::High
            } else {
                Confidence::Low
            };
            debug!("gvfs mount {} ({} confidence)", name, confidence);

            if find_media_container(&mount).is_some() {
                hits.push(ProbeCandidate {
                    path: mount,
                    confidence,
                });
                continue;
            }

            // MTP exposes one directory per storage
            for storage in sorted_subdirs(&mount) {
                if find_media_container(&storage).is_some() {
                    hits.push(ProbeCandidate {
                        path: storage,
                        confidence,
                    });
                }
            }
        }

        hits
    }
}

impl Default for MediaApiProbe {
    fn default() -> Self {
        Self {
            gvfs_roots: gvfs_mount_dirs(),
            spotlight: cfg!(target_os = "macos"),
        }
    }
}

impl ProbeStrategy for MediaApiProbe {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn attempt(&self) -> ProbeResult {
        let roots: Vec<&PathBuf> = self.gvfs_roots.iter().filter(|p| p.is_dir()).collect();

        if roots.is_empty() && !self.spotlight {
            return ProbeResult::not_applicable("no GIO/gvfs mount directory on this system");
        }

        let mut hits: Vec<ProbeCandidate> = roots
            .iter()
            .flat_map(|root| self.gvfs_candidates(root))
            .collect();

        if self.spotlight {
            hits.extend(spotlight_volumes().into_iter().map(|path| ProbeCandidate {
                path,
                confidence: Confidence::High,
            }));
        }

        match pick_best(hits) {
            Some(candidate) => ProbeResult::Found(candidate),
            None => ProbeResult::failed("no AFC, gphoto2 or MTP mount with a DCIM folder"),
        }
    }
}

/// Volumes Spotlight reports as iPhones
fn spotlight_volumes() -> Vec<PathBuf> {
    let output = match std::process::Command::new("mdfind")
        .arg("kMDItemKind == 'iPhone'")
        .output()
    {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            debug!("mdfind exited with {}", output.status);
            return Vec::new();
        }
        Err(e) => {
            debug!("mdfind unavailable: {}", e);
            return Vec::new();
        }
    };

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .filter(|p| p.is_dir())
        .collect()
}

// ============================================================================
// Mounted volume scan
// ============================================================================

/// A mounted volume as reported by the OS
#[derive(Debug, Clone)]
pub struct VolumeInfo {
    pub name: String,
    pub mount_point: PathBuf,
    pub removable: bool,
}

/// OS-mounted volume listing
pub struct VolumeScanProbe;

impl VolumeScanProbe {
    pub const NAME: &'static str = "volume-scan";
}

impl ProbeStrategy for VolumeScanProbe {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn attempt(&self) -> ProbeResult {
        let disks = sysinfo::Disks::new_with_refreshed_list();
        let volumes: Vec<VolumeInfo> = disks
            .list()
            .iter()
            .map(|disk| VolumeInfo {
                name: disk.name().to_string_lossy().into_owned(),
                mount_point: disk.mount_point().to_path_buf(),
                removable: disk.is_removable(),
            })
            .collect();

        if volumes.is_empty() {
            return ProbeResult::failed("the OS reported no mounted volumes");
        }

        match rank_volumes(&volumes) {
            Some(candidate) => ProbeResult::Found(candidate),
            None => ProbeResult::failed(format!(
                "none of {} mounted volumes looks like an Apple device",
                volumes.len()
            )),
        }
    }
}

/// Rank volumes holding a DCIM folder: identifier matches first, then
/// removable volumes
pub fn rank_volumes(volumes: &[VolumeInfo]) -> Option<ProbeCandidate> {
    let hits = volumes
        .iter()
        .filter_map(|volume| {
            if find_media_container(&volume.mount_point).is_none() {
                return None;
            }

            let identified = looks_like_apple(&volume.name)
                || looks_like_apple(&volume.mount_point.to_string_lossy());

            if identified {
                Some(ProbeCandidate {
                    path: volume.mount_point.clone(),
                    confidence: Confidence::High,
                })
            } else if volume.removable {
                Some(ProbeCandidate {
                    path: volume.mount_point.clone(),
                    confidence: Confidence::Low,
                })
            } else {
                None
            }
        })
        .collect();

    pick_best(hits)
}

// ============================================================================
// USB bus enumeration
// ============================================================================

/// A USB device as read from the bus
#[derive(Debug, Clone)]
pub struct UsbDevice {
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial: Option<String>,
    pub product: Option<String>,
}

impl UsbDevice {
    /// iPhone, iPad or iPod touch
    pub fn is_apple_mobile(&self) -> bool {
        self.vendor_id == APPLE_VENDOR_ID && APPLE_MOBILE_PRODUCT_IDS.contains(&self.product_id)
    }

    fn describe(&self) -> String {
        match &self.product {
            Some(product) => product.clone(),
            None => format!("Apple device {:04x}:{:04x}", self.vendor_id, self.product_id),
        }
    }
}

/// USB bus enumeration filtered on Apple's vendor ID
///
/// Finding the device on the bus says nothing about where it is mounted, so
/// this strategy then looks for a mount whose name carries the device serial.
pub struct UsbBusProbe {
    mount_roots: Vec<PathBuf>,
}

impl UsbBusProbe {
    pub const NAME: &'static str = "usb-bus";

    pub fn with_mount_roots(mount_roots: Vec<PathBuf>) -> Self {
        Self { mount_roots }
    }
}

impl Default for UsbBusProbe {
    fn default() -> Self {
        let mut mount_roots = gvfs_mount_dirs();
        mount_roots.extend(user_media_dirs());
        mount_roots.push(PathBuf::from("/Volumes"));
        Self { mount_roots }
    }
}

impl ProbeStrategy for UsbBusProbe {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn attempt(&self) -> ProbeResult {
        let devices = match list_usb_devices() {
            Ok(devices) => devices,
            Err(e) => return ProbeResult::failed(format!("USB enumeration failed: {}", e)),
        };

        let apple: Vec<UsbDevice> = devices.into_iter().filter(|d| d.is_apple_mobile()).collect();
        if apple.is_empty() {
            return ProbeResult::not_applicable("no Apple device on the USB bus");
        }

        for device in &apple {
            debug!(
                "USB: {} (serial {})",
                device.describe(),
                device.serial.as_deref().unwrap_or("unknown")
            );
        }

        match match_mounts(&apple, &self.mount_roots) {
            Some(candidate) => ProbeResult::Found(candidate),
            None => ProbeResult::failed(format!(
                "{} is on the USB bus but not mounted; unlock it and tap Trust",
                apple[0].describe()
            )),
        }
    }
}

fn list_usb_devices() -> Result<Vec<UsbDevice>, String> {
    use nusb::MaybeFuture;

    let devices = nusb::list_devices().wait().map_err(|e| e.to_string())?;
    Ok(devices
        .map(|info| UsbDevice {
            vendor_id: info.vendor_id(),
            product_id: info.product_id(),
            serial: info.serial_number().map(str::to_string),
            product: info.product_string().map(str::to_string),
        })
        .collect())
}

/// Find mount directories that belong to one of the given USB devices
///
/// A directory whose name contains the serial is a high-confidence match; one
/// that only contains the product string is a low-confidence match. Mounts
/// without a DCIM folder are ignored.
pub fn match_mounts(devices: &[UsbDevice], mount_roots: &[PathBuf]) -> Option<ProbeCandidate> {
    let mut hits = Vec::new();

    for root in mount_roots {
        for mount in sorted_subdirs(root) {
            if find_media_container(&mount).is_none() {
                continue;
            }
            let name = file_name_lossy(&mount).to_lowercase();
            let squashed = name.replace(['-', '_', ' '], "");

            for device in devices {
                let serial_match = device.serial.as_ref().is_some_and(|serial| {
                    let serial = serial.to_lowercase().replace('-', "");
                    !serial.is_empty() && squashed.contains(&serial)
                });

                let product_match = device.product.as_ref().is_some_and(|product| {
                    let product = product.to_lowercase().replace(['-', '_', ' '], "");
                    !product.is_empty() && squashed.contains(&product)
                });

                if serial_match || product_match {
                    hits.push(ProbeCandidate {
                        path: mount.clone(),
                        confidence: if serial_match {
                            Confidence::High
                        } else {
                            Confidence::Low
                        },
                    });
                    break;
                }
            }
        }
    }

    pick_best(hits)
}

// ============================================================================
// Well-known mount paths
// ============================================================================

/// Well-known mount path heuristics
pub struct MountPathProbe {
    exact: Vec<PathBuf>,
    parents: Vec<PathBuf>,
}

impl MountPathProbe {
    pub const NAME: &'static str = "mount-paths";

    /// Probe explicit paths, then every child directory of `parents`
    pub fn new(exact: Vec<PathBuf>, parents: Vec<PathBuf>) -> Self {
        Self { exact, parents }
    }

    fn candidate_for(path: PathBuf) -> Option<ProbeCandidate> {
        find_media_container(&path)?;
        let confidence = if looks_like_apple(&path.to_string_lossy()) {
            Confidence::High
        } else {
            Confidence::Low
        };
        Some(ProbeCandidate { path, confidence })
    }
}

impl Default for MountPathProbe {
    fn default() -> Self {
        let mut exact = Vec::new();
        let mut parents = Vec::new();

        if cfg!(target_os = "macos") {
            exact.push(PathBuf::from("/Volumes/Apple iPhone"));
            exact.push(PathBuf::from("/Volumes/iPhone"));
            parents.push(PathBuf::from("/Volumes"));
        } else if cfg!(windows) {
            exact.extend((b'A'..=b'Z').map(|letter| PathBuf::from(format!("{}:\\", letter as char))));
        } else {
            parents.extend(gvfs_mount_dirs());
            parents.extend(user_media_dirs());
            parents.push(PathBuf::from("/mnt"));
        }

        Self { exact, parents }
    }
}

impl ProbeStrategy for MountPathProbe {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn attempt(&self) -> ProbeResult {
        let mut hits: Vec<ProbeCandidate> = self
            .exact
            .iter()
            .filter(|p| p.is_dir())
            .filter_map(|p| Self::candidate_for(p.clone()))
            .collect();

        hits.extend(
            self.parents
                .iter()
                .flat_map(|parent| sorted_subdirs(parent))
                .filter_map(Self::candidate_for),
        );

        match pick_best(hits) {
            Some(candidate) => ProbeResult::Found(candidate),
            None => ProbeResult::failed("no well-known mount path holds a DCIM folder"),
        }
    }
}

// ============================================================================
// Manual path
// ============================================================================

/// Caller-supplied device path
///
/// Trusted because a human chose it: only existence and readability are
/// checked.
pub struct ManualPathProbe {
    path: PathBuf,
}

impl ManualPathProbe {
    pub const NAME: &'static str = "manual";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProbeStrategy for ManualPathProbe {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn attempt(&self) -> ProbeResult {
        let metadata = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) => return ProbeResult::failed(format!("path does not exist: {}", e)),
        };
        if !metadata.is_dir() {
            return ProbeResult::failed("path is not a directory");
        }
        if let Err(e) = fs::read_dir(&self.path) {
            return ProbeResult::failed(format!("directory not readable: {}", e));
        }
        ProbeResult::found(self.path.clone(), Confidence::High)
    }
}
