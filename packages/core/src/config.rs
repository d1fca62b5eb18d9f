//! Settings file and device configuration.
//!
//! Settings are read from a JSON file holding the loop cadence and the list of
//! devices. Device entries are validated into [`DeviceConfig`] before any
//! device is registered, so configuration errors never reach the poll loop.
//!
//! ```json
//! {
//!   "poll_interval_secs": 10,
//!   "devices": [
//!     { "volume_name": "Backup", "prevent_sleep": true },
//!     { "name": "NAS", "kind": "network", "volume_name": "media",
//!       "volume_url": "smb://guest@nas.local/media" }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::error::{
    ConfigParseSnafu, DuplicateDeviceSnafu, Error, FieldError, IoResultExt, Result,
};
use crate::remote::VolumeUrl;

/// Directory local volumes are mounted under by macOS.
pub const VOLUMES_DIR: &str = "/Volumes";

/// Application directory name under the user configuration directory.
pub const APP_DIR: &str = "macdisks";

/// Settings file name.
pub const CONFIG_FILE: &str = "config.json";

/// Returns `<config dir>/macdisks/config.json`.
pub fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().ok_or(Error::ConfigDirNotFound)?;
    Ok(dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Kind of volume a device controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// A disk or partition attached to this machine.
    #[default]
    Local,
    /// A share mounted from a URL.
    Network,
}

/// A device entry as written in the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Display name; defaults to the volume name.
    pub name: Option<String>,
    pub kind: DeviceKind,
    /// Volume name as shown by `diskutil list` and under `/Volumes`.
    pub volume_name: String,
    /// Share URL, network devices only.
    pub volume_url: Option<String>,
    /// Periodically touch a file on the volume so the disk doesn't sleep.
    pub prevent_sleep: bool,
    /// Unmount even if files are open.
    pub force_unmount: bool,
    /// Remove the network mount point directory after unmounting.
    pub remove_mount_point: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            name: None,
            kind: DeviceKind::Local,
            volume_name: String::new(),
            volume_url: None,
            prevent_sleep: false,
            force_unmount: false,
            remove_mount_point: true,
        }
    }
}

impl DeviceSettings {
    /// Name used for logs and host requests.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.volume_name)
    }

    /// Validates the entry, reporting every invalid field at once.
    pub fn validate(&self) -> Result<DeviceConfig> {
        let mut errors = Vec::new();

        let volume_name = self.volume_name.trim();
        if volume_name.is_empty() {
            errors.push(FieldError::new("volume_name", "Required"));
        } else if volume_name.contains('/') {
            errors.push(FieldError::new("volume_name", "must not contain '/'"));
        }

        let kind = match self.kind {
            DeviceKind::Local => Some(VolumeKind::Local),
            DeviceKind::Network => match self.volume_url.as_deref().map(str::trim) {
                None | Some("") => {
                    errors.push(FieldError::new("volume_url", "Required"));
                    None
                }
                Some(url) => match VolumeUrl::parse(url) {
                    Ok(url) => Some(VolumeKind::Network(url)),
                    Err(message) => {
                        errors.push(FieldError::new("volume_url", message));
                        None
                    }
                },
            },
        };

        match kind {
            Some(kind) if errors.is_empty() => Ok(DeviceConfig {
                name: self.display_name().trim().to_string(),
                volume_name: volume_name.to_string(),
                mount_point: Path::new(VOLUMES_DIR).join(volume_name),
                kind,
                prevent_sleep: self.prevent_sleep,
                force_unmount: self.force_unmount,
                remove_mount_point: self.remove_mount_point,
            }),
            _ => Err(Error::InvalidDevice {
                device: self.display_name().to_string(),
                errors,
            }),
        }
    }
}

/// How a validated device reaches its volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeKind {
    Local,
    Network(VolumeUrl),
}

/// A validated device configuration. Immutable for the device's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub name: String,
    pub volume_name: String,
    /// `/Volumes/<volume_name>`.
    pub mount_point: PathBuf,
    pub kind: VolumeKind,
    pub prevent_sleep: bool,
    pub force_unmount: bool,
    pub remove_mount_point: bool,
}

/// Contents of the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between poll cycles.
    pub poll_interval_secs: u64,
    /// Minutes between forced identifier lookups.
    pub identify_interval_mins: u64,
    /// Minutes between keep-awake touches.
    pub touch_interval_mins: u64,
    /// Milliseconds to wait after a mount or unmount before re-reading state.
    pub settle_delay_ms: u64,
    /// Start with debug logging enabled.
    pub debug: bool,
    pub devices: Vec<DeviceSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            identify_interval_mins: 10,
            touch_interval_mins: 10,
            settle_delay_ms: 1000,
            debug: false,
            devices: Vec::new(),
        }
    }
}

impl Settings {
    /// Reads settings from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).config_read_context(path)?;
        Self::from_json(&text, path)
    }

    /// Parses settings text; `path` is only used in error messages.
    pub fn from_json(text: &str, path: &Path) -> Result<Self> {
        serde_json::from_str(text).context(ConfigParseSnafu { path })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn identify_interval(&self) -> Duration {
        Duration::from_secs(self.identify_interval_mins * 60)
    }

    pub fn touch_interval(&self) -> Duration {
        Duration::from_secs(self.touch_interval_mins * 60)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Validates every device entry and checks that names are unique.
    ///
    /// Stops at the first invalid device.
    pub fn device_configs(&self) -> Result<Vec<DeviceConfig>> {
        let mut seen = HashSet::new();
        let mut configs = Vec::with_capacity(self.devices.len());

        for entry in &self.devices {
            let config = entry.validate()?;
            if !seen.insert(config.name.clone()) {
                return DuplicateDeviceSnafu { name: config.name }.fail();
            }
            configs.push(config);
        }

        Ok(configs)
    }
}
