//! macdisks-core: mount and unmount macOS volumes from a home-automation host.
//!
//! Each configured device is a local volume or a network share that the host
//! sees as an on/off switch. The library polls `df` and `diskutil list`, keeps
//! a published state record per device and reports only the fields that
//! changed.
//!
//! # Modules
//!
//! - [`config`]: Settings file and device validation
//! - [`diskutil`]: `diskutil list` parsing and volume resolution
//! - [`df`]: `df -mn` parsing
//! - [`remote`]: Network share URLs
//! - [`mount`]: Shell command construction
//! - [`snapshot`]: Per-cycle command output cache
//! - [`device`]: Per-device reconciliation
//! - [`monitor`]: Poll cycle over all devices
//! - [`protocol`]: JSON-lines host protocol
//! - [`executor`]: Shell command execution
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```no_run
//! use macdisks_core::{Monitor, Settings, ShellRunner, config, protocol};
//!
//! let settings = Settings::load(&config::default_config_path().unwrap()).unwrap();
//! let mut monitor = Monitor::new(&settings, ShellRunner::new()).unwrap();
//! let mut publisher = protocol::JsonLinesPublisher::new(std::io::stdout());
//!
//! monitor.start(&mut publisher);
//! monitor.run_cycle(std::time::Instant::now(), &mut publisher);
//! ```

pub mod config;
pub mod device;
pub mod df;
pub mod diskutil;
pub mod error;
pub mod executor;
pub mod monitor;
pub mod mount;
pub mod protocol;
pub mod remote;
pub mod size;
pub mod snapshot;
pub mod state;

// Re-export commonly used types
pub use config::{DeviceConfig, DeviceSettings, Settings};
pub use device::{Device, StatePublisher};
pub use error::{Error, Result};
pub use executor::{CommandRunner, ShellRunner};
pub use monitor::{DeviceAction, Monitor};
pub use state::{DeviceState, StateChange, StateValue};
