//! Device reconciliation.
//!
//! A [`Device`] pairs a validated configuration with the state last published
//! to the host. Each reconciliation pass builds a candidate state from the
//! cycle's [`Snapshot`], publishes the fields that changed and keeps the
//! candidate as the new published state.
//!
//! Two independent state machines live here: the identifier goes from unknown
//! to known (local volumes can be re-resolved later), and on/off follows the
//! presence of the identifier in `df`.

use std::thread;
use std::time::Duration;

use chrono::Local;
use log::{debug, error, info};

use crate::config::{DeviceConfig, VolumeKind};
use crate::df;
use crate::diskutil;
use crate::error::{Error, Result};
use crate::executor::CommandRunner;
use crate::mount::{self, CommandPair};
use crate::snapshot::Snapshot;
use crate::state::{DeviceState, StateChange, TIMESTAMP_FORMAT};

/// Receives state changes for the host.
pub trait StatePublisher {
    /// Called with the changed fields of one device, never with an empty slice.
    fn publish(&mut self, device: &str, changes: &[StateChange]);

    /// Called after `publish` when the device switched on or off.
    fn indicate(&mut self, device: &str, on: bool);
}

/// Everything a reconciliation pass needs besides the device itself.
pub struct Cycle<'a> {
    pub runner: &'a dyn CommandRunner,
    pub snapshot: &'a mut Snapshot,
    pub publisher: &'a mut dyn StatePublisher,
}

/// Extra work requested for one `update` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Look the identifier up again even if one is known.
    pub force_identify: bool,
    /// Touch the keep-awake file if the device asks for it.
    pub touch: bool,
}

/// Result of a state request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The device was already in the requested state; nothing ran.
    Unchanged,
    /// The command succeeded and state was re-read.
    Applied,
}

/// A configured volume and its published state.
#[derive(Debug, Clone)]
pub struct Device {
    config: DeviceConfig,
    state: DeviceState,
    commands: CommandPair,
}

impl Device {
    /// Creates a device with nothing published yet.
    pub fn new(config: DeviceConfig) -> Self {
        let state = DeviceState::default();
        let commands = CommandPair::build(&config, &state.identifier);
        Self {
            config,
            state,
            commands,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// The state last published.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn commands(&self) -> &CommandPair {
        &self.commands
    }

    pub fn is_on(&self) -> bool {
        self.state.on_off_state
    }

    /// Recomputes the device state and publishes what changed.
    pub fn update(&mut self, cycle: &mut Cycle<'_>, options: UpdateOptions) {
        let mut candidate = self.state.clone();

        if candidate.identifier.is_empty() || options.force_identify {
            self.identify(cycle, &mut candidate);
        }
        if candidate.identifier != self.state.identifier {
            self.commands = CommandPair::build(&self.config, &candidate.identifier);
        }

        let stats = df::find_stats(
            cycle.snapshot.df_text(cycle.runner),
            &candidate.identifier,
        );
        candidate.on_off_state = stats.is_some();

        if let Some(stats) = stats {
            candidate.apply_stats(&stats);
            if options.touch && self.config.prevent_sleep {
                self.touch(cycle.runner, &mut candidate);
            }
        }

        self.publish(&mut *cycle.publisher, candidate);
    }

    /// Mounts (`on`) or unmounts the volume.
    ///
    /// Does nothing if the device is already in the requested state. On
    /// success the snapshot is invalidated and, after `settle` for the mount
    /// table to catch up, the device is updated. On failure the published
    /// state is left as is.
    pub fn request_state(
        &mut self,
        on: bool,
        cycle: &mut Cycle<'_>,
        settle: Duration,
    ) -> Result<Transition> {
        if self.state.on_off_state == on {
            return Ok(Transition::Unchanged);
        }

        let (verb, progress) = if on {
            ("mount", "mounting")
        } else {
            ("unmount", "unmounting")
        };
        let output = cycle
            .runner
            .run(self.commands.for_state(on))
            .inspect_err(|e| {
                error!(
                    "can't {} volume \"{}\": {}",
                    verb, self.config.volume_name, e
                )
            })?;

        if !output.success() {
            let output_text = output.combined();
            error!(
                "can't {} volume \"{}\": {}",
                verb, self.config.volume_name, output_text
            );
            return Err(Error::CommandExit {
                command: format!("{} {}", verb, self.config.volume_name),
                code: output.code,
                output: output_text,
            });
        }

        info!("{} volume \"{}\"", progress, self.config.volume_name);
        cycle.snapshot.invalidate();
        if !settle.is_zero() {
            thread::sleep(settle);
        }
        self.update(cycle, UpdateOptions::default());

        Ok(Transition::Applied)
    }

    fn identify(&self, cycle: &mut Cycle<'_>, candidate: &mut DeviceState) {
        debug!(
            "getting identifier for volume \"{}\"",
            self.config.volume_name
        );

        match &self.config.kind {
            VolumeKind::Local => {
                let listing = cycle.snapshot.diskutil_text(cycle.runner);
                match diskutil::resolve_volume(listing, &self.config.volume_name) {
                    Some(resolved) => {
                        candidate.identifier = resolved.identifier;
                        candidate.disk_type = resolved.disk_type;
                    }
                    None => debug!(
                        "volume \"{}\" not found in disk list",
                        self.config.volume_name
                    ),
                }
            }
            VolumeKind::Network(url) => {
                candidate.identifier = url.identifier();
                candidate.disk_type = url.scheme.as_str().to_string();
            }
        }
    }

    fn touch(&self, runner: &dyn CommandRunner, candidate: &mut DeviceState) {
        debug!("touching file on volume \"{}\"", self.config.volume_name);

        match runner.run_checked(&mount::touch(&self.config.mount_point)) {
            Ok(_) => candidate.last_touch = Local::now().format(TIMESTAMP_FORMAT).to_string(),
            Err(e) => error!(
                "can't touch file on volume \"{}\": {}",
                self.config.volume_name, e
            ),
        }
    }

    fn publish(&mut self, publisher: &mut dyn StatePublisher, candidate: DeviceState) {
        let changes = self.state.diff(&candidate);
        if changes.is_empty() {
            return;
        }

        debug!("updating states on device \"{}\":", self.config.name);
        for change in &changes {
            debug!("{:>12}: {}", change.key, change.value);
        }
        publisher.publish(&self.config.name, &changes);

        let toggled = candidate.on_off_state != self.state.on_off_state;
        self.state = candidate;

        if toggled {
            let on = self.state.on_off_state;
            info!("\"{}\" {}", self.config.name, if on { "on" } else { "off" });
            publisher.indicate(&self.config.name, on);
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording publisher and log capture for unit tests.

    use std::cell::RefCell;

    use log::{LevelFilter, Log, Metadata, Record};

    use super::*;

    thread_local! {
        static RECORDS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    /// Collects records per thread, so parallel tests don't see each other.
    struct CaptureLogger;

    impl Log for CaptureLogger {
        fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &Record<'_>) {
            RECORDS.with(|records| {
                records
                    .borrow_mut()
                    .push(format!("{} {}", record.level(), record.args()))
            });
        }

        fn flush(&self) {}
    }

    static LOGGER: CaptureLogger = CaptureLogger;

    /// Runs `f` and returns the log lines it emitted, as `"LEVEL message"`.
    pub fn capture_logs(f: impl FnOnce()) -> Vec<String> {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
        RECORDS.with(|records| records.borrow_mut().clear());
        f();
        RECORDS.with(|records| records.take())
    }

    #[derive(Debug, Default)]
    pub struct RecordingPublisher {
        pub published: Vec<(String, Vec<StateChange>)>,
        pub indicators: Vec<(String, bool)>,
    }

    impl RecordingPublisher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Keys published across all calls, in order.
        pub fn keys(&self) -> Vec<String> {
            self.published
                .iter()
                .flat_map(|(_, changes)| changes.iter().map(|c| c.key.clone()))
                .collect()
        }

        pub fn clear(&mut self) {
            self.published.clear();
            self.indicators.clear();
        }
    }

    impl StatePublisher for RecordingPublisher {
        fn publish(&mut self, device: &str, changes: &[StateChange]) {
            self.published.push((device.to_string(), changes.to_vec()));
        }

        fn indicate(&mut self, device: &str, on: bool) {
            self.indicators.push((device.to_string(), on));
        }
    }
}
