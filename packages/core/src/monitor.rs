//! Poll cycle over all registered devices.
//!
//! [`Monitor`] owns the devices, the command runner and the snapshot. The
//! caller drives it: [`Monitor::start`] once, then [`Monitor::run_cycle`] at
//! the poll interval, with [`Monitor::perform`] for host actions in between.
//! Everything runs on the caller's thread, one device at a time.

use std::time::{Duration, Instant};

use log::{debug, info};
use snafu::OptionExt;

use crate::config::{DeviceConfig, Settings};
use crate::device::{Cycle, Device, StatePublisher, UpdateOptions};
use crate::error::{Result, UnknownDeviceSnafu};
use crate::executor::CommandRunner;
use crate::snapshot::Snapshot;

/// Host action on one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAction {
    TurnOn,
    TurnOff,
    Toggle,
    /// Re-read state now, including the identifier.
    RequestStatus,
}

/// Decides which slow tasks are due at the start of a cycle.
#[derive(Debug, Clone)]
pub struct Schedule {
    identify_every: Duration,
    touch_every: Duration,
    last_identify: Instant,
    last_touch: Instant,
}

impl Schedule {
    /// Both tasks first fall due one interval after `now`.
    pub fn new(identify_every: Duration, touch_every: Duration, now: Instant) -> Self {
        Self {
            identify_every,
            touch_every,
            last_identify: now,
            last_touch: now,
        }
    }

    /// Returns the tasks due at `now` and restarts their intervals.
    pub fn due(&mut self, now: Instant) -> UpdateOptions {
        let force_identify = now >= self.last_identify + self.identify_every;
        let touch = now >= self.last_touch + self.touch_every;

        if force_identify {
            self.last_identify = now;
        }
        if touch {
            self.last_touch = now;
        }

        UpdateOptions {
            force_identify,
            touch,
        }
    }
}

/// Registered devices and the resources they share.
pub struct Monitor<R> {
    runner: R,
    snapshot: Snapshot,
    devices: Vec<Device>,
    schedule: Schedule,
    poll_interval: Duration,
    settle_delay: Duration,
}

impl<R: CommandRunner> Monitor<R> {
    /// Validates the configured devices and registers them.
    pub fn new(settings: &Settings, runner: R) -> Result<Self> {
        let configs = settings.device_configs()?;
        Ok(Self::with_devices(settings, configs, runner))
    }

    /// Registers already validated devices.
    pub fn with_devices(settings: &Settings, configs: Vec<DeviceConfig>, runner: R) -> Self {
        Self {
            runner,
            snapshot: Snapshot::new(),
            devices: configs.into_iter().map(Device::new).collect(),
            schedule: Schedule::new(
                settings.identify_interval(),
                settings.touch_interval(),
                Instant::now(),
            ),
            poll_interval: settings.poll_interval(),
            settle_delay: settings.settle_delay(),
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name() == name)
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Reconciles every device once with a fresh identifier lookup.
    pub fn start(&mut self, publisher: &mut dyn StatePublisher) {
        debug!("starting {} device(s)", self.devices.len());
        let options = UpdateOptions {
            force_identify: true,
            touch: false,
        };
        self.reconcile_all(options, publisher);
    }

    /// Runs one poll cycle at `now`.
    pub fn run_cycle(&mut self, now: Instant, publisher: &mut dyn StatePublisher) {
        let options = self.schedule.due(now);
        if options.force_identify {
            debug!("refreshing volume identifiers");
        }
        self.reconcile_all(options, publisher);
    }

    fn reconcile_all(&mut self, options: UpdateOptions, publisher: &mut dyn StatePublisher) {
        self.snapshot.invalidate();
        let mut cycle = Cycle {
            runner: &self.runner,
            snapshot: &mut self.snapshot,
            publisher,
        };
        for device in &mut self.devices {
            device.update(&mut cycle, options);
        }
    }

    /// Applies a host action to the device called `name`.
    pub fn perform(
        &mut self,
        name: &str,
        action: DeviceAction,
        publisher: &mut dyn StatePublisher,
    ) -> Result<()> {
        let device = self
            .devices
            .iter_mut()
            .find(|d| d.name() == name)
            .context(UnknownDeviceSnafu { name })?;
        let mut cycle = Cycle {
            runner: &self.runner,
            snapshot: &mut self.snapshot,
            publisher,
        };

        let on = match action {
            DeviceAction::TurnOn => true,
            DeviceAction::TurnOff => false,
            DeviceAction::Toggle => !device.is_on(),
            DeviceAction::RequestStatus => {
                info!("\"{}\" status update", name);
                cycle.snapshot.invalidate();
                let options = UpdateOptions {
                    force_identify: true,
                    touch: false,
                };
                device.update(&mut cycle, options);
                return Ok(());
            }
        };

        device.request_state(on, &mut cycle, self.settle_delay)?;
        Ok(())
    }
}
