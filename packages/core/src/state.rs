//! Published device state.
//!
//! [`DeviceState`] is the record the host stores per device. The reconciler
//! builds a candidate record each pass and publishes only the fields that
//! differ from the last published one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::df::DiskStats;
use crate::size::format_megabytes;

/// Format of the `last_touch` timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single state value as sent to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Number(u64),
    Text(String),
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("on"),
            Self::Bool(false) => f.write_str("off"),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u64> for StateValue {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

impl From<&String> for StateValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

/// One changed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub key: String,
    pub value: StateValue,
}

/// Everything the host knows about one device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Device path or share identifier; empty until resolved.
    pub identifier: String,
    /// Partition type for local volumes, URL scheme for shares.
    pub disk_type: String,
    /// True while the volume is mounted.
    pub on_off_state: bool,
    pub megs_total: u64,
    pub megs_used: u64,
    pub megs_free: u64,
    pub percent_used: u64,
    pub percent_free: u64,
    pub size_total: String,
    pub size_used: String,
    pub size_free: String,
    /// Local time of the last successful keep-awake touch.
    pub last_touch: String,
}

impl DeviceState {
    /// Key of the on/off field.
    pub const ON_OFF_KEY: &'static str = "on_off_state";

    /// Every field as a `(key, value)` pair, in declaration order.
    pub fn fields(&self) -> Vec<(&'static str, StateValue)> {
        vec![
            ("identifier", (&self.identifier).into()),
            ("disk_type", (&self.disk_type).into()),
            (Self::ON_OFF_KEY, self.on_off_state.into()),
            ("megs_total", self.megs_total.into()),
            ("megs_used", self.megs_used.into()),
            ("megs_free", self.megs_free.into()),
            ("percent_used", self.percent_used.into()),
            ("percent_free", self.percent_free.into()),
            ("size_total", (&self.size_total).into()),
            ("size_used", (&self.size_used).into()),
            ("size_free", (&self.size_free).into()),
            ("last_touch", (&self.last_touch).into()),
        ]
    }

    /// Fields of `candidate` that differ from `self`.
    pub fn diff(&self, candidate: &DeviceState) -> Vec<StateChange> {
        self.fields()
            .into_iter()
            .zip(candidate.fields())
            .filter(|((_, old), (_, new))| old != new)
            .map(|(_, (key, value))| StateChange {
                key: key.to_string(),
                value,
            })
            .collect()
    }

    /// Copies capacity figures from a `df` line.
    pub fn apply_stats(&mut self, stats: &DiskStats) {
        self.megs_total = stats.megs_total;
        self.megs_used = stats.megs_used;
        self.megs_free = stats.megs_free;
        self.percent_used = stats.percent_used;
        self.percent_free = stats.percent_free();
        self.size_total = format_megabytes(stats.megs_total);
        self.size_used = format_megabytes(stats.megs_used);
        self.size_free = format_megabytes(stats.megs_free);
    }
}
