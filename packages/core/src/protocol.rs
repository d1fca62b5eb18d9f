//! JSON-lines protocol between the host and the daemon (`macdisks run`).
//!
//! The host writes one [`HostRequest`] per line to the daemon's stdin. The
//! daemon writes [`HostEvent`]s to stdout: state changes and on/off
//! indicators as they happen, and one response per request.
//!
//! ```text
//! > {"id":1,"cmd":"turn_on","device":"Backup"}
//! < {"event":"state_changed","device":"Backup","changes":[{"key":"on_off_state","value":true}]}
//! < {"event":"indicator","device":"Backup","on":true}
//! < {"event":"response","id":1,"success":true}
//! ```

use std::io::Write;

use log::error;
use serde::{Deserialize, Serialize};

use crate::device::StatePublisher;
use crate::monitor::DeviceAction;
use crate::state::StateChange;

/// Request sent by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRequest {
    /// Echoed back in the response.
    pub id: u64,
    #[serde(flatten)]
    pub cmd: HostCommand,
}

/// Command types for the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum HostCommand {
    TurnOn { device: String },
    TurnOff { device: String },
    Toggle { device: String },
    RequestStatus { device: String },
    /// Flip between info and debug logging.
    ToggleDebug,
    /// Stop the daemon after responding.
    Shutdown,
}

impl HostCommand {
    /// The device action this command maps to, if it targets a device.
    pub fn device_action(&self) -> Option<(&str, DeviceAction)> {
        match self {
            Self::TurnOn { device } => Some((device.as_str(), DeviceAction::TurnOn)),
            Self::TurnOff { device } => Some((device.as_str(), DeviceAction::TurnOff)),
            Self::Toggle { device } => Some((device.as_str(), DeviceAction::Toggle)),
            Self::RequestStatus { device } => Some((device.as_str(), DeviceAction::RequestStatus)),
            Self::ToggleDebug | Self::Shutdown => None,
        }
    }
}

/// Message sent to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    StateChanged {
        device: String,
        changes: Vec<StateChange>,
    },
    /// The device's on/off indicator should follow `on`.
    Indicator { device: String, on: bool },
    Response {
        id: u64,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl HostEvent {
    pub fn success(id: u64) -> Self {
        Self::Response {
            id,
            success: true,
            error: None,
        }
    }

    pub fn failure(id: u64, message: impl Into<String>) -> Self {
        Self::Response {
            id,
            success: false,
            error: Some(message.into()),
        }
    }
}

/// Writes events as JSON lines to `W`, flushing after each one.
pub struct JsonLinesPublisher<W> {
    writer: W,
}

impl<W: Write> JsonLinesPublisher<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Sends one event. Write failures are logged; the host reading our
    /// stdout going away is detected elsewhere.
    pub fn send(&mut self, event: &HostEvent) {
        let result = serde_json::to_string(event)
            .map_err(std::io::Error::from)
            .and_then(|json| {
                writeln!(self.writer, "{}", json)?;
                self.writer.flush()
            });
        if let Err(e) = result {
            error!("can't send event to host: {}", e);
        }
    }
}

impl<W: Write> StatePublisher for JsonLinesPublisher<W> {
    fn publish(&mut self, device: &str, changes: &[StateChange]) {
        self.send(&HostEvent::StateChanged {
            device: device.to_string(),
            changes: changes.to_vec(),
        });
    }

    fn indicate(&mut self, device: &str, on: bool) {
        self.send(&HostEvent::Indicator {
            device: device.to_string(),
            on,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateValue;

    #[test]
    fn test_parse_device_request() {
        let request: HostRequest =
            serde_json::from_str(r#"{"id":7,"cmd":"toggle","device":"NAS"}"#).unwrap();
        assert_eq!(request.id, 7);
        assert_eq!(
            request.cmd.device_action(),
            Some(("NAS", DeviceAction::Toggle))
        );
    }

    #[test]
    fn test_parse_unit_commands() {
        let request: HostRequest =
            serde_json::from_str(r#"{"id":1,"cmd":"toggle_debug"}"#).unwrap();
        assert_eq!(request.cmd, HostCommand::ToggleDebug);
        assert_eq!(request.cmd.device_action(), None);

        let request: HostRequest = serde_json::from_str(r#"{"id":2,"cmd":"shutdown"}"#).unwrap();
        assert_eq!(request.cmd, HostCommand::Shutdown);
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(serde_json::from_str::<HostRequest>(r#"{"id":1,"cmd":"format"}"#).is_err());
        assert!(
            serde_json::from_str::<HostRequest>(r#"{"id":1,"cmd":"turn_on"}"#).is_err(),
            "device is required"
        );
    }

    #[test]
    fn test_response_omits_empty_error() {
        assert_eq!(
            serde_json::to_string(&HostEvent::success(3)).unwrap(),
            r#"{"event":"response","id":3,"success":true}"#
        );
        assert_eq!(
            serde_json::to_string(&HostEvent::failure(4, "unknown device 'x'")).unwrap(),
            r#"{"event":"response","id":4,"success":false,"error":"unknown device 'x'"}"#
        );
    }

    #[test]
    fn test_publisher_writes_one_line_per_event() {
        let mut publisher = JsonLinesPublisher::new(Vec::new());
        publisher.publish(
            "Backup",
            &[StateChange {
                key: "on_off_state".to_string(),
                value: StateValue::Bool(true),
            }],
        );
        publisher.indicate("Backup", true);

        let text = String::from_utf8(publisher.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"{"event":"state_changed","device":"Backup","changes":[{"key":"on_off_state","value":true}]}"#,
                r#"{"event":"indicator","device":"Backup","on":true}"#,
            ]
        );
    }
}
