use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the compute instance, derived from the provider's
/// numeric status code once per probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
    NotFound,
}

impl InstanceState {
    /// Provider status codes:
    /// - 0  : pending
    /// - 16 : running
    /// - 32 : shutting-down
    /// - 48 : terminated
    /// - 64 : stopping
    /// - 80 : stopped
    ///
    /// Unmapped codes fall back to `NotFound`.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => InstanceState::Pending,
            16 => InstanceState::Running,
            32 => InstanceState::ShuttingDown,
            48 => InstanceState::Terminated,
            64 => InstanceState::Stopping,
            80 => InstanceState::Stopped,
            _ => InstanceState::NotFound,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Pending => "PENDING",
            InstanceState::Running => "RUNNING",
            InstanceState::Stopping => "STOPPING",
            InstanceState::Stopped => "STOPPED",
            InstanceState::ShuttingDown => "SHUTTING_DOWN",
            InstanceState::Terminated => "TERMINATED",
            InstanceState::NotFound => "NOT_FOUND",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition requested by the caller, paired against the current
/// `InstanceState` to decide legality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredTransition {
    Start,
    Stop,
    Terminate,
}

impl fmt::Display for DesiredTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DesiredTransition::Start => "start",
            DesiredTransition::Stop => "stop",
            DesiredTransition::Terminate => "terminate",
        };
        f.write_str(s)
    }
}

/// Sort key shared by every registry row; the partition key is the server id.
pub const RECORD_SORT_KEY: &str = "serverdetails";

/// Last-known record for a managed server. `id` is immutable once created;
/// every other field is last-writer-wins on reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    #[serde(rename = "serverID")]
    pub id: String,
    #[serde(rename = "serverIP")]
    pub address: Option<String>,
    #[serde(rename = "serverName")]
    pub name: String,
    #[serde(rename = "lastUpdated")]
    pub last_updated: String,
    #[serde(rename = "isRunning")]
    pub is_running: bool,
}

/// Timestamp format used in registry rows, in the operator's local zone.
pub fn record_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes_map_totally() {
        assert_eq!(InstanceState::from_code(0), InstanceState::Pending);
        assert_eq!(InstanceState::from_code(16), InstanceState::Running);
        assert_eq!(InstanceState::from_code(32), InstanceState::ShuttingDown);
        assert_eq!(InstanceState::from_code(48), InstanceState::Terminated);
        assert_eq!(InstanceState::from_code(64), InstanceState::Stopping);
        assert_eq!(InstanceState::from_code(80), InstanceState::Stopped);
        // Anything the mapping does not know about is NotFound, never a panic.
        assert_eq!(InstanceState::from_code(-1), InstanceState::NotFound);
        assert_eq!(InstanceState::from_code(99), InstanceState::NotFound);
    }

    #[test]
    fn server_record_uses_wire_field_names() {
        let record = ServerRecord {
            id: "i-0abc".into(),
            address: Some("203.0.113.10".into()),
            name: "smp-main".into(),
            last_updated: "2024-05-01 10:00:00".into(),
            is_running: true,
        };
        let v = serde_json::to_value(&record).unwrap();
        assert_eq!(v["serverID"], "i-0abc");
        assert_eq!(v["serverIP"], "203.0.113.10");
        assert_eq!(v["serverName"], "smp-main");
        assert_eq!(v["isRunning"], true);
    }

    #[test]
    fn record_timestamp_has_expected_shape() {
        let ts = record_timestamp();
        // YYYY-MM-DD HH:MM:SS
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
        assert_eq!(&ts[13..14], ":");
    }
}
