//! Wire types for the TRDP simulator's HTTP control surface.
//! Keeping these in a dedicated crate lets tooling (exporters, test
//! harnesses) consume the message shapes without pulling in the client
//! runtime.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Authentication

/// Access level attached to an authenticated session.
///
/// The hierarchy is strictly monotonic: Admin satisfies every requirement
/// Developer does, and Developer satisfies every requirement Viewer does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Viewer,
    Developer,
    Admin,
}

impl Role {
    fn rank(self) -> u8 {
        match self {
            Role::Viewer => 0,
            Role::Developer => 1,
            Role::Admin => 2,
        }
    }

    /// Whether a session holding `self` meets a `required` access level.
    pub fn satisfies(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Viewer => "Viewer",
            Role::Developer => "Developer",
            Role::Admin => "Admin",
        };
        f.write_str(s)
    }
}

/// Authenticated session identity as returned by `/api/auth/session` and
/// `/api/auth/login`. The session token itself travels in a cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub username: String,
    pub role: Role,
    #[serde(default = "default_theme")]
    pub theme: String,
}

fn default_theme() -> String {
    "dark".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response of `POST /api/ui/theme`; echoes the theme the server stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeUpdate {
    pub theme: String,
}

// ---------------------------------------------------------------------------
// Diagnostics events

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown severity '{0}'")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Severity::Debug),
            "INFO" => Ok(Severity::Info),
            "WARN" => Ok(Severity::Warn),
            "ERROR" => Ok(Severity::Error),
            "FATAL" => Ok(Severity::Fatal),
            other => Err(ParseSeverityError(other.to_string())),
        }
    }
}

/// One entry of `/api/diag/events`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub timestamp_ms: i64,
    pub component: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// PD (cyclic) sessions

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Publish,
    Subscribe,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdStats {
    pub tx_count: u64,
    pub rx_count: u64,
    pub timeout_count: u64,
    pub last_seq_number: u64,
    pub last_cycle_jitter_us: u64,
}

/// One row of `/api/pd/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdSummary {
    pub com_id: u32,
    #[serde(default)]
    pub data_set_id: Option<u32>,
    pub name: String,
    pub direction: Direction,
    pub enabled: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub redundant_active: bool,
    #[serde(default)]
    pub active_channel: u32,
    #[serde(default)]
    pub stats: PdStats,
}

// ---------------------------------------------------------------------------
// MD (on-demand) sessions

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MdRole {
    #[default]
    Requester,
    Responder,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MdStats {
    pub tx_count: u64,
    pub rx_count: u64,
    pub retry_count: u64,
    pub timeout_count: u64,
    pub last_round_trip_us: u64,
}

/// Request or response payload attached to an MD exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MdPayload {
    pub data_set_id: Option<u32>,
    pub name: Option<String>,
    pub hex: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MdExchange {
    pub request: Option<MdPayload>,
    pub response: Option<MdPayload>,
}

/// Status of one MD session. The server answers with an empty object for an
/// unknown session id, so every field defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MdSessionStatus {
    pub session_id: u32,
    pub com_id: u32,
    pub role: MdRole,
    pub state: String,
    pub protocol: Option<String>,
    pub retry_count: u32,
    pub stats: MdStats,
    pub exchange: Option<MdExchange>,
}

impl MdSessionStatus {
    /// The empty-object answer for an unknown session.
    pub fn is_empty(&self) -> bool {
        self.session_id == 0 && self.state.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Datasets

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetStatus {
    Active,
    #[default]
    Inactive,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ElementSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub array_size: u32,
    pub nested_data_set_id: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetElement {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub array_size: u32,
    pub raw: Vec<u8>,
    pub hex: Option<String>,
    pub nested_data_set_id: Option<u32>,
}

/// Full dataset contents as served by `GET /api/datasets/{id}` and echoed by
/// every dataset mutation. The server answers an unknown id with an empty
/// object, so every field defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatasetSnapshot {
    pub data_set_id: u32,
    pub name: String,
    pub locked: bool,
    pub is_outgoing: bool,
    pub read_only: bool,
    pub status: DatasetStatus,
    pub schema: Vec<ElementSchema>,
    pub values: Vec<DatasetElement>,
}

// ---------------------------------------------------------------------------
// Network interfaces / multicast

/// One multicast membership row of `GET /api/network/multicast`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MulticastMembership {
    pub interface: String,
    pub group: String,
    pub joined: bool,
    #[serde(default)]
    pub nic: Option<String>,
    #[serde(default)]
    pub host_ip: Option<String>,
}

// ---------------------------------------------------------------------------
// Configuration summaries

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeSummary {
    pub transport_active: bool,
    pub active_pd_telegrams: u64,
    pub active_md_sessions: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigSummary {
    pub host_name: String,
    pub leader_name: String,
    pub interfaces: u64,
    pub data_sets: u64,
    pub pd_telegrams: u64,
    pub md_telegrams: u64,
    pub runtime: Option<RuntimeSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceInfo {
    pub host_name: String,
    pub leader_name: String,
    #[serde(rename = "type")]
    pub device_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryBlock {
    pub size: u64,
    pub preallocate: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryLayout {
    pub memory_size: u64,
    pub blocks: Vec<MemoryBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DebugConfig {
    pub file_name: String,
    pub file_size: u64,
    pub info: String,
    pub level: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PcapConfig {
    pub enabled: bool,
    pub capture_tx: bool,
    pub capture_rx: bool,
    pub file_name: String,
    pub max_size_bytes: u64,
    pub max_files: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComParameter {
    pub id: u32,
    pub qos: u32,
    pub ttl: u32,
}

/// Detail tree served by `GET /api/config/detail`. Dataset definitions keep
/// their raw JSON shape; only the viewer walks them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigDetail {
    pub device: DeviceInfo,
    pub memory: MemoryLayout,
    pub debug: Option<DebugConfig>,
    pub pcap: Option<PcapConfig>,
    pub com_parameters: Vec<ComParameter>,
    pub data_sets: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Diagnostics metrics

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdMetrics {
    pub telegrams: u64,
    pub tx_count: u64,
    pub rx_count: u64,
    pub timeout_count: u64,
    pub max_cycle_jitter_us: u64,
    pub max_interarrival_us: u64,
    pub stress_bursts: u64,
    pub redundancy_switches: u64,
    pub bus_failure_drops: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MdMetrics {
    pub sessions: u64,
    pub tx_count: u64,
    pub rx_count: u64,
    pub retry_count: u64,
    pub timeout_count: u64,
    pub max_latency_us: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdapterErrorCounters {
    pub init_errors: u64,
    pub publish_errors: u64,
    pub subscribe_errors: u64,
    pub pd_send_errors: u64,
    pub md_request_errors: u64,
    pub md_reply_errors: u64,
    pub event_loop_errors: u64,
    pub last_error_code: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsSnapshot {
    pub timestamp_ms: i64,
    /// Liveness per engine thread (pd, md, diag, trdp).
    pub threads: BTreeMap<String, bool>,
    pub pd: PdMetrics,
    pub md: MdMetrics,
    pub trdp: AdapterErrorCounters,
}

/// Aggregate snapshot of `GET /api/ui/overview`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverviewSnapshot {
    pub config: ConfigSummary,
    pub metrics: MetricsSnapshot,
    pub events: Vec<EventRecord>,
    pub pd: Vec<PdSummary>,
}

// ---------------------------------------------------------------------------
// Simulation controls

/// Request body of `POST /api/sim/stress`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StressSettings {
    pub enabled: bool,
    pub pd_cycle_us: u64,
    pub pd_burst: u32,
    pub md_burst: u32,
    pub md_interval_us: u64,
}

/// Stress block of the simulation state (response shape differs from the
/// request: the server reports the applied override fields).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StressMode {
    pub enabled: bool,
    pub pd_cycle_override_us: u64,
    pub pd_burst_telegrams: u32,
    pub md_burst: u32,
    pub md_interval_us: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RedundancySettings {
    pub force_switch: bool,
    pub bus_failure: bool,
    pub failed_channel: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeSyncOffsets {
    pub ntp_offset_us: i64,
    pub ptp_offset_us: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VirtualInstance {
    pub name: String,
    pub path: String,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulationState {
    pub stress: StressMode,
    pub redundancy: RedundancySettings,
    pub time_sync: TimeSyncOffsets,
    pub instances: Vec<VirtualInstance>,
    /// Fault-injection rule lists; kept opaque, the client only displays them.
    pub pd_rules: Vec<serde_json::Value>,
    pub md_rules: Vec<serde_json::Value>,
    pub data_set_rules: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Time sync

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WallClock {
    pub unix_ms: i64,
    pub iso: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeSyncStatus {
    pub ntp_offset_us: i64,
    pub ptp_offset_us: i64,
    pub now: WallClock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConvertRequest {
    pub seconds: u64,
    pub nanoseconds: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeConvertResponse {
    pub input_seconds: u64,
    pub input_nanoseconds: u32,
    pub utc_iso: String,
    pub unix_ms: i64,
    pub ntp_adjusted_iso: String,
    pub ptp_adjusted_iso: String,
    pub ntp_adjusted_ms: i64,
    pub ptp_adjusted_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_hierarchy_is_monotonic() {
        assert!(Role::Admin.satisfies(Role::Viewer));
        assert!(Role::Admin.satisfies(Role::Developer));
        assert!(Role::Admin.satisfies(Role::Admin));

        assert!(Role::Developer.satisfies(Role::Viewer));
        assert!(Role::Developer.satisfies(Role::Developer));
        assert!(!Role::Developer.satisfies(Role::Admin));

        assert!(Role::Viewer.satisfies(Role::Viewer));
        assert!(!Role::Viewer.satisfies(Role::Developer));
        assert!(!Role::Viewer.satisfies(Role::Admin));
    }

    #[test]
    fn identity_uses_server_field_names() {
        let identity: Identity = serde_json::from_str(
            r#"{"username":"driver","role":"Developer","theme":"light"}"#,
        )
        .unwrap();
        assert_eq!(identity.role, Role::Developer);
        assert_eq!(identity.theme, "light");
    }

    #[test]
    fn pd_summary_tolerates_extra_stats() {
        let raw = r#"{
            "comId": 1001,
            "dataSetId": 2001,
            "name": "Door Status",
            "direction": "PUBLISH",
            "enabled": true,
            "locked": false,
            "redundantActive": true,
            "activeChannel": 1,
            "stats": {
                "txCount": 42,
                "rxCount": 0,
                "timeoutCount": 0,
                "lastSeqNumber": 42,
                "lastTxTime": 123456789,
                "lastCycleJitterUs": 180
            }
        }"#;
        let row: PdSummary = serde_json::from_str(raw).unwrap();
        assert_eq!(row.com_id, 1001);
        assert_eq!(row.direction, Direction::Publish);
        assert_eq!(row.stats.tx_count, 42);
    }

    #[test]
    fn unknown_md_session_deserializes_as_empty() {
        let status: MdSessionStatus = serde_json::from_str("{}").unwrap();
        assert!(status.is_empty());
        assert_eq!(status.role, MdRole::Requester);
    }

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("warn".parse::<Severity>().unwrap(), Severity::Warn);
        assert!("loud".parse::<Severity>().is_err());
    }
}
