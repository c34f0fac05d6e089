use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Mirrors the `device_status` Postgres enum.
///
/// Ingestion only ever sets `active`; the presence sweep flips devices to
/// `inactive` once they go quiet for longer than the configured window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "device_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Active,
    Inactive,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceStatus::Active => "active",
            DeviceStatus::Inactive => "inactive",
        };
        f.write_str(s)
    }
}

/// Mirrors the `log_level` Postgres enum used by the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "log_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

/// A known device, created on its first observed event.
///
/// `id` is the logical device id and is immutable once created; ingestion
/// only mutates `status` and `last_seen`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub device_type: String,
    pub status: DeviceStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// One normalized telemetry event. Append-only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: Uuid,
    pub device_id: String,
    /// Free-form event type tag, e.g. `"motion_detected"` or `"unknown"`.
    pub event_type: String,
    pub value: Option<f64>,
    /// Processing time, not device-reported time.
    pub recorded_at: DateTime<Utc>,
    /// Raw payload text, truncated to a fixed cap before storage.
    pub raw_payload: Option<String>,
}

/// Operational audit trail entry (connections, discoveries, reconnects).
/// Append-only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub logged_at: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub device_id: Option<String>,
}
