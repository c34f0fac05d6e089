use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use super::classifier::Classification;
use crate::db::models::{AuditLogEntry, LogLevel, SensorReading};
use crate::db::store::TelemetryStore;

/// Cap on the stored copy of a raw payload. Anything longer is truncated;
/// the full payload still flows through classification untouched.
const RAW_PAYLOAD_MAX_BYTES: usize = 1024;

/// Append-side of the pipeline: one sensor reading per processed event,
/// plus audit entries for motion and for ad-hoc operational events.
pub struct EventPersister<S> {
    store: S,
}

impl<S: TelemetryStore> EventPersister<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Append the reading derived from one processed event. Motion-class
    /// events additionally get an info audit entry.
    pub async fn record(
        &self,
        device_id: &str,
        classification: &Classification,
        raw_payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<SensorReading> {
        let reading = SensorReading {
            id: Uuid::new_v4(),
            device_id: device_id.to_owned(),
            event_type: classification.event_type.clone(),
            value: classification.value,
            recorded_at: now,
            raw_payload: Some(truncate_payload(raw_payload)),
        };
        self.store.insert_reading(&reading).await?;

        if classification.is_motion() {
            self.store
                .insert_log(&AuditLogEntry {
                    id: Uuid::new_v4(),
                    logged_at: now,
                    level: LogLevel::Info,
                    message: format!("motion detected on {device_id}"),
                    device_id: Some(device_id.to_owned()),
                })
                .await?;
        }

        Ok(reading)
    }

    /// Ad-hoc operational audit entry (connection established, reconnect
    /// attempt, give-up). Best-effort: a failed write is logged and
    /// swallowed so audit trouble never takes down the consumer loop.
    pub async fn log(&self, level: LogLevel, message: impl Into<String>, device_id: Option<&str>) {
        let entry = AuditLogEntry {
            id: Uuid::new_v4(),
            logged_at: Utc::now(),
            level,
            message: message.into(),
            device_id: device_id.map(str::to_owned),
        };
        if let Err(e) = self.store.insert_log(&entry).await {
            warn!(error = %e, message = %entry.message, "Failed to write audit log entry");
        }
    }
}

/// Lossy-decode the payload and cap it on a char boundary.
fn truncate_payload(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    if text.len() <= RAW_PAYLOAD_MAX_BYTES {
        return text.into_owned();
    }
    let mut end = RAW_PAYLOAD_MAX_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_owned()
}
