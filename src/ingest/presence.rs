use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::db::models::{AuditLogEntry, Device, DeviceStatus, LogLevel};
use crate::db::store::TelemetryStore;

/// Derives device presence from observed activity: every processed event
/// marks its device active and refreshes `last_seen`, creating the device
/// record on first observation.
pub struct PresenceTracker<S> {
    store: S,
}

impl<S: TelemetryStore> PresenceTracker<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Mark `device_id` as seen at `now`. Unknown devices are created with
    /// defaults inferred from the id, and a discovery audit entry is
    /// written exactly once.
    pub async fn observe(&self, device_id: &str, now: DateTime<Utc>) -> Result<Device> {
        if let Some(mut device) = self.store.get_device(device_id).await? {
            self.store.touch_device(device_id, now).await?;
            device.status = DeviceStatus::Active;
            device.last_seen = Some(now);
            return Ok(device);
        }

        let device = Device {
            id: device_id.to_owned(),
            name: device_id.to_owned(),
            device_type: infer_device_type(device_id).to_owned(),
            status: DeviceStatus::Active,
            last_seen: Some(now),
            created_at: now,
        };
        self.store.insert_device(&device).await?;
        self.store
            .insert_log(&AuditLogEntry {
                id: Uuid::new_v4(),
                logged_at: now,
                level: LogLevel::Info,
                message: format!("new device discovered: {device_id}"),
                device_id: Some(device_id.to_owned()),
            })
            .await?;

        info!(
            device_id = %device.id,
            device_type = %device.device_type,
            "New device discovered"
        );
        Ok(device)
    }
}

/// Infer a device category from the fleet's id naming conventions.
fn infer_device_type(device_id: &str) -> &'static str {
    if device_id.contains("esp32") {
        "ESP32"
    } else if device_id.contains("photon") {
        "Particle Photon"
    } else {
        "Unknown"
    }
}
