use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

use super::models::{AuditLogEntry, Device, DeviceStatus, SensorReading};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e.to_string())
    }
}

/// Persistence collaborator for the ingestion path.
///
/// The ingestion loop never deletes rows: devices are upserted and touched,
/// readings and audit entries are append-only.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    async fn get_device(&self, id: &str) -> Result<Option<Device>, StoreError>;

    /// Insert a device, or refresh `status`/`last_seen` if it already exists
    /// (first observation can race with a redelivered duplicate).
    async fn insert_device(&self, device: &Device) -> Result<(), StoreError>;

    /// Mark an existing device active and update its `last_seen`.
    async fn touch_device(&self, id: &str, seen_at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Flip active devices with `last_seen` older than `cutoff` to inactive.
    /// Returns the number of devices affected.
    async fn mark_stale_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn insert_reading(&self, reading: &SensorReading) -> Result<(), StoreError>;

    async fn insert_log(&self, entry: &AuditLogEntry) -> Result<(), StoreError>;
}

/// Postgres-backed `TelemetryStore`. Cheap to clone; shares the pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TelemetryStore for PgStore {
    async fn get_device(&self, id: &str) -> Result<Option<Device>, StoreError> {
        let device = sqlx::query_as::<_, Device>(
            r#"
            SELECT id, name, device_type, status, last_seen, created_at
            FROM devices
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(device)
    }

    async fn insert_device(&self, device: &Device) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO devices (id, name, device_type, status, last_seen, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
                SET status = EXCLUDED.status,
                    last_seen = EXCLUDED.last_seen
            "#,
        )
        .bind(&device.id)
        .bind(&device.name)
        .bind(&device.device_type)
        .bind(device.status)
        .bind(device.last_seen)
        .bind(device.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn touch_device(&self, id: &str, seen_at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE devices
            SET status = $2, last_seen = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(DeviceStatus::Active)
        .bind(seen_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_stale_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE devices
            SET status = 'inactive'
            WHERE status = 'active'
              AND last_seen IS NOT NULL
              AND last_seen < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_reading(&self, reading: &SensorReading) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sensor_readings (id, device_id, event_type, value, recorded_at, raw_payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(reading.id)
        .bind(&reading.device_id)
        .bind(&reading.event_type)
        .bind(reading.value)
        .bind(reading.recorded_at)
        .bind(&reading.raw_payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_log(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_log (id, logged_at, level, message, device_id)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.id)
        .bind(entry.logged_at)
        .bind(entry.level)
        .bind(&entry.message)
        .bind(&entry.device_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
