//! Shared test doubles: an in-memory `TelemetryStore` and a scripted
//! stream source driven through the same traits as the real transport.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{AuditLogEntry, Device, DeviceStatus, SensorReading};
use crate::db::store::{StoreError, TelemetryStore};
use crate::stream::{EventStream, StreamConnector, StreamError, StreamEvent};

#[derive(Default)]
struct MemoryState {
    devices: HashMap<String, Device>,
    readings: Vec<SensorReading>,
    logs: Vec<AuditLogEntry>,
    fail_readings: bool,
    fail_logs: bool,
}

/// In-memory `TelemetryStore` with injectable write failures.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(&self, id: &str) -> Option<Device> {
        self.inner.lock().unwrap().devices.get(id).cloned()
    }

    pub fn device_count(&self) -> usize {
        self.inner.lock().unwrap().devices.len()
    }

    pub fn readings(&self) -> Vec<SensorReading> {
        self.inner.lock().unwrap().readings.clone()
    }

    pub fn logs(&self) -> Vec<AuditLogEntry> {
        self.inner.lock().unwrap().logs.clone()
    }

    pub fn fail_readings(&self, fail: bool) {
        self.inner.lock().unwrap().fail_readings = fail;
    }

    pub fn fail_logs(&self, fail: bool) {
        self.inner.lock().unwrap().fail_logs = fail;
    }
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn get_device(&self, id: &str) -> Result<Option<Device>, StoreError> {
        Ok(self.inner.lock().unwrap().devices.get(id).cloned())
    }

    async fn insert_device(&self, device: &Device) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .devices
            .insert(device.id.clone(), device.clone());
        Ok(())
    }

    async fn touch_device(&self, id: &str, seen_at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(device) = self.inner.lock().unwrap().devices.get_mut(id) {
            device.status = DeviceStatus::Active;
            device.last_seen = Some(seen_at);
        }
        Ok(())
    }

    async fn mark_stale_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.inner.lock().unwrap();
        let mut marked = 0;
        for device in state.devices.values_mut() {
            if device.status == DeviceStatus::Active
                && device.last_seen.is_some_and(|seen| seen < cutoff)
            {
                device.status = DeviceStatus::Inactive;
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn insert_reading(&self, reading: &SensorReading) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        if state.fail_readings {
            return Err(StoreError::Database("injected reading failure".into()));
        }
        state.readings.push(reading.clone());
        Ok(())
    }

    async fn insert_log(&self, entry: &AuditLogEntry) -> Result<(), StoreError> {
        let mut state = self.inner.lock().unwrap();
        if state.fail_logs {
            return Err(StoreError::Database("injected log failure".into()));
        }
        state.logs.push(entry.clone());
        Ok(())
    }
}

/// Yields its scripted items in order, then stays pending forever —
/// a healthy but idle stream, interruptible only by cancellation.
pub struct ScriptedStream {
    items: VecDeque<Result<Option<StreamEvent>, StreamError>>,
}

impl ScriptedStream {
    pub fn new(items: Vec<Result<Option<StreamEvent>, StreamError>>) -> Self {
        Self {
            items: items.into(),
        }
    }
}

#[async_trait]
impl EventStream for ScriptedStream {
    async fn next_event(&mut self) -> Result<Option<StreamEvent>, StreamError> {
        match self.items.pop_front() {
            Some(item) => item,
            None => std::future::pending().await,
        }
    }
}

/// Each `connect` consumes the next scripted outcome; once exhausted,
/// further attempts fail. Counts attempts for assertions.
pub struct ScriptedConnector {
    outcomes: Mutex<VecDeque<Result<ScriptedStream, StreamError>>>,
    connects: Arc<AtomicU32>,
}

impl ScriptedConnector {
    pub fn new(outcomes: Vec<Result<ScriptedStream, StreamError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            connects: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn connect_count(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.connects)
    }
}

#[async_trait]
impl StreamConnector for ScriptedConnector {
    type Stream = ScriptedStream;

    async fn connect(&self) -> Result<ScriptedStream, StreamError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(StreamError::Connect("scripted outcomes exhausted".into())))
    }
}
