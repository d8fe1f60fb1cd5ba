//! Device state store.
//!
//! One synchronization-guarded map from serial number to [`DeviceRecord`].
//! All access goes through methods; the backing map is never handed out.
//! Updates to a single record are atomic as a unit — readers see either
//! the previous snapshot or the new one, never a mix. There is no
//! cross-record ordering guarantee and none is needed: devices are
//! independent.
//!
//! Records are created on the first telemetry frame for a serial and live
//! for the process lifetime. Going offline only clears a flag; the next
//! frame brings the device straight back.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use psbridge_proto::{InverterHeartbeat, DEVICE_SN_PREFIX};

/// Everything the bridge remembers about one device.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    /// Most recent full telemetry report.
    pub heartbeat: InverterHeartbeat,
    /// When the last report arrived.
    pub last_seen: DateTime<Utc>,
    /// Cleared by the offline sweep, set again by the next report.
    pub online: bool,
    /// Last power limit actually sent to the device, in watts. Written
    /// only after a successful command publish; gates duplicate writes.
    pub last_commanded_watts: Option<i64>,
}

/// Shared map of known devices.
#[derive(Debug, Default)]
pub struct DeviceStore {
    records: Arc<RwLock<HashMap<String, DeviceRecord>>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace (or create) a device's snapshot and refresh its last-seen
    /// stamp. Only family-prefixed serials may enter the store; the codec
    /// filters these upstream, so a foreign serial here is a caller bug.
    pub async fn upsert(&self, device_sn: &str, heartbeat: InverterHeartbeat) {
        debug_assert!(device_sn.starts_with(DEVICE_SN_PREFIX));
        let mut records = self.records.write().await;
        let now = Utc::now();
        match records.get_mut(device_sn) {
            Some(record) => {
                record.heartbeat = heartbeat;
                record.last_seen = now;
                record.online = true;
            }
            None => {
                records.insert(
                    device_sn.to_string(),
                    DeviceRecord {
                        heartbeat,
                        last_seen: now,
                        online: true,
                        last_commanded_watts: None,
                    },
                );
            }
        }
    }

    /// Refresh last-seen without touching the snapshot.
    pub async fn touch(&self, device_sn: &str) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(device_sn) {
            record.last_seen = Utc::now();
        }
    }

    pub async fn get(&self, device_sn: &str) -> Option<DeviceRecord> {
        self.records.read().await.get(device_sn).cloned()
    }

    pub async fn all(&self) -> Vec<(String, DeviceRecord)> {
        self.records
            .read()
            .await
            .iter()
            .map(|(sn, record)| (sn.clone(), record.clone()))
            .collect()
    }

    pub async fn known_serials(&self) -> Vec<String> {
        self.records.read().await.keys().cloned().collect()
    }

    /// Mark a device offline. Keeps the record and the last-commanded
    /// cache; returns false when the device was already offline (or
    /// unknown) so callers can log only the transition.
    pub async fn mark_offline(&self, device_sn: &str) -> bool {
        let mut records = self.records.write().await;
        match records.get_mut(device_sn) {
            Some(record) if record.online => {
                record.online = false;
                true
            }
            _ => false,
        }
    }

    /// Serials whose last report is older than the staleness threshold.
    pub async fn stale(&self, threshold: Duration) -> Vec<String> {
        let cutoff = Utc::now() - threshold;
        self.records
            .read()
            .await
            .iter()
            .filter(|(_, record)| record.last_seen < cutoff)
            .map(|(sn, _)| sn.clone())
            .collect()
    }

    /// Resolve a short topic suffix to a full serial by case-insensitive
    /// match on the last four characters, restricted to the device family.
    pub async fn resolve_by_suffix(&self, short_name: &str) -> Option<String> {
        let tail = short_name
            .get(short_name.len().saturating_sub(4)..)?
            .to_lowercase();
        self.records
            .read()
            .await
            .keys()
            .find(|sn| sn.starts_with(DEVICE_SN_PREFIX) && sn.to_lowercase().ends_with(&tail))
            .cloned()
    }

    pub async fn last_commanded_watts(&self, device_sn: &str) -> Option<i64> {
        self.records
            .read()
            .await
            .get(device_sn)
            .and_then(|record| record.last_commanded_watts)
    }

    /// Record a successfully published power limit.
    pub async fn record_commanded_watts(&self, device_sn: &str, watts: i64) {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(device_sn) {
            record.last_commanded_watts = Some(watts);
        }
    }
}
