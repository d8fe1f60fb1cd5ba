//! Periodic maintenance tasks.
//!
//! Three independent loops, each on its own interval, all running for the
//! process lifetime:
//!
//! - discovery republish: re-emits every known device's retained
//!   discovery and state, so an automation layer that restarted without
//!   retained topics converges on the next pass
//! - offline sweep: devices silent past the staleness threshold are
//!   marked offline and published through the forced-zero path
//! - keepalive: a liveness ping to each device itself, distinct from
//!   telemetry and discovery traffic
//!
//! There is no cross-task coordination beyond the store's per-record
//! atomicity, and no cancellation; the tasks die with the process.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use psbridge_proto::{encode_command, CommandKind, InverterHeartbeat};

use crate::config::BridgeConfig;
use crate::projection::publish_device;
use crate::publisher::MessagePublisher;
use crate::store::DeviceStore;
use crate::topics;

/// Sweep cadence; the staleness threshold itself is configured.
const SWEEP_TICK_SECS: u64 = 60;

/// Spawn all three maintenance loops.
pub fn spawn_all(
    store: Arc<DeviceStore>,
    publisher: Arc<dyn MessagePublisher>,
    config: &BridgeConfig,
) {
    spawn_discovery_republish(
        store.clone(),
        publisher.clone(),
        Duration::from_secs(config.discovery_interval_secs),
    );
    spawn_offline_sweep(
        store.clone(),
        publisher.clone(),
        Duration::from_secs(config.offline_timeout_secs),
    );
    spawn_keepalive(
        store,
        publisher,
        Duration::from_secs(config.keepalive_interval_secs),
        config.heartbeat_logging,
    );
}

fn spawn_discovery_republish(
    store: Arc<DeviceStore>,
    publisher: Arc<dyn MessagePublisher>,
    interval: Duration,
) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let devices = store.all().await;
            if devices.is_empty() {
                continue;
            }
            info!("republishing discovery for {} known device(s)", devices.len());
            for (device_sn, record) in devices {
                if record.online {
                    publish_device(
                        publisher.as_ref(),
                        &device_sn,
                        &record.heartbeat,
                        false,
                        record.last_commanded_watts,
                    )
                    .await;
                } else {
                    publish_device(
                        publisher.as_ref(),
                        &device_sn,
                        &InverterHeartbeat::default(),
                        true,
                        record.last_commanded_watts,
                    )
                    .await;
                }
            }
        }
    });
}

fn spawn_offline_sweep(
    store: Arc<DeviceStore>,
    publisher: Arc<dyn MessagePublisher>,
    staleness: Duration,
) {
    let threshold = chrono::Duration::from_std(staleness).unwrap_or(chrono::Duration::seconds(300));
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(SWEEP_TICK_SECS)).await;
            for device_sn in store.stale(threshold).await {
                if store.mark_offline(&device_sn).await {
                    info!("{device_sn} is silent past the staleness threshold, forcing zero state");
                }
                let last_commanded = store.last_commanded_watts(&device_sn).await;
                publish_device(
                    publisher.as_ref(),
                    &device_sn,
                    &InverterHeartbeat::default(),
                    true,
                    last_commanded,
                )
                .await;
            }
        }
    });
}

fn spawn_keepalive(
    store: Arc<DeviceStore>,
    publisher: Arc<dyn MessagePublisher>,
    interval: Duration,
    heartbeat_logging: bool,
) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            for device_sn in store.known_serials().await {
                let frame = encode_command(&device_sn, &CommandKind::Keepalive);
                match publisher
                    .publish(&topics::command_topic(&device_sn), frame, false)
                    .await
                {
                    Ok(()) => {
                        if heartbeat_logging {
                            debug!("sent keepalive to {device_sn}");
                        }
                    }
                    Err(e) => debug!("keepalive publish to {device_sn} failed: {e}"),
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::testing::RecordingPublisher;

    // The loops only sleep and delegate; the delegated paths are covered
    // in their own modules. This exercises the offline round trip the
    // sweep drives: stale -> forced zero -> fresh frame -> back online.
    #[tokio::test]
    async fn offline_round_trip() {
        let store = Arc::new(DeviceStore::new());
        let publisher = Arc::new(RecordingPublisher::new());

        store
            .upsert(
                "HW51ABCD1234",
                InverterHeartbeat {
                    bat_soc: 80,
                    ..Default::default()
                },
            )
            .await;

        // What the sweep does for a stale record.
        assert!(store.mark_offline("HW51ABCD1234").await);
        publish_device(
            publisher.as_ref(),
            "HW51ABCD1234",
            &InverterHeartbeat::default(),
            true,
            None,
        )
        .await;

        let published = publisher.published.lock().await;
        let online_state = published
            .iter()
            .find(|(topic, _, _)| topic.ends_with("_online/state"))
            .unwrap();
        assert_eq!(online_state.1, b"OFF");
        let soc_state = published
            .iter()
            .find(|(topic, _, _)| topic.ends_with("/bat_soc/state"))
            .unwrap();
        assert_eq!(soc_state.1, b"0");
        drop(published);

        // Next telemetry frame restores the record.
        store
            .upsert(
                "HW51ABCD1234",
                InverterHeartbeat {
                    bat_soc: 81,
                    ..Default::default()
                },
            )
            .await;
        let record = store.get("HW51ABCD1234").await.unwrap();
        assert!(record.online);

        publish_device(
            publisher.as_ref(),
            "HW51ABCD1234",
            &record.heartbeat,
            false,
            record.last_commanded_watts,
        )
        .await;
        let published = publisher.published.lock().await;
        let last_online = published
            .iter()
            .filter(|(topic, _, _)| topic.ends_with("_online/state"))
            .next_back()
            .unwrap();
        assert_eq!(last_online.1, b"ON");
    }
}
