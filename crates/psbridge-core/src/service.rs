//! The bridge service: transport wiring and the inbound message pump.
//!
//! Owns the rumqttc client and event loop. Subscriptions are (re)applied
//! on every connection acknowledgement, so a broker reconnect restores
//! them without any bookkeeping here; rumqttc handles the reconnect
//! itself. Event-loop errors are logged and polling continues — nothing
//! on this path may take the process down.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tracing::{error, info, warn};
use uuid::Uuid;

use psbridge_proto::decode_telemetry;

use crate::config::BridgeConfig;
use crate::dispatch::CommandDispatcher;
use crate::projection::publish_device;
use crate::publisher::{MessagePublisher, MqttPublisher};
use crate::scheduler;
use crate::store::DeviceStore;
use crate::topics;

/// Long-running bridge between the device protocol and the automation
/// layer.
pub struct BridgeService {
    config: BridgeConfig,
    store: Arc<DeviceStore>,
}

impl BridgeService {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            store: Arc::new(DeviceStore::new()),
        }
    }

    pub fn store(&self) -> Arc<DeviceStore> {
        self.store.clone()
    }

    /// Connect and run forever. Only transport setup errors surface; once
    /// polling starts, every failure is logged and absorbed.
    pub async fn run(&self) -> anyhow::Result<()> {
        let mut options = MqttOptions::new(
            format!("psbridge_{}", Uuid::new_v4()),
            &self.config.mqtt_host,
            self.config.mqtt_port,
        );
        options.set_keep_alive(Duration::from_secs(60));
        if !self.config.mqtt_user.is_empty() {
            options.set_credentials(&self.config.mqtt_user, &self.config.mqtt_password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 10);
        let publisher: Arc<dyn MessagePublisher> = Arc::new(MqttPublisher::new(client.clone()));
        let dispatcher = CommandDispatcher::new(
            self.store.clone(),
            publisher.clone(),
            self.config.control_logging,
        );

        scheduler::spawn_all(self.store.clone(), publisher.clone(), &self.config);

        info!("connecting to MQTT broker {}", self.config.full_broker_addr());
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!("connected to MQTT broker (code {:?})", ack.code);
                    if let Err(e) = subscribe_all(&client).await {
                        warn!("failed to subscribe: {e}");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if publish.topic.ends_with(topics::UPSTREAM_SUFFIX) {
                        process_frame(
                            &self.store,
                            publisher.as_ref(),
                            &publish.payload,
                            self.config.heartbeat_logging,
                        )
                        .await;
                    } else {
                        let payload = String::from_utf8_lossy(&publish.payload);
                        dispatcher.dispatch(&publish.topic, &payload).await;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("mqtt connection error: {e}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}

async fn subscribe_all(client: &AsyncClient) -> Result<(), rumqttc::ClientError> {
    client
        .subscribe(topics::UPSTREAM_PATTERN, QoS::AtLeastOnce)
        .await?;
    client
        .subscribe(topics::NUMBER_SET_PATTERN, QoS::AtLeastOnce)
        .await?;
    client
        .subscribe(topics::SELECT_SET_PATTERN, QoS::AtLeastOnce)
        .await?;
    Ok(())
}

/// Decode one inbound frame and fold it into the store + projection.
/// Malformed frames are logged and dropped without touching any state.
pub(crate) async fn process_frame(
    store: &DeviceStore,
    publisher: &dyn MessagePublisher,
    payload: &[u8],
    heartbeat_logging: bool,
) {
    if payload.is_empty() {
        info!("empty telemetry payload received");
        return;
    }

    let reports = match decode_telemetry(payload) {
        Ok(reports) => reports,
        Err(e) => {
            info!("telemetry decode error: {e}");
            return;
        }
    };

    for (device_sn, heartbeat) in reports {
        if heartbeat_logging {
            info!(
                "[{device_sn}] heartbeat: {}W out, battery {}%",
                heartbeat.inv_output_watts as f64 / 10.0,
                heartbeat.bat_soc
            );
        }
        store.upsert(&device_sn, heartbeat.clone()).await;
        let last_commanded = store.last_commanded_watts(&device_sn).await;
        publish_device(publisher, &device_sn, &heartbeat, false, last_commanded).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;
    use psbridge_proto::messages::{TelemetryEnvelope, TelemetryHeader};
    use psbridge_proto::{InverterHeartbeat, TELEMETRY_REPORT_CMD_ID};

    use crate::publisher::testing::RecordingPublisher;

    fn frame_for(device_sn: &str, heartbeat: &InverterHeartbeat) -> Vec<u8> {
        TelemetryEnvelope {
            header: vec![TelemetryHeader {
                pdata: heartbeat.encode_to_vec(),
                cmd_id: TELEMETRY_REPORT_CMD_ID,
                device_sn: device_sn.to_string(),
                ..Default::default()
            }],
        }
        .encode_to_vec()
    }

    #[tokio::test]
    async fn frame_updates_store_and_publishes_projection() {
        let store = DeviceStore::new();
        let publisher = RecordingPublisher::new();
        let heartbeat = InverterHeartbeat {
            permanent_watts: 1000,
            ..Default::default()
        };

        process_frame(&store, &publisher, &frame_for("HW51ABCD1234", &heartbeat), false).await;

        let record = store.get("HW51ABCD1234").await.unwrap();
        assert_eq!(record.heartbeat.permanent_watts, 1000);
        // 66 entities, one config + one state each.
        assert_eq!(publisher.count().await, 132);

        let topics = publisher.topics().await;
        assert!(topics
            .iter()
            .any(|t| t == "homeassistant/number/ecoflow_ps1234_power_limit/state"));
    }

    #[tokio::test]
    async fn malformed_frame_leaves_no_trace() {
        let store = DeviceStore::new();
        let publisher = RecordingPublisher::new();

        process_frame(&store, &publisher, &[0x0a, 0x05, 0x01], false).await;
        process_frame(&store, &publisher, &[], false).await;

        assert!(store.all().await.is_empty());
        assert_eq!(publisher.count().await, 0);
    }

    #[tokio::test]
    async fn foreign_devices_are_ignored() {
        let store = DeviceStore::new();
        let publisher = RecordingPublisher::new();

        process_frame(
            &store,
            &publisher,
            &frame_for("XY99ABCD1234", &InverterHeartbeat::default()),
            false,
        )
        .await;

        assert!(store.all().await.is_empty());
        assert_eq!(publisher.count().await, 0);
    }
}
