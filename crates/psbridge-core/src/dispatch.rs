//! Control-write dispatcher.
//!
//! Inbound automation-layer writes arrive on per-entity `set` topics. The
//! route table below is the single source of truth for which topics we
//! act on: each row pairs a topic shape with a handler that validates the
//! payload into a [`CommandKind`]. Rows are tried in order; the first
//! match wins.
//!
//! A topic that matches no route, or a suffix that resolves to no known
//! device, is ignored without a log line — the broker fans the wildcard
//! subscriptions out to every integration instance, so foreign traffic
//! here is normal. Payloads that fail validation are logged and dropped;
//! no partial frame is ever sent.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use psbridge_proto::{encode_command, CommandKind};

use crate::projection::{MODE_PRIORITIZE_STORAGE, MODE_PRIORITIZE_SUPPLY};
use crate::publisher::{MessagePublisher, PublishError};
use crate::store::DeviceStore;
use crate::topics;

/// Why a control write was dropped.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid control payload {payload:?}: {reason}")]
    InvalidPayload { payload: String, reason: String },

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Payload validation for one control surface.
trait ControlHandler: Send + Sync {
    /// Control name as it appears in topics and logs.
    fn name(&self) -> &'static str;

    /// Parse and validate a raw payload into a device command.
    fn parse(&self, payload: &str) -> Result<CommandKind, DispatchError>;
}

/// Integer parse that tolerates a float rendering, truncating toward
/// zero. The automation layer sends numbers both ways.
fn parse_int(payload: &str) -> Result<i64, DispatchError> {
    let value: f64 = payload
        .trim()
        .parse()
        .map_err(|_| DispatchError::InvalidPayload {
            payload: payload.to_string(),
            reason: "not a number".to_string(),
        })?;
    if !value.is_finite() {
        return Err(DispatchError::InvalidPayload {
            payload: payload.to_string(),
            reason: "not finite".to_string(),
        });
    }
    Ok(value as i64)
}

struct PowerLimit;

impl ControlHandler for PowerLimit {
    fn name(&self) -> &'static str {
        "power_limit"
    }

    fn parse(&self, payload: &str) -> Result<CommandKind, DispatchError> {
        let watts = parse_int(payload)?.max(0);
        Ok(CommandKind::SetPowerLimit {
            deci_watts: (watts * 10) as i32,
        })
    }
}

struct SupplyMode;

impl ControlHandler for SupplyMode {
    fn name(&self) -> &'static str {
        "supply_mode"
    }

    fn parse(&self, payload: &str) -> Result<CommandKind, DispatchError> {
        let priority = match payload {
            MODE_PRIORITIZE_SUPPLY => 0,
            MODE_PRIORITIZE_STORAGE => 1,
            other => {
                // The select only offers the two options above, so this
                // is a misbehaving publisher. Storage is the safe choice,
                // but make the coercion visible.
                warn!("unrecognized supply mode {other:?}, treating as storage priority");
                1
            }
        };
        Ok(CommandKind::SetSupplyPriority { priority })
    }
}

struct BatteryLower;

impl ControlHandler for BatteryLower {
    fn name(&self) -> &'static str {
        "battery_lower_limit"
    }

    fn parse(&self, payload: &str) -> Result<CommandKind, DispatchError> {
        Ok(CommandKind::SetBatteryLower {
            percent: parse_int(payload)? as i32,
        })
    }
}

struct BatteryUpper;

impl ControlHandler for BatteryUpper {
    fn name(&self) -> &'static str {
        "battery_upper_limit"
    }

    fn parse(&self, payload: &str) -> Result<CommandKind, DispatchError> {
        Ok(CommandKind::SetBatteryUpper {
            percent: parse_int(payload)? as i32,
        })
    }
}

struct Brightness;

impl ControlHandler for Brightness {
    fn name(&self) -> &'static str {
        "brightness"
    }

    fn parse(&self, payload: &str) -> Result<CommandKind, DispatchError> {
        let percent = parse_int(payload)?.clamp(0, 100);
        Ok(CommandKind::SetBrightness {
            raw: crate::fields::percent_to_brightness(percent) as i32,
        })
    }
}

/// One row of the route table: a topic shape and its handler.
struct ControlRoute {
    /// Discovery component carrying the control (`number` or `select`).
    component: &'static str,
    /// Entity suffix including the trailing `/set`.
    suffix: &'static str,
    handler: &'static (dyn ControlHandler),
}

/// Routes in match order. The specific battery/brightness suffixes come
/// before the power-limit fallback, mirroring entity precedence.
static ROUTES: &[ControlRoute] = &[
    ControlRoute {
        component: "number",
        suffix: "_battery_lower_limit/set",
        handler: &BatteryLower,
    },
    ControlRoute {
        component: "number",
        suffix: "_battery_upper_limit/set",
        handler: &BatteryUpper,
    },
    ControlRoute {
        component: "number",
        suffix: "_inverter_brightness/set",
        handler: &Brightness,
    },
    ControlRoute {
        component: "number",
        suffix: "_power_limit/set",
        handler: &PowerLimit,
    },
    ControlRoute {
        component: "select",
        suffix: "_supply_mode/set",
        handler: &SupplyMode,
    },
];

/// Match a topic against the route table, yielding the route and the
/// short device name embedded in the topic.
fn match_route(topic: &str) -> Option<(&'static ControlRoute, &str)> {
    for route in ROUTES {
        let prefix = match route.component {
            "number" => "homeassistant/number/ecoflow_",
            "select" => "homeassistant/select/ecoflow_",
            _ => continue,
        };
        if let Some(rest) = topic.strip_prefix(prefix) {
            if let Some(short) = rest.strip_suffix(route.suffix) {
                if !short.is_empty() {
                    return Some((route, short));
                }
            }
        }
    }
    None
}

/// Resolves control writes to devices and turns them into command frames.
pub struct CommandDispatcher {
    store: Arc<DeviceStore>,
    publisher: Arc<dyn MessagePublisher>,
    control_logging: bool,
}

impl CommandDispatcher {
    pub fn new(
        store: Arc<DeviceStore>,
        publisher: Arc<dyn MessagePublisher>,
        control_logging: bool,
    ) -> Self {
        Self {
            store,
            publisher,
            control_logging,
        }
    }

    /// Handle one raw control write. Never returns an error to the
    /// caller; every failure mode is logged here and the write dropped.
    pub async fn dispatch(&self, topic: &str, payload: &str) {
        let Some((route, short)) = match_route(topic) else {
            return;
        };
        let Some(device_sn) = self.store.resolve_by_suffix(short).await else {
            // Possibly addressed to another bridge instance.
            debug!("no known device for control topic {topic}");
            return;
        };

        if self.control_logging {
            info!(
                "control write {} for {device_sn} via {short}: {payload:?}",
                route.handler.name()
            );
        }

        let kind = match route.handler.parse(payload) {
            Ok(kind) => kind,
            Err(e) => {
                warn!("dropping {} write for {device_sn}: {e}", route.handler.name());
                return;
            }
        };

        // Identical repeated power limits are suppressed; the hardware
        // commits each write to flash.
        if let CommandKind::SetPowerLimit { deci_watts } = &kind {
            let watts = i64::from(*deci_watts) / 10;
            if self.store.last_commanded_watts(&device_sn).await == Some(watts) {
                if self.control_logging {
                    info!("power limit {watts}W unchanged for {device_sn}, skipping");
                }
                return;
            }
        }

        let frame = encode_command(&device_sn, &kind);
        match self
            .publisher
            .publish(&topics::command_topic(&device_sn), frame, false)
            .await
        {
            Ok(()) => {
                if let CommandKind::SetPowerLimit { deci_watts } = &kind {
                    self.store
                        .record_commanded_watts(&device_sn, i64::from(*deci_watts) / 10)
                        .await;
                }
                if self.control_logging {
                    info!("sent {} command to {device_sn}", kind.name());
                }
            }
            Err(e) => warn!("failed to send {} command to {device_sn}: {e}", kind.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;
    use psbridge_proto::messages::{
        BrightnessPack, CommandEnvelope, SetValue, SupplyPriorityPack,
    };
    use psbridge_proto::InverterHeartbeat;

    use crate::publisher::testing::RecordingPublisher;

    async fn dispatcher_with_device() -> (CommandDispatcher, Arc<RecordingPublisher>) {
        let store = Arc::new(DeviceStore::new());
        store
            .upsert("HW51ABCD1234", InverterHeartbeat::default())
            .await;
        let publisher = Arc::new(RecordingPublisher::new());
        (
            CommandDispatcher::new(store, publisher.clone(), false),
            publisher,
        )
    }

    fn decoded_header(payload: &[u8]) -> psbridge_proto::TelemetryHeader {
        CommandEnvelope::decode(payload).unwrap().header.unwrap()
    }

    #[test]
    fn routes_match_in_order() {
        let (route, short) =
            match_route("homeassistant/number/ecoflow_ps1234_power_limit/set").unwrap();
        assert_eq!(route.handler.name(), "power_limit");
        assert_eq!(short, "ps1234");

        let (route, _) =
            match_route("homeassistant/number/ecoflow_ps1234_battery_lower_limit/set").unwrap();
        assert_eq!(route.handler.name(), "battery_lower_limit");

        let (route, _) =
            match_route("homeassistant/select/ecoflow_ps1234_supply_mode/set").unwrap();
        assert_eq!(route.handler.name(), "supply_mode");

        assert!(match_route("homeassistant/number/ecoflow_ps1234_power_limit/state").is_none());
        assert!(match_route("homeassistant/number/other_ps1234_power_limit/set").is_none());
    }

    #[tokio::test]
    async fn power_limit_publishes_deci_watts() {
        let (dispatcher, publisher) = dispatcher_with_device().await;
        dispatcher
            .dispatch("homeassistant/number/ecoflow_ps1234_power_limit/set", "600")
            .await;

        let published = publisher.published.lock().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "/sys/75/HW51ABCD1234/thing/property/cmd");
        assert!(!published[0].2);

        let header = decoded_header(&published[0].1);
        assert_eq!(header.cmd_id, 129);
        let pack = SetValue::decode(header.pdata.as_slice()).unwrap();
        assert_eq!(pack.value, 6000);
    }

    #[tokio::test]
    async fn repeated_power_limit_is_suppressed() {
        let (dispatcher, publisher) = dispatcher_with_device().await;
        let topic = "homeassistant/number/ecoflow_ps1234_power_limit/set";

        dispatcher.dispatch(topic, "600").await;
        dispatcher.dispatch(topic, "600").await;
        assert_eq!(publisher.count().await, 1);

        dispatcher.dispatch(topic, "650").await;
        assert_eq!(publisher.count().await, 2);
    }

    #[tokio::test]
    async fn negative_power_limit_floors_at_zero() {
        let (dispatcher, publisher) = dispatcher_with_device().await;
        dispatcher
            .dispatch("homeassistant/number/ecoflow_ps1234_power_limit/set", "-25")
            .await;

        let published = publisher.published.lock().await;
        let pack = SetValue::decode(decoded_header(&published[0].1).pdata.as_slice()).unwrap();
        assert_eq!(pack.value, 0);
    }

    #[tokio::test]
    async fn unknown_suffix_is_ignored() {
        let (dispatcher, publisher) = dispatcher_with_device().await;
        dispatcher
            .dispatch("homeassistant/number/ecoflow_ps9999_power_limit/set", "600")
            .await;
        assert_eq!(publisher.count().await, 0);
    }

    #[tokio::test]
    async fn invalid_payload_sends_nothing() {
        let (dispatcher, publisher) = dispatcher_with_device().await;
        dispatcher
            .dispatch(
                "homeassistant/number/ecoflow_ps1234_battery_upper_limit/set",
                "plenty",
            )
            .await;
        assert_eq!(publisher.count().await, 0);
    }

    #[tokio::test]
    async fn supply_mode_literals_and_fallback() {
        let (dispatcher, publisher) = dispatcher_with_device().await;
        let topic = "homeassistant/select/ecoflow_ps1234_supply_mode/set";

        dispatcher.dispatch(topic, MODE_PRIORITIZE_SUPPLY).await;
        dispatcher.dispatch(topic, "Something else").await;

        let published = publisher.published.lock().await;
        assert_eq!(published.len(), 2);

        let first = SupplyPriorityPack::decode(
            decoded_header(&published[0].1).pdata.as_slice(),
        )
        .unwrap();
        assert_eq!(first.supply_priority, 0);

        let second = SupplyPriorityPack::decode(
            decoded_header(&published[1].1).pdata.as_slice(),
        )
        .unwrap();
        assert_eq!(second.supply_priority, 1);
    }

    #[tokio::test]
    async fn brightness_percent_scales_to_raw() {
        let (dispatcher, publisher) = dispatcher_with_device().await;
        dispatcher
            .dispatch(
                "homeassistant/number/ecoflow_ps1234_inverter_brightness/set",
                "50",
            )
            .await;

        let published = publisher.published.lock().await;
        let header = decoded_header(&published[0].1);
        assert_eq!(header.cmd_id, 135);
        let pack = BrightnessPack::decode(header.pdata.as_slice()).unwrap();
        assert_eq!(pack.brightness, 511);
    }

    #[tokio::test]
    async fn case_insensitive_suffix_resolution() {
        let store = Arc::new(DeviceStore::new());
        store
            .upsert("HW51ABCDWXYZ", InverterHeartbeat::default())
            .await;
        let publisher = Arc::new(RecordingPublisher::new());
        let dispatcher = CommandDispatcher::new(store, publisher.clone(), false);

        dispatcher
            .dispatch("homeassistant/number/ecoflow_pswxyz_power_limit/set", "100")
            .await;
        assert_eq!(publisher.count().await, 1);
    }
}
