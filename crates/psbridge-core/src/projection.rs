//! Telemetry projection: heartbeat → discoverable entities.
//!
//! Turns one decoded heartbeat into the full set of retained discovery
//! configs and state values for the automation layer. Every update is an
//! idempotent retained upsert, so the projection can be re-emitted at any
//! time (and the scheduler does exactly that).
//!
//! Beyond the field table, the projection always emits an online
//! indicator, the supply-mode selector, and the four writable controls.
//! The forced-zero path is used for devices presumed offline: the caller
//! passes a zeroed heartbeat and the flag, numerics all render `0`, and
//! the online indicator goes OFF. The device record itself survives, so
//! the next real frame flips everything back.

use serde::Serialize;
use tracing::warn;

use psbridge_proto::InverterHeartbeat;

use crate::fields::{brightness_to_percent, FIELD_TABLE};
use crate::publisher::MessagePublisher;
use crate::topics;

/// Select option: feed surplus to the house first.
pub const MODE_PRIORITIZE_SUPPLY: &str = "Prioritize power supply";
/// Select option: charge the battery first.
pub const MODE_PRIORITIZE_STORAGE: &str = "Prioritize power storage";

/// Device grouping block, identical across every entity of one device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceBlock {
    pub identifiers: Vec<String>,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub name: String,
}

impl DeviceBlock {
    fn for_serial(device_sn: &str) -> Self {
        Self {
            identifiers: vec![format!("ecoflow_{}", topics::short_name(device_sn))],
            manufacturer: "EcoFlow",
            model: "PowerStream",
            name: format!("EcoFlow PS{}", topics::display_suffix(device_sn)),
        }
    }
}

/// Retained discovery payload for one entity.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryConfig {
    pub name: String,
    pub state_topic: String,
    pub unique_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_by_default: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    pub device: DeviceBlock,
}

impl DiscoveryConfig {
    fn new(
        name: impl Into<String>,
        state_topic: impl Into<String>,
        unique_id: impl Into<String>,
        device: DeviceBlock,
    ) -> Self {
        Self {
            name: name.into(),
            state_topic: state_topic.into(),
            unique_id: unique_id.into(),
            command_topic: None,
            unit_of_measurement: None,
            device_class: None,
            enabled_by_default: None,
            payload_on: None,
            payload_off: None,
            options: None,
            min: None,
            max: None,
            step: None,
            mode: None,
            device,
        }
    }

    fn number(mut self, command_topic: String, min: i64, max: i64) -> Self {
        self.command_topic = Some(command_topic);
        self.min = Some(min);
        self.max = Some(max);
        self.step = Some(1);
        self.mode = Some("box");
        self
    }
}

/// One retained config + state pair for the automation layer.
#[derive(Debug, Clone)]
pub struct EntityUpdate {
    pub config_topic: String,
    pub config: DiscoveryConfig,
    pub state_topic: String,
    pub state: String,
}

/// Project a heartbeat into the full entity set for one device.
///
/// `last_commanded_watts` seeds the power-limit control when a value has
/// actually been sent to the device; otherwise the device's own permanent
/// power setting is displayed. Output ordering is immaterial.
pub fn project(
    device_sn: &str,
    heartbeat: &InverterHeartbeat,
    force_zero: bool,
    last_commanded_watts: Option<i64>,
) -> Vec<EntityUpdate> {
    let short = topics::short_name(device_sn);
    let last4 = topics::last4(device_sn);
    let device = DeviceBlock::for_serial(device_sn);

    let mut updates = Vec::with_capacity(FIELD_TABLE.len() + 6);

    // Online indicator.
    let online_base = format!("homeassistant/binary_sensor/ecoflow_{short}_online");
    let mut online = DiscoveryConfig::new(
        "Online",
        format!("{online_base}/state"),
        format!("ecoflow_{last4}_online"),
        device.clone(),
    );
    online.device_class = Some("connectivity".to_string());
    online.payload_on = Some("ON".to_string());
    online.payload_off = Some("OFF".to_string());
    updates.push(EntityUpdate {
        config_topic: format!("{online_base}/config"),
        state_topic: format!("{online_base}/state"),
        state: if force_zero { "OFF" } else { "ON" }.to_string(),
        config: online,
    });

    // Plain telemetry sensors, straight off the field table.
    let sensor_base = format!("homeassistant/sensor/ecoflow_{short}");
    for descriptor in FIELD_TABLE {
        let state_topic = format!("{sensor_base}/{}/state", descriptor.key);
        let mut config = DiscoveryConfig::new(
            descriptor.label,
            state_topic.clone(),
            format!("ecoflow_{last4}_{}", descriptor.key),
            device.clone(),
        );
        if let Some(unit) = descriptor.unit {
            config.unit_of_measurement = Some(unit.to_string());
            config.device_class = descriptor.device_class().map(str::to_string);
        }
        if !descriptor.enabled_by_default {
            config.enabled_by_default = Some(false);
        }
        updates.push(EntityUpdate {
            config_topic: format!("{sensor_base}/{}/config", descriptor.key),
            state_topic,
            state: descriptor.render(heartbeat, force_zero),
            config,
        });
    }

    // Supply-mode selector.
    let select_base = format!("homeassistant/select/ecoflow_{short}_supply_mode");
    let mut select = DiscoveryConfig::new(
        "Power Supply Mode",
        format!("{select_base}/state"),
        format!("ecoflow_{last4}_supply_priority"),
        device.clone(),
    );
    select.command_topic = Some(format!("{select_base}/set"));
    select.options = Some(vec![
        MODE_PRIORITIZE_SUPPLY.to_string(),
        MODE_PRIORITIZE_STORAGE.to_string(),
    ]);
    updates.push(EntityUpdate {
        config_topic: format!("{select_base}/config"),
        state_topic: format!("{select_base}/state"),
        state: if heartbeat.supply_priority == 0 {
            MODE_PRIORITIZE_SUPPLY
        } else {
            MODE_PRIORITIZE_STORAGE
        }
        .to_string(),
        config: select,
    });

    // Writable number controls.
    let power_limit_watts = if force_zero {
        0
    } else {
        last_commanded_watts.unwrap_or_else(|| i64::from(heartbeat.permanent_watts) / 10)
    };
    let brightness_percent = if force_zero {
        0
    } else {
        brightness_to_percent(i64::from(heartbeat.inv_brightness))
    };
    let zero_or = |value: i64| if force_zero { 0 } else { value };

    let numbers: [(&str, &str, i64, i64, Option<&str>, i64); 4] = [
        ("power_limit", "Power Limit", 0, 800, None, power_limit_watts),
        (
            "battery_lower_limit",
            "Battery Discharge Limit",
            0,
            30,
            Some("%"),
            zero_or(i64::from(heartbeat.lower_limit)),
        ),
        (
            "battery_upper_limit",
            "Battery Charge Limit",
            50,
            100,
            Some("%"),
            zero_or(i64::from(heartbeat.upper_limit)),
        ),
        (
            "inverter_brightness",
            "Inverter Brightness",
            0,
            100,
            Some("%"),
            brightness_percent,
        ),
    ];

    for (control, label, min, max, unit, value) in numbers {
        let base = format!("homeassistant/number/ecoflow_{short}_{control}");
        let mut config = DiscoveryConfig::new(
            label,
            format!("{base}/state"),
            format!("ecoflow_{last4}_{control}"),
            device.clone(),
        )
        .number(format!("{base}/set"), min, max);
        config.unit_of_measurement = unit.map(str::to_string);
        updates.push(EntityUpdate {
            config_topic: format!("{base}/config"),
            state_topic: format!("{base}/state"),
            state: value.to_string(),
            config,
        });
    }

    updates
}

/// Publish a device's full projection. Individual publish failures are
/// logged and skipped; the next periodic pass re-converges.
pub async fn publish_device(
    publisher: &dyn MessagePublisher,
    device_sn: &str,
    heartbeat: &InverterHeartbeat,
    force_zero: bool,
    last_commanded_watts: Option<i64>,
) {
    for update in project(device_sn, heartbeat, force_zero, last_commanded_watts) {
        let config_payload = match serde_json::to_vec(&update.config) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to serialize discovery config for {}: {e}", update.config_topic);
                continue;
            }
        };
        if let Err(e) = publisher
            .publish(&update.config_topic, config_payload, true)
            .await
        {
            warn!("discovery publish failed for {}: {e}", update.config_topic);
        }
        if let Err(e) = publisher
            .publish(&update.state_topic, update.state.into_bytes(), true)
            .await
        {
            warn!("state publish failed for {}: {e}", update.state_topic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(updates: &'a [EntityUpdate], unique_id: &str) -> &'a EntityUpdate {
        updates
            .iter()
            .find(|u| u.config.unique_id == unique_id)
            .unwrap_or_else(|| panic!("no entity {unique_id}"))
    }

    #[test]
    fn projects_every_entity() {
        let updates = project("HW51ABCD1234", &InverterHeartbeat::default(), false, None);
        // 60 sensors + online + select + 4 numbers.
        assert_eq!(updates.len(), 66);
    }

    #[test]
    fn scaled_sensor_state_and_discovery_metadata() {
        let heartbeat = InverterHeartbeat {
            pv1_input_volt: 1234,
            ..Default::default()
        };
        let updates = project("HW51ABCD1234", &heartbeat, false, None);
        let entity = find(&updates, "ecoflow_1234_pv1_input_volt");

        assert_eq!(entity.state, "123.4");
        assert_eq!(
            entity.state_topic,
            "homeassistant/sensor/ecoflow_ps1234/pv1_input_volt/state"
        );
        assert_eq!(entity.config.unit_of_measurement.as_deref(), Some("V"));
        assert_eq!(entity.config.device_class.as_deref(), Some("voltage"));
        assert_eq!(entity.config.device.identifiers, vec!["ecoflow_ps1234"]);
        assert_eq!(entity.config.device.name, "EcoFlow PS1234");
    }

    #[test]
    fn power_limit_seeds_from_telemetry_then_cache() {
        let heartbeat = InverterHeartbeat {
            permanent_watts: 1000,
            ..Default::default()
        };
        let updates = project("HW51ABCD1234", &heartbeat, false, None);
        assert_eq!(find(&updates, "ecoflow_1234_power_limit").state, "100");

        let updates = project("HW51ABCD1234", &heartbeat, false, Some(250));
        assert_eq!(find(&updates, "ecoflow_1234_power_limit").state, "250");
    }

    #[test]
    fn supply_priority_selects_storage_mode() {
        let heartbeat = InverterHeartbeat {
            supply_priority: 1,
            ..Default::default()
        };
        let updates = project("HW51ABCD1234", &heartbeat, false, None);
        let select = find(&updates, "ecoflow_1234_supply_priority");
        assert_eq!(select.state, MODE_PRIORITIZE_STORAGE);
        assert_eq!(
            select.config.options.as_deref(),
            Some(&[MODE_PRIORITIZE_SUPPLY.to_string(), MODE_PRIORITIZE_STORAGE.to_string()][..])
        );
    }

    #[test]
    fn brightness_states_are_percent() {
        let heartbeat = InverterHeartbeat {
            inv_brightness: 512,
            ..Default::default()
        };
        let updates = project("HW51ABCD1234", &heartbeat, false, None);
        assert_eq!(find(&updates, "ecoflow_1234_inv_brightness").state, "50");
        assert_eq!(
            find(&updates, "ecoflow_1234_inverter_brightness").state,
            "50"
        );
    }

    #[test]
    fn forced_zero_zeroes_numerics_and_drops_online() {
        let updates = project("HW51ABCD1234", &InverterHeartbeat::default(), true, Some(600));

        assert_eq!(find(&updates, "ecoflow_1234_online").state, "OFF");
        assert_eq!(find(&updates, "ecoflow_1234_power_limit").state, "0");
        assert_eq!(find(&updates, "ecoflow_1234_battery_upper_limit").state, "0");
        for key in ["pv1_input_volt", "bat_soc", "permanent_watts"] {
            assert_eq!(find(&updates, &format!("ecoflow_1234_{key}")).state, "0");
        }
    }

    #[test]
    fn fresh_heartbeat_restores_online() {
        let heartbeat = InverterHeartbeat {
            bat_soc: 55,
            ..Default::default()
        };
        let updates = project("HW51ABCD1234", &heartbeat, false, None);
        assert_eq!(find(&updates, "ecoflow_1234_online").state, "ON");
        assert_eq!(find(&updates, "ecoflow_1234_bat_soc").state, "55");
    }

    #[test]
    fn diagnostics_are_disabled_in_discovery() {
        let updates = project("HW51ABCD1234", &InverterHeartbeat::default(), false, None);
        let code = find(&updates, "ecoflow_1234_inv_error_code");
        assert_eq!(code.config.enabled_by_default, Some(false));

        let json = serde_json::to_value(&code.config).unwrap();
        assert_eq!(json["enabled_by_default"], serde_json::json!(false));
        // Unset optionals stay out of the payload entirely.
        assert!(json.get("unit_of_measurement").is_none());
        assert!(json.get("min").is_none());
    }

    #[test]
    fn number_controls_carry_bounds_and_command_topics() {
        let updates = project("HW51ABCD1234", &InverterHeartbeat::default(), false, None);

        let power = find(&updates, "ecoflow_1234_power_limit");
        assert_eq!(power.config.min, Some(0));
        assert_eq!(power.config.max, Some(800));
        assert_eq!(power.config.step, Some(1));
        assert_eq!(power.config.mode, Some("box"));
        assert_eq!(
            power.config.command_topic.as_deref(),
            Some("homeassistant/number/ecoflow_ps1234_power_limit/set")
        );

        let lower = find(&updates, "ecoflow_1234_battery_lower_limit");
        assert_eq!((lower.config.min, lower.config.max), (Some(0), Some(30)));
        let upper = find(&updates, "ecoflow_1234_battery_upper_limit");
        assert_eq!((upper.config.min, upper.config.max), (Some(50), Some(100)));
    }
}
