//! Static telemetry field table.
//!
//! One row per heartbeat field: label, display transform, unit, and
//! whether the entity is enabled by default in the automation layer.
//! Error/warning codes and raw status words are registered but disabled
//! by default. The table is compile-time constant; the projection walks
//! it once per report.
//!
//! Electrical values arrive as fixed-point integers and are divided down
//! here. The divisors are per-field, not per-unit — the firmware mixes
//! deci-, centi- and milli-scaled fields freely.

use psbridge_proto::InverterHeartbeat;

/// Raw value read out of a heartbeat field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

/// How a raw field value becomes its displayed state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// Publish the raw value as-is.
    Raw,
    /// Divide by a fixed-point divisor.
    Scale(f64),
    /// Map the 0-1023 hardware range to whole percent, truncating.
    BrightnessPercent,
}

/// One telemetry field as exposed to the automation layer.
pub struct FieldDescriptor {
    /// Snake-case field key; part of topic paths and unique ids.
    pub key: &'static str,
    /// Human-readable entity label.
    pub label: &'static str,
    pub transform: Transform,
    pub unit: Option<&'static str>,
    /// Diagnostic codes and status words default to hidden.
    pub enabled_by_default: bool,
    /// Accessor into the heartbeat.
    pub read: fn(&InverterHeartbeat) -> FieldValue,
}

impl FieldDescriptor {
    /// Render the displayed state for this field.
    pub fn render(&self, heartbeat: &InverterHeartbeat, force_zero: bool) -> String {
        if force_zero {
            return "0".to_string();
        }
        match (self.transform, (self.read)(heartbeat)) {
            (Transform::Raw, FieldValue::Int(raw)) => raw.to_string(),
            (Transform::Raw, FieldValue::Text(text)) => text,
            (Transform::Scale(divisor), FieldValue::Int(raw)) => {
                format!("{}", raw as f64 / divisor)
            }
            (Transform::BrightnessPercent, FieldValue::Int(raw)) => {
                brightness_to_percent(raw).to_string()
            }
            // Text fields never carry a numeric transform.
            (_, FieldValue::Text(text)) => text,
        }
    }

    /// Derived device classification, from the unit.
    pub fn device_class(&self) -> Option<&'static str> {
        self.unit.and_then(device_class_for_unit)
    }
}

/// Map the raw 0-1023 brightness range to whole percent, truncating
/// toward zero.
pub fn brightness_to_percent(raw: i64) -> i64 {
    raw * 100 / 1023
}

/// Map whole percent back to the raw 0-1023 range, truncating.
pub fn percent_to_brightness(percent: i64) -> i64 {
    percent * 1023 / 100
}

/// Automation-layer device class for a unit of measurement.
pub fn device_class_for_unit(unit: &str) -> Option<&'static str> {
    match unit {
        "V" | "mV" => Some("voltage"),
        "A" => Some("current"),
        "W" => Some("power"),
        "Wh" => Some("energy"),
        "%" => Some("battery"),
        "°C" => Some("temperature"),
        "Hz" => Some("frequency"),
        "s" => Some("duration"),
        _ => None,
    }
}

macro_rules! int_field {
    ($key:ident, $label:expr, $transform:expr, $unit:expr, $enabled:expr) => {
        FieldDescriptor {
            key: stringify!($key),
            label: $label,
            transform: $transform,
            unit: $unit,
            enabled_by_default: $enabled,
            read: |hb| FieldValue::Int(hb.$key as i64),
        }
    };
}

macro_rules! text_field {
    ($key:ident, $label:expr) => {
        FieldDescriptor {
            key: stringify!($key),
            label: $label,
            transform: Transform::Raw,
            unit: None,
            enabled_by_default: true,
            read: |hb| FieldValue::Text(hb.$key.clone()),
        }
    };
}

use Transform::{BrightnessPercent, Raw, Scale};

/// Every heartbeat field the bridge publishes, in report order.
pub static FIELD_TABLE: &[FieldDescriptor] = &[
    int_field!(inv_error_code, "Inverter Error Code", Raw, None, false),
    int_field!(inv_warning_code, "Inverter Warning Code", Raw, None, false),
    int_field!(pv1_error_code, "PV1 Error Code", Raw, None, false),
    int_field!(pv1_warning_code, "PV1 Warning Code", Raw, None, false),
    int_field!(pv2_error_code, "PV2 Error Code", Raw, None, false),
    int_field!(pv2_warning_code, "PV2 Warning Code", Raw, None, false),
    int_field!(bat_error_code, "Battery Error Code", Raw, None, false),
    int_field!(bat_warning_code, "Battery Warning Code", Raw, None, false),
    int_field!(llc_error_code, "LLC Error Code", Raw, None, false),
    int_field!(llc_warning_code, "LLC Warning Code", Raw, None, false),
    int_field!(wireless_error_code, "Wireless Error Code", Raw, None, false),
    int_field!(wireless_warning_code, "Wireless Warning Code", Raw, None, false),
    int_field!(pv1_status, "PV1 Status", Raw, None, false),
    int_field!(pv2_status, "PV2 Status", Raw, None, false),
    int_field!(bat_status, "Battery Status", Raw, None, false),
    int_field!(llc_status, "LLC Status", Raw, None, false),
    int_field!(inv_status, "Inverter Status", Raw, None, false),
    int_field!(pv1_input_volt, "PV1 Input Voltage", Scale(10.0), Some("V"), true),
    int_field!(pv1_op_volt, "PV1 Operating Voltage", Scale(100.0), Some("V"), true),
    int_field!(pv1_input_cur, "PV1 Input Current", Scale(10.0), Some("A"), true),
    int_field!(pv1_input_watts, "PV1 Input Power", Scale(10.0), Some("W"), true),
    int_field!(pv1_temp, "PV1 Temperature", Scale(10.0), Some("°C"), true),
    int_field!(pv2_input_volt, "PV2 Input Voltage", Scale(10.0), Some("V"), true),
    int_field!(pv2_op_volt, "PV2 Operating Voltage", Scale(100.0), Some("V"), true),
    int_field!(pv2_input_cur, "PV2 Input Current", Scale(10.0), Some("A"), true),
    int_field!(pv2_input_watts, "PV2 Input Power", Scale(10.0), Some("W"), true),
    int_field!(pv2_temp, "PV2 Temperature", Scale(10.0), Some("°C"), true),
    int_field!(bat_input_volt, "Battery Input Voltage", Scale(10.0), Some("V"), true),
    int_field!(bat_op_volt, "Battery Operating Voltage", Scale(10.0), Some("V"), true),
    int_field!(bat_input_cur, "Battery Input Current", Scale(10.0), Some("A"), true),
    int_field!(bat_input_watts, "Battery Input Power", Scale(10.0), Some("W"), true),
    int_field!(bat_temp, "Battery Temperature", Scale(10.0), Some("°C"), true),
    int_field!(bat_soc, "Battery State of Charge", Raw, Some("%"), true),
    int_field!(llc_input_volt, "LLC Input Voltage", Scale(10.0), Some("V"), true),
    int_field!(llc_op_volt, "LLC Operating Voltage", Scale(100.0), Some("V"), true),
    int_field!(llc_temp, "LLC Temperature", Scale(10.0), Some("°C"), true),
    int_field!(inv_input_volt, "Inverter Input Voltage", Scale(100.0), Some("V"), true),
    int_field!(inv_op_volt, "Inverter Operating Voltage", Scale(10.0), Some("V"), true),
    int_field!(inv_output_cur, "Inverter Output Current", Scale(1000.0), Some("A"), true),
    int_field!(inv_output_watts, "Inverter Output Power", Scale(10.0), Some("W"), true),
    int_field!(inv_temp, "Inverter Temperature", Scale(10.0), Some("°C"), true),
    int_field!(inv_freq, "Inverter Frequency", Scale(10.0), Some("Hz"), true),
    int_field!(inv_dc_cur, "Inverter DC Current", Scale(1000.0), Some("A"), true),
    int_field!(bp_type, "Battery Pack Type", Raw, None, true),
    int_field!(inv_relay_status, "Inverter Relay Status", Raw, None, false),
    int_field!(pv1_relay_status, "PV1 Relay Status", Raw, None, false),
    int_field!(pv2_relay_status, "PV2 Relay Status", Raw, None, false),
    text_field!(install_country, "Installation Country"),
    text_field!(install_town, "Installation Town"),
    int_field!(permanent_watts, "Permanent Power", Scale(10.0), Some("W"), true),
    int_field!(dynamic_watts, "Dynamic Power", Scale(10.0), Some("W"), true),
    int_field!(supply_priority, "Supply Priority", Raw, None, true),
    int_field!(lower_limit, "Discharge Limit", Raw, Some("%"), true),
    int_field!(upper_limit, "Charge Limit", Raw, Some("%"), true),
    int_field!(inv_on_off, "Inverter On/Off", Raw, None, true),
    int_field!(inv_brightness, "Inverter Brightness", BrightnessPercent, Some("%"), true),
    int_field!(heartbeat_frequency, "Heartbeat Frequency", Raw, Some("s"), true),
    int_field!(rated_power, "Rated Power", Scale(10.0), Some("W"), true),
    int_field!(battery_charge_remain, "Battery Charge Remaining", Raw, Some("Wh"), true),
    int_field!(battery_discharge_remain, "Battery Discharge Remaining", Raw, Some("Wh"), true),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_render_keeps_fractions() {
        let heartbeat = InverterHeartbeat {
            pv1_input_volt: 1234,
            ..Default::default()
        };
        let descriptor = FIELD_TABLE
            .iter()
            .find(|f| f.key == "pv1_input_volt")
            .unwrap();
        assert_eq!(descriptor.render(&heartbeat, false), "123.4");
        assert_eq!(descriptor.render(&heartbeat, true), "0");
    }

    #[test]
    fn whole_values_render_without_trailing_zero() {
        let heartbeat = InverterHeartbeat {
            permanent_watts: 1000,
            ..Default::default()
        };
        let descriptor = FIELD_TABLE
            .iter()
            .find(|f| f.key == "permanent_watts")
            .unwrap();
        assert_eq!(descriptor.render(&heartbeat, false), "100");
    }

    #[test]
    fn brightness_maps_to_truncated_percent() {
        assert_eq!(brightness_to_percent(512), 50);
        assert_eq!(brightness_to_percent(1023), 100);
        assert_eq!(brightness_to_percent(0), 0);
        assert_eq!(percent_to_brightness(50), 511);
        assert_eq!(percent_to_brightness(100), 1023);
    }

    #[test]
    fn diagnostics_default_hidden() {
        for descriptor in FIELD_TABLE {
            let diagnostic = descriptor.key.contains("error_code")
                || descriptor.key.contains("warning_code")
                || descriptor.key.contains("status");
            assert_eq!(descriptor.enabled_by_default, !diagnostic, "{}", descriptor.key);
        }
    }

    #[test]
    fn temperature_units_carry_a_device_class() {
        let descriptor = FIELD_TABLE.iter().find(|f| f.key == "bat_temp").unwrap();
        assert_eq!(descriptor.device_class(), Some("temperature"));
        let text = FIELD_TABLE
            .iter()
            .find(|f| f.key == "install_country")
            .unwrap();
        assert_eq!(text.device_class(), None);
    }

    #[test]
    fn table_covers_every_heartbeat_field() {
        assert_eq!(FIELD_TABLE.len(), 60);
    }
}
