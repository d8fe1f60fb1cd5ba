//! Topic layout shared by the projection and the dispatcher.
//!
//! Device-side topics follow the vendor cloud scheme; automation-side
//! topics follow the MQTT discovery convention, keyed by a short device
//! name derived from the serial's last four characters.

/// Subscription pattern for inbound telemetry frames.
pub const UPSTREAM_PATTERN: &str = "/sys/75/+/thing/protobuf/upstream";

/// Subscription patterns for automation-layer control writes.
pub const NUMBER_SET_PATTERN: &str = "homeassistant/number/+/set";
pub const SELECT_SET_PATTERN: &str = "homeassistant/select/+/set";

/// Topic suffix identifying an inbound telemetry frame.
pub const UPSTREAM_SUFFIX: &str = "/thing/protobuf/upstream";

/// Outbound command topic for one device.
pub fn command_topic(device_sn: &str) -> String {
    format!("/sys/75/{device_sn}/thing/property/cmd")
}

/// Lowercased last four characters of a serial.
pub fn last4(device_sn: &str) -> String {
    device_sn
        .get(device_sn.len().saturating_sub(4)..)
        .unwrap_or(device_sn)
        .to_lowercase()
}

/// Short device name used in automation-layer topics (`ps` + last four).
pub fn short_name(device_sn: &str) -> String {
    format!("ps{}", last4(device_sn))
}

/// Last four characters of the serial in original case, for display names.
pub fn display_suffix(device_sn: &str) -> &str {
    device_sn
        .get(device_sn.len().saturating_sub(4)..)
        .unwrap_or(device_sn)
}
