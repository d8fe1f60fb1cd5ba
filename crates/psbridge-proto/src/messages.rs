//! Protobuf message definitions for the PowerStream frame protocol.
//!
//! The schema is fixed by the device firmware and is written out by hand
//! rather than generated: the messages are few, the field set is frozen,
//! and a hand-written module keeps the crate free of a build-script
//! dependency on `protoc`.
//!
//! Inbound traffic is a [`TelemetryEnvelope`] carrying one or more
//! [`TelemetryHeader`]s; a header whose `cmd_id` is the telemetry report
//! code wraps an [`InverterHeartbeat`] in its `pdata`. Outbound commands
//! reuse the same header shape inside a single-header [`CommandEnvelope`],
//! with the command parameters serialized into `pdata` as one of the small
//! `*Pack` payloads. The keepalive ping is a bare [`KeepaliveFrame`] with
//! no inner payload at all.

use prost::Message;

/// Outer wrapper for inbound frames. One physical frame may address
/// several devices, one header each.
#[derive(Clone, PartialEq, Message)]
pub struct TelemetryEnvelope {
    #[prost(message, repeated, tag = "1")]
    pub header: Vec<TelemetryHeader>,
}

/// Frame header addressing a single device and command.
///
/// The same layout is used on both directions of the link; outbound
/// command frames fill in the addressing constants and carry their payload
/// in `pdata`.
#[derive(Clone, PartialEq, Message)]
pub struct TelemetryHeader {
    #[prost(bytes = "vec", tag = "1")]
    pub pdata: Vec<u8>,
    #[prost(int32, tag = "2")]
    pub src: i32,
    #[prost(int32, tag = "3")]
    pub dest: i32,
    #[prost(int32, tag = "4")]
    pub d_src: i32,
    #[prost(int32, tag = "5")]
    pub d_dest: i32,
    #[prost(int32, tag = "6")]
    pub enc_type: i32,
    #[prost(int32, tag = "7")]
    pub check_type: i32,
    #[prost(int32, tag = "8")]
    pub cmd_func: i32,
    #[prost(int32, tag = "9")]
    pub cmd_id: i32,
    #[prost(int32, tag = "10")]
    pub data_len: i32,
    #[prost(int32, tag = "11")]
    pub need_ack: i32,
    #[prost(int32, tag = "12")]
    pub is_ack: i32,
    #[prost(uint32, tag = "14")]
    pub seq: u32,
    #[prost(int32, tag = "16")]
    pub version: i32,
    #[prost(int32, tag = "17")]
    pub payload_ver: i32,
    #[prost(int32, tag = "21")]
    pub ack_type: i32,
    #[prost(string, tag = "23")]
    pub from: String,
    #[prost(string, tag = "25")]
    pub device_sn: String,
}

/// Outbound wrapper: exactly one header per command frame.
#[derive(Clone, PartialEq, Message)]
pub struct CommandEnvelope {
    #[prost(message, optional, tag = "1")]
    pub header: Option<TelemetryHeader>,
}

/// Full periodic state report from a PowerStream inverter.
///
/// Every field is present in every report; a new heartbeat replaces the
/// previous one wholesale. Electrical values are fixed-point integers
/// (the projection layer owns the divisors), status and code fields are
/// raw enumerations.
#[derive(Clone, PartialEq, Message)]
pub struct InverterHeartbeat {
    #[prost(uint32, tag = "1")]
    pub inv_error_code: u32,
    #[prost(uint32, tag = "2")]
    pub inv_warning_code: u32,
    #[prost(uint32, tag = "3")]
    pub pv1_error_code: u32,
    #[prost(uint32, tag = "4")]
    pub pv1_warning_code: u32,
    #[prost(uint32, tag = "5")]
    pub pv2_error_code: u32,
    #[prost(uint32, tag = "6")]
    pub pv2_warning_code: u32,
    #[prost(uint32, tag = "7")]
    pub bat_error_code: u32,
    #[prost(uint32, tag = "8")]
    pub bat_warning_code: u32,
    #[prost(uint32, tag = "9")]
    pub llc_error_code: u32,
    #[prost(uint32, tag = "10")]
    pub llc_warning_code: u32,
    #[prost(uint32, tag = "11")]
    pub wireless_error_code: u32,
    #[prost(uint32, tag = "12")]
    pub wireless_warning_code: u32,
    #[prost(uint32, tag = "13")]
    pub pv1_status: u32,
    #[prost(uint32, tag = "14")]
    pub pv2_status: u32,
    #[prost(uint32, tag = "15")]
    pub bat_status: u32,
    #[prost(uint32, tag = "16")]
    pub llc_status: u32,
    #[prost(uint32, tag = "17")]
    pub inv_status: u32,
    #[prost(int32, tag = "18")]
    pub pv1_input_volt: i32,
    #[prost(int32, tag = "19")]
    pub pv1_op_volt: i32,
    #[prost(int32, tag = "20")]
    pub pv1_input_cur: i32,
    #[prost(int32, tag = "21")]
    pub pv1_input_watts: i32,
    #[prost(int32, tag = "22")]
    pub pv1_temp: i32,
    #[prost(int32, tag = "23")]
    pub pv2_input_volt: i32,
    #[prost(int32, tag = "24")]
    pub pv2_op_volt: i32,
    #[prost(int32, tag = "25")]
    pub pv2_input_cur: i32,
    #[prost(int32, tag = "26")]
    pub pv2_input_watts: i32,
    #[prost(int32, tag = "27")]
    pub pv2_temp: i32,
    #[prost(int32, tag = "28")]
    pub bat_input_volt: i32,
    #[prost(int32, tag = "29")]
    pub bat_op_volt: i32,
    #[prost(int32, tag = "30")]
    pub bat_input_cur: i32,
    #[prost(int32, tag = "31")]
    pub bat_input_watts: i32,
    #[prost(int32, tag = "32")]
    pub bat_temp: i32,
    #[prost(uint32, tag = "33")]
    pub bat_soc: u32,
    #[prost(int32, tag = "34")]
    pub llc_input_volt: i32,
    #[prost(int32, tag = "35")]
    pub llc_op_volt: i32,
    #[prost(int32, tag = "36")]
    pub llc_temp: i32,
    #[prost(int32, tag = "37")]
    pub inv_input_volt: i32,
    #[prost(int32, tag = "38")]
    pub inv_op_volt: i32,
    #[prost(int32, tag = "39")]
    pub inv_output_cur: i32,
    #[prost(int32, tag = "40")]
    pub inv_output_watts: i32,
    #[prost(int32, tag = "41")]
    pub inv_temp: i32,
    #[prost(int32, tag = "42")]
    pub inv_freq: i32,
    #[prost(int32, tag = "43")]
    pub inv_dc_cur: i32,
    #[prost(uint32, tag = "44")]
    pub bp_type: u32,
    #[prost(uint32, tag = "45")]
    pub inv_relay_status: u32,
    #[prost(uint32, tag = "46")]
    pub pv1_relay_status: u32,
    #[prost(uint32, tag = "47")]
    pub pv2_relay_status: u32,
    #[prost(string, tag = "48")]
    pub install_country: String,
    #[prost(string, tag = "49")]
    pub install_town: String,
    #[prost(uint32, tag = "50")]
    pub permanent_watts: u32,
    #[prost(uint32, tag = "51")]
    pub dynamic_watts: u32,
    #[prost(uint32, tag = "52")]
    pub supply_priority: u32,
    #[prost(uint32, tag = "53")]
    pub lower_limit: u32,
    #[prost(uint32, tag = "54")]
    pub upper_limit: u32,
    #[prost(uint32, tag = "55")]
    pub inv_on_off: u32,
    #[prost(uint32, tag = "56")]
    pub inv_brightness: u32,
    #[prost(uint32, tag = "57")]
    pub heartbeat_frequency: u32,
    #[prost(uint32, tag = "58")]
    pub rated_power: u32,
    #[prost(uint32, tag = "59")]
    pub battery_charge_remain: u32,
    #[prost(uint32, tag = "60")]
    pub battery_discharge_remain: u32,
}

/// Generic single-value command payload (deci-watt power limit).
#[derive(Clone, PartialEq, Message)]
pub struct SetValue {
    #[prost(int32, tag = "1")]
    pub value: i32,
}

/// Supply-priority command payload: 0 = prioritize power supply,
/// 1 = prioritize power storage.
#[derive(Clone, PartialEq, Message)]
pub struct SupplyPriorityPack {
    #[prost(int32, tag = "1")]
    pub supply_priority: i32,
}

/// Battery discharge floor command payload, percent.
#[derive(Clone, PartialEq, Message)]
pub struct BatLowerPack {
    #[prost(int32, tag = "1")]
    pub lower_limit: i32,
}

/// Battery charge ceiling command payload, percent.
#[derive(Clone, PartialEq, Message)]
pub struct BatUpperPack {
    #[prost(int32, tag = "1")]
    pub upper_limit: i32,
}

/// Indicator brightness command payload, raw 0-1023.
#[derive(Clone, PartialEq, Message)]
pub struct BrightnessPack {
    #[prost(int32, tag = "1")]
    pub brightness: i32,
}

/// Envelope-only liveness ping sent to the device itself.
///
/// Distinct from the command envelope: it is serialized bare, carries no
/// inner payload, and uses its own function/command identifiers.
#[derive(Clone, PartialEq, Message)]
pub struct KeepaliveFrame {
    #[prost(int32, tag = "1")]
    pub link_id: i32,
    #[prost(int32, tag = "2")]
    pub src: i32,
    #[prost(int32, tag = "3")]
    pub dest: i32,
    #[prost(int32, tag = "4")]
    pub d_src: i32,
    #[prost(int32, tag = "5")]
    pub d_dest: i32,
    #[prost(int32, tag = "6")]
    pub enc_type: i32,
    #[prost(int32, tag = "7")]
    pub check_type: i32,
    #[prost(int32, tag = "8")]
    pub cmd_func: i32,
    #[prost(int32, tag = "9")]
    pub cmd_id: i32,
    #[prost(int32, tag = "10")]
    pub data_len: i32,
    #[prost(int32, tag = "11")]
    pub need_ack: i32,
    #[prost(int32, tag = "12")]
    pub is_ack: i32,
    #[prost(int32, tag = "13")]
    pub ack_type: i32,
    #[prost(uint32, tag = "14")]
    pub seq: u32,
}
