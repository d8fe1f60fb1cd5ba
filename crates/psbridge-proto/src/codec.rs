//! Frame encode/decode entry points.
//!
//! Decoding filters the envelope down to headers that are actually ours:
//! the serial must carry the PowerStream family prefix and the command
//! identifier must be the telemetry report code. Everything else in the
//! envelope is someone else's traffic and is skipped without comment.
//!
//! Encoding wraps a [`CommandKind`] payload in the fixed command header.
//! The addressing constants are firmware-defined and must not drift; the
//! sequence number is wall-clock seconds, which keeps it non-decreasing
//! across calls within one process.

use chrono::Utc;
use prost::Message;
use thiserror::Error;

use crate::messages::{
    BatLowerPack, BatUpperPack, BrightnessPack, CommandEnvelope, InverterHeartbeat, KeepaliveFrame,
    SetValue, SupplyPriorityPack, TelemetryEnvelope, TelemetryHeader,
};

/// Serial prefix of the device family this bridge speaks for.
pub const DEVICE_SN_PREFIX: &str = "HW51";

/// `cmd_id` of an inbound telemetry report header.
pub const TELEMETRY_REPORT_CMD_ID: i32 = 1;

/// Fixed command-header constants, firmware-defined.
mod header {
    pub const SRC: i32 = 32;
    pub const DEST: i32 = 53;
    pub const D_SRC: i32 = 1;
    pub const D_DEST: i32 = 1;
    pub const CHECK_TYPE: i32 = 3;
    pub const CMD_FUNC: i32 = 20;
    pub const NEED_ACK: i32 = 1;
    pub const VERSION: i32 = 19;
    pub const PAYLOAD_VER: i32 = 1;
    pub const FROM: &str = "ios";
}

/// Fixed keepalive-frame constants.
mod keepalive {
    pub const LINK_ID: i32 = 15;
    pub const SRC: i32 = 32;
    pub const DEST: i32 = 53;
    pub const D_SRC: i32 = 1;
    pub const D_DEST: i32 = 1;
    pub const CMD_FUNC: i32 = 32;
    pub const CMD_ID: i32 = 10;
    pub const DATA_LEN: i32 = 2;
    pub const NEED_ACK: i32 = 1;
}

/// Failure to decode an inbound frame. The frame is dropped as a unit;
/// no state derived from a partially decoded envelope is ever applied.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed frame envelope: {0}")]
    Envelope(prost::DecodeError),

    #[error("malformed heartbeat payload from {device_sn}: {source}")]
    Payload {
        device_sn: String,
        source: prost::DecodeError,
    },
}

/// An outbound device command and its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// Output power limit in deci-watts.
    SetPowerLimit { deci_watts: i32 },
    /// 0 = prioritize power supply, 1 = prioritize power storage.
    SetSupplyPriority { priority: i32 },
    /// Battery discharge floor, percent.
    SetBatteryLower { percent: i32 },
    /// Battery charge ceiling, percent.
    SetBatteryUpper { percent: i32 },
    /// Indicator brightness, raw 0-1023.
    SetBrightness { raw: i32 },
    /// Envelope-only liveness ping.
    Keepalive,
}

impl CommandKind {
    /// Command identifier selecting the target operation on the device.
    pub fn cmd_id(&self) -> i32 {
        match self {
            CommandKind::SetPowerLimit { .. } => 129,
            CommandKind::SetSupplyPriority { .. } => 130,
            CommandKind::SetBatteryLower { .. } => 132,
            CommandKind::SetBatteryUpper { .. } => 133,
            CommandKind::SetBrightness { .. } => 135,
            CommandKind::Keepalive => keepalive::CMD_ID,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::SetPowerLimit { .. } => "power_limit",
            CommandKind::SetSupplyPriority { .. } => "supply_priority",
            CommandKind::SetBatteryLower { .. } => "battery_lower_limit",
            CommandKind::SetBatteryUpper { .. } => "battery_upper_limit",
            CommandKind::SetBrightness { .. } => "brightness",
            CommandKind::Keepalive => "keepalive",
        }
    }

    fn encode_pack(&self) -> Vec<u8> {
        match *self {
            CommandKind::SetPowerLimit { deci_watts } => {
                SetValue { value: deci_watts }.encode_to_vec()
            }
            CommandKind::SetSupplyPriority { priority } => SupplyPriorityPack {
                supply_priority: priority,
            }
            .encode_to_vec(),
            CommandKind::SetBatteryLower { percent } => BatLowerPack {
                lower_limit: percent,
            }
            .encode_to_vec(),
            CommandKind::SetBatteryUpper { percent } => BatUpperPack {
                upper_limit: percent,
            }
            .encode_to_vec(),
            CommandKind::SetBrightness { raw } => {
                BrightnessPack { brightness: raw }.encode_to_vec()
            }
            CommandKind::Keepalive => Vec::new(),
        }
    }
}

fn wall_clock_seq() -> u32 {
    Utc::now().timestamp() as u32
}

/// Decode an inbound telemetry frame into the heartbeats it carries.
///
/// Headers for foreign serial prefixes or non-telemetry commands are
/// skipped. Any malformed bytes, outer or inner, fail the whole frame.
pub fn decode_telemetry(payload: &[u8]) -> Result<Vec<(String, InverterHeartbeat)>, CodecError> {
    let envelope = TelemetryEnvelope::decode(payload).map_err(CodecError::Envelope)?;

    let mut reports = Vec::new();
    for header in &envelope.header {
        if !header.device_sn.starts_with(DEVICE_SN_PREFIX)
            || header.cmd_id != TELEMETRY_REPORT_CMD_ID
        {
            continue;
        }
        let heartbeat =
            InverterHeartbeat::decode(header.pdata.as_slice()).map_err(|source| {
                CodecError::Payload {
                    device_sn: header.device_sn.clone(),
                    source,
                }
            })?;
        reports.push((header.device_sn.clone(), heartbeat));
    }
    Ok(reports)
}

/// Encode an outbound command frame for one device.
pub fn encode_command(device_sn: &str, kind: &CommandKind) -> Vec<u8> {
    if let CommandKind::Keepalive = kind {
        return encode_keepalive();
    }

    let pdata = kind.encode_pack();
    let envelope = CommandEnvelope {
        header: Some(TelemetryHeader {
            data_len: pdata.len() as i32,
            pdata,
            src: header::SRC,
            dest: header::DEST,
            d_src: header::D_SRC,
            d_dest: header::D_DEST,
            check_type: header::CHECK_TYPE,
            cmd_func: header::CMD_FUNC,
            cmd_id: kind.cmd_id(),
            need_ack: header::NEED_ACK,
            seq: wall_clock_seq(),
            version: header::VERSION,
            payload_ver: header::PAYLOAD_VER,
            from: header::FROM.to_string(),
            device_sn: device_sn.to_string(),
            ..Default::default()
        }),
    };
    envelope.encode_to_vec()
}

fn encode_keepalive() -> Vec<u8> {
    KeepaliveFrame {
        link_id: keepalive::LINK_ID,
        src: keepalive::SRC,
        dest: keepalive::DEST,
        d_src: keepalive::D_SRC,
        d_dest: keepalive::D_DEST,
        enc_type: 0,
        check_type: 0,
        cmd_func: keepalive::CMD_FUNC,
        cmd_id: keepalive::CMD_ID,
        data_len: keepalive::DATA_LEN,
        need_ack: keepalive::NEED_ACK,
        is_ack: 0,
        ack_type: 0,
        seq: wall_clock_seq(),
    }
    .encode_to_vec()
}
