//! Wire codec for the EcoFlow PowerStream frame protocol.
//!
//! The device speaks length-prefixed protobuf over MQTT: an outer envelope
//! of addressed headers, each wrapping a typed inner payload. This crate
//! owns that layout — the message definitions, the telemetry decode path,
//! and the command/keepalive encode path. It holds no state and does no
//! I/O; the bridge crate decides what to do with what comes out.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_telemetry, encode_command, CodecError, CommandKind, DEVICE_SN_PREFIX,
    TELEMETRY_REPORT_CMD_ID,
};
pub use messages::{InverterHeartbeat, TelemetryEnvelope, TelemetryHeader};
