//! PowerStream bridge core.
//!
//! Everything between the wire codec and the MQTT socket lives here:
//!
//! - **DeviceStore**: last-known state per device, staleness tracking,
//!   and the command idempotency cache
//! - **projection**: heartbeat → retained discovery + state entities
//! - **dispatch**: automation-layer control writes → device command frames
//! - **scheduler**: discovery republish, offline sweep, keepalive loops
//! - **service**: the rumqttc event pump tying it all together
//!
//! The crate never exits on its own; every runtime failure is logged and
//! absorbed, with convergence restored by the periodic republish.

pub mod config;
pub mod dispatch;
pub mod fields;
pub mod projection;
pub mod publisher;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod topics;

pub use config::BridgeConfig;
pub use dispatch::CommandDispatcher;
pub use fields::{FieldDescriptor, FieldValue, Transform, FIELD_TABLE};
pub use projection::{project, publish_device, DiscoveryConfig, EntityUpdate};
pub use publisher::{MessagePublisher, MqttPublisher, PublishError};
pub use service::BridgeService;
pub use store::{DeviceRecord, DeviceStore};
