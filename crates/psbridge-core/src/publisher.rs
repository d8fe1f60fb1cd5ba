//! Outbound publish seam.
//!
//! Everything that leaves the bridge goes through [`MessagePublisher`],
//! so the projection, dispatcher and scheduler are all testable against a
//! recording stub. The only production implementation is a thin wrapper
//! over the rumqttc async client; publishes are fire-and-forget at
//! at-least-once QoS, with convergence left to the periodic republish.

use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};
use thiserror::Error;

/// Failure to hand a message to the transport. Never fatal; the next
/// periodic cycle or inbound event retries implicitly.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("mqtt publish failed: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
}

/// Publish seam over the transport client.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool)
        -> Result<(), PublishError>;
}

/// rumqttc-backed publisher.
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MessagePublisher for MqttPublisher {
    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> Result<(), PublishError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, retain, payload)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::Mutex;

    /// Records every publish for assertions.
    #[derive(Default)]
    pub struct RecordingPublisher {
        pub published: Mutex<Vec<(String, Vec<u8>, bool)>>,
    }

    impl RecordingPublisher {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn count(&self) -> usize {
            self.published.lock().await.len()
        }

        pub async fn topics(&self) -> Vec<String> {
            self.published
                .lock()
                .await
                .iter()
                .map(|(topic, _, _)| topic.clone())
                .collect()
        }
    }

    #[async_trait]
    impl MessagePublisher for RecordingPublisher {
        async fn publish(
            &self,
            topic: &str,
            payload: Vec<u8>,
            retain: bool,
        ) -> Result<(), PublishError> {
            self.published
                .lock()
                .await
                .push((topic.to_string(), payload, retain));
            Ok(())
        }
    }
}
