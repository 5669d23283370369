//! NATS transport for the command and telemetry channels.
//!
//! The bridge and the simulation process share two fixed subjects, one
//! per direction (see [`TransportConfig`]). Core NATS gives exactly the
//! semantics the bridge assumes: no durability, ordered per connection,
//! and a publish with no subscriber is silently discarded.

use futures::StreamExt as _;
use tracing::{debug, info, warn};

use crate::channel::{CommandPublisher, TelemetrySource};
use crate::config::TransportConfig;
use crate::error::ChannelError;

/// A connected NATS client bound to the configured subjects.
#[derive(Clone)]
pub struct NatsTransport {
    client: async_nats::Client,
    telemetry_subject: String,
    command_subject: String,
}

impl NatsTransport {
    /// Connect to the configured NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Connect`] if the server is unreachable.
    pub async fn connect(config: &TransportConfig) -> Result<Self, ChannelError> {
        let url = &config.nats_url;
        info!(url = %url, "connecting to NATS server");
        let client = async_nats::connect(url.as_str())
            .await
            .map_err(|e| ChannelError::Connect(format!("failed to connect to {url}: {e}")))?;
        info!("NATS connection established");
        Ok(Self {
            client,
            telemetry_subject: config.telemetry_subject.clone(),
            command_subject: config.command_subject.clone(),
        })
    }

    /// Publisher for the command subject.
    pub fn command_publisher(&self) -> NatsCommandPublisher {
        NatsCommandPublisher {
            client: self.client.clone(),
            subject: self.command_subject.clone(),
        }
    }

    /// Subscribe to the telemetry subject.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Subscribe`] if the subscription fails.
    pub async fn telemetry_source(&self) -> Result<NatsTelemetrySource, ChannelError> {
        let subject = self.telemetry_subject.clone();
        let subscriber = subscribe(&self.client, &subject).await?;
        Ok(NatsTelemetrySource {
            client: self.client.clone(),
            subject,
            subscriber: Some(subscriber),
        })
    }
}

impl std::fmt::Debug for NatsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsTransport")
            .field("telemetry_subject", &self.telemetry_subject)
            .field("command_subject", &self.command_subject)
            .finish_non_exhaustive()
    }
}

/// Publishes command lines on the command subject.
#[derive(Clone)]
pub struct NatsCommandPublisher {
    client: async_nats::Client,
    subject: String,
}

impl CommandPublisher for NatsCommandPublisher {
    async fn publish(&self, line: String) -> Result<(), ChannelError> {
        debug!(subject = %self.subject, command = %line, "publishing command");
        self.client
            .publish(self.subject.clone(), line.into_bytes().into())
            .await
            .map_err(|e| ChannelError::Publish(format!("failed to publish to {}: {e}", self.subject)))
    }
}

impl std::fmt::Debug for NatsCommandPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsCommandPublisher")
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}

async fn subscribe(
    client: &async_nats::Client,
    subject: &str,
) -> Result<async_nats::Subscriber, ChannelError> {
    debug!(subject = %subject, "subscribing to telemetry");
    let subscriber = client
        .subscribe(subject.to_owned())
        .await
        .map_err(|e| ChannelError::Subscribe(format!("failed to subscribe to {subject}: {e}")))?;
    info!(subject = %subject, "subscribed to telemetry");
    Ok(subscriber)
}

/// Yields telemetry payloads from the telemetry subscription.
///
/// If the subscription ends, the next `recv` subscribes again, so the
/// listener's backoff doubles as the retry interval.
pub struct NatsTelemetrySource {
    client: async_nats::Client,
    subject: String,
    subscriber: Option<async_nats::Subscriber>,
}

impl TelemetrySource for NatsTelemetrySource {
    async fn recv(&mut self) -> Result<Vec<u8>, ChannelError> {
        if self.subscriber.is_none() {
            self.subscriber = Some(subscribe(&self.client, &self.subject).await?);
        }
        let Some(subscriber) = self.subscriber.as_mut() else {
            return Err(ChannelError::Closed);
        };
        match subscriber.next().await {
            Some(message) => Ok(message.payload.to_vec()),
            None => {
                warn!(subject = %self.subject, "telemetry subscription ended, resubscribing");
                self.subscriber = None;
                Err(ChannelError::Closed)
            }
        }
    }
}

impl std::fmt::Debug for NatsTelemetrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsTelemetrySource")
            .field("subject", &self.subject)
            .field("subscribed", &self.subscriber.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn local_config() -> TransportConfig {
        TransportConfig {
            telemetry_subject: "marketsim.test.telemetry".to_owned(),
            command_subject: "marketsim.test.telemetry".to_owned(),
            ..TransportConfig::default()
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connect_error() {
        let config = TransportConfig {
            nats_url: "nats://127.0.0.1:1".to_owned(),
            ..TransportConfig::default()
        };
        let result = tokio::time::timeout(Duration::from_secs(10), NatsTransport::connect(&config)).await;
        if let Ok(result) = result {
            assert!(matches!(result, Err(ChannelError::Connect(_))));
        }
    }

    // Integration tests that require a live NATS server are marked #[ignore].
    #[tokio::test]
    #[ignore]
    async fn connect_to_nats() {
        let result = NatsTransport::connect(&TransportConfig::default()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    #[ignore]
    async fn published_commands_arrive_on_the_subject() {
        // Both subjects point at the same name so the publisher's output is
        // visible to our own subscription.
        let Ok(transport) = NatsTransport::connect(&local_config()).await else {
            return;
        };
        let Ok(mut source) = transport.telemetry_source().await else {
            return;
        };
        let publisher = transport.command_publisher();
        assert!(publisher.publish("DATA 101.25 500".to_owned()).await.is_ok());

        let frame = tokio::time::timeout(Duration::from_secs(2), source.recv()).await;
        assert!(matches!(frame, Ok(Ok(ref f)) if f.as_slice() == b"DATA 101.25 500"));
    }

    #[tokio::test]
    #[ignore]
    async fn ended_subscription_is_replaced() {
        let Ok(transport) = NatsTransport::connect(&local_config()).await else {
            return;
        };
        let Ok(mut source) = transport.telemetry_source().await else {
            return;
        };
        if let Some(subscriber) = source.subscriber.as_mut() {
            assert!(subscriber.unsubscribe().await.is_ok());
        }

        let ended = tokio::time::timeout(Duration::from_secs(2), source.recv()).await;
        assert!(matches!(ended, Ok(Err(ChannelError::Closed))));
        assert!(source.subscriber.is_none());

        // The next receive subscribes again and sees new traffic.
        let publisher = transport.command_publisher();
        let next = tokio::spawn(async move {
            tokio::time::timeout(Duration::from_secs(2), source.recv()).await
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(publisher.publish("METRICS 0.05 1200".to_owned()).await.is_ok());

        let frame = next.await;
        assert!(matches!(frame, Ok(Ok(Ok(ref f))) if f.as_slice() == b"METRICS 0.05 1200"));
    }
}
