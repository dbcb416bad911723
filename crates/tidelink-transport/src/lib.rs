//! Delivery transports for the TideLink command router.
//!
//! A transport produces delivery channels (one per adapter instance) and
//! sends resolved commands on them. Two backends are provided: Kafka
//! (channel = topic) and a direct in-process messaging network. The choice
//! is made once at configuration time, per tenant.

pub mod channel;
pub mod direct;
pub mod kafka;
pub mod select;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tidelink_core::{AdapterInstanceId, Command};

// Re-exports
pub use channel::{channel_name, instance_id_from_name, DeliveryChannel, DEFAULT_CHANNEL_PREFIX};

pub use direct::{DirectTransport, DirectTransportConfig};

pub use kafka::{KafkaTransport, KafkaTransportConfig};

pub use select::{TransportKind, TransportSelectionConfig, TransportSelector};

/// Transport error types.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport has no live connection to its backend.
    #[error("transport not connected")]
    NotConnected,

    /// A send was accepted by the transport but failed at the backend.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// A channel create/list/delete operation failed at the backend.
    /// Transient; the caller retries on its next pass.
    #[error("channel operation failed: {0}")]
    ChannelOperation(String),
}

/// Per-transport send statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportStats {
    /// Transport identifier
    pub transport_id: String,
    /// Number of commands handed to the transport
    pub commands_sent: u64,
    /// Number of commands acknowledged by the backend
    pub commands_succeeded: u64,
    /// Number of commands that failed
    pub commands_failed: u64,
    /// Whether the transport is connected
    pub connected: bool,
    /// Last error message
    pub last_error: Option<String>,
}

impl TransportStats {
    fn new(transport_id: impl Into<String>, connected: bool) -> Self {
        Self {
            transport_id: transport_id.into(),
            commands_sent: 0,
            commands_succeeded: 0,
            commands_failed: 0,
            connected,
            last_error: None,
        }
    }
}

/// A command delivery backend.
///
/// Channel operations are idempotent: ensuring an existing channel returns
/// it, deleting an absent one is a no-op. Sends complete when the backend
/// acknowledges the publish.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Get or create the delivery channel for `instance_id`.
    async fn ensure_channel(
        &self,
        instance_id: &AdapterInstanceId,
    ) -> Result<DeliveryChannel, TransportError>;

    /// All channels currently existing at the backend, by name.
    async fn list_channels(&self) -> Result<Vec<DeliveryChannel>, TransportError>;

    /// Delete a channel by name. Deleting an absent channel is a no-op.
    async fn delete_channel(&self, channel_name: &str) -> Result<(), TransportError>;

    /// Send a command on a channel, completing with the backend's
    /// acknowledgement.
    async fn send(&self, channel: &DeliveryChannel, command: &Command)
        -> Result<(), TransportError>;

    /// The channel prefix this transport derives names from.
    fn channel_prefix(&self) -> &str;

    /// Current send statistics.
    async fn stats(&self) -> TransportStats;
}

/// The configured transport backends.
///
/// Selected once per tenant at configuration time; never renegotiated per
/// command.
#[derive(Debug)]
pub enum AnyTransport {
    /// Kafka-backed delivery (channel = topic)
    Kafka(KafkaTransport),
    /// Direct in-process messaging network
    Direct(DirectTransport),
}

impl AnyTransport {
    /// The kind tag of this transport.
    pub fn kind(&self) -> TransportKind {
        match self {
            AnyTransport::Kafka(_) => TransportKind::Kafka,
            AnyTransport::Direct(_) => TransportKind::Direct,
        }
    }
}

#[async_trait]
impl Transport for AnyTransport {
    async fn ensure_channel(
        &self,
        instance_id: &AdapterInstanceId,
    ) -> Result<DeliveryChannel, TransportError> {
        match self {
            AnyTransport::Kafka(t) => t.ensure_channel(instance_id).await,
            AnyTransport::Direct(t) => t.ensure_channel(instance_id).await,
        }
    }

    async fn list_channels(&self) -> Result<Vec<DeliveryChannel>, TransportError> {
        match self {
            AnyTransport::Kafka(t) => t.list_channels().await,
            AnyTransport::Direct(t) => t.list_channels().await,
        }
    }

    async fn delete_channel(&self, channel_name: &str) -> Result<(), TransportError> {
        match self {
            AnyTransport::Kafka(t) => t.delete_channel(channel_name).await,
            AnyTransport::Direct(t) => t.delete_channel(channel_name).await,
        }
    }

    async fn send(
        &self,
        channel: &DeliveryChannel,
        command: &Command,
    ) -> Result<(), TransportError> {
        match self {
            AnyTransport::Kafka(t) => t.send(channel, command).await,
            AnyTransport::Direct(t) => t.send(channel, command).await,
        }
    }

    fn channel_prefix(&self) -> &str {
        match self {
            AnyTransport::Kafka(t) => t.channel_prefix(),
            AnyTransport::Direct(t) => t.channel_prefix(),
        }
    }

    async fn stats(&self) -> TransportStats {
        match self {
            AnyTransport::Kafka(t) => t.stats().await,
            AnyTransport::Direct(t) => t.stats().await,
        }
    }
}
