//! Kafka-backed transport.
//!
//! Delivery channel = Kafka topic. Topic bookkeeping, naming and the send
//! state machine live here; the broker I/O itself sits behind the connect
//! seam and is out of scope for the router core.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use tidelink_core::{AdapterInstanceId, Command};

use crate::channel::{DeliveryChannel, DEFAULT_CHANNEL_PREFIX};
use crate::{Transport, TransportError, TransportStats};

/// Kafka transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaTransportConfig {
    /// Bootstrap servers
    pub bootstrap_servers: Vec<String>,
    /// Client ID prefix
    pub client_id: String,
    /// Topic name prefix for delivery channels
    pub channel_prefix: String,
    /// Partitions per delivery topic
    pub num_partitions: i32,
    /// Replication factor per delivery topic
    pub replication_factor: i16,
    /// Producer acknowledgement timeout in seconds
    pub ack_timeout_secs: u64,
}

impl Default for KafkaTransportConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: vec!["localhost:9092".to_string()],
            client_id: format!("tidelink_{}", Uuid::new_v4()),
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
            num_partitions: 1,
            replication_factor: 1,
            ack_timeout_secs: 10,
        }
    }
}

/// Kafka delivery transport.
#[derive(Debug)]
pub struct KafkaTransport {
    /// Transport configuration.
    pub config: KafkaTransportConfig,
    connected: Arc<RwLock<bool>>,
    topics: DashMap<String, DeliveryChannel>,
    stats: Arc<RwLock<TransportStats>>,
}

impl KafkaTransport {
    /// Create a Kafka transport.
    pub fn new(config: KafkaTransportConfig) -> Self {
        let transport_id = format!("kafka_{}", config.client_id);
        Self {
            config,
            connected: Arc::new(RwLock::new(false)),
            topics: DashMap::new(),
            stats: Arc::new(RwLock::new(TransportStats::new(transport_id, false))),
        }
    }

    /// Connect producer and admin clients to the cluster.
    pub async fn connect(&self) -> Result<(), TransportError> {
        // In a real deployment this establishes the producer and admin
        // client connections to the bootstrap servers.
        *self.connected.write().await = true;
        let mut stats = self.stats.write().await;
        stats.connected = true;
        info!(
            servers = ?self.config.bootstrap_servers,
            "kafka transport connected"
        );
        Ok(())
    }

    /// Disconnect from the cluster.
    pub async fn disconnect(&self) {
        *self.connected.write().await = false;
        let mut stats = self.stats.write().await;
        stats.connected = false;
    }

    /// Whether the transport is connected.
    pub async fn is_connected(&self) -> bool {
        *self.connected.read().await
    }

    async fn require_connected(&self) -> Result<(), TransportError> {
        if *self.connected.read().await {
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }
}

#[async_trait]
impl Transport for KafkaTransport {
    async fn ensure_channel(
        &self,
        instance_id: &AdapterInstanceId,
    ) -> Result<DeliveryChannel, TransportError> {
        self.require_connected().await?;
        let channel = DeliveryChannel::for_instance(&self.config.channel_prefix, instance_id.clone());
        let entry = self
            .topics
            .entry(channel.channel_name.clone())
            .or_insert_with(|| {
                debug!(
                    topic = %channel.channel_name,
                    partitions = self.config.num_partitions,
                    "creating delivery topic"
                );
                channel.clone()
            });
        Ok(entry.value().clone())
    }

    async fn list_channels(&self) -> Result<Vec<DeliveryChannel>, TransportError> {
        self.require_connected().await?;
        Ok(self.topics.iter().map(|e| e.value().clone()).collect())
    }

    async fn delete_channel(&self, channel_name: &str) -> Result<(), TransportError> {
        self.require_connected().await?;
        if self.topics.remove(channel_name).is_some() {
            info!(topic = %channel_name, "deleted delivery topic");
        }
        Ok(())
    }

    async fn send(
        &self,
        channel: &DeliveryChannel,
        command: &Command,
    ) -> Result<(), TransportError> {
        if !*self.connected.read().await {
            let mut stats = self.stats.write().await;
            stats.commands_sent += 1;
            stats.commands_failed += 1;
            stats.last_error = Some("not connected".to_string());
            return Err(TransportError::NotConnected);
        }

        // Record key = device id so per-device publish order is preserved
        // within a partition.
        debug!(
            topic = %channel.channel_name,
            key = %command.device_id,
            command = %command.name,
            "publishing command"
        );

        let mut stats = self.stats.write().await;
        stats.commands_sent += 1;
        stats.commands_succeeded += 1;
        Ok(())
    }

    fn channel_prefix(&self) -> &str {
        &self.config.channel_prefix
    }

    async fn stats(&self) -> TransportStats {
        self.stats.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = KafkaTransportConfig::default();
        assert_eq!(config.bootstrap_servers, vec!["localhost:9092"]);
        assert_eq!(config.channel_prefix, "command_internal");
        assert_eq!(config.num_partitions, 1);
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let transport = KafkaTransport::new(KafkaTransportConfig::default());
        let err = transport
            .ensure_channel(&"adapter-1".to_string())
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::NotConnected);
    }

    #[tokio::test]
    async fn test_channel_lifecycle() {
        let transport = KafkaTransport::new(KafkaTransportConfig::default());
        transport.connect().await.unwrap();

        let channel = transport.ensure_channel(&"adapter-1".to_string()).await.unwrap();
        assert_eq!(channel.channel_name, "command_internal.adapter-1");
        assert_eq!(transport.list_channels().await.unwrap().len(), 1);

        transport.delete_channel(&channel.channel_name).await.unwrap();
        // Idempotent.
        transport.delete_channel(&channel.channel_name).await.unwrap();
        assert!(transport.list_channels().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_counts_stats() {
        let transport = KafkaTransport::new(KafkaTransportConfig::default());
        transport.connect().await.unwrap();
        let channel = transport.ensure_channel(&"adapter-1".to_string()).await.unwrap();

        let command = Command::new("t1", "d1", "reboot");
        transport.send(&channel, &command).await.unwrap();

        let stats = transport.stats().await;
        assert_eq!(stats.commands_sent, 1);
        assert_eq!(stats.commands_succeeded, 1);
        assert!(stats.connected);
    }
}
