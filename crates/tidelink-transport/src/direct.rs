//! Direct in-process transport.
//!
//! Delivers commands over bounded in-memory channels, one per adapter
//! instance. Used when adapters and router run in the same process, and by
//! the end-to-end tests.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::debug;

use tidelink_core::{AdapterInstanceId, Command};

use crate::channel::{instance_id_from_name, DeliveryChannel, DEFAULT_CHANNEL_PREFIX};
use crate::{Transport, TransportError, TransportStats};

/// Direct transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectTransportConfig {
    /// Channel name prefix
    pub channel_prefix: String,
    /// Per-channel command buffer size
    pub buffer_size: usize,
}

impl Default for DirectTransportConfig {
    fn default() -> Self {
        Self {
            channel_prefix: DEFAULT_CHANNEL_PREFIX.to_string(),
            buffer_size: 64,
        }
    }
}

#[derive(Debug)]
struct DirectChannel {
    channel: DeliveryChannel,
    tx: mpsc::Sender<Command>,
    // Held until the owning adapter instance attaches.
    rx: Mutex<Option<mpsc::Receiver<Command>>>,
}

/// In-process messaging network.
#[derive(Debug)]
pub struct DirectTransport {
    config: DirectTransportConfig,
    channels: DashMap<String, Arc<DirectChannel>>,
    stats: Arc<RwLock<TransportStats>>,
}

impl DirectTransport {
    /// Create a direct transport.
    pub fn new(config: DirectTransportConfig) -> Self {
        Self {
            stats: Arc::new(RwLock::new(TransportStats::new("direct", true))),
            config,
            channels: DashMap::new(),
        }
    }

    /// Take the receiving end of an instance's channel, creating the
    /// channel if needed. Each channel has exactly one receiver; a second
    /// attach returns `None`.
    pub async fn attach(
        &self,
        instance_id: &AdapterInstanceId,
    ) -> Result<Option<mpsc::Receiver<Command>>, TransportError> {
        self.ensure_channel(instance_id).await?;
        let name = crate::channel_name(&self.config.channel_prefix, instance_id);
        let entry = self
            .channels
            .get(&name)
            .map(|e| e.value().clone())
            .ok_or_else(|| TransportError::ChannelOperation("channel vanished".to_string()))?;
        let rx = entry.rx.lock().await.take();
        Ok(rx)
    }
}

impl Default for DirectTransport {
    fn default() -> Self {
        Self::new(DirectTransportConfig::default())
    }
}

#[async_trait]
impl Transport for DirectTransport {
    async fn ensure_channel(
        &self,
        instance_id: &AdapterInstanceId,
    ) -> Result<DeliveryChannel, TransportError> {
        let channel = DeliveryChannel::for_instance(&self.config.channel_prefix, instance_id.clone());
        let entry = self
            .channels
            .entry(channel.channel_name.clone())
            .or_insert_with(|| {
                debug!(channel = %channel.channel_name, "creating direct channel");
                let (tx, rx) = mpsc::channel(self.config.buffer_size);
                Arc::new(DirectChannel {
                    channel: channel.clone(),
                    tx,
                    rx: Mutex::new(Some(rx)),
                })
            });
        Ok(entry.value().channel.clone())
    }

    async fn list_channels(&self) -> Result<Vec<DeliveryChannel>, TransportError> {
        Ok(self
            .channels
            .iter()
            .map(|e| e.value().channel.clone())
            .collect())
    }

    async fn delete_channel(&self, channel_name: &str) -> Result<(), TransportError> {
        if self.channels.remove(channel_name).is_some() {
            debug!(channel = %channel_name, "deleted direct channel");
        }
        Ok(())
    }

    async fn send(
        &self,
        channel: &DeliveryChannel,
        command: &Command,
    ) -> Result<(), TransportError> {
        // Channel identity comes from the name; reject names this transport
        // did not produce.
        if instance_id_from_name(&self.config.channel_prefix, &channel.channel_name).is_none() {
            return Err(TransportError::SendFailed(format!(
                "not a delivery channel: {}",
                channel.channel_name
            )));
        }
        let entry = self.channels.get(&channel.channel_name).map(|e| e.value().clone());

        let mut stats = self.stats.write().await;
        stats.commands_sent += 1;

        let Some(entry) = entry else {
            stats.commands_failed += 1;
            stats.last_error = Some("channel does not exist".to_string());
            return Err(TransportError::SendFailed(format!(
                "channel [{}] does not exist",
                channel.channel_name
            )));
        };
        match entry.tx.try_send(command.clone()) {
            Ok(()) => {
                stats.commands_succeeded += 1;
                Ok(())
            }
            Err(err) => {
                stats.commands_failed += 1;
                stats.last_error = Some(err.to_string());
                Err(TransportError::SendFailed(format!(
                    "channel [{}] rejected command: {}",
                    channel.channel_name, err
                )))
            }
        }
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

    #[tokio::test]
    async fn test_ensure_channel_is_idempotent() {
        let transport = DirectTransport::default();
        let id = "adapter-1".to_string();
        let first = transport.ensure_channel(&id).await.unwrap();
        let second = transport.ensure_channel(&id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.list_channels().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let transport = DirectTransport::default();
        let id = "adapter-1".to_string();
        let mut rx = transport.attach(&id).await.unwrap().unwrap();

        let channel = transport.ensure_channel(&id).await.unwrap();
        let command = Command::new("t1", "d1", "reboot");
        transport.send(&channel, &command).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, command.id);
        assert_eq!(received.name, "reboot");
    }

    #[tokio::test]
    async fn test_second_attach_returns_none() {
        let transport = DirectTransport::default();
        let id = "adapter-1".to_string();
        assert!(transport.attach(&id).await.unwrap().is_some());
        assert!(transport.attach(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_send_to_deleted_channel_fails() {
        let transport = DirectTransport::default();
        let id = "adapter-1".to_string();
        let channel = transport.ensure_channel(&id).await.unwrap();

        transport.delete_channel(&channel.channel_name).await.unwrap();
        // Deleting again is a no-op.
        transport.delete_channel(&channel.channel_name).await.unwrap();

        let command = Command::new("t1", "d1", "reboot");
        let err = transport.send(&channel, &command).await.unwrap_err();
        assert!(matches!(err, TransportError::SendFailed(_)));
    }

    #[tokio::test]
    async fn test_full_buffer_rejects() {
        let transport = DirectTransport::new(DirectTransportConfig {
            buffer_size: 1,
            ..Default::default()
        });
        let id = "adapter-1".to_string();
        let channel = transport.ensure_channel(&id).await.unwrap();
        let command = Command::new("t1", "d1", "reboot");

        transport.send(&channel, &command).await.unwrap();
        let err = transport.send(&channel, &command).await.unwrap_err();
        assert!(matches!(err, TransportError::SendFailed(_)));

        let stats = transport.stats().await;
        assert_eq!(stats.commands_sent, 2);
        assert_eq!(stats.commands_succeeded, 1);
        assert_eq!(stats.commands_failed, 1);
    }
}
