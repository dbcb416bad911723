//! Delivery channel reconciliation.
//!
//! Adapter instances come and go; their delivery channels must be garbage
//! collected once the instance is gone for good. The manager periodically
//! lists all channels, recovers each embedded instance identifier, asks the
//! liveness oracle, and deletes the channels of instances affirmatively
//! reported not alive.
//!
//! Deletion is conservative: an Unknown answer never deletes, because a
//! false deletion silently drops in-flight and future commands, while a
//! missed one only wastes resources until the next cycle. The loop may run
//! redundantly on several router replicas; deletes are idempotent, so the
//! races are harmless.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tidelink_core::{LivenessOracle, LivenessStatus};
use tidelink_transport::{instance_id_from_name, Transport};

/// Reconciliation loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Seconds between reconciliation passes
    pub interval_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

/// Creates and garbage-collects per-instance delivery channels.
pub struct DeliveryChannelManager {
    config: ReconcilerConfig,
    transport: Arc<dyn Transport>,
    oracle: Arc<dyn LivenessOracle>,
    running: Arc<RwLock<bool>>,
    task_handle: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl DeliveryChannelManager {
    /// Create a manager for one transport backend.
    pub fn new(
        transport: Arc<dyn Transport>,
        oracle: Arc<dyn LivenessOracle>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            config,
            transport,
            oracle,
            running: Arc::new(RwLock::new(false)),
            task_handle: Arc::new(RwLock::new(None)),
        }
    }

    /// Start the periodic reconciliation loop.
    pub async fn start(&self) {
        let mut running = self.running.write().await;
        if *running {
            return;
        }
        *running = true;
        drop(running);

        let transport = self.transport.clone();
        let oracle = self.oracle.clone();
        let running_flag = self.running.clone();
        let interval = Duration::from_secs(self.config.interval_secs);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                {
                    let r = running_flag.read().await;
                    if !*r {
                        break;
                    }
                }
                if let Err(err) = reconcile_once(transport.as_ref(), oracle.as_ref()).await {
                    warn!(error = %err, "reconciliation pass failed, retrying next cycle");
                }
            }
        });

        let mut task = self.task_handle.write().await;
        *task = Some(handle);
    }

    /// Stop the reconciliation loop.
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        drop(running);

        let mut task = self.task_handle.write().await;
        if let Some(handle) = task.take() {
            handle.abort();
        }
    }

    /// Whether the loop is running.
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Run one reconciliation pass immediately.
    pub async fn reconcile_now(&self) -> Result<(), tidelink_transport::TransportError> {
        reconcile_once(self.transport.as_ref(), self.oracle.as_ref()).await
    }
}

/// One reconciliation pass over all channels of one transport.
///
/// A transient failure deleting one channel is logged and left for the next
/// pass; it does not abort the rest of the pass.
async fn reconcile_once(
    transport: &dyn Transport,
    oracle: &dyn LivenessOracle,
) -> Result<(), tidelink_transport::TransportError> {
    let prefix = transport.channel_prefix().to_string();
    let channels = transport.list_channels().await?;
    debug!(count = channels.len(), "reconciling delivery channels");

    for channel in channels {
        let Some(instance_id) =
            instance_id_from_name(&prefix, &channel.channel_name).map(str::to_string)
        else {
            // Not a delivery channel of ours; leave it alone.
            continue;
        };

        match oracle.is_alive(&instance_id).await {
            LivenessStatus::Alive => {}
            LivenessStatus::Unknown => {
                debug!(
                    instance = %instance_id,
                    "liveness unknown, keeping channel"
                );
            }
            LivenessStatus::NotAlive => {
                match transport.delete_channel(&channel.channel_name).await {
                    Ok(()) => {
                        info!(
                            channel = %channel.channel_name,
                            instance = %instance_id,
                            "deleted channel of dead adapter instance"
                        );
                    }
                    Err(err) => {
                        warn!(
                            channel = %channel.channel_name,
                            error = %err,
                            "failed to delete channel, retrying next cycle"
                        );
                    }
                }
            }
        }
    }
    Ok(())
}
