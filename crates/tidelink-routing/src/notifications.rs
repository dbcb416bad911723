//! Lifecycle notification handling.
//!
//! When a device or tenant is deleted in the registry, its routing facts
//! must go away promptly instead of lingering until TTL expiry. The
//! handler consumes lifecycle notifications from whatever channel the
//! deployment uses and purges the connection registry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use tidelink_core::{DeviceId, TenantId};
use tidelink_registry::ConnectionRegistry;

/// A registry change that invalidates routing facts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LifecycleNotification {
    /// One device was deleted.
    DeviceDeleted {
        /// Owning tenant
        tenant_id: TenantId,
        /// Deleted device
        device_id: DeviceId,
    },
    /// A whole tenant was deleted.
    TenantDeleted {
        /// Deleted tenant
        tenant_id: TenantId,
    },
    /// All devices of a tenant were deleted at once.
    AllDevicesOfTenantDeleted {
        /// Affected tenant
        tenant_id: TenantId,
    },
}

/// Applies lifecycle notifications to the connection registry.
pub struct NotificationHandler {
    registry: Arc<dyn ConnectionRegistry>,
}

impl NotificationHandler {
    /// Create a handler over the registry to purge.
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Apply one notification.
    ///
    /// Registry unavailability is logged and swallowed: the facts still
    /// expire by TTL, so a missed purge degrades staleness, not
    /// correctness.
    pub async fn handle(&self, notification: LifecycleNotification) {
        let result = match &notification {
            LifecycleNotification::DeviceDeleted {
                tenant_id,
                device_id,
            } => {
                info!(tenant = %tenant_id, device = %device_id, "purging deleted device");
                self.registry.purge_device(tenant_id, device_id).await
            }
            LifecycleNotification::TenantDeleted { tenant_id }
            | LifecycleNotification::AllDevicesOfTenantDeleted { tenant_id } => {
                info!(tenant = %tenant_id, "purging tenant facts");
                self.registry.purge_tenant(tenant_id).await
            }
        };
        if let Err(err) = result {
            warn!(error = %err, "purge failed, facts will expire by TTL");
        }
    }

    /// Consume notifications from a channel until it closes.
    pub fn spawn(self, mut rx: mpsc::Receiver<LifecycleNotification>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                self.handle(notification).await;
            }
        })
    }
}
