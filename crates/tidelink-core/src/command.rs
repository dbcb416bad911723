//! Command envelope and identifier types.
//!
//! Identifiers are opaque, case-sensitive strings. Tenant, device and
//! gateway identifiers are unique within a tenant; adapter instance
//! identifiers are unique across the whole cluster.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant identifier.
pub type TenantId = String;

/// Device identifier, unique within a tenant.
pub type DeviceId = String;

/// Gateway identifier, unique within a tenant.
pub type GatewayId = String;

/// A device or gateway identifier acting as the unit of command-handling
/// ownership.
pub type SubjectId = String;

/// Identifier of one running protocol adapter replica; cluster-global.
pub type AdapterInstanceId = String;

/// A command addressed to a device.
///
/// The payload is opaque to the router; no assumptions are made about its
/// encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// Unique command ID
    pub id: String,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Target device ID
    pub device_id: DeviceId,
    /// Command name (e.g. "setBrightness")
    pub name: String,
    /// Opaque payload bytes
    #[serde(default)]
    pub payload: Vec<u8>,
    /// Payload content type hint, if the sender supplied one
    pub content_type: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Command {
    /// Create a new command with an empty payload.
    pub fn new(
        tenant_id: impl Into<TenantId>,
        device_id: impl Into<DeviceId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            device_id: device_id.into(),
            name: name.into(),
            payload: Vec::new(),
            content_type: None,
            created_at: Utc::now(),
        }
    }

    /// Set the payload.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Set the payload content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_creation() {
        let cmd = Command::new("tenant-a", "device-1", "reboot");

        assert_eq!(cmd.tenant_id, "tenant-a");
        assert_eq!(cmd.device_id, "device-1");
        assert_eq!(cmd.name, "reboot");
        assert!(cmd.payload.is_empty());
        assert!(cmd.content_type.is_none());
        assert!(!cmd.id.is_empty());
    }

    #[test]
    fn test_command_builder() {
        let cmd = Command::new("tenant-a", "device-1", "setConfig")
            .with_payload(vec![0x01, 0x02])
            .with_content_type("application/octet-stream");

        assert_eq!(cmd.payload, vec![0x01, 0x02]);
        assert_eq!(cmd.content_type.as_deref(), Some("application/octet-stream"));
    }

    #[test]
    fn test_command_ids_unique() {
        let a = Command::new("t", "d", "x");
        let b = Command::new("t", "d", "x");
        assert_ne!(a.id, b.id);
    }
}
