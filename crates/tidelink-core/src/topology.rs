//! Device topology and the registration lookup contract.
//!
//! The registration lookup answers, for one device, how that device can be
//! reached: directly, through explicitly listed gateways, or through any
//! member of a gateway group the device is authorized to use.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::command::{DeviceId, GatewayId, SubjectId, TenantId};
use crate::error::RoutingError;

/// A named group of gateways with its resolved member list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayGroup {
    /// Group name
    pub name: String,
    /// Member gateways, in configured order
    pub members: Vec<GatewayId>,
}

/// How one device may be reached, as configured in the device registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceTopology {
    /// The device this topology describes
    pub device_id: DeviceId,
    /// Gateways explicitly authorized to act for the device, in configured
    /// order
    #[serde(default)]
    pub via_gateways: Vec<GatewayId>,
    /// Gateway groups the device may use, with members resolved
    #[serde(default)]
    pub gateway_groups: Vec<GatewayGroup>,
}

impl DeviceTopology {
    /// Topology of a device that only connects directly.
    pub fn direct(device_id: impl Into<DeviceId>) -> Self {
        Self {
            device_id: device_id.into(),
            via_gateways: Vec::new(),
            gateway_groups: Vec::new(),
        }
    }

    /// Set the explicit gateway list.
    pub fn with_gateways(mut self, gateways: Vec<GatewayId>) -> Self {
        self.via_gateways = gateways;
        self
    }

    /// Add a gateway group.
    pub fn with_group(mut self, group: GatewayGroup) -> Self {
        self.gateway_groups.push(group);
        self
    }

    /// The ordered candidate subject set for command routing.
    ///
    /// Order matters for the deterministic tie-break: the device itself
    /// first, then explicit gateways in configured order, then group members
    /// in group order. Duplicates keep their first position.
    pub fn candidate_subjects(&self) -> Vec<SubjectId> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::with_capacity(1 + self.via_gateways.len());

        let direct: &[SubjectId] = std::slice::from_ref(&self.device_id);
        let groups = self.gateway_groups.iter().flat_map(|g| g.members.iter());
        for subject in direct.iter().chain(self.via_gateways.iter()).chain(groups) {
            if seen.insert(subject.clone()) {
                candidates.push(subject.clone());
            }
        }
        candidates
    }
}

/// Read-only access to device registration data.
///
/// Implementations wrap whatever registry backend the deployment uses; the
/// router only ever reads topology through this trait.
#[async_trait]
pub trait RegistrationLookup: Send + Sync {
    /// Look up how `device_id` can be reached.
    ///
    /// Fails with [`RoutingError::DeviceUnknown`] if the device does not
    /// exist or the tenant is disabled, and with
    /// [`RoutingError::Unavailable`] if the backend cannot be reached.
    async fn get_topology(
        &self,
        tenant_id: &TenantId,
        device_id: &DeviceId,
    ) -> Result<DeviceTopology, RoutingError>;
}

/// In-memory registration lookup.
///
/// Reference implementation for embedding and tests; production deployments
/// put a registry client behind [`RegistrationLookup`] instead.
#[derive(Default)]
pub struct InMemoryRegistrationLookup {
    topologies: DashMap<(TenantId, DeviceId), DeviceTopology>,
    disabled_tenants: DashMap<TenantId, ()>,
}

impl InMemoryRegistrationLookup {
    /// Create an empty lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty lookup behind an `Arc`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a device topology.
    pub fn put(&self, tenant_id: impl Into<TenantId>, topology: DeviceTopology) {
        self.topologies
            .insert((tenant_id.into(), topology.device_id.clone()), topology);
    }

    /// Remove a device.
    pub fn remove(&self, tenant_id: &TenantId, device_id: &DeviceId) {
        self.topologies
            .remove(&(tenant_id.clone(), device_id.clone()));
    }

    /// Mark a tenant as disabled; all its devices become unknown.
    pub fn disable_tenant(&self, tenant_id: impl Into<TenantId>) {
        self.disabled_tenants.insert(tenant_id.into(), ());
    }

    /// Re-enable a tenant.
    pub fn enable_tenant(&self, tenant_id: &TenantId) {
        self.disabled_tenants.remove(tenant_id);
    }
}

#[async_trait]
impl RegistrationLookup for InMemoryRegistrationLookup {
    async fn get_topology(
        &self,
        tenant_id: &TenantId,
        device_id: &DeviceId,
    ) -> Result<DeviceTopology, RoutingError> {
        if self.disabled_tenants.contains_key(tenant_id) {
            return Err(RoutingError::DeviceUnknown {
                tenant_id: tenant_id.clone(),
                device_id: device_id.clone(),
            });
        }
        self.topologies
            .get(&(tenant_id.clone(), device_id.clone()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RoutingError::DeviceUnknown {
                tenant_id: tenant_id.clone(),
                device_id: device_id.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_order_direct_first() {
        let topology = DeviceTopology::direct("d1")
            .with_gateways(vec!["gw1".to_string(), "gw2".to_string()]);

        assert_eq!(topology.candidate_subjects(), vec!["d1", "gw1", "gw2"]);
    }

    #[test]
    fn test_candidate_order_groups_last() {
        let topology = DeviceTopology::direct("d1")
            .with_gateways(vec!["gw1".to_string()])
            .with_group(GatewayGroup {
                name: "hall".to_string(),
                members: vec!["gw2".to_string(), "gw3".to_string()],
            });

        assert_eq!(
            topology.candidate_subjects(),
            vec!["d1", "gw1", "gw2", "gw3"]
        );
    }

    #[test]
    fn test_candidate_dedup_keeps_first_position() {
        let topology = DeviceTopology::direct("d1")
            .with_gateways(vec!["gw1".to_string(), "gw2".to_string()])
            .with_group(GatewayGroup {
                name: "hall".to_string(),
                members: vec!["gw2".to_string(), "gw1".to_string(), "gw4".to_string()],
            });

        assert_eq!(
            topology.candidate_subjects(),
            vec!["d1", "gw1", "gw2", "gw4"]
        );
    }

    #[tokio::test]
    async fn test_lookup_unknown_device() {
        let lookup = InMemoryRegistrationLookup::new();
        let err = lookup
            .get_topology(&"t1".to_string(), &"missing".to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, RoutingError::DeviceUnknown { .. }));
    }

    #[tokio::test]
    async fn test_lookup_known_device() {
        let lookup = InMemoryRegistrationLookup::new();
        lookup.put("t1", DeviceTopology::direct("d1"));

        let topology = lookup
            .get_topology(&"t1".to_string(), &"d1".to_string())
            .await
            .unwrap();
        assert_eq!(topology.device_id, "d1");
    }

    #[tokio::test]
    async fn test_disabled_tenant_hides_devices() {
        let lookup = InMemoryRegistrationLookup::new();
        lookup.put("t1", DeviceTopology::direct("d1"));
        lookup.disable_tenant("t1");

        let err = lookup
            .get_topology(&"t1".to_string(), &"d1".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::DeviceUnknown { .. }));

        lookup.enable_tenant(&"t1".to_string());
        assert!(lookup
            .get_topology(&"t1".to_string(), &"d1".to_string())
            .await
            .is_ok());
    }
}
