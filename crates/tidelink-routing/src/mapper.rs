//! Command target resolution.
//!
//! Turns a (tenant, device) pair into the adapter instance that must
//! receive the command, consulting the registration lookup for topology and
//! the connection registry for live ownership facts. Resolution is
//! read-only: safe to run concurrently for the same or different devices,
//! with no internal locking or retries.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use tidelink_core::{
    AdapterInstanceId, DeviceId, GatewayId, RegistrationLookup, RoutingError, TenantId,
};
use tidelink_registry::{ConnectionRegistry, RegistryError};

/// Where a command must be delivered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandTarget {
    /// The adapter instance holding the relevant connection
    pub adapter_instance_id: AdapterInstanceId,
    /// Set when the command is addressed through a gateway rather than the
    /// device's own connection
    pub resolved_gateway_id: Option<GatewayId>,
}

/// Resolves devices to command targets.
pub struct CommandTargetMapper {
    lookup: Arc<dyn RegistrationLookup>,
    registry: Arc<dyn ConnectionRegistry>,
}

impl CommandTargetMapper {
    /// Create a mapper over the given lookup and registry.
    pub fn new(lookup: Arc<dyn RegistrationLookup>, registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { lookup, registry }
    }

    /// Resolve the delivery target for one device.
    ///
    /// Candidate subjects are considered in a fixed order: the device
    /// itself, then its explicit gateways in configured order, then gateway
    /// group members. When several candidates have live owners, the
    /// last-known gateway wins if it is among them; otherwise the first
    /// live candidate in that order is chosen. The tie-break is a
    /// deterministic best effort, not a correctness guarantee; ambiguity
    /// self-resolves once the device's next message updates the
    /// last-known-gateway fact.
    pub async fn resolve(
        &self,
        tenant_id: &TenantId,
        device_id: &DeviceId,
    ) -> Result<CommandTarget, RoutingError> {
        let topology = self.lookup.get_topology(tenant_id, device_id).await?;
        let candidates = topology.candidate_subjects();

        let subject_set: HashSet<_> = candidates.iter().cloned().collect();
        let owners = self
            .registry
            .get_owners(tenant_id, &subject_set)
            .await
            .map_err(registry_unavailable)?;

        if owners.is_empty() {
            debug!(tenant = %tenant_id, device = %device_id, "no live owner for any candidate");
            return Err(RoutingError::NoRoute {
                device_id: device_id.clone(),
            });
        }

        let subject = match owners.keys().next() {
            // Exactly one live path; owners is keyed by candidate subjects,
            // so the lone key is the subject to use.
            Some(only) if owners.len() == 1 => only.clone(),
            _ => {
                self.disambiguate(tenant_id, device_id, &candidates, &owners)
                    .await?
            }
        };

        let Some(adapter_instance_id) = owners.get(&subject).cloned() else {
            return Err(RoutingError::NoRoute {
                device_id: device_id.clone(),
            });
        };
        let resolved_gateway_id = (subject != *device_id).then_some(subject);

        debug!(
            tenant = %tenant_id,
            device = %device_id,
            instance = %adapter_instance_id,
            gateway = ?resolved_gateway_id,
            "resolved command target"
        );
        Ok(CommandTarget {
            adapter_instance_id,
            resolved_gateway_id,
        })
    }

    /// Pick one of several live candidates.
    async fn disambiguate(
        &self,
        tenant_id: &TenantId,
        device_id: &DeviceId,
        candidates: &[String],
        owners: &std::collections::HashMap<String, AdapterInstanceId>,
    ) -> Result<String, RoutingError> {
        if let Some(last_known) = self
            .registry
            .get_last_known_gateway(tenant_id, device_id)
            .await
            .map_err(registry_unavailable)?
        {
            // The path most recently proven to be in actual use.
            if owners.contains_key(&last_known) {
                return Ok(last_known);
            }
        }
        candidates
            .iter()
            .find(|candidate| owners.contains_key(*candidate))
            .cloned()
            .ok_or_else(|| RoutingError::NoRoute {
                device_id: device_id.clone(),
            })
    }
}

fn registry_unavailable(err: RegistryError) -> RoutingError {
    RoutingError::Unavailable(err.to_string())
}
