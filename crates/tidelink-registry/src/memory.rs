//! In-memory connection registry.
//!
//! Reference backend for embedding and tests. Deployments that run more
//! than one router replica point this trait at a shared cache service
//! instead; the semantics implemented here (read-time expiry,
//! last-write-wins, owner-checked removal) are the contract either way.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use tidelink_core::{AdapterInstanceId, DeviceId, GatewayId, SubjectId, TenantId};

use crate::fact::{LastKnownGatewayFact, OwnershipFact};
use crate::registry::{ConnectionRegistry, RegistryError, RemoveOutcome};

type SubjectKey = (TenantId, SubjectId);

/// Concurrent-map backed registry.
#[derive(Default)]
pub struct InMemoryConnectionRegistry {
    owners: DashMap<SubjectKey, OwnershipFact>,
    last_known_gateways: DashMap<(TenantId, DeviceId), LastKnownGatewayFact>,
}

impl InMemoryConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry behind an `Arc`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of stored ownership facts, expired ones included.
    pub fn fact_count(&self) -> usize {
        self.owners.len()
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn set_owner(
        &self,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
        adapter_instance_id: &AdapterInstanceId,
        ttl: Duration,
    ) -> Result<(), RegistryError> {
        let fact = OwnershipFact::new(
            tenant_id.clone(),
            subject_id.clone(),
            adapter_instance_id.clone(),
            ttl,
        );
        debug!(
            tenant = %tenant_id,
            subject = %subject_id,
            instance = %adapter_instance_id,
            ttl_secs = ttl.as_secs(),
            "recording ownership fact"
        );
        self.owners
            .insert((tenant_id.clone(), subject_id.clone()), fact);
        Ok(())
    }

    async fn remove_owner(
        &self,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
        adapter_instance_id: &AdapterInstanceId,
    ) -> Result<RemoveOutcome, RegistryError> {
        let key = (tenant_id.clone(), subject_id.clone());
        // remove_if holds the shard lock for the check and removal, so a
        // concurrent set_owner cannot slip between them.
        let removed = self
            .owners
            .remove_if(&key, |_, fact| {
                &fact.adapter_instance_id == adapter_instance_id
            })
            .is_some();

        if removed {
            debug!(tenant = %tenant_id, subject = %subject_id, "ownership fact removed");
            return Ok(RemoveOutcome::Removed);
        }
        match self.owners.get(&key) {
            // A different instance holds a current fact: the caller was
            // superseded.
            Some(fact) if !fact.is_expired() => Ok(RemoveOutcome::NotOwner),
            // No current fact at all; treat as removed (idempotent).
            _ => Ok(RemoveOutcome::Removed),
        }
    }

    async fn get_owners(
        &self,
        tenant_id: &TenantId,
        subject_ids: &HashSet<SubjectId>,
    ) -> Result<HashMap<SubjectId, AdapterInstanceId>, RegistryError> {
        let now = Utc::now();
        let mut owners = HashMap::new();
        for subject_id in subject_ids {
            let key = (tenant_id.clone(), subject_id.clone());
            if let Some(fact) = self.owners.get(&key) {
                if fact.is_expired_at(now) {
                    continue;
                }
                owners.insert(subject_id.clone(), fact.adapter_instance_id.clone());
            }
        }
        Ok(owners)
    }

    async fn set_last_known_gateway(
        &self,
        tenant_id: &TenantId,
        device_id: &DeviceId,
        gateway_id: &GatewayId,
    ) -> Result<(), RegistryError> {
        let fact = LastKnownGatewayFact::new(
            tenant_id.clone(),
            device_id.clone(),
            gateway_id.clone(),
        );
        self.last_known_gateways
            .insert((tenant_id.clone(), device_id.clone()), fact);
        Ok(())
    }

    async fn get_last_known_gateway(
        &self,
        tenant_id: &TenantId,
        device_id: &DeviceId,
    ) -> Result<Option<GatewayId>, RegistryError> {
        Ok(self
            .last_known_gateways
            .get(&(tenant_id.clone(), device_id.clone()))
            .map(|fact| fact.gateway_id.clone()))
    }

    async fn purge_device(
        &self,
        tenant_id: &TenantId,
        device_id: &DeviceId,
    ) -> Result<(), RegistryError> {
        self.owners
            .remove(&(tenant_id.clone(), device_id.clone()));
        self.last_known_gateways
            .remove(&(tenant_id.clone(), device_id.clone()));
        debug!(tenant = %tenant_id, device = %device_id, "purged device facts");
        Ok(())
    }

    async fn purge_tenant(&self, tenant_id: &TenantId) -> Result<(), RegistryError> {
        self.owners.retain(|(tenant, _), _| tenant != tenant_id);
        self.last_known_gateways
            .retain(|(tenant, _), _| tenant != tenant_id);
        debug!(tenant = %tenant_id, "purged tenant facts");
        Ok(())
    }
}
