//! The connection registry contract.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;

use tidelink_core::{AdapterInstanceId, DeviceId, GatewayId, SubjectId, TenantId};

/// Errors from registry operations.
///
/// The registry never retries internally and reports benign races as
/// [`RemoveOutcome`] values rather than errors.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry backend cannot be reached. Transient; callers retry
    /// with backoff.
    #[error("connection registry unavailable: {0}")]
    Unavailable(String),
}

/// Result of an owner removal attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The caller's fact was removed (or had already expired away).
    Removed,
    /// A different adapter instance has taken over since; nothing was
    /// removed. A disconnect race, not an error.
    NotOwner,
}

/// Shared cache of ownership and last-known-gateway facts.
///
/// Per-key atomicity is the only consistency guarantee: each `set_owner` /
/// `remove_owner` for one (tenant, subject) key is atomic, writes are
/// last-write-wins, and there are no cross-key transactions. Expiry is
/// evaluated at read time; a fact past its TTL is treated as absent even if
/// not yet purged.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Record that `adapter_instance_id` now handles commands for
    /// `subject_id`. Idempotent upsert.
    async fn set_owner(
        &self,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
        adapter_instance_id: &AdapterInstanceId,
        ttl: Duration,
    ) -> Result<(), RegistryError>;

    /// Remove the ownership fact for `subject_id`, but only if
    /// `adapter_instance_id` still matches the recorded owner. A late
    /// disconnect from a superseded instance must not erase a newer owner.
    async fn remove_owner(
        &self,
        tenant_id: &TenantId,
        subject_id: &SubjectId,
        adapter_instance_id: &AdapterInstanceId,
    ) -> Result<RemoveOutcome, RegistryError>;

    /// Batched owner lookup. Subjects with no current (unexpired) fact are
    /// simply absent from the result; that is not an error.
    async fn get_owners(
        &self,
        tenant_id: &TenantId,
        subject_ids: &HashSet<SubjectId>,
    ) -> Result<HashMap<SubjectId, AdapterInstanceId>, RegistryError>;

    /// Record which gateway most recently relayed traffic for `device_id`.
    async fn set_last_known_gateway(
        &self,
        tenant_id: &TenantId,
        device_id: &DeviceId,
        gateway_id: &GatewayId,
    ) -> Result<(), RegistryError>;

    /// The gateway that most recently relayed for `device_id`, if any.
    async fn get_last_known_gateway(
        &self,
        tenant_id: &TenantId,
        device_id: &DeviceId,
    ) -> Result<Option<GatewayId>, RegistryError>;

    /// Drop all facts about one device, independent of TTL. Used when the
    /// device is deleted from the registry.
    async fn purge_device(
        &self,
        tenant_id: &TenantId,
        device_id: &DeviceId,
    ) -> Result<(), RegistryError>;

    /// Drop all facts for a tenant, independent of TTL. Used when the
    /// tenant is deleted or all of its devices are.
    async fn purge_tenant(&self, tenant_id: &TenantId) -> Result<(), RegistryError>;
}
