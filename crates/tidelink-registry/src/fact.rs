//! Registry fact types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tidelink_core::{AdapterInstanceId, DeviceId, GatewayId, SubjectId, TenantId};

/// Assertion that one adapter instance currently handles commands for one
/// subject (device or gateway).
///
/// Facts are never mutated in place; a newer write for the same
/// (tenant, subject) key replaces the older fact. Expiry is evaluated at
/// read time, so a fact past its TTL behaves as absent even before it is
/// physically purged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnershipFact {
    /// Owning tenant
    pub tenant_id: TenantId,
    /// The device or gateway the fact is about
    pub subject_id: SubjectId,
    /// Adapter instance holding the subject's connection
    pub adapter_instance_id: AdapterInstanceId,
    /// When the fact was recorded
    pub recorded_at: DateTime<Utc>,
    /// Lifetime; chosen by the writing instance to roughly match its own
    /// session-renewal interval
    pub ttl: Duration,
}

impl OwnershipFact {
    /// Record a fact as of now.
    pub fn new(
        tenant_id: impl Into<TenantId>,
        subject_id: impl Into<SubjectId>,
        adapter_instance_id: impl Into<AdapterInstanceId>,
        ttl: Duration,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            subject_id: subject_id.into(),
            adapter_instance_id: adapter_instance_id.into(),
            recorded_at: Utc::now(),
            ttl,
        }
    }

    /// Whether the fact has outlived its TTL as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let Ok(ttl) = chrono::Duration::from_std(self.ttl) else {
            return false;
        };
        self.recorded_at + ttl < now
    }

    /// Whether the fact has outlived its TTL.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether `other` supersedes this fact (last-write-wins by
    /// `recorded_at`).
    pub fn superseded_by(&self, other: &OwnershipFact) -> bool {
        other.recorded_at >= self.recorded_at
    }
}

/// Which gateway most recently relayed traffic for a gateway-routed device.
///
/// A disambiguation hint only; never the sole source of truth for routing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastKnownGatewayFact {
    /// Owning tenant
    pub tenant_id: TenantId,
    /// The routed device
    pub device_id: DeviceId,
    /// Gateway that last relayed for the device
    pub gateway_id: GatewayId,
    /// When the relay was observed
    pub recorded_at: DateTime<Utc>,
}

impl LastKnownGatewayFact {
    /// Record an observation as of now.
    pub fn new(
        tenant_id: impl Into<TenantId>,
        device_id: impl Into<DeviceId>,
        gateway_id: impl Into<GatewayId>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            device_id: device_id.into(),
            gateway_id: gateway_id.into(),
            recorded_at: Utc::now(),
        }
    }
}
