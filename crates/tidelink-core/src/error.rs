//! Routing error taxonomy.

use serde::{Deserialize, Serialize};

/// Errors surfaced to the sender of a command.
///
/// The router never retries internally; retry policy belongs to the caller.
/// `DeviceUnknown` and `NoRoute` are terminal for the attempt, `Unavailable`
/// and `Transport` are transient and worth retrying with backoff.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum RoutingError {
    /// The device does not exist, or its tenant is disabled. Not retryable.
    #[error("unknown device [{device_id}] for tenant [{tenant_id}]")]
    DeviceUnknown {
        /// Tenant the lookup was scoped to
        tenant_id: String,
        /// Device that could not be found
        device_id: String,
    },

    /// No adapter instance currently owns the device or any of its gateways.
    /// The command is undeliverable right now; the caller may retry once the
    /// device reconnects.
    #[error("no adapter instance currently handles commands for device [{device_id}]")]
    NoRoute {
        /// Device that could not be routed
        device_id: String,
    },

    /// A backing service (connection registry, registration lookup) could not
    /// be reached. Transient; retry with backoff.
    #[error("backing service unavailable: {0}")]
    Unavailable(String),

    /// The selected transport rejected or failed the send.
    #[error("transport send failed: {0}")]
    Transport(String),

    /// No transport is configured for the tenant.
    #[error("no transport configured for tenant [{tenant_id}]")]
    TransportDisabled {
        /// Tenant without a usable transport
        tenant_id: String,
    },
}

impl RoutingError {
    /// Whether a retry of the same send can reasonably succeed without any
    /// external state change.
    pub fn is_transient(&self) -> bool {
        matches!(self, RoutingError::Unavailable(_) | RoutingError::Transport(_))
    }
}
