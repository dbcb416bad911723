//! Per-tenant transport selection.
//!
//! The choice of transport is static configuration: resolved once when the
//! router is built, never renegotiated per command. A tenant with neither
//! an explicit entry nor a configured default has no usable transport.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use tidelink_core::{RoutingError, TenantId};

use crate::AnyTransport;

/// Transport backend kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Kafka-backed delivery
    Kafka,
    /// Direct in-process messaging
    Direct,
}

impl TransportKind {
    /// Get the kind name.
    pub fn type_name(&self) -> &'static str {
        match self {
            TransportKind::Kafka => "kafka",
            TransportKind::Direct => "direct",
        }
    }
}

/// Which transport each tenant uses.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransportSelectionConfig {
    /// Fallback for tenants without an explicit entry; `None` means such
    /// tenants have no transport
    #[serde(default)]
    pub default: Option<TransportKind>,
    /// Explicit per-tenant choices
    #[serde(default)]
    pub tenants: HashMap<TenantId, TransportKind>,
}

/// Resolves a tenant to one of the constructed transport backends.
pub struct TransportSelector {
    config: TransportSelectionConfig,
    transports: HashMap<TransportKind, Arc<AnyTransport>>,
}

impl TransportSelector {
    /// Create a selector over the constructed backends.
    pub fn new(
        config: TransportSelectionConfig,
        transports: Vec<Arc<AnyTransport>>,
    ) -> Self {
        let transports = transports.into_iter().map(|t| (t.kind(), t)).collect();
        Self { config, transports }
    }

    /// The transport configured for `tenant_id`.
    ///
    /// Fails with [`RoutingError::TransportDisabled`] if the tenant has no
    /// configured kind, or its kind has no constructed backend.
    pub fn select(&self, tenant_id: &TenantId) -> Result<Arc<AnyTransport>, RoutingError> {
        let kind = self
            .config
            .tenants
            .get(tenant_id)
            .copied()
            .or(self.config.default)
            .ok_or_else(|| RoutingError::TransportDisabled {
                tenant_id: tenant_id.clone(),
            })?;
        self.transports
            .get(&kind)
            .cloned()
            .ok_or_else(|| RoutingError::TransportDisabled {
                tenant_id: tenant_id.clone(),
            })
    }

    /// All constructed backends.
    pub fn transports(&self) -> impl Iterator<Item = &Arc<AnyTransport>> {
        self.transports.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direct::DirectTransport;

    fn direct() -> Arc<AnyTransport> {
        Arc::new(AnyTransport::Direct(DirectTransport::default()))
    }

    #[test]
    fn test_explicit_tenant_choice() {
        let config = TransportSelectionConfig {
            default: None,
            tenants: [("t1".to_string(), TransportKind::Direct)].into(),
        };
        let selector = TransportSelector::new(config, vec![direct()]);

        let transport = selector.select(&"t1".to_string()).unwrap();
        assert_eq!(transport.kind(), TransportKind::Direct);
    }

    #[test]
    fn test_default_fallback() {
        let config = TransportSelectionConfig {
            default: Some(TransportKind::Direct),
            tenants: HashMap::new(),
        };
        let selector = TransportSelector::new(config, vec![direct()]);

        assert!(selector.select(&"anyone".to_string()).is_ok());
    }

    #[test]
    fn test_unconfigured_tenant_is_disabled() {
        let selector = TransportSelector::new(TransportSelectionConfig::default(), vec![direct()]);

        let err = selector.select(&"t1".to_string()).unwrap_err();
        assert!(matches!(err, RoutingError::TransportDisabled { .. }));
    }

    #[test]
    fn test_missing_backend_is_disabled() {
        // Tenant points at Kafka, but only the direct backend was built.
        let config = TransportSelectionConfig {
            default: None,
            tenants: [("t1".to_string(), TransportKind::Kafka)].into(),
        };
        let selector = TransportSelector::new(config, vec![direct()]);

        let err = selector.select(&"t1".to_string()).unwrap_err();
        assert!(matches!(err, RoutingError::TransportDisabled { .. }));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(TransportKind::Kafka.type_name(), "kafka");
        assert_eq!(TransportKind::Direct.type_name(), "direct");
    }

    #[test]
    fn test_config_deserializes() {
        let config: TransportSelectionConfig = serde_json::from_str(
            r#"{"default":"kafka","tenants":{"t1":"direct"}}"#,
        )
        .unwrap();
        assert_eq!(config.default, Some(TransportKind::Kafka));
        assert_eq!(config.tenants.get("t1"), Some(&TransportKind::Direct));
    }
}
