//! The router facade.
//!
//! Ties the pieces together for one command send: resolve the target
//! adapter instance via the mapper, pick the tenant's transport, make sure
//! the instance's delivery channel exists, and forward the command. The
//! returned result reflects the transport-level acknowledgement.
//!
//! The facade is built by passing in already-constructed collaborators; no
//! runtime wiring container is involved.

use std::sync::Arc;

use tracing::debug;

use tidelink_core::{Command, RoutingError};
use tidelink_transport::{Transport, TransportError, TransportSelector};

use crate::mapper::{CommandTarget, CommandTargetMapper};

/// Routes backend commands to the adapter instances holding the target
/// device connections.
pub struct CommandRouter {
    mapper: CommandTargetMapper,
    selector: TransportSelector,
}

impl CommandRouter {
    /// Create a router from its collaborators.
    pub fn new(mapper: CommandTargetMapper, selector: TransportSelector) -> Self {
        Self { mapper, selector }
    }

    /// Resolve the delivery target for a command without sending it.
    pub async fn resolve_target(&self, command: &Command) -> Result<CommandTarget, RoutingError> {
        self.mapper
            .resolve(&command.tenant_id, &command.device_id)
            .await
    }

    /// Route one command, completing with the transport acknowledgement.
    ///
    /// No internal retries: every error surfaces to the caller with enough
    /// classification to decide whether a retry is worthwhile
    /// ([`RoutingError::is_transient`]).
    pub async fn send_command(&self, command: &Command) -> Result<CommandTarget, RoutingError> {
        let transport = self.selector.select(&command.tenant_id)?;
        let target = self.resolve_target(command).await?;

        // Channels are created reactively: the first command for a
        // previously-unseen instance brings its channel into existence.
        let channel = transport
            .ensure_channel(&target.adapter_instance_id)
            .await
            .map_err(transport_failed)?;

        transport
            .send(&channel, command)
            .await
            .map_err(transport_failed)?;

        debug!(
            command = %command.id,
            tenant = %command.tenant_id,
            device = %command.device_id,
            instance = %target.adapter_instance_id,
            "command forwarded"
        );
        Ok(target)
    }
}

fn transport_failed(err: TransportError) -> RoutingError {
    RoutingError::Transport(err.to_string())
}
