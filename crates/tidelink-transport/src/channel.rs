//! Delivery channel naming.
//!
//! Every adapter instance owns exactly one delivery channel, named as
//! `<prefix>.<adapterInstanceId>`. Reconciliation relies on recovering the
//! instance identifier purely from the channel name, so the format must not
//! change between router versions running side by side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tidelink_core::AdapterInstanceId;

/// Default channel name prefix.
pub const DEFAULT_CHANNEL_PREFIX: &str = "command_internal";

/// One adapter instance's delivery channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryChannel {
    /// The instance the channel delivers to
    pub adapter_instance_id: AdapterInstanceId,
    /// Transport-level channel name
    pub channel_name: String,
    /// When the channel was created
    pub created_at: DateTime<Utc>,
}

impl DeliveryChannel {
    /// Describe the channel for `instance_id` under `prefix`.
    pub fn for_instance(prefix: &str, instance_id: impl Into<AdapterInstanceId>) -> Self {
        let adapter_instance_id = instance_id.into();
        Self {
            channel_name: channel_name(prefix, &adapter_instance_id),
            adapter_instance_id,
            created_at: Utc::now(),
        }
    }
}

/// Build the delivery channel name for one adapter instance.
pub fn channel_name(prefix: &str, instance_id: &str) -> String {
    format!("{}.{}", prefix, instance_id)
}

/// Recover the adapter instance identifier from a channel name.
///
/// Returns `None` for names that do not carry the given prefix; the
/// reconciler uses this to skip foreign channels instead of deleting them.
pub fn instance_id_from_name<'a>(prefix: &str, name: &'a str) -> Option<&'a str> {
    let rest = name.strip_prefix(prefix)?.strip_prefix('.')?;
    if rest.is_empty() {
        return None;
    }
    Some(rest)
}
