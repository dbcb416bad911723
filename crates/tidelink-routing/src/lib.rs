//! Routing logic for the TideLink command router.
//!
//! Provides:
//! - The command target mapper (device -> owning adapter instance)
//! - The delivery channel manager with its reconciliation loop
//! - Lifecycle notification handling (prompt fact invalidation)
//! - The router facade tying mapper, registry and transports together

pub mod mapper;
pub mod notifications;
pub mod reconciler;
pub mod router;

// Re-exports
pub use mapper::{CommandTarget, CommandTargetMapper};

pub use reconciler::{DeliveryChannelManager, ReconcilerConfig};

pub use notifications::{LifecycleNotification, NotificationHandler};

pub use router::CommandRouter;
