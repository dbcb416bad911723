//! Connection registry for the TideLink command router.
//!
//! The registry is the one piece of state shared across all adapter
//! instances and all router replicas: a TTL-based cache of which adapter
//! instance currently handles commands for which device or gateway, plus a
//! last-known-gateway hint per device. It holds facts, not business logic.

pub mod fact;
pub mod memory;
pub mod registry;

// Re-exports
pub use fact::{LastKnownGatewayFact, OwnershipFact};

pub use registry::{ConnectionRegistry, RegistryError, RemoveOutcome};

pub use memory::InMemoryConnectionRegistry;
