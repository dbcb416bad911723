//! Core types and contracts for the TideLink command router.
//!
//! Provides:
//! - Identifier aliases and the command envelope
//! - The routing error taxonomy
//! - The Registration Lookup contract (device topology)
//! - The Liveness Oracle contract (adapter instance status)
//!
//! Protocol adapters and backend applications never depend on each other
//! directly; they meet at the contracts defined here.

pub mod command;
pub mod error;
pub mod liveness;
pub mod topology;

// Re-exports
pub use command::{AdapterInstanceId, Command, DeviceId, GatewayId, SubjectId, TenantId};

pub use error::RoutingError;

pub use liveness::{HeartbeatLivenessOracle, HeartbeatOracleConfig, LivenessOracle, LivenessStatus};

pub use topology::{
    DeviceTopology, GatewayGroup, InMemoryRegistrationLookup, RegistrationLookup,
};
