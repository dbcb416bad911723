//! Adapter instance liveness.
//!
//! The liveness oracle abstracts over whatever cluster-membership source a
//! deployment has (orchestrator pod listing, heartbeat table, ...). It has
//! exactly three answers; "unknown" is never the same as "not alive", and
//! consumers must not collapse the two.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::command::AdapterInstanceId;

/// Answer of a liveness query for one adapter instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LivenessStatus {
    /// The instance is part of the running cluster.
    Alive,
    /// The instance is affirmatively known to be gone.
    NotAlive,
    /// The membership source is unreachable or has no record of the
    /// instance. Callers must treat this conservatively.
    Unknown,
}

/// Authority on whether an adapter instance is still running.
#[async_trait]
pub trait LivenessOracle: Send + Sync {
    /// Report the current status of `instance_id`.
    async fn is_alive(&self, instance_id: &AdapterInstanceId) -> LivenessStatus;
}

/// Configuration for [`HeartbeatLivenessOracle`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatOracleConfig {
    /// How recent a heartbeat must be for an instance to count as alive
    pub alive_window_secs: u64,
    /// Extra slack after the alive window before an instance is declared
    /// not alive; in between, the answer is Unknown
    pub grace_secs: u64,
}

impl Default for HeartbeatOracleConfig {
    fn default() -> Self {
        Self {
            alive_window_secs: 30,
            grace_secs: 30,
        }
    }
}

/// Heartbeat-table liveness oracle.
///
/// Adapter instances report heartbeats; queries compare the last heartbeat
/// against the configured window. An instance never seen at all is Unknown,
/// not NotAlive: the table may simply be behind.
pub struct HeartbeatLivenessOracle {
    config: HeartbeatOracleConfig,
    heartbeats: DashMap<AdapterInstanceId, DateTime<Utc>>,
}

impl HeartbeatLivenessOracle {
    /// Create an oracle with the given config.
    pub fn new(config: HeartbeatOracleConfig) -> Self {
        Self {
            config,
            heartbeats: DashMap::new(),
        }
    }

    /// Create an oracle with default config behind an `Arc`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new(HeartbeatOracleConfig::default()))
    }

    /// Record a heartbeat for an instance.
    pub fn heartbeat(&self, instance_id: impl Into<AdapterInstanceId>) {
        self.heartbeats.insert(instance_id.into(), Utc::now());
    }

    /// Record an instance's clean shutdown; subsequent queries answer
    /// NotAlive immediately rather than after the grace period.
    pub fn mark_stopped(&self, instance_id: &AdapterInstanceId) {
        // Backdating past window + grace makes the normal query path answer
        // NotAlive without a separate tombstone state.
        let expired = Utc::now()
            - chrono::Duration::seconds(
                (self.config.alive_window_secs + self.config.grace_secs) as i64 + 1,
            );
        self.heartbeats.insert(instance_id.clone(), expired);
    }

    fn status_at(&self, instance_id: &AdapterInstanceId, now: DateTime<Utc>) -> LivenessStatus {
        let Some(last) = self.heartbeats.get(instance_id).map(|e| *e.value()) else {
            return LivenessStatus::Unknown;
        };
        let age = now.signed_duration_since(last);
        let window = chrono::Duration::seconds(self.config.alive_window_secs as i64);
        let grace = chrono::Duration::seconds(self.config.grace_secs as i64);

        if age <= window {
            LivenessStatus::Alive
        } else if age <= window + grace {
            LivenessStatus::Unknown
        } else {
            LivenessStatus::NotAlive
        }
    }
}

#[async_trait]
impl LivenessOracle for HeartbeatLivenessOracle {
    async fn is_alive(&self, instance_id: &AdapterInstanceId) -> LivenessStatus {
        self.status_at(instance_id, Utc::now())
    }
}
