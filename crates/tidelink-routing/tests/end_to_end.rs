//! End-to-end routing scenarios: adapter instances registering ownership,
//! backends sending commands, TTL expiry and channel garbage collection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tidelink_core::{
    Command, DeviceTopology, HeartbeatLivenessOracle, InMemoryRegistrationLookup, RoutingError,
};
use tidelink_registry::{ConnectionRegistry, InMemoryConnectionRegistry, RemoveOutcome};
use tidelink_routing::{
    CommandRouter, CommandTargetMapper, DeliveryChannelManager, ReconcilerConfig,
};
use tidelink_transport::{
    AnyTransport, DirectTransport, Transport, TransportKind, TransportSelectionConfig,
    TransportSelector,
};

struct Harness {
    lookup: Arc<InMemoryRegistrationLookup>,
    registry: Arc<InMemoryConnectionRegistry>,
    transport: Arc<AnyTransport>,
    oracle: Arc<HeartbeatLivenessOracle>,
    router: CommandRouter,
}

fn harness() -> Harness {
    let lookup = InMemoryRegistrationLookup::shared();
    let registry = InMemoryConnectionRegistry::shared();
    let transport = Arc::new(AnyTransport::Direct(DirectTransport::default()));
    let oracle = HeartbeatLivenessOracle::shared();
    let selector = TransportSelector::new(
        TransportSelectionConfig {
            default: Some(TransportKind::Direct),
            tenants: HashMap::new(),
        },
        vec![transport.clone()],
    );
    let mapper = CommandTargetMapper::new(lookup.clone(), registry.clone());
    Harness {
        lookup,
        registry,
        transport,
        oracle,
        router: CommandRouter::new(mapper, selector),
    }
}

async fn set_owner(h: &Harness, subject: &str, instance: &str, ttl: Duration) {
    h.registry
        .set_owner(
            &"tenant-x".to_string(),
            &subject.to_string(),
            &instance.to_string(),
            ttl,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn ownership_expires_after_ttl() {
    let h = harness();
    h.lookup.put("tenant-x", DeviceTopology::direct("device1"));

    // Adapter instance A accepts device1's connection.
    set_owner(&h, "device1", "instance-a", Duration::from_millis(100)).await;

    // Immediately resolvable to A.
    let target = h
        .router
        .resolve_target(&Command::new("tenant-x", "device1", "ping"))
        .await
        .unwrap();
    assert_eq!(target.adapter_instance_id, "instance-a");

    // The instance dies without cleanup; one TTL window later the fact is
    // gone without any explicit action.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let err = h
        .router
        .resolve_target(&Command::new("tenant-x", "device1", "ping"))
        .await
        .unwrap_err();
    assert!(matches!(err, RoutingError::NoRoute { .. }));
}

#[tokio::test]
async fn gateway_routed_device_becomes_reachable() {
    let h = harness();
    h.lookup.put(
        "tenant-x",
        DeviceTopology::direct("d1").with_gateways(vec!["g1".to_string()]),
    );

    // Nothing connected yet.
    let err = h
        .router
        .send_command(&Command::new("tenant-x", "d1", "ping"))
        .await
        .unwrap_err();
    assert!(matches!(err, RoutingError::NoRoute { .. }));

    // Gateway g1 connects through instance B.
    set_owner(&h, "g1", "instance-b", Duration::from_secs(60)).await;

    let target = h
        .router
        .send_command(&Command::new("tenant-x", "d1", "ping"))
        .await
        .unwrap();
    assert_eq!(target.adapter_instance_id, "instance-b");
    assert_eq!(target.resolved_gateway_id, Some("g1".to_string()));
}

#[tokio::test]
async fn command_delivered_through_gateway_connection() {
    let h = harness();
    h.lookup.put(
        "tenant-x",
        DeviceTopology::direct("d1").with_gateways(vec!["g1".to_string()]),
    );
    set_owner(&h, "g1", "instance-b", Duration::from_secs(60)).await;

    let AnyTransport::Direct(direct) = h.transport.as_ref() else {
        unreachable!()
    };
    let mut rx = direct
        .attach(&"instance-b".to_string())
        .await
        .unwrap()
        .unwrap();

    let command = Command::new("tenant-x", "d1", "setConfig").with_payload(vec![1, 2, 3]);
    h.router.send_command(&command).await.unwrap();

    let received = rx.recv().await.unwrap();
    assert_eq!(received.device_id, "d1");
    assert_eq!(received.payload, vec![1, 2, 3]);
}

#[tokio::test]
async fn disconnect_race_does_not_clobber_new_owner() {
    let h = harness();
    h.lookup.put("tenant-x", DeviceTopology::direct("d1"));

    // Device reconnects through instance B while instance A's disconnect
    // handling is still in flight.
    set_owner(&h, "d1", "instance-a", Duration::from_secs(60)).await;
    set_owner(&h, "d1", "instance-b", Duration::from_secs(60)).await;

    let outcome = h
        .registry
        .remove_owner(
            &"tenant-x".to_string(),
            &"d1".to_string(),
            &"instance-a".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, RemoveOutcome::NotOwner);

    // Commands still route to the new owner.
    let target = h
        .router
        .resolve_target(&Command::new("tenant-x", "d1", "ping"))
        .await
        .unwrap();
    assert_eq!(target.adapter_instance_id, "instance-b");
}

#[tokio::test]
async fn dead_instance_channel_reaped_only_when_affirmed() {
    let h = harness();
    h.lookup.put("tenant-x", DeviceTopology::direct("d1"));
    set_owner(&h, "d1", "instance-a", Duration::from_secs(60)).await;
    h.oracle.heartbeat("instance-a");

    // First command creates the channel.
    h.router
        .send_command(&Command::new("tenant-x", "d1", "ping"))
        .await
        .unwrap();
    assert_eq!(h.transport.list_channels().await.unwrap().len(), 1);

    let manager = DeliveryChannelManager::new(
        h.transport.clone(),
        h.oracle.clone(),
        ReconcilerConfig::default(),
    );

    // While the instance heartbeats, reconciliation keeps the channel.
    manager.reconcile_now().await.unwrap();
    assert_eq!(h.transport.list_channels().await.unwrap().len(), 1);

    // Once the instance is affirmatively gone, the channel is reaped.
    h.oracle.mark_stopped(&"instance-a".to_string());
    manager.reconcile_now().await.unwrap();
    assert!(h.transport.list_channels().await.unwrap().is_empty());
}
