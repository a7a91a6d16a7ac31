//! Self-healing after the broker loses an endpoint.

use std::sync::Arc;

use durable_bus::broker::{Broker, InMemoryBroker};
use durable_bus::queue::WorkQueue;

use crate::support::{bind, envelope, init_tracing, source};

// ============================================================================
// Test 1: A missing endpoint triggers exactly one rebuild
// ============================================================================

#[test]
fn missing_endpoint_rebuilds_every_bound_type_once() {
    init_tracing();
    let broker = InMemoryBroker::new();
    let source = source(&broker, "billing", Arc::default());
    bind(&broker, &source, &["Orders.Placed", "Orders.Cancelled"]);

    let creations_before = broker.destination_creations();
    assert!(broker.delete_destination("billing"));

    assert!(source.try_dequeue().unwrap().is_empty());

    assert_eq!(broker.cache_invalidations(), 1);
    assert_eq!(broker.destination_creations() - creations_before, 2);
    assert!(broker.has_destination("billing"));
}

// ============================================================================
// Test 2: The poll after a rebuild succeeds
// ============================================================================

#[test]
fn poll_after_rebuild_receives_new_messages() {
    let broker = InMemoryBroker::new();
    let source = source(&broker, "billing", Arc::default());
    bind(&broker, &source, &["Orders.Placed"]);
    broker.delete_destination("billing");

    assert!(source.try_dequeue().unwrap().is_empty());

    broker
        .publish("Orders.Placed", &envelope("Orders.Placed", "{\"id\":1}"))
        .unwrap();
    let pending = source.try_dequeue().unwrap().into_pending().unwrap();
    assert_eq!(pending.item().envelope.payload(), "{\"id\":1}");
    pending.commit().unwrap();

    assert_eq!(broker.cache_invalidations(), 1);
    assert_eq!(broker.acknowledged().len(), 1);
}

// ============================================================================
// Test 3: Ordinary receive failures never rebuild
// ============================================================================

#[test]
fn transport_failures_do_not_rebuild() {
    let broker = InMemoryBroker::new();
    let source = source(&broker, "billing", Arc::default());
    bind(&broker, &source, &["Orders.Placed"]);
    let creations_before = broker.destination_creations();

    broker.fail_next_receives(3);
    for _ in 0..3 {
        assert!(source.try_dequeue().unwrap().is_empty());
    }

    assert_eq!(broker.cache_invalidations(), 0);
    assert_eq!(broker.destination_creations(), creations_before);
}

// ============================================================================
// Test 4: Types bound later are part of the next rebuild
// ============================================================================

#[test]
fn rebuild_includes_types_added_after_start() {
    let broker = InMemoryBroker::new();
    let source = source(&broker, "audit", Arc::default());
    bind(&broker, &source, &["A"]);
    assert!(source.try_dequeue().unwrap().is_empty());

    bind(&broker, &source, &["B", "C"]);
    broker.delete_destination("audit");
    let creations_before = broker.destination_creations();

    assert!(source.try_dequeue().unwrap().is_empty());
    assert_eq!(broker.destination_creations() - creations_before, 3);
}
