//! Direct mode: publish inside `send`, bounded retries.

use std::sync::Arc;

use durable_bus::broker::{Broker, BrokerErrorKind, InMemoryBroker};
use durable_bus::sender::{DirectSender, SendError, Sender, DEFAULT_PUBLISH_ATTEMPTS};
use durable_bus::HookRegistry;

use crate::support::{init_tracing, invoice, number_of};

// ============================================================================
// Test 1: A broker that never accepts gets exactly five attempts
// ============================================================================

#[test]
fn gives_up_after_five_attempts() {
    init_tracing();
    let broker = InMemoryBroker::new();
    broker.fail_next_publishes(100);
    let sender = DirectSender::new(Arc::new(broker.clone()), HookRegistry::new());

    let err = sender.send(&invoice(1)).unwrap_err();

    assert_eq!(DEFAULT_PUBLISH_ATTEMPTS, 5);
    assert_eq!(broker.publish_attempts(), 5);
    match err {
        SendError::Exhausted { attempts, source } => {
            assert_eq!(attempts, 5);
            assert_eq!(source.kind(), BrokerErrorKind::Transport);
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
    assert!(broker.published().is_empty());
}

// ============================================================================
// Test 2: Success on attempt k stops retrying at k
// ============================================================================

#[test]
fn stops_at_first_successful_attempt() {
    for k in 1..=5 {
        let broker = InMemoryBroker::new();
        broker.fail_next_publishes(k - 1);
        let sender = DirectSender::new(Arc::new(broker.clone()), HookRegistry::new());

        sender.send(&invoice(k as u32)).unwrap();

        assert_eq!(broker.publish_attempts(), k, "attempts when succeeding on try {k}");
        assert_eq!(broker.published().len(), 1);
    }
}

// ============================================================================
// Test 3: Routing key picks the endpoint, type name is the default
// ============================================================================

#[test]
fn routing_key_overrides_type_endpoint() {
    let broker = InMemoryBroker::new();
    broker.create_destination("Billing.Invoice", "ledger").unwrap();
    broker.create_destination("Billing.Invoice", "audit").unwrap();
    let sender = DirectSender::new(Arc::new(broker.clone()), HookRegistry::new());

    sender.send(&invoice(1)).unwrap();
    sender.send_routed(&invoice(2), "audit").unwrap();

    let published = broker.published();
    assert_eq!(published[0].0, "Billing.Invoice");
    assert_eq!(published[1].0, "audit");
    assert_eq!(broker.destination_len("ledger"), 1);
    assert_eq!(broker.destination_len("audit"), 2);

    let delivery = broker.try_receive("ledger").unwrap().unwrap();
    assert_eq!(number_of(&delivery.envelope), 1);
}

// ============================================================================
// Test 4: Configured attempt count is honoured
// ============================================================================

#[test]
fn configured_attempts_are_used() {
    let broker = InMemoryBroker::new();
    broker.fail_next_publishes(100);
    let sender = DirectSender::new(Arc::new(broker.clone()), HookRegistry::new()).with_publish_attempts(2);

    assert!(sender.send(&invoice(1)).is_err());
    assert_eq!(broker.publish_attempts(), 2);
}
