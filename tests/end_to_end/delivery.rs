//! Messages flow from a buffered sender to receiver handlers.

use std::sync::mpsc;
use std::time::Duration;

use crate::support::{cancelled, config, init_tracing, placed, Bus, OrderCancelled, OrderPlaced, ORDER_CONTRACT};

// ============================================================================
// Test 1: Sent orders reach the handler and both hooks fire
// ============================================================================

#[test]
fn sent_orders_reach_handler_and_hooks() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let bus = Bus::new();
    let config = config(dir.path());

    let receiver = bus.context.receiver(&config, bus.broker(), "billing");
    let (tx, rx) = mpsc::channel();
    receiver
        .handle::<OrderPlaced, _>(move |order| {
            tx.send(order.clone()).unwrap();
            Ok(())
        })
        .unwrap();
    receiver.start();

    let sender = bus.context.sender(&config, bus.broker()).unwrap();
    let sent: Vec<OrderPlaced> = (1..=3).map(placed).collect();
    for order in &sent {
        sender.send(order).unwrap();
    }

    let mut got: Vec<OrderPlaced> = (0..3)
        .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
        .collect();
    got.sort_by_key(|order| order.order_id);

    sender.shutdown(Duration::from_secs(5)).unwrap();
    let stats = receiver.stop();

    assert_eq!(got, sent);
    assert_eq!(stats.handled, 3);
    assert_eq!(bus.hook.sent.lock().len(), 3);

    let received = bus.hook.received.lock();
    assert_eq!(received.len(), 3);
    assert!(received.iter().all(|(_, endpoint)| endpoint == "billing"));
    assert_eq!(bus.broker.acknowledged().len(), 3);
}

// ============================================================================
// Test 2: A contract handler sees every message that implements it
// ============================================================================

#[test]
fn contract_handler_receives_every_implementing_type() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Bus::new();
    let config = config(dir.path());
    bus.context.types().register::<OrderPlaced>();
    bus.context.types().register::<OrderCancelled>();

    let receiver = bus.context.receiver(&config, bus.broker(), "audit");
    let (tx, rx) = mpsc::channel();
    receiver
        .handle_contract(ORDER_CONTRACT, move |message| {
            tx.send(message.type_name()).unwrap();
            Ok(())
        })
        .unwrap();
    receiver.start();

    let sender = bus.context.sender(&config, bus.broker()).unwrap();
    sender.send(&placed(1)).unwrap();
    sender.send(&cancelled(1)).unwrap();

    let mut got: Vec<&str> = (0..2)
        .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
        .collect();
    got.sort();
    sender.shutdown(Duration::from_secs(5)).unwrap();
    receiver.stop();

    assert_eq!(got, vec!["Orders.OrderCancelled", "Orders.OrderPlaced"]);
}

// ============================================================================
// Test 3: Routed messages skip the type's default bindings
// ============================================================================

#[test]
fn routed_send_reaches_only_the_named_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let bus = Bus::new();
    let config = config(dir.path());

    let billing = bus.context.receiver(&config, bus.broker(), "billing");
    let (billing_tx, billing_rx) = mpsc::channel();
    billing
        .handle::<OrderPlaced, _>(move |order| {
            billing_tx.send(order.order_id).unwrap();
            Ok(())
        })
        .unwrap();

    let vip = bus.context.receiver(&config, bus.broker(), "vip");
    let (vip_tx, vip_rx) = mpsc::channel();
    vip.handle::<OrderPlaced, _>(move |order| {
        vip_tx.send(order.order_id).unwrap();
        Ok(())
    })
    .unwrap();

    billing.start();
    vip.start();

    let sender = bus.context.sender(&config, bus.broker()).unwrap();
    sender.send_routed(&placed(42), "vip").unwrap();

    assert_eq!(vip_rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
    assert!(billing_rx.recv_timeout(Duration::from_millis(200)).is_err());

    sender.shutdown(Duration::from_secs(5)).unwrap();
    billing.stop();
    vip.stop();
}
