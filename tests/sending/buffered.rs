//! Durable buffer mode: persist in `send`, forward in order in the background.

use std::sync::Arc;
use std::time::Duration;

use durable_bus::broker::{Broker, InMemoryBroker};
use durable_bus::config::{MessagingConfig, SenderMode};
use durable_bus::sender::{BufferedSender, Outbound};
use durable_bus::store::StoreOptions;
use durable_bus::{DurableQueue, MessagingContext, Sender};

use crate::support::{init_tracing, invoice, number_of, PublishEvent, SlowBroker};

fn outbound_queue(dir: &std::path::Path) -> DurableQueue<Outbound> {
    DurableQueue::open(dir, StoreOptions::default().with_lock_timeout(Duration::from_secs(2)))
        .unwrap()
        .with_idle_wait(Duration::from_millis(5))
}

// ============================================================================
// Test 1: One publish finishes before the next begins
// ============================================================================

#[test]
fn publishes_never_overlap_and_keep_send_order() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let broker = SlowBroker::default();
    let sender = BufferedSender::new(
        outbound_queue(dir.path()),
        Arc::new(broker.clone()),
        Default::default(),
    );

    for number in 0..6 {
        sender.send(&invoice(number)).unwrap();
    }
    let stats = sender.shutdown_with_stats(Duration::from_secs(10)).unwrap().unwrap();

    assert_eq!(stats.handled, 6);
    assert_eq!(broker.overlaps.load(std::sync::atomic::Ordering::SeqCst), 0);

    let expected: Vec<PublishEvent> = (0..6)
        .flat_map(|n| [PublishEvent::Started(n), PublishEvent::Finished(n)])
        .collect();
    assert_eq!(*broker.events.lock(), expected);
}

// ============================================================================
// Test 2: Concurrent producers still get one publish at a time
// ============================================================================

#[test]
fn concurrent_producers_publish_one_at_a_time_in_order() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let broker = SlowBroker::default();
    let sender = Arc::new(BufferedSender::new(
        outbound_queue(dir.path()),
        Arc::new(broker.clone()),
        Default::default(),
    ));

    let producers: Vec<_> = (0..4u32)
        .map(|producer| {
            let sender = Arc::clone(&sender);
            std::thread::spawn(move || {
                for seq in 0..5 {
                    sender.send(&invoice(producer * 100 + seq)).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    let stats = sender.shutdown_with_stats(Duration::from_secs(10)).unwrap().unwrap();

    assert_eq!(stats.handled, 20);
    assert_eq!(broker.overlaps.load(std::sync::atomic::Ordering::SeqCst), 0);

    let events = broker.events.lock().clone();
    assert_eq!(events.len(), 40);
    let mut published = Vec::new();
    for pair in events.chunks(2) {
        match pair {
            [PublishEvent::Started(a), PublishEvent::Finished(b)] if a == b => published.push(*a),
            other => panic!("publishes interleaved: {other:?}"),
        }
    }

    for producer in 0..4u32 {
        let own: Vec<u32> = published
            .iter()
            .copied()
            .filter(|n| n / 100 == producer)
            .collect();
        let expected: Vec<u32> = (0..5).map(|seq| producer * 100 + seq).collect();
        assert_eq!(own, expected, "order of producer {producer}");
    }
}

// ============================================================================
// Test 3: Messages buffered during an outage go out after a restart
// ============================================================================

#[test]
fn buffered_messages_survive_restart_during_outage() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let down = InMemoryBroker::new();
    down.fail_next_publishes(usize::MAX);
    {
        let sender = BufferedSender::new(outbound_queue(dir.path()), Arc::new(down.clone()), Default::default());
        sender.send(&invoice(1)).unwrap();
        sender.send_routed(&invoice(2), "ledger").unwrap();
        sender.shutdown(Duration::from_millis(100)).unwrap();
    }
    assert!(down.published().is_empty());

    let up = InMemoryBroker::new();
    let sender = BufferedSender::new(outbound_queue(dir.path()), Arc::new(up.clone()), Default::default());
    sender.shutdown(Duration::from_secs(10)).unwrap();

    let published: Vec<(String, u32)> = up
        .published()
        .iter()
        .map(|(endpoint, envelope)| (endpoint.clone(), number_of(envelope)))
        .collect();
    assert_eq!(
        published,
        vec![("Billing.Invoice".to_string(), 1), ("ledger".to_string(), 2)]
    );
}

// ============================================================================
// Test 4: The context builds a durable sender from configuration
// ============================================================================

#[test]
fn context_builds_durable_sender_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let broker = InMemoryBroker::new();
    broker.create_destination("Billing.Invoice", "ledger").unwrap();

    let config = MessagingConfig::default()
        .with_sender_mode(SenderMode::DurableBuffer)
        .with_local_queue_path(dir.path().join("outbox"))
        .with_idle_wait(Duration::from_millis(5));
    let context = MessagingContext::new();
    let sender = context.sender(&config, Arc::new(broker.clone())).unwrap();

    sender.send(&invoice(9)).unwrap();
    sender.shutdown(Duration::from_secs(10)).unwrap();

    let delivery = broker.try_receive("ledger").unwrap().unwrap();
    assert_eq!(number_of(&delivery.envelope), 9);
}
