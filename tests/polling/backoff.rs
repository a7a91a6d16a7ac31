//! Poll pacing.

use std::sync::Arc;
use std::time::Duration;

use durable_bus::broker::{Broker, InMemoryBroker};
use durable_bus::queue::WorkQueue;

use crate::support::{bind, envelope, source, RecordingSleeper};

// ============================================================================
// Test 1: Idle polls double the wait up to the cap
// ============================================================================

#[test]
fn idle_polls_grow_delay_up_to_max() {
    let broker = InMemoryBroker::new();
    let sleeper = Arc::new(RecordingSleeper::default());
    let source = source(&broker, "inbox", Arc::clone(&sleeper));
    bind(&broker, &source, &["Mail.Letter"]);

    for _ in 0..5 {
        assert!(!source.ready());
    }

    let ms: Vec<u64> = sleeper
        .delays
        .lock()
        .iter()
        .map(|delay| delay.as_millis() as u64)
        .collect();
    assert_eq!(ms, vec![20, 40, 80, 100, 100]);
}

// ============================================================================
// Test 2: A delivery resets the wait to the minimum
// ============================================================================

#[test]
fn delivery_resets_delay() {
    let broker = InMemoryBroker::new();
    let sleeper = Arc::new(RecordingSleeper::default());
    let source = source(&broker, "inbox", Arc::clone(&sleeper));
    bind(&broker, &source, &["Mail.Letter"]);

    assert!(!source.ready());
    assert!(!source.ready());
    broker.publish("Mail.Letter", &envelope("Mail.Letter", "1")).unwrap();
    assert!(source.ready());

    assert_eq!(source.backoff().delay(), Duration::from_millis(10));
    assert_eq!(sleeper.delays.lock().len(), 2);
}

// ============================================================================
// Test 3: Failed handlers slow the source down
// ============================================================================

#[test]
fn handler_failure_sleeps_more() {
    let broker = InMemoryBroker::new();
    let sleeper = Arc::new(RecordingSleeper::default());
    let source = source(&broker, "inbox", Arc::clone(&sleeper));

    source.on_handler_failed();
    source.on_handler_failed();

    assert_eq!(
        *sleeper.delays.lock(),
        vec![Duration::from_millis(20), Duration::from_millis(40)]
    );
}
