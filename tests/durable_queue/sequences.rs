//! Random enqueue/dequeue/commit/abort sequences checked against a model.

use std::collections::VecDeque;

use durable_bus::queue::{DurableQueue, Pending, WorkItem, WorkQueue};
use durable_bus::store::MemoryStore;
use durable_bus::Envelope;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Enqueue,
    Dequeue,
    Commit,
    Abort,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Enqueue),
        3 => Just(Op::Dequeue),
        2 => Just(Op::Commit),
        1 => Just(Op::Abort),
    ]
}

fn envelope(n: u32) -> Envelope {
    Envelope::parse(&format!("V2=Jobs.Raw||{}", n)).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn queue_matches_fifo_model(ops in prop::collection::vec(op(), 1..60)) {
        let queue: DurableQueue<Envelope, MemoryStore> = DurableQueue::new(MemoryStore::new());
        let mut model: VecDeque<u32> = VecDeque::new();
        let mut outstanding: Option<Pending<Envelope>> = None;
        let mut next = 0u32;

        for op in ops {
            match op {
                Op::Enqueue => {
                    queue.enqueue_record(&envelope(next)).unwrap();
                    model.push_back(next);
                    next += 1;
                }
                Op::Dequeue => match queue.try_dequeue().unwrap() {
                    WorkItem::Ready(pending) => {
                        prop_assert!(outstanding.is_none(), "two items handed out");
                        prop_assert_eq!(Some(pending.item().clone()), model.front().map(|n| envelope(*n)));
                        outstanding = Some(pending);
                    }
                    WorkItem::Empty => {
                        prop_assert!(outstanding.is_some() || model.is_empty());
                    }
                },
                Op::Commit => {
                    if let Some(pending) = outstanding.take() {
                        pending.commit().unwrap();
                        model.pop_front();
                    }
                }
                Op::Abort => {
                    if let Some(pending) = outstanding.take() {
                        pending.abort();
                    }
                }
            }
            prop_assert_eq!(queue.len(), model.len());
        }
    }
}
