//! Test messages and helpers shared by the durable queue tests.

#![allow(dead_code)]

use std::path::Path;
use std::time::Duration;

use durable_bus::queue::{DurableQueue, WorkItem, WorkQueue};
use durable_bus::store::StoreOptions;
use durable_bus::{Envelope, Message};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub correlation_id: Uuid,
    pub seq: u32,
}

impl Message for Job {
    const TYPE_NAME: &'static str = "Jobs.Job";

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

pub fn job(seq: u32) -> Job {
    Job {
        correlation_id: Uuid::new_v4(),
        seq,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn open(dir: &Path) -> DurableQueue {
    DurableQueue::open(dir, StoreOptions::default().with_lock_timeout(Duration::from_secs(2)))
        .unwrap()
        .with_idle_wait(Duration::from_millis(10))
}

pub fn seq_of(envelope: &Envelope) -> u32 {
    envelope.decode_as::<Job>().unwrap().seq
}

/// Dequeue and commit everything, returning the sequence numbers in order.
pub fn drain(queue: &DurableQueue) -> Vec<u32> {
    let mut seen = Vec::new();
    while let WorkItem::Ready(pending) = queue.try_dequeue().unwrap() {
        seen.push(seq_of(pending.item()));
        pending.commit().unwrap();
    }
    seen
}
