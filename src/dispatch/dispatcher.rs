//! Worker pool draining a [`WorkQueue`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::error::HandlerError;
use crate::queue::{WorkItem, WorkQueue};

/// Pause after a dequeue error so a broken store is not hammered.
const ERROR_PAUSE: Duration = Duration::from_millis(10);
const DRAIN_CHECK: Duration = Duration::from_millis(5);

type Handler<T> = dyn Fn(&T) -> Result<(), HandlerError> + Send + Sync;

/// Statistics from a dispatcher's workers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchStats {
    pub handled: usize,
    pub failed: usize,
    pub polls: usize,
    pub commit_errors: usize,
    pub dequeue_errors: usize,
    /// Items still queued when a drain gave up.
    pub left_behind: usize,
}

impl DispatchStats {
    fn merge(&mut self, other: DispatchStats) {
        self.handled += other.handled;
        self.failed += other.failed;
        self.polls += other.polls;
        self.commit_errors += other.commit_errors;
        self.dequeue_errors += other.dequeue_errors;
    }
}

/// Runs a handler over every item of a queue on `max_in_flight` threads.
///
/// ## Example
///
/// ```ignore
/// let handle = Dispatcher::new(queue.clone(), |envelope: &Envelope| {
///     broker.publish(envelope.type_name(), envelope)?;
///     Ok(())
/// })
/// .with_max_in_flight(1)
/// .start();
///
/// // ... enqueue work ...
///
/// let stats = handle.drain_and_stop(Duration::from_secs(5));
/// println!("handled {} items", stats.handled);
/// ```
pub struct Dispatcher<Q: WorkQueue> {
    queue: Arc<Q>,
    handler: Arc<Handler<Q::Item>>,
    max_in_flight: usize,
    name: String,
}

impl<Q: WorkQueue + 'static> Dispatcher<Q> {
    pub fn new<F>(queue: Arc<Q>, handler: F) -> Self
    where
        F: Fn(&Q::Item) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        Self {
            queue,
            handler: Arc::new(handler),
            max_in_flight: 1,
            name: "dispatcher".to_string(),
        }
    }

    /// Number of worker threads, at least one.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Thread name prefix, also used in log fields.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn start(self) -> DispatcherHandle<Q> {
        let stop = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(self.max_in_flight);

        for index in 0..self.max_in_flight {
            let worker = Worker {
                queue: Arc::clone(&self.queue),
                handler: Arc::clone(&self.handler),
                stop: Arc::clone(&stop),
                name: self.name.clone(),
            };
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", self.name, index))
                .spawn(move || worker.run());
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => error!(dispatcher = %self.name, error = %err, "failed to spawn worker"),
            }
        }

        info!(dispatcher = %self.name, workers = workers.len(), "dispatcher started");
        DispatcherHandle {
            queue: self.queue,
            stop,
            workers,
            name: self.name,
        }
    }
}

struct Worker<Q: WorkQueue> {
    queue: Arc<Q>,
    handler: Arc<Handler<Q::Item>>,
    stop: Arc<AtomicBool>,
    name: String,
}

impl<Q: WorkQueue> Worker<Q> {
    fn run(self) -> DispatchStats {
        let mut stats = DispatchStats::default();

        while !self.stop.load(Ordering::Acquire) {
            stats.polls += 1;

            match self.queue.try_dequeue() {
                Ok(WorkItem::Ready(pending)) => {
                    let outcome = catch_unwind(AssertUnwindSafe(|| (self.handler)(pending.item())));
                    match outcome {
                        Ok(Ok(())) => match pending.commit() {
                            Ok(()) => {
                                stats.handled += 1;
                                self.queue.on_handler_succeeded();
                            }
                            Err(err) => {
                                stats.commit_errors += 1;
                                warn!(dispatcher = %self.name, error = %err, "commit failed");
                            }
                        },
                        Ok(Err(err)) => {
                            warn!(dispatcher = %self.name, error = %err, "handler failed, item requeued");
                            pending.abort();
                            stats.failed += 1;
                            self.queue.on_handler_failed();
                        }
                        Err(_) => {
                            error!(dispatcher = %self.name, "handler panicked, item requeued");
                            pending.abort();
                            stats.failed += 1;
                            self.queue.on_handler_failed();
                        }
                    }
                }
                Ok(WorkItem::Empty) => {
                    if !self.stop.load(Ordering::Acquire) {
                        self.queue.ready();
                    }
                }
                Err(err) => {
                    stats.dequeue_errors += 1;
                    warn!(dispatcher = %self.name, error = %err, "dequeue failed");
                    self.queue.on_handler_failed();
                    thread::sleep(ERROR_PAUSE);
                }
            }
        }

        debug!(dispatcher = %self.name, ?stats, "worker stopped");
        stats
    }
}

/// Running dispatcher. Stop it to collect statistics; dropping it only
/// signals the workers.
pub struct DispatcherHandle<Q: WorkQueue> {
    queue: Arc<Q>,
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<DispatchStats>>,
    name: String,
}

impl<Q: WorkQueue> DispatcherHandle<Q> {
    pub fn queue(&self) -> &Arc<Q> {
        &self.queue
    }

    /// Signal the workers to stop without waiting.
    pub fn signal_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Stop issuing dequeues and wait for in-flight items to finish.
    pub fn stop(mut self) -> DispatchStats {
        self.signal_stop();
        let mut total = DispatchStats::default();
        for worker in self.workers.drain(..) {
            match worker.join() {
                Ok(stats) => total.merge(stats),
                Err(_) => error!(dispatcher = %self.name, "worker thread panicked"),
            }
        }
        info!(dispatcher = %self.name, handled = total.handled, failed = total.failed, "dispatcher stopped");
        total
    }

    /// Wait up to `timeout` for the queue to empty, then stop.
    pub fn drain_and_stop(self, timeout: Duration) -> DispatchStats {
        let deadline = Instant::now() + timeout;
        while !self.queue.is_empty() && Instant::now() < deadline {
            thread::sleep(DRAIN_CHECK);
        }
        let queue = Arc::clone(&self.queue);
        let mut stats = self.stop();
        stats.left_behind = queue.len();
        if stats.left_behind > 0 {
            warn!(left_behind = stats.left_behind, "stopped before the queue drained");
        }
        stats
    }
}

impl<Q: WorkQueue> Drop for DispatcherHandle<Q> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }
}
