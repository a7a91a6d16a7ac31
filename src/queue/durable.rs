//! Durable local queue over a [`DurableStore`].
//!
//! Dequeue is a tentative read of the oldest record; only `commit` removes it
//! from disk. A crash between the two leaves the record in place, which is the
//! same outcome as an abort.
//!
//! A record that no longer decodes is moved to the dead letter store, when one
//! is attached, so it cannot block the records queued behind it.

use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, warn};

use super::error::QueueError;
use super::single_flight::SingleFlight;
use super::work_item::{Pending, Resolution, WorkItem};
use super::work_queue::WorkQueue;
use crate::backoff::BackoffController;
use crate::message::{AnyMessage, Codec, Envelope, EnvelopeError, TypeRegistry};
use crate::store::{DurableStore, FileStore, StoreOptions};

const DEFAULT_IDLE_WAIT: Duration = Duration::from_millis(100);
/// Subdirectory of a file-backed queue that holds undecodable records.
pub const DEAD_LETTER_DIR: &str = "dead-letter";

/// Something a [`DurableQueue`] can persist.
pub trait Record: Sized + Send + 'static {
    fn to_record(&self) -> Result<Vec<u8>, EnvelopeError>;
    fn from_record(bytes: &[u8]) -> Result<Self, EnvelopeError>;
}

impl Record for Envelope {
    fn to_record(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(self.to_string().into_bytes())
    }

    fn from_record(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        Envelope::from_bytes(bytes)
    }
}

struct Shared<S> {
    store: Mutex<Option<S>>,
    dead_letter: Mutex<Option<S>>,
    gate: SingleFlight,
    arrived: Condvar,
}

/// Persistent FIFO with single-flight consumption. Records are envelopes
/// unless another [`Record`] type is chosen.
pub struct DurableQueue<R: Record = Envelope, S: DurableStore = FileStore> {
    shared: Arc<Shared<S>>,
    codec: Codec,
    idle_wait: Duration,
    backoff: Option<Arc<BackoffController>>,
    records: PhantomData<fn() -> R>,
}

impl<R: Record> DurableQueue<R, FileStore> {
    /// Open a file-backed queue in `dir`, waiting up to the options' lock
    /// timeout for any previous owner to let go. Undecodable records go to
    /// `dir/dead-letter`.
    pub fn open(dir: impl AsRef<Path>, options: StoreOptions) -> Result<Self, QueueError> {
        let dir = dir.as_ref();
        let store = FileStore::open(dir, options)?;
        let dead_letter = FileStore::open(dir.join(DEAD_LETTER_DIR), options)?;
        Ok(Self::new(store).with_dead_letter(dead_letter))
    }
}

impl<R: Record, S: DurableStore + 'static> DurableQueue<R, S> {
    pub fn new(store: S) -> Self {
        Self {
            shared: Arc::new(Shared {
                store: Mutex::new(Some(store)),
                dead_letter: Mutex::new(None),
                gate: SingleFlight::new(),
                arrived: Condvar::new(),
            }),
            codec: Codec::default(),
            idle_wait: DEFAULT_IDLE_WAIT,
            backoff: None,
            records: PhantomData,
        }
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// How long `ready` waits for an enqueue when the queue is empty.
    pub fn with_idle_wait(mut self, idle_wait: Duration) -> Self {
        self.idle_wait = idle_wait;
        self
    }

    /// Back off on handler failure and reset on success.
    pub fn with_backoff(mut self, backoff: Arc<BackoffController>) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Keep undecodable records in `store` instead of discarding them.
    pub fn with_dead_letter(self, store: S) -> Self {
        *self.shared.dead_letter.lock() = Some(store);
        self
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Records moved aside because they could not be decoded.
    pub fn dead_letter_len(&self) -> usize {
        self.shared
            .dead_letter
            .lock()
            .as_ref()
            .map_or(0, |store| store.estimated_len())
    }

    /// Durably append a record. Returns once it is on disk.
    pub fn enqueue_record(&self, record: &R) -> Result<(), QueueError> {
        let record = record.to_record()?;
        {
            let mut guard = self.shared.store.lock();
            let store = guard.as_mut().ok_or(QueueError::Closed)?;
            let mut session = store.open_session();
            session.enqueue(record);
            session.flush()?;
        }
        self.shared.arrived.notify_all();
        Ok(())
    }

    /// Release the store. Later enqueues fail with [`QueueError::Closed`];
    /// dequeues see an empty queue.
    pub fn close(&self) -> Result<(), QueueError> {
        let store = {
            let mut guard = self.shared.store.lock();
            let store = guard.take();
            self.shared.arrived.notify_all();
            store
        };
        let dead_letter = self.shared.dead_letter.lock().take();

        let closed = match store {
            Some(mut store) => {
                debug!("closing durable queue");
                store.close()
            }
            None => Ok(()),
        };
        if let Some(mut dead_letter) = dead_letter {
            dead_letter.close()?;
        }
        closed.map_err(QueueError::from)
    }

    /// Oldest decodable record, moving undecodable ones out of the way.
    /// The caller holds the gate.
    fn next_decodable(&self) -> Result<Option<R>, QueueError> {
        let mut guard = self.shared.store.lock();
        let Some(store) = guard.as_mut() else {
            return Ok(None);
        };
        loop {
            let Some(record) = store.open_session().dequeue()? else {
                return Ok(None);
            };
            match R::from_record(&record) {
                Ok(item) => return Ok(Some(item)),
                Err(err) => self.dead_letter(store, record, &err)?,
            }
        }
    }

    fn dead_letter(&self, store: &mut S, record: Vec<u8>, err: &EnvelopeError) -> Result<(), QueueError> {
        let bytes = record.len();
        let kept = match self.shared.dead_letter.lock().as_mut() {
            Some(dead_letter) => {
                dead_letter.append(&[record])?;
                true
            }
            None => false,
        };

        let mut session = store.open_session();
        session.dequeue()?;
        session.flush()?;

        if kept {
            error!(error = %err, bytes, "undecodable record moved to dead letter store");
        } else {
            error!(error = %err, bytes, "undecodable record discarded, no dead letter store attached");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.shared.store.lock().is_none()
    }
}

impl<S: DurableStore + 'static> DurableQueue<Envelope, S> {
    /// Encode and durably append a message.
    pub fn enqueue(&self, message: &dyn AnyMessage) -> Result<(), QueueError> {
        let envelope = Envelope::seal(message, self.codec)?;
        self.enqueue_record(&envelope)
    }

    /// A typed view that decodes envelopes through `types`.
    pub fn typed(self: &Arc<Self>, types: Arc<TypeRegistry>) -> TypedQueue<S> {
        TypedQueue {
            queue: Arc::clone(self),
            types,
        }
    }
}

impl<R: Record, S: DurableStore + 'static> WorkQueue for DurableQueue<R, S> {
    type Item = R;

    fn try_dequeue(&self) -> Result<WorkItem<R>, QueueError> {
        if !self.shared.gate.try_acquire() {
            return Ok(WorkItem::Empty);
        }

        match self.next_decodable() {
            Ok(Some(item)) => Ok(WorkItem::Ready(Pending::new(
                item,
                DurableResolution {
                    shared: Arc::clone(&self.shared),
                },
            ))),
            Ok(None) => {
                self.shared.gate.release();
                Ok(WorkItem::Empty)
            }
            Err(err) => {
                self.shared.gate.release();
                Err(err)
            }
        }
    }

    fn len(&self) -> usize {
        self.shared
            .store
            .lock()
            .as_ref()
            .map_or(0, |store| store.estimated_len())
    }

    /// True when an item can be handed out now. Otherwise waits up to the
    /// idle interval for an enqueue or for the outstanding item to settle.
    fn ready(&self) -> bool {
        let mut guard = self.shared.store.lock();
        let available = |store: &Option<S>| {
            self.shared.gate.is_available() && store.as_ref().is_some_and(|s| s.estimated_len() > 0)
        };
        match guard.as_ref() {
            None => return false,
            Some(_) if available(&*guard) => return true,
            Some(_) => {}
        }
        self.shared.arrived.wait_for(&mut guard, self.idle_wait);
        available(&*guard)
    }

    fn on_handler_failed(&self) {
        if let Some(backoff) = &self.backoff {
            backoff.sleep_more();
        }
    }

    fn on_handler_succeeded(&self) {
        if let Some(backoff) = &self.backoff {
            backoff.reset();
        }
    }
}

struct DurableResolution<S> {
    shared: Arc<Shared<S>>,
}

impl<S: DurableStore + 'static> Resolution for DurableResolution<S> {
    fn commit(self: Box<Self>) -> Result<(), QueueError> {
        let result = {
            let mut guard = self.shared.store.lock();
            let result = match guard.as_mut() {
                Some(store) => {
                    let mut session = store.open_session();
                    session
                        .dequeue()
                        .and_then(|_| session.flush())
                        .map_err(QueueError::from)
                }
                None => Err(QueueError::Closed),
            };
            // Under the store lock so a waiter in `ready` cannot miss it.
            self.shared.gate.release();
            self.shared.arrived.notify_all();
            result
        };
        if let Err(err) = &result {
            warn!(error = %err, "commit failed, item stays queued");
        }
        result
    }

    fn abort(self: Box<Self>) {
        let _guard = self.shared.store.lock();
        self.shared.gate.release();
        self.shared.arrived.notify_all();
    }
}

/// [`DurableQueue`] that hands out decoded messages.
///
/// An envelope whose type is not registered is aborted and reported as an
/// error; it stays on disk until a handler for it is registered.
pub struct TypedQueue<S: DurableStore = FileStore> {
    queue: Arc<DurableQueue<Envelope, S>>,
    types: Arc<TypeRegistry>,
}

impl<S: DurableStore + 'static> TypedQueue<S> {
    pub fn inner(&self) -> &Arc<DurableQueue<Envelope, S>> {
        &self.queue
    }
}

impl<S: DurableStore + 'static> WorkQueue for TypedQueue<S> {
    type Item = Box<dyn AnyMessage>;

    fn try_dequeue(&self) -> Result<WorkItem<Box<dyn AnyMessage>>, QueueError> {
        match self.queue.try_dequeue()? {
            WorkItem::Empty => Ok(WorkItem::Empty),
            WorkItem::Ready(pending) => {
                let decoded = pending.try_map(|envelope| self.types.decode(envelope))?;
                Ok(WorkItem::Ready(decoded))
            }
        }
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn ready(&self) -> bool {
        self.queue.ready()
    }

    fn on_handler_failed(&self) {
        self.queue.on_handler_failed()
    }

    fn on_handler_succeeded(&self) {
        self.queue.on_handler_succeeded()
    }
}
