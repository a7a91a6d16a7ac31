use std::fmt;

use super::error::QueueError;

/// How a pending item is settled against the queue it came from.
///
/// Exactly one of `commit` or `abort` runs for each dequeued item.
pub trait Resolution: Send {
    /// Remove the item permanently.
    fn commit(self: Box<Self>) -> Result<(), QueueError>;

    /// Make the item available again, content unchanged.
    fn abort(self: Box<Self>);
}

/// Result of a dequeue attempt.
pub enum WorkItem<T> {
    Empty,
    Ready(Pending<T>),
}

impl<T> WorkItem<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, WorkItem::Empty)
    }

    pub fn into_pending(self) -> Option<Pending<T>> {
        match self {
            WorkItem::Empty => None,
            WorkItem::Ready(pending) => Some(pending),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for WorkItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItem::Empty => f.write_str("Empty"),
            WorkItem::Ready(pending) => f.debug_tuple("Ready").field(pending.item()).finish(),
        }
    }
}

/// A dequeued item awaiting commit or abort. Dropping it aborts.
pub struct Pending<T> {
    item: T,
    ticket: Ticket,
}

impl<T> Pending<T> {
    pub fn new(item: T, resolution: impl Resolution + 'static) -> Self {
        Self {
            item,
            ticket: Ticket(Some(Box::new(resolution))),
        }
    }

    pub fn item(&self) -> &T {
        &self.item
    }

    pub fn commit(self) -> Result<(), QueueError> {
        self.ticket.commit()
    }

    pub fn abort(self) {
        self.ticket.abort()
    }

    /// Convert the item, keeping the same resolution. If `f` fails the
    /// original item is aborted.
    pub fn try_map<U, E>(self, f: impl FnOnce(&T) -> Result<U, E>) -> Result<Pending<U>, E> {
        let item = f(&self.item)?;
        Ok(Pending {
            item,
            ticket: self.ticket,
        })
    }
}

struct Ticket(Option<Box<dyn Resolution>>);

impl Ticket {
    fn commit(mut self) -> Result<(), QueueError> {
        match self.0.take() {
            Some(resolution) => resolution.commit(),
            None => Ok(()),
        }
    }

    fn abort(mut self) {
        if let Some(resolution) = self.0.take() {
            resolution.abort();
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if let Some(resolution) = self.0.take() {
            resolution.abort();
        }
    }
}
