use super::error::QueueError;
use super::work_item::WorkItem;

/// A source of work items a dispatcher can drain.
///
/// `ready` may block for a bounded time; the dispatcher calls it between
/// empty dequeues. The handler signals let a queue drive its own backoff.
pub trait WorkQueue: Send + Sync {
    type Item: Send + 'static;

    /// Take the next item without blocking. `Empty` when there is nothing to
    /// hand out or another item from this queue is still outstanding.
    fn try_dequeue(&self) -> Result<WorkItem<Self::Item>, QueueError>;

    /// Best-effort count of waiting items.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an item is likely available. May wait or back off first.
    fn ready(&self) -> bool;

    fn on_handler_failed(&self) {}

    fn on_handler_succeeded(&self) {}
}
