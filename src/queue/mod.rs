//! Work queues - the contract a [`Dispatcher`](crate::dispatch::Dispatcher)
//! drains, and the durable local queue that implements it.
//!
//! ```ignore
//! let queue = DurableQueue::open("/var/lib/app/outbox", StoreOptions::default())?;
//! queue.enqueue(&order_placed)?;
//!
//! if let WorkItem::Ready(pending) = queue.try_dequeue()? {
//!     publish(pending.item())?;
//!     pending.commit()?; // dropping `pending` instead puts it back
//! }
//! ```

mod durable;
mod error;
mod single_flight;
mod work_item;
mod work_queue;

pub use durable::{DurableQueue, Record, TypedQueue, DEAD_LETTER_DIR};
pub use error::QueueError;
pub use work_item::{Pending, Resolution, WorkItem};
pub use work_queue::WorkQueue;
