//! Dispatcher - a thread pool that drains any [`WorkQueue`](crate::queue::WorkQueue),
//! committing items whose handler succeeds and aborting the rest.

mod dispatcher;
mod error;

pub use dispatcher::{DispatchStats, Dispatcher, DispatcherHandle};
pub use error::HandlerError;
