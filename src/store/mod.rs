//! Durable record storage underneath the local queue.
//!
//! [`FileStore`] keeps an append-only log on local disk guarded by a lock
//! file; [`MemoryStore`] is the volatile stand-in used by tests.

mod error;
mod file;
mod lock;
mod memory;
#[allow(clippy::module_inception)]
mod store;

pub use error::StoreError;
pub use file::{FileStore, StoreOptions};
pub use memory::MemoryStore;
pub use store::{DurableStore, Session};
