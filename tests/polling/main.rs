//! Broker polling source integration tests.
//!
//! Drives a `PollingSource` against the in-memory broker:
//! - Rebuilding bindings after the endpoint disappears
//! - Backoff while the endpoint is idle or failing
//! - Redelivery through a running dispatcher

mod support;
mod backoff;
mod rebuild;
