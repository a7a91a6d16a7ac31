//! Receiving messages from one broker endpoint.

mod node;

pub use node::ReceiverNode;
