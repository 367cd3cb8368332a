//! Wire protocol and datagram transport.
//!
//! - [`Message`]: the five datagram kinds, JSON-encoded
//! - [`Transport`]: a bound UDP socket with bounded receive timeouts

pub mod message;
pub mod transport;

pub use message::{ChunkId, Message, Operation, PartialResult};
pub use transport::{Received, Transport};
