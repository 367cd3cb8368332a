//! Worker side of the protocol.
//!
//! - [`WorkerRuntime`]: registration state machine and the TASK loop
//! - [`heartbeat`]: periodic HEARTBEAT datagrams once registered
//! - [`TaskExecutor`]: computes a chunk's [`PartialResult`](crate::protocol::PartialResult)
//!
//! A worker is told the coordinator address out of band, registers with
//! bounded retries, then answers every TASK it receives with a RESULT. It
//! keeps no record of what it has processed.

pub mod executor;
pub mod heartbeat;
pub mod runtime;

pub use executor::{ExecutionResult, TaskExecutor};
pub use runtime::WorkerRuntime;
