//! Event hooks for status displays, progress bars and loggers.
//!
//! The core never talks to a presentation layer directly. It calls these
//! methods synchronously at fixed points; every method has a no-op default,
//! so a subscriber implements only what it shows. Hooks are never called
//! while the coordinator state lock is held.

use std::net::SocketAddr;

use crate::protocol::{ChunkId, PartialResult};
use crate::scheduler::FinalAggregate;

pub trait CoordinatorHooks: Send + Sync {
    fn on_log(&self, _text: &str) {}

    /// The known-worker set grew. Addresses are in registration order.
    fn on_worker_set_changed(&self, _addresses: &[SocketAddr]) {}

    fn on_progress(&self, _pending: usize, _completed: usize) {}

    /// A TASK datagram was handed to the transport.
    fn on_dispatch(&self, _chunk_id: ChunkId, _worker: SocketAddr, _retransmit: bool) {}

    /// A RESULT was accepted (duplicates never reach this hook).
    fn on_result(&self, _chunk_id: ChunkId, _result: &PartialResult) {}

    fn on_final(&self, _aggregate: &FinalAggregate) {}
}

/// Worker lifecycle as shown to an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Unregistered,
    Registered,
    Disconnected,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerStatus::Unregistered => write!(f, "unregistered"),
            WorkerStatus::Registered => write!(f, "registered"),
            WorkerStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

pub trait WorkerHooks: Send + Sync {
    fn on_log(&self, _text: &str) {}

    fn on_status(&self, _status: WorkerStatus) {}

    fn on_task(&self, _chunk_id: ChunkId, _len: usize) {}

    fn on_result(&self, _chunk_id: ChunkId, _result: &PartialResult) {}
}

/// Forwards every hook to `tracing`. Default subscriber for the binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHooks;

impl CoordinatorHooks for LogHooks {
    fn on_log(&self, text: &str) {
        tracing::info!("{}", text);
    }

    fn on_worker_set_changed(&self, addresses: &[SocketAddr]) {
        tracing::info!(workers = ?addresses, count = addresses.len(), "Worker set changed");
    }

    fn on_progress(&self, pending: usize, completed: usize) {
        tracing::debug!(pending, completed, total = pending + completed, "Progress");
    }

    fn on_dispatch(&self, chunk_id: ChunkId, worker: SocketAddr, retransmit: bool) {
        tracing::debug!(chunk_id, worker = %worker, retransmit, "Task sent");
    }

    fn on_result(&self, chunk_id: ChunkId, result: &PartialResult) {
        tracing::debug!(
            chunk_id,
            sum = result.sum,
            count = result.count,
            min = result.min,
            max = result.max,
            "Chunk result"
        );
    }

    fn on_final(&self, aggregate: &FinalAggregate) {
        tracing::info!(
            total_count = aggregate.total_count,
            total_sum = aggregate.total_sum,
            average = aggregate.average,
            elapsed_secs = aggregate.elapsed_secs,
            throughput = aggregate.throughput,
            "Processing complete"
        );
    }
}

impl WorkerHooks for LogHooks {
    fn on_log(&self, text: &str) {
        tracing::info!("{}", text);
    }

    fn on_status(&self, status: WorkerStatus) {
        tracing::info!(status = %status, "Worker status");
    }

    fn on_task(&self, chunk_id: ChunkId, len: usize) {
        tracing::debug!(chunk_id, len, "Task received");
    }

    fn on_result(&self, chunk_id: ChunkId, result: &PartialResult) {
        tracing::debug!(chunk_id, sum = result.sum, count = result.count, "Result sent");
    }
}
