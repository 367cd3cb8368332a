use std::net::SocketAddr;
use std::time::Instant;

use crate::protocol::ChunkId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    Completed,
}

impl std::fmt::Display for ChunkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkState::Pending => write!(f, "pending"),
            ChunkState::Completed => write!(f, "completed"),
        }
    }
}

/// A contiguous slice of the dataset, bound to one worker at a time.
///
/// Retransmission reuses `id` and `data` and only refreshes `dispatched_at`.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: ChunkId,
    pub worker: SocketAddr,
    pub data: Vec<i64>,
    pub dispatched_at: Instant,
    pub state: ChunkState,
    /// Retransmissions to the current worker.
    pub retransmits: u32,
}

impl Chunk {
    pub fn new(id: ChunkId, worker: SocketAddr, data: Vec<i64>) -> Self {
        Self {
            id,
            worker,
            data,
            dispatched_at: Instant::now(),
            state: ChunkState::Pending,
            retransmits: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == ChunkState::Pending
    }
}
