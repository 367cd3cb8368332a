use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::protocol::{ChunkId, PartialResult};
use crate::scheduler::aggregator::FinalAggregate;
use crate::scheduler::chunk::{Chunk, ChunkState};
use crate::scheduler::registry::WorkerRegistry;

/// A TASK the retry scan wants sent again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retransmit {
    pub chunk_id: ChunkId,
    pub worker: SocketAddr,
    pub data: Vec<i64>,
    /// Set when the chunk moved to a different worker on this pass.
    pub reassigned_from: Option<SocketAddr>,
}

/// Chunk bookkeeping for the job in flight: which chunks are PENDING, which
/// are COMPLETED, and the results collected so far.
#[derive(Debug, Default)]
pub struct JobLedger {
    chunks: BTreeMap<ChunkId, Chunk>,
    results: BTreeMap<ChunkId, PartialResult>,
    rejected: usize,
    retransmissions: u64,
}

impl JobLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a chunk as PENDING. Ids must be fresh.
    pub fn insert_pending(&mut self, chunk: Chunk) {
        debug_assert!(!self.chunks.contains_key(&chunk.id));
        self.chunks.insert(chunk.id, chunk);
    }

    /// Counts a chunk that was never dispatched because its TASK was too large.
    pub fn record_rejected(&mut self) {
        self.rejected += 1;
    }

    /// Moves a PENDING chunk to COMPLETED on its first RESULT.
    ///
    /// Late duplicates and unknown ids are discarded and return false, which
    /// keeps result handling idempotent when TASKs get retransmitted.
    pub fn accept(
        &mut self,
        chunk_id: ChunkId,
        result: PartialResult,
        from: SocketAddr,
        registry: &mut WorkerRegistry,
    ) -> bool {
        let Some(chunk) = self.chunks.get_mut(&chunk_id) else {
            return false;
        };
        if chunk.state != ChunkState::Pending {
            return false;
        }

        chunk.state = ChunkState::Completed;
        self.results.insert(chunk_id, result);
        registry.record_completion(&from);
        true
    }

    /// Refreshes every PENDING chunk older than `timeout` and returns what
    /// to resend.
    ///
    /// Without a ceiling the chunk goes back to the same worker forever. With
    /// `max_retransmits = Some(n)`, a chunk already resent `n` times moves to
    /// the next worker in `workers` and its counter starts over.
    pub fn expire(
        &mut self,
        now: Instant,
        timeout: Duration,
        max_retransmits: Option<u32>,
        workers: &[SocketAddr],
    ) -> Vec<Retransmit> {
        let mut out = Vec::new();

        for chunk in self.chunks.values_mut() {
            if !chunk.is_pending() || now.saturating_duration_since(chunk.dispatched_at) <= timeout
            {
                continue;
            }

            let mut reassigned_from = None;
            match max_retransmits {
                Some(ceiling) if chunk.retransmits >= ceiling && workers.len() > 1 => {
                    let next = next_worker(workers, &chunk.worker);
                    reassigned_from = Some(chunk.worker);
                    chunk.worker = next;
                    chunk.retransmits = 0;
                }
                _ => chunk.retransmits += 1,
            }
            chunk.dispatched_at = now;
            self.retransmissions += 1;

            out.push(Retransmit {
                chunk_id: chunk.id,
                worker: chunk.worker,
                data: chunk.data.clone(),
                reassigned_from,
            });
        }

        out
    }

    /// True while any PENDING chunk is bound to `worker`.
    pub fn has_pending_for(&self, worker: &SocketAddr) -> bool {
        self.chunks
            .values()
            .any(|chunk| chunk.is_pending() && chunk.worker == *worker)
    }

    pub fn chunk(&self, chunk_id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(&chunk_id)
    }

    pub fn dispatched_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn pending_count(&self) -> usize {
        self.chunks.len() - self.results.len()
    }

    pub fn completed_count(&self) -> usize {
        self.results.len()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected
    }

    pub fn retransmissions(&self) -> u64 {
        self.retransmissions
    }

    /// Done iff nothing is PENDING and every dispatched chunk completed.
    pub fn is_complete(&self) -> bool {
        self.pending_count() == 0 && self.completed_count() == self.dispatched_count()
    }

    /// Folds completed results in chunk-id order.
    pub fn finalize(&self, elapsed: Duration) -> FinalAggregate {
        FinalAggregate::fold(self.results.values(), elapsed)
    }
}

fn next_worker(workers: &[SocketAddr], current: &SocketAddr) -> SocketAddr {
    match workers.iter().position(|w| w == current) {
        Some(i) => workers[(i + 1) % workers.len()],
        None => workers[0],
    }
}
