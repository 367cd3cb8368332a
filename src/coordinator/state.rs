use crate::protocol::ChunkId;
use crate::scheduler::{JobLedger, WorkerRegistry};

/// Everything the coordinator mutates, behind one lock.
///
/// Registration, dispatch and result handling all touch more than one of
/// these, and they change at most once per worker or chunk, so a single
/// coarse lock is enough.
#[derive(Debug, Default)]
pub struct CoordinatorState {
    pub registry: WorkerRegistry,
    /// The job in flight, if any.
    pub job: Option<JobLedger>,
    next_chunk_id: ChunkId,
}

impl CoordinatorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids keep increasing across jobs, so a straggling RESULT from an earlier
    /// job can never match a chunk of the current one.
    pub fn allocate_chunk_id(&mut self) -> ChunkId {
        let id = self.next_chunk_id;
        self.next_chunk_id += 1;
        id
    }

    /// (pending, completed) for the job in flight.
    pub fn progress(&self) -> (usize, usize) {
        self.job
            .as_ref()
            .map(|job| (job.pending_count(), job.completed_count()))
            .unwrap_or((0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ids_are_monotonic() {
        let mut state = CoordinatorState::new();
        let ids: Vec<ChunkId> = (0..5).map(|_| state.allocate_chunk_id()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn progress_without_job_is_zero() {
        let state = CoordinatorState::new();
        assert_eq!(state.progress(), (0, 0));
    }
}
