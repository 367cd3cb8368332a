use crate::protocol::{ChunkId, Operation, PartialResult};

/// Result of processing one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub chunk_id: ChunkId,
    pub result: PartialResult,
}

/// Runs the operation a TASK names over its payload.
///
/// Stateless: the same chunk delivered twice is simply computed twice, and
/// the coordinator discards the second RESULT.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskExecutor;

impl TaskExecutor {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&self, chunk_id: ChunkId, operation: Operation, data: &[i64]) -> ExecutionResult {
        let result = match operation {
            Operation::SumAndStats => PartialResult::from_values(data),
        };

        tracing::debug!(
            chunk_id,
            count = result.count,
            sum = result.sum,
            "Chunk processed"
        );

        ExecutionResult { chunk_id, result }
    }
}
