//! Dataset partitioning.

/// Chunk count the coordinator aims for: one chunk per worker for small
/// datasets, more as the dataset outgrows `max_chunk_size`.
pub fn target_chunk_count(len: usize, workers: usize, max_chunk_size: usize) -> usize {
    workers.max(1) * (len / max_chunk_size.max(1) + 1)
}

/// Never returns 0, whatever the inputs.
pub fn chunk_size(len: usize, target_chunk_count: usize, max_chunk_size: usize) -> usize {
    (len / target_chunk_count.max(1)).min(max_chunk_size).max(1)
}

/// Slices the dataset into consecutive runs of `chunk_size`; the last run may
/// be shorter. Every element lands in exactly one chunk.
pub fn split(dataset: &[i64], target_chunk_count: usize, max_chunk_size: usize) -> Vec<Vec<i64>> {
    let size = chunk_size(dataset.len(), target_chunk_count, max_chunk_size);
    dataset.chunks(size).map(<[i64]>::to_vec).collect()
}
