use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::protocol::PartialResult;

/// Job-level statistics folded from every completed chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalAggregate {
    pub total_sum: i64,
    pub total_count: u64,
    pub average: f64,
    pub min: i64,
    pub max: i64,
    pub elapsed_secs: f64,
    /// Elements per second.
    pub throughput: f64,
}

impl FinalAggregate {
    /// Sum, count, min and max compose commutatively and associatively, so
    /// the order of `results` does not affect the outcome. An empty chunk's
    /// zeros take part in min/max like any other result.
    pub fn fold<'a, I>(results: I, elapsed: Duration) -> Self
    where
        I: IntoIterator<Item = &'a PartialResult>,
    {
        let mut total_sum: i64 = 0;
        let mut total_count: u64 = 0;
        let mut extrema: Option<(i64, i64)> = None;

        for r in results {
            total_sum = total_sum.saturating_add(r.sum);
            total_count = total_count.saturating_add(r.count);
            extrema = Some(match extrema {
                Some((lo, hi)) => (lo.min(r.min), hi.max(r.max)),
                None => (r.min, r.max),
            });
        }

        let (min, max) = extrema.unwrap_or((0, 0));
        let elapsed_secs = elapsed.as_secs_f64();

        Self {
            total_sum,
            total_count,
            average: if total_count > 0 {
                total_sum as f64 / total_count as f64
            } else {
                0.0
            },
            min,
            max,
            elapsed_secs,
            throughput: if elapsed_secs > 0.0 {
                total_count as f64 / elapsed_secs
            } else {
                0.0
            },
        }
    }
}

/// What the operator gets back for one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub dataset_size: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub chunks_dispatched: usize,
    /// Chunks whose TASK would not fit in one datagram.
    pub chunks_rejected: usize,
    pub retransmissions: u64,
    pub aggregate: FinalAggregate,
}
