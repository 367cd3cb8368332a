use std::net::SocketAddr;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::coordinator::{Coordinator, CoordinatorState, Shared};
use crate::dataset;
use crate::error::{FoldError, Result};
use crate::protocol::{ChunkId, Message};
use crate::scheduler::{chunker, Chunk, JobLedger, JobReport};

impl Coordinator {
    /// Generates `size` sample values and runs a job over them.
    pub async fn run_generated_job(&self, size: usize) -> Result<JobReport> {
        self.run_job(dataset::generate(size)).await
    }

    /// Splits `dataset` across the registered workers and waits for every
    /// dispatched chunk to come back.
    ///
    /// Blocks until the quorum registers (bounded), then dispatches every
    /// chunk up front and retransmits chunks whose RESULT is overdue. If the
    /// quorum never shows up the job is abandoned and nothing is kept.
    pub async fn run_job(&self, dataset: Vec<i64>) -> Result<JobReport> {
        if dataset.is_empty() {
            return Err(FoldError::EmptyDataset);
        }

        {
            let mut state = self.shared.state.lock().await;
            if state.job.is_some() {
                return Err(FoldError::JobInProgress);
            }
            state.job = Some(JobLedger::new());
        }

        let outcome = self.shared.drive_job(&dataset).await;
        self.shared.state.lock().await.job = None;
        outcome
    }
}

impl Shared {
    async fn drive_job(&self, dataset: &[i64]) -> Result<JobReport> {
        let job_id = Uuid::new_v4();
        self.hooks.on_log(&format!(
            "Starting work distribution for {} elements...",
            dataset.len()
        ));

        let workers = self.wait_for_quorum().await?;
        self.hooks
            .on_log(&format!("Found {} workers", workers.len()));

        let max_chunk_size = self.config.max_chunk_size;
        let target = chunker::target_chunk_count(dataset.len(), workers.len(), max_chunk_size);
        let chunks = chunker::split(dataset, target, max_chunk_size);
        let chunk_count = chunks.len();

        tracing::info!(
            job_id = %job_id,
            elements = dataset.len(),
            chunks = chunk_count,
            workers = workers.len(),
            "Dispatching job"
        );

        let started = Instant::now();
        let started_at = Utc::now();

        for (i, data) in chunks.into_iter().enumerate() {
            let worker = workers[i % workers.len()];
            self.dispatch_chunk(worker, data).await;
        }

        self.hooks
            .on_log(&format!("Waiting for {} tasks to complete...", chunk_count));
        self.await_completion().await?;

        let elapsed = started.elapsed();
        let ledger = self.state.lock().await.job.take().unwrap_or_default();
        let aggregate = ledger.finalize(elapsed);

        self.hooks.on_log(&format!(
            "Processing complete in {:.2} seconds",
            elapsed.as_secs_f64()
        ));
        self.hooks.on_final(&aggregate);

        Ok(JobReport {
            job_id,
            dataset_size: dataset.len(),
            started_at,
            finished_at: Utc::now(),
            chunks_dispatched: ledger.dispatched_count(),
            chunks_rejected: ledger.rejected_count(),
            retransmissions: ledger.retransmissions(),
            aggregate,
        })
    }

    /// Waits for the quorum in at most `quorum_max_attempts` rounds of
    /// `quorum_poll_interval_ms`, waking early as soon as enough workers
    /// have registered. Returns worker addresses in registration order.
    async fn wait_for_quorum(&self) -> Result<Vec<SocketAddr>> {
        let required = self.config.quorum;
        let round = Duration::from_millis(self.config.quorum_poll_interval_ms);
        let mut count_rx = self.worker_count.subscribe();
        let mut attempts = 0;

        loop {
            let registered = *count_rx.borrow_and_update();
            if registered >= required {
                break;
            }
            if attempts >= self.config.quorum_max_attempts {
                self.hooks.on_log(&format!(
                    "Error: Only {} workers registered. Need {}.",
                    registered, required
                ));
                return Err(FoldError::QuorumNotReached {
                    registered,
                    required,
                });
            }

            self.hooks.on_log(&format!(
                "Waiting for {} workers... ({} registered)",
                required, registered
            ));
            attempts += 1;

            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(FoldError::Shutdown),
                _ = tokio::time::timeout(round, count_rx.wait_for(|n| *n >= required)) => {}
            }
        }

        Ok(self.state.lock().await.registry.addresses())
    }

    /// Records the chunk as PENDING, marks the worker BUSY, then sends.
    ///
    /// A TASK too large for one datagram is logged and counted, never split.
    /// A failed send leaves the chunk PENDING for the retry scan.
    async fn dispatch_chunk(&self, worker: SocketAddr, data: Vec<i64>) {
        let chunk_id = self.state.lock().await.allocate_chunk_id();

        let bytes = match Message::encode_task(chunk_id, &data, self.config.max_datagram_size) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(chunk_id, error = %e, "Task rejected");
                self.hooks.on_log(&format!(
                    "Error: Task {} too large ({}). Splitting not implemented.",
                    chunk_id, e
                ));
                let (pending, completed) = {
                    let mut guard = self.state.lock().await;
                    if let Some(job) = guard.job.as_mut() {
                        job.record_rejected();
                    }
                    guard.progress()
                };
                self.hooks.on_progress(pending, completed);
                return;
            }
        };

        let len = data.len();
        let (pending, completed) = {
            let mut guard = self.state.lock().await;
            let CoordinatorState { registry, job, .. } = &mut *guard;
            job.get_or_insert_with(JobLedger::new)
                .insert_pending(Chunk::new(chunk_id, worker, data));
            registry.mark_busy(&worker);
            guard.progress()
        };

        if self.send_task(&bytes, chunk_id, worker, false).await {
            self.hooks.on_log(&format!(
                "Task {} sent to {} (data size: {})",
                chunk_id, worker, len
            ));
        }
        self.hooks.on_progress(pending, completed);
    }

    async fn send_task(
        &self,
        bytes: &[u8],
        chunk_id: ChunkId,
        worker: SocketAddr,
        retransmit: bool,
    ) -> bool {
        match self.transport.send_bytes(bytes, worker).await {
            Ok(_) => {
                self.hooks.on_dispatch(chunk_id, worker, retransmit);
                true
            }
            Err(e) => {
                tracing::warn!(chunk_id, worker = %worker, error = %e, "Failed to send task");
                self.hooks
                    .on_log(&format!("Error sending task to {}: {}", worker, e));
                false
            }
        }
    }

    /// Sleeps until a RESULT is accepted or the retry scan is due, then
    /// re-checks. Done when nothing is PENDING.
    async fn await_completion(&self) -> Result<()> {
        let timeout = Duration::from_millis(self.config.result_timeout_ms);
        let mut scan = tokio::time::interval(Duration::from_millis(
            self.config.retry_scan_interval_ms,
        ));
        scan.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let complete = self
                .state
                .lock()
                .await
                .job
                .as_ref()
                .map(JobLedger::is_complete)
                .unwrap_or(true);
            if complete {
                return Ok(());
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(FoldError::Shutdown),
                _ = self.result_accepted.notified() => {}
                _ = scan.tick() => self.retransmit_expired(timeout).await,
            }
        }
    }

    async fn retransmit_expired(&self, timeout: Duration) {
        let resend = {
            let mut guard = self.state.lock().await;
            let workers = guard.registry.addresses();
            let CoordinatorState { registry, job, .. } = &mut *guard;
            let Some(ledger) = job.as_mut() else {
                return;
            };
            let resend = ledger.expire(
                Instant::now(),
                timeout,
                self.config.max_retransmits,
                &workers,
            );
            for r in &resend {
                registry.mark_busy(&r.worker);
                if let Some(previous) = r.reassigned_from {
                    if !ledger.has_pending_for(&previous) {
                        registry.mark_ready(&previous);
                    }
                }
            }
            resend
        };

        for r in resend {
            match r.reassigned_from {
                Some(previous) => {
                    tracing::warn!(chunk_id = r.chunk_id, from = %previous, to = %r.worker, "Reassigning task");
                    self.hooks.on_log(&format!(
                        "Task {} reassigned from {} to {}",
                        r.chunk_id, previous, r.worker
                    ));
                }
                None => {
                    tracing::info!(chunk_id = r.chunk_id, worker = %r.worker, "Task timed out, retransmitting");
                    self.hooks.on_log(&format!(
                        "Task {} timed out, retransmitting...",
                        r.chunk_id
                    ));
                }
            }

            match Message::encode_task(r.chunk_id, &r.data, usize::MAX) {
                Ok(bytes) => {
                    self.send_task(&bytes, r.chunk_id, r.worker, true).await;
                }
                Err(e) => {
                    tracing::error!(chunk_id = r.chunk_id, error = %e, "Failed to encode retransmission");
                }
            }
        }
    }
}
