use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::WorkerConfig;
use crate::error::{FoldError, Result};
use crate::hooks::{WorkerHooks, WorkerStatus};
use crate::protocol::{ChunkId, Message, Operation, Received, Transport};
use crate::worker::executor::TaskExecutor;
use crate::worker::heartbeat::HeartbeatSender;

/// A worker process: register, heartbeat, process TASKs until stopped.
///
/// ```text
/// UNREGISTERED --ACK--> REGISTERED --transport error / stop--> DISCONNECTED
///       \--no ACK after N attempts--> DISCONNECTED
/// ```
pub struct WorkerRuntime {
    config: WorkerConfig,
    transport: Arc<Transport>,
    hooks: Arc<dyn WorkerHooks>,
    running: Arc<AtomicBool>,
    executor: TaskExecutor,
}

impl WorkerRuntime {
    pub async fn bind(config: WorkerConfig, hooks: Arc<dyn WorkerHooks>) -> Result<Self> {
        config.validate()?;

        let transport = Transport::bind(
            config.listen_addr,
            Duration::from_millis(config.recv_timeout_ms),
        )
        .await?;
        hooks.on_log(&format!(
            "Worker initialized on port {}",
            transport.local_addr()?.port()
        ));

        Ok(Self {
            config,
            transport: Arc::new(transport),
            hooks,
            running: Arc::new(AtomicBool::new(false)),
            executor: TaskExecutor::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Shared with the heartbeat loop. Storing `false` stops both loops
    /// within one receive timeout.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Registers, then serves TASKs until stopped or the socket fails.
    ///
    /// # Errors
    ///
    /// `RegistrationFailed` if no ACK arrives within the configured attempts;
    /// the worker never enters its main loop in that case. Any non-timeout
    /// transport error ends the main loop and is returned.
    pub async fn run(&self) -> Result<()> {
        self.hooks.on_status(WorkerStatus::Unregistered);
        self.register().await?;

        let heartbeat = HeartbeatSender::new(
            self.config.heartbeat_interval_ms,
            self.config.coordinator_addr,
        );
        let heartbeat_handle = tokio::spawn(heartbeat.run(
            self.transport.clone(),
            self.running.clone(),
            self.hooks.clone(),
        ));

        let outcome = self.serve().await;

        self.stop();
        heartbeat_handle.abort();
        self.hooks.on_status(WorkerStatus::Disconnected);
        outcome
    }

    /// REGISTER / await ACK, up to `registration_attempts` times.
    pub async fn register(&self) -> Result<()> {
        let coordinator = self.config.coordinator_addr;
        let attempts = self.config.registration_attempts;
        let per_attempt = Duration::from_millis(self.config.registration_timeout_ms);
        let retry_delay = Duration::from_millis(self.config.registration_retry_delay_ms);

        self.running.store(true, Ordering::SeqCst);

        for attempt in 1..=attempts {
            if !self.running.load(Ordering::SeqCst) {
                return Err(FoldError::Shutdown);
            }

            self.hooks.on_log(&format!(
                "Attempting to register with coordinator {} (Attempt {}/{})",
                coordinator, attempt, attempts
            ));
            if let Err(e) = self.transport.send(&Message::Register, coordinator).await {
                self.hooks
                    .on_log(&format!("Error during registration: {}", e));
                self.disconnect();
                return Err(e);
            }

            if self.await_ack(per_attempt).await? {
                self.hooks.on_log("Registered with coordinator");
                self.hooks.on_status(WorkerStatus::Registered);
                tracing::info!(coordinator = %coordinator, attempt, "Registered");
                return Ok(());
            }

            self.hooks.on_log(&format!(
                "Registration attempt {}/{} failed. Retrying...",
                attempt, attempts
            ));
            if attempt < attempts {
                tokio::time::sleep(retry_delay).await;
            }
        }

        self.hooks.on_log("Error: Failed to register with coordinator");
        self.disconnect();
        Err(FoldError::RegistrationFailed { attempts })
    }

    fn disconnect(&self) {
        self.stop();
        self.hooks.on_status(WorkerStatus::Disconnected);
    }

    /// True once any ACK arrives before `wait` runs out. Other datagrams are
    /// skipped without restarting the clock.
    async fn await_ack(&self, wait: Duration) -> Result<bool> {
        let deadline = Instant::now() + wait;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }

            match self.transport.recv_within(remaining).await {
                Ok(Received::Message {
                    message: Message::Ack { .. },
                    from,
                }) => {
                    if from != self.config.coordinator_addr {
                        tracing::debug!(from = %from, "ACK from unexpected address accepted");
                    }
                    return Ok(true);
                }
                Ok(Received::Message { message, from }) => {
                    tracing::debug!(from = %from, kind = message.kind(), "Ignoring message while registering");
                }
                Ok(Received::Timeout) => return Ok(false),
                Ok(Received::Malformed { .. }) => {}
                Err(e) => {
                    self.hooks
                        .on_log(&format!("Error during registration: {}", e));
                    self.disconnect();
                    return Err(e);
                }
            }
        }
    }

    async fn serve(&self) -> Result<()> {
        while self.running.load(Ordering::SeqCst) {
            match self.transport.recv().await {
                Ok(Received::Message {
                    message:
                        Message::Task {
                            chunk_id,
                            data,
                            operation,
                        },
                    ..
                }) => self.process(chunk_id, operation, &data).await,
                Ok(Received::Message {
                    message: Message::Ack { .. },
                    ..
                }) => {
                    self.hooks.on_log("Received registration acknowledgment");
                }
                Ok(Received::Message { message, from }) => {
                    tracing::warn!(from = %from, kind = message.kind(), "Unexpected message at worker");
                }
                Ok(Received::Timeout) | Ok(Received::Malformed { .. }) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "Worker receive failed");
                    self.hooks
                        .on_log(&format!("Error processing message: {}", e));
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Duplicate TASKs are processed again; the coordinator de-duplicates.
    async fn process(&self, chunk_id: ChunkId, operation: Operation, data: &[i64]) {
        self.hooks.on_log(&format!(
            "Received task {} with {} elements",
            chunk_id,
            data.len()
        ));
        self.hooks.on_task(chunk_id, data.len());

        let executed = self.executor.execute(chunk_id, operation, data);
        let reply = Message::Result {
            chunk_id,
            result: executed.result,
        };

        match self.transport.send(&reply, self.config.coordinator_addr).await {
            Ok(_) => {
                self.hooks
                    .on_log(&format!("Sent result for task {}", chunk_id));
                self.hooks.on_result(chunk_id, &executed.result);
            }
            Err(e) => {
                tracing::warn!(chunk_id, error = %e, "Failed to send result");
                self.hooks
                    .on_log(&format!("Error sending result for task {}: {}", chunk_id, e));
            }
        }
    }
}
