//! Coordinator process: owns the bound socket, the worker registry and the
//! job in flight.
//!
//! Two long-running tasks are spawned by [`Coordinator::start`]:
//!
//! 1. **Reader**: receives datagrams with a bounded timeout and forwards
//!    decoded messages over a channel
//! 2. **Updater**: applies REGISTER / HEARTBEAT / RESULT to the shared state
//!
//! Jobs are driven by [`Coordinator::run_job`], one at a time. No lock is held
//! across socket I/O or hook calls.

mod dispatch;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::CoordinatorConfig;
use crate::error::Result;
use crate::hooks::CoordinatorHooks;
use crate::protocol::{ChunkId, Message, PartialResult, Received, Transport};
use crate::scheduler::WorkerRecord;

pub use state::CoordinatorState;

const INBOUND_CHANNEL_CAPACITY: usize = 1024;
const RECV_BACKOFF_BASE: Duration = Duration::from_millis(10);
const RECV_BACKOFF_MAX: Duration = Duration::from_secs(1);

pub(crate) struct Shared {
    config: CoordinatorConfig,
    transport: Transport,
    state: Mutex<CoordinatorState>,
    hooks: Arc<dyn CoordinatorHooks>,
    /// Registered worker count, published on every registry growth.
    worker_count: watch::Sender<usize>,
    /// Pinged whenever a RESULT is accepted.
    result_accepted: Notify,
    shutdown: CancellationToken,
}

/// Handle to a bound coordinator. Cheap to clone.
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl Coordinator {
    /// Binds the coordinator socket. A port already in use is fatal.
    pub async fn bind(config: CoordinatorConfig, hooks: Arc<dyn CoordinatorHooks>) -> Result<Self> {
        config.validate()?;

        let transport = Transport::bind(
            config.listen_addr,
            Duration::from_millis(config.recv_timeout_ms),
        )
        .await?;
        let local = transport.local_addr()?;
        hooks.on_log(&format!("Coordinator started on {}", local));

        let (worker_count, _) = watch::channel(0usize);
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                transport,
                state: Mutex::new(CoordinatorState::new()),
                hooks,
                worker_count,
                result_accepted: Notify::new(),
                shutdown: CancellationToken::new(),
            }),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.shared.transport.local_addr()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    /// Cancelling this token stops the background tasks and any job in flight.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shared.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
    }

    /// Spawns the reader and updater tasks.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);

        let reader = tokio::spawn(reader_loop(self.shared.clone(), tx));
        let updater = tokio::spawn(updater_loop(self.shared.clone(), rx));
        vec![reader, updater]
    }

    /// Snapshot of known workers in registration order.
    pub async fn workers(&self) -> Vec<WorkerRecord> {
        self.shared.state.lock().await.registry.all_workers()
    }

    /// (pending, completed) for the job in flight.
    pub async fn progress(&self) -> (usize, usize) {
        self.shared.state.lock().await.progress()
    }
}

/// Delay between receive attempts after consecutive socket errors. Doubles
/// per failure up to `RECV_BACKOFF_MAX`; any successful receive resets it.
#[derive(Debug)]
struct RecvBackoff {
    next: Duration,
}

impl RecvBackoff {
    fn new() -> Self {
        Self {
            next: RECV_BACKOFF_BASE,
        }
    }

    fn failure(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(RECV_BACKOFF_MAX);
        delay
    }

    fn reset(&mut self) {
        self.next = RECV_BACKOFF_BASE;
    }
}

async fn reader_loop(shared: Arc<Shared>, tx: mpsc::Sender<(Message, SocketAddr)>) {
    let mut backoff = RecvBackoff::new();

    loop {
        let received = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            received = shared.transport.recv() => received,
        };

        match received {
            Ok(Received::Message { message, from }) => {
                backoff.reset();
                if tx.send((message, from)).await.is_err() {
                    break;
                }
            }
            Ok(Received::Timeout) | Ok(Received::Malformed { .. }) => backoff.reset(),
            Err(e) => {
                let delay = backoff.failure();
                tracing::warn!(
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Coordinator receive failed"
                );
                shared.hooks.on_log(&format!("Error handling message: {}", e));
                tokio::select! {
                    _ = shared.shutdown.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
    tracing::debug!("Coordinator reader stopped");
}

async fn updater_loop(shared: Arc<Shared>, mut rx: mpsc::Receiver<(Message, SocketAddr)>) {
    loop {
        let (message, from) = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            next = rx.recv() => match next {
                Some(inbound) => inbound,
                None => break,
            },
        };
        shared.handle_message(message, from).await;
    }
    tracing::debug!("Coordinator updater stopped");
}

impl Shared {
    async fn handle_message(&self, message: Message, from: SocketAddr) {
        match message {
            Message::Register => self.handle_register(from).await,
            Message::Heartbeat => self.handle_heartbeat(from).await,
            Message::Result { chunk_id, result } => self.handle_result(chunk_id, result, from).await,
            other => {
                tracing::warn!(from = %from, kind = other.kind(), "Unexpected message at coordinator");
            }
        }
    }

    /// Always ACKs, since a worker retries REGISTER until it hears back.
    async fn handle_register(&self, from: SocketAddr) {
        let (is_new, addresses) = {
            let mut state = self.state.lock().await;
            let is_new = state.registry.register(from);
            (is_new, state.registry.addresses())
        };

        if let Err(e) = self.transport.send(&Message::ack("registered"), from).await {
            tracing::warn!(worker = %from, error = %e, "Failed to send ACK");
        }

        if is_new {
            self.worker_count.send_replace(addresses.len());
            self.hooks.on_log(&format!("Worker registered: {}", from));
            self.hooks.on_worker_set_changed(&addresses);
        } else {
            tracing::debug!(worker = %from, "Repeated REGISTER from known worker");
        }
    }

    async fn handle_heartbeat(&self, from: SocketAddr) {
        let known = self.state.lock().await.registry.touch(&from);
        if known {
            tracing::debug!(worker = %from, "Heartbeat");
        } else {
            tracing::debug!(from = %from, "Heartbeat from unregistered address ignored");
        }
    }

    async fn handle_result(&self, chunk_id: ChunkId, result: PartialResult, from: SocketAddr) {
        let (accepted, pending, completed) = {
            let mut guard = self.state.lock().await;
            let CoordinatorState { registry, job, .. } = &mut *guard;
            let accepted = match job.as_mut() {
                Some(ledger) => ledger.accept(chunk_id, result, from, registry),
                None => false,
            };
            if !accepted {
                registry.touch(&from);
            }
            let (pending, completed) = guard.progress();
            (accepted, pending, completed)
        };

        if !accepted {
            tracing::debug!(chunk_id, worker = %from, "Discarding duplicate or stale result");
            return;
        }

        self.hooks.on_log(&format!("Task {} completed by {}", chunk_id, from));
        self.hooks.on_result(chunk_id, &result);
        self.hooks.on_progress(pending, completed);
        self.result_accepted.notify_one();
    }
}
