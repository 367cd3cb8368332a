use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::hooks::WorkerHooks;
use crate::protocol::{Message, Transport};

/// Fire-and-forget HEARTBEAT datagrams to the coordinator.
pub struct HeartbeatSender {
    interval: Duration,
    coordinator: SocketAddr,
}

impl HeartbeatSender {
    pub fn new(interval_ms: u64, coordinator: SocketAddr) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            coordinator,
        }
    }

    /// Sends one heartbeat per interval until `running` goes false.
    /// Send failures are logged and the loop carries on.
    pub async fn run(
        self,
        transport: Arc<Transport>,
        running: Arc<AtomicBool>,
        hooks: Arc<dyn WorkerHooks>,
    ) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            interval.tick().await;
            if !running.load(Ordering::SeqCst) {
                break;
            }

            match transport.send(&Message::Heartbeat, self.coordinator).await {
                Ok(_) => tracing::trace!(coordinator = %self.coordinator, "Heartbeat sent"),
                Err(e) => {
                    tracing::warn!(coordinator = %self.coordinator, error = %e, "Heartbeat failed");
                    hooks.on_log(&format!("Error sending heartbeat: {}", e));
                }
            }
        }
    }
}
