use std::net::SocketAddr;

use crate::error::{FoldError, Result};

/// Well-known coordinator port. Workers assume it when given a bare host.
pub const DEFAULT_COORDINATOR_PORT: u16 = 9999;

/// Default worker port.
pub const DEFAULT_WORKER_PORT: u16 = 10000;

/// Largest TASK datagram the coordinator will send (approx. 64 KB minus headers).
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 64_000;

/// Coordinator tuning.
///
/// Timeouts are wall-clock and only ever compared against this process's own
/// clock, so skew between machines does not matter.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub listen_addr: SocketAddr,
    /// Minimum registered workers before a job is dispatched.
    pub quorum: usize,
    pub quorum_poll_interval_ms: u64,
    pub quorum_max_attempts: u32,
    /// Upper bound on elements per chunk.
    pub max_chunk_size: usize,
    pub retry_scan_interval_ms: u64,
    /// A PENDING chunk older than this is retransmitted.
    pub result_timeout_ms: u64,
    /// Retransmissions to one worker before the chunk moves to another worker.
    /// `None` retransmits to the same worker forever.
    pub max_retransmits: Option<u32>,
    pub recv_timeout_ms: u64,
    pub max_datagram_size: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_COORDINATOR_PORT)),
            quorum: 2,
            quorum_poll_interval_ms: 2000,
            quorum_max_attempts: 10,
            max_chunk_size: 10_000,
            retry_scan_interval_ms: 500,
            result_timeout_ms: 30_000,
            max_retransmits: None,
            recv_timeout_ms: 5000,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
        }
    }
}

impl CoordinatorConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn with_result_timeout_ms(mut self, result_timeout_ms: u64) -> Self {
        self.result_timeout_ms = result_timeout_ms;
        self
    }

    pub fn with_max_retransmits(mut self, max_retransmits: Option<u32>) -> Self {
        self.max_retransmits = max_retransmits;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.quorum == 0 {
            return Err(FoldError::Config("quorum must be at least 1".into()));
        }
        if self.max_chunk_size == 0 {
            return Err(FoldError::Config("max_chunk_size must be at least 1".into()));
        }
        if self.quorum_poll_interval_ms == 0
            || self.retry_scan_interval_ms == 0
            || self.recv_timeout_ms == 0
        {
            return Err(FoldError::Config("intervals must be non-zero".into()));
        }
        if self.max_retransmits == Some(0) {
            return Err(FoldError::Config(
                "max_retransmits must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub listen_addr: SocketAddr,
    /// Told to the worker out of band; there is no discovery.
    pub coordinator_addr: SocketAddr,
    pub registration_attempts: u32,
    /// How long each REGISTER waits for its ACK.
    pub registration_timeout_ms: u64,
    pub registration_retry_delay_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub recv_timeout_ms: u64,
}

impl WorkerConfig {
    pub fn new(listen_addr: SocketAddr, coordinator_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            coordinator_addr,
            registration_attempts: 5,
            registration_timeout_ms: 5000,
            registration_retry_delay_ms: 2000,
            heartbeat_interval_ms: 5000,
            recv_timeout_ms: 5000,
        }
    }

    pub fn with_heartbeat_interval_ms(mut self, heartbeat_interval_ms: u64) -> Self {
        self.heartbeat_interval_ms = heartbeat_interval_ms;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.registration_attempts == 0 {
            return Err(FoldError::Config(
                "registration_attempts must be at least 1".into(),
            ));
        }
        if self.registration_timeout_ms == 0
            || self.heartbeat_interval_ms == 0
            || self.recv_timeout_ms == 0
        {
            return Err(FoldError::Config("intervals must be non-zero".into()));
        }
        Ok(())
    }
}

/// Parses `host:port`, `[v6]:port`, or a bare host or IP which gets the
/// well-known coordinator port.
pub fn parse_coordinator_addr(input: &str) -> Result<SocketAddr> {
    use std::net::{IpAddr, ToSocketAddrs};

    let input = input.trim();
    if input.is_empty() {
        return Err(FoldError::Config("coordinator address is empty".into()));
    }
    if let Ok(ip) = input.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_COORDINATOR_PORT));
    }
    let candidate = if input.contains(':') {
        input.to_string()
    } else {
        format!("{}:{}", input, DEFAULT_COORDINATOR_PORT)
    };

    candidate
        .to_socket_addrs()
        .map_err(|e| FoldError::Config(format!("invalid coordinator address {input}: {e}")))?
        .next()
        .ok_or_else(|| FoldError::Config(format!("coordinator address {input} did not resolve")))
}
