use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Coordinator-side view of whether a worker has work outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Ready,
    Busy,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Ready => write!(f, "ready"),
            WorkerState::Busy => write!(f, "busy"),
        }
    }
}

/// Worker tracking, keyed by the address its datagrams come from.
#[derive(Debug, Clone)]
pub struct WorkerRecord {
    pub addr: SocketAddr,
    pub state: WorkerState,
    pub last_seen: Instant,
    pub tasks_completed: u64,
}

impl WorkerRecord {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            state: WorkerState::Ready,
            last_seen: Instant::now(),
            tasks_completed: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn silent_for(&self) -> Duration {
        self.last_seen.elapsed()
    }
}

/// Known workers in registration order.
///
/// Records are never removed: a worker that goes quiet stays eligible for
/// dispatch.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: HashMap<SocketAddr, WorkerRecord>,
    order: Vec<SocketAddr>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the address was unseen and has been added.
    /// Registering a known address changes nothing.
    pub fn register(&mut self, addr: SocketAddr) -> bool {
        if self.workers.contains_key(&addr) {
            return false;
        }
        self.workers.insert(addr, WorkerRecord::new(addr));
        self.order.push(addr);
        tracing::info!(worker = %addr, total = self.order.len(), "Worker registered");
        true
    }

    /// Refresh last-seen without touching status. Returns false for unknown workers.
    pub fn touch(&mut self, addr: &SocketAddr) -> bool {
        match self.workers.get_mut(addr) {
            Some(worker) => {
                worker.touch();
                true
            }
            None => false,
        }
    }

    pub fn mark_busy(&mut self, addr: &SocketAddr) {
        if let Some(worker) = self.workers.get_mut(addr) {
            worker.state = WorkerState::Busy;
        }
    }

    pub fn mark_ready(&mut self, addr: &SocketAddr) {
        if let Some(worker) = self.workers.get_mut(addr) {
            worker.state = WorkerState::Ready;
        }
    }

    /// Bookkeeping for an accepted RESULT.
    pub fn record_completion(&mut self, addr: &SocketAddr) {
        if let Some(worker) = self.workers.get_mut(addr) {
            worker.state = WorkerState::Ready;
            worker.tasks_completed += 1;
            worker.touch();
        }
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<&WorkerRecord> {
        self.workers.get(addr)
    }

    pub fn is_known(&self, addr: &SocketAddr) -> bool {
        self.workers.contains_key(addr)
    }

    /// Addresses in the order workers first registered.
    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.order.clone()
    }

    pub fn all_workers(&self) -> Vec<WorkerRecord> {
        self.order
            .iter()
            .filter_map(|addr| self.workers.get(addr))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn register_is_idempotent() {
        let mut registry = WorkerRegistry::new();
        assert!(registry.register(addr("10.0.0.1:10000")));
        assert!(!registry.register(addr("10.0.0.1:10000")));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(&addr("10.0.0.1:10000")).unwrap().state,
            WorkerState::Ready
        );
    }

    #[test]
    fn same_host_different_ports_are_distinct() {
        let mut registry = WorkerRegistry::new();
        registry.register(addr("10.0.0.1:10000"));
        registry.register(addr("10.0.0.1:10001"));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.addresses(),
            vec![addr("10.0.0.1:10000"), addr("10.0.0.1:10001")]
        );
    }

    #[test]
    fn touch_keeps_status() {
        let mut registry = WorkerRegistry::new();
        let w = addr("10.0.0.1:10000");
        registry.register(w);
        registry.mark_busy(&w);
        let before = registry.get(&w).unwrap().last_seen;

        std::thread::sleep(Duration::from_millis(2));
        assert!(registry.touch(&w));

        let record = registry.get(&w).unwrap();
        assert_eq!(record.state, WorkerState::Busy);
        assert!(record.last_seen > before);
        assert!(!registry.touch(&addr("10.0.0.9:1")));
    }

    #[test]
    fn completion_marks_ready_and_counts() {
        let mut registry = WorkerRegistry::new();
        let w = addr("10.0.0.1:10000");
        registry.register(w);
        registry.mark_busy(&w);
        registry.record_completion(&w);
        registry.record_completion(&w);

        let record = registry.get(&w).unwrap();
        assert_eq!(record.state, WorkerState::Ready);
        assert_eq!(record.tasks_completed, 2);
    }

    #[test]
    fn unknown_addresses_are_ignored() {
        let mut registry = WorkerRegistry::new();
        let ghost = addr("10.0.0.2:10000");
        registry.mark_busy(&ghost);
        registry.record_completion(&ghost);
        assert!(registry.is_empty());
        assert!(!registry.is_known(&ghost));
    }
}
