//! Server state

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use crate::deploy::orchestrator::Orchestrator;

/// Server state shared across handlers
pub struct ServerState {
    pub orchestrator: Orchestrator,
    /// Held for the whole of one deployment; the worker runs one at a time
    pub invocation_lock: Mutex<()>,
    invocations: AtomicU64,
}

impl ServerState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            invocation_lock: Mutex::new(()),
            invocations: AtomicU64::new(0),
        }
    }

    /// Record an invocation and return its sequence number
    pub fn next_invocation(&self) -> u64 {
        self.invocations.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }
}
