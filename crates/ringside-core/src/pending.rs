//! The queue of decision calls that have not resolved yet.
//!
//! The scheduler is the only writer. Readers (the engine's callers, a
//! status endpoint, a test) get a point-in-time copy through
//! [`PendingQueue::snapshot`] and never hold the lock.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use ringside_types::{EngineRequest, RequestId, RequestStatus};

/// Shared handle to the in-flight requests, keyed by request id.
#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    inner: Arc<RwLock<BTreeMap<RequestId, EngineRequest>>>,
}

impl PendingQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly issued request.
    pub fn insert(&self, request: EngineRequest) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(request.request_id, request);
    }

    /// Record that another attempt is starting, or that the last one failed.
    pub fn update(&self, request_id: RequestId, attempts: u32, status: RequestStatus) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(request) = guard.get_mut(&request_id) {
            request.attempts = attempts;
            request.status = status;
        }
    }

    /// Stop tracking a resolved request.
    pub fn remove(&self, request_id: RequestId) -> Option<EngineRequest> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.remove(&request_id)
    }

    /// A copy of every unresolved request, ordered by request id.
    pub fn snapshot(&self) -> Vec<EngineRequest> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.values().cloned().collect()
    }

    /// Number of unresolved requests.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
