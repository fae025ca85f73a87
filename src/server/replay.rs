//! Replay cache for idempotent toggles.
//!
//! Remembers the response produced for each request id so a replayed
//! request returns the original answer instead of toggling again.

use std::collections::{HashMap, VecDeque};

use crate::core::RequestId;
use crate::sync::ToggleResponse;

/// Default number of responses remembered.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1024;

/// Bounded map from request id to the response it produced.
///
/// The oldest response is evicted once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct ReplayCache {
    responses: HashMap<RequestId, ToggleResponse>,
    order: VecDeque<RequestId>,
    capacity: usize,
}

impl ReplayCache {
    /// Create a cache holding up to `capacity` responses.
    pub fn new(capacity: usize) -> Self {
        Self {
            responses: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Response previously produced for `request_id`.
    pub fn get(&self, request_id: &RequestId) -> Option<&ToggleResponse> {
        self.responses.get(request_id)
    }

    /// Remember `response` for its request id.
    pub fn insert(&mut self, response: ToggleResponse) {
        let request_id = response.request_id();
        if self.responses.insert(request_id, response).is_some() {
            return;
        }
        self.order.push_back(request_id);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.responses.remove(&evicted);
            }
        }
    }

    /// Number of remembered responses.
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// Whether nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

impl Default for ReplayCache {
    fn default() -> Self {
        Self::new(DEFAULT_REPLAY_CAPACITY)
    }
}
