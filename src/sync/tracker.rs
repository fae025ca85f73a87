//! In-flight request tracker
//!
//! Maps each entity to its currently outstanding mutation request. Toggles
//! arriving within the dedupe window join the outstanding request and
//! observe its result instead of issuing their own call; an entry older than
//! the window is replaced so a slow or abandoned request never blocks an
//! entity indefinitely.
//!
//! One tracker exists per engine instance. Nothing here is process-global.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::core::{EntityId, RequestId};

/// One outstanding request.
#[derive(Debug)]
struct Entry<T> {
    request_id: RequestId,
    started_at: Instant,
    result: watch::Receiver<Option<T>>,
}

#[derive(Debug)]
struct Inner<T> {
    entries: HashMap<EntityId, Entry<T>>,
    /// Requests that settled without clearing the entity's pending state.
    orphans: HashMap<EntityId, RequestId>,
}

/// Registry of outstanding requests, keyed by entity.
///
/// Generic over the settled result `T` shared with joining callers.
#[derive(Debug)]
pub struct InFlightTracker<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for InFlightTracker<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for InFlightTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of [`InFlightTracker::acquire_or_join`].
#[derive(Debug)]
pub enum Acquisition<T> {
    /// No recent request existed; the caller owns a new one.
    Acquired(InFlightLease<T>),
    /// A recent request exists; the caller must await it instead.
    Joined(JoinedRequest<T>),
}

impl<T> InFlightTracker<T> {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                orphans: HashMap::new(),
            })),
        }
    }

    /// Acquire a new request for `entity_id` or join the outstanding one.
    pub fn acquire_or_join(&self, entity_id: &EntityId, dedupe_window: Duration) -> Acquisition<T> {
        self.acquire_or_join_at(entity_id, dedupe_window, Instant::now())
    }

    /// Acquire or join at a given time.
    ///
    /// - no entry: create one, `supersedes` is any orphaned request
    /// - entry younger than `dedupe_window`: join it
    /// - older entry: replace it, `supersedes` is the replaced request
    pub fn acquire_or_join_at(
        &self,
        entity_id: &EntityId,
        dedupe_window: Duration,
        now: Instant,
    ) -> Acquisition<T> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let supersedes = match inner.entries.get(entity_id) {
            Some(entry) if now.saturating_duration_since(entry.started_at) < dedupe_window => {
                tracing::debug!(
                    request_id = %entry.request_id,
                    entity_id = %entity_id,
                    "joining in-flight request"
                );
                return Acquisition::Joined(JoinedRequest {
                    request_id: entry.request_id,
                    result: entry.result.clone(),
                });
            }
            Some(stale) => {
                tracing::info!(
                    request_id = %stale.request_id,
                    entity_id = %entity_id,
                    age_ms = now.saturating_duration_since(stale.started_at).as_millis() as u64,
                    "replacing stale in-flight request"
                );
                inner.orphans.remove(entity_id);
                Some(stale.request_id)
            }
            None => inner.orphans.remove(entity_id),
        };

        let request_id = RequestId::generate();
        let (publisher, result) = watch::channel(None);
        inner.entries.insert(
            entity_id.clone(),
            Entry {
                request_id,
                started_at: now,
                result,
            },
        );

        tracing::debug!(
            request_id = %request_id,
            entity_id = %entity_id,
            supersedes = ?supersedes.map(|id| id.to_string()),
            "acquired request"
        );

        Acquisition::Acquired(InFlightLease {
            tracker: self.clone(),
            entity_id: entity_id.clone(),
            request_id,
            supersedes,
            publisher,
            published: false,
        })
    }

    /// Remove the entry for `entity_id` if it still belongs to `request_id`.
    ///
    /// Returns `true` if an entry was removed. A newer entry that replaced a
    /// stale one is never removed by the older request.
    pub fn release(&self, entity_id: &EntityId, request_id: RequestId) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.get(entity_id).map(|entry| entry.request_id) {
            Some(current) if current == request_id => {
                inner.entries.remove(entity_id);
                tracing::debug!(request_id = %request_id, entity_id = %entity_id, "released request");
                true
            }
            Some(current) => {
                tracing::debug!(
                    request_id = %request_id,
                    entity_id = %entity_id,
                    current = %current,
                    "release ignored, entry was replaced"
                );
                false
            }
            None => false,
        }
    }

    /// Record that `request_id` settled while still owning the entity's
    /// pending state, so the next acquisition may take it over.
    pub fn mark_orphaned(&self, entity_id: &EntityId, request_id: RequestId) {
        tracing::debug!(request_id = %request_id, entity_id = %entity_id, "request orphaned");
        self.inner.lock().orphans.insert(entity_id.clone(), request_id);
    }

    /// Orphaned request recorded for `entity_id`, if any.
    pub fn orphan(&self, entity_id: &EntityId) -> Option<RequestId> {
        self.inner.lock().orphans.get(entity_id).copied()
    }

    /// Whether `request_id` is the orphan recorded for `entity_id`.
    pub fn is_orphaned(&self, entity_id: &EntityId, request_id: RequestId) -> bool {
        self.orphan(entity_id) == Some(request_id)
    }

    /// Number of outstanding requests.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether `entity_id` has an outstanding request.
    pub fn is_in_flight(&self, entity_id: &EntityId) -> bool {
        self.inner.lock().entries.contains_key(entity_id)
    }

    /// Drop every entry and orphan record.
    ///
    /// Leases handed out earlier still settle; their release becomes a no-op.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.orphans.clear();
    }
}

/// Ownership of one outstanding request.
///
/// Dropping the lease releases the tracker entry. Callers that joined the
/// request observe the value passed to [`publish`](Self::publish), or an
/// abandoned request if the lease is dropped first.
#[derive(Debug)]
pub struct InFlightLease<T> {
    tracker: InFlightTracker<T>,
    entity_id: EntityId,
    request_id: RequestId,
    supersedes: Option<RequestId>,
    publisher: watch::Sender<Option<T>>,
    published: bool,
}

impl<T> InFlightLease<T> {
    /// Id of the owned request.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Entity the request mutates.
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// Request this one replaced, if any.
    pub fn supersedes(&self) -> Option<RequestId> {
        self.supersedes
    }

    /// Hand the settled result to every joined caller.
    pub fn publish(&mut self, result: T) {
        self.publisher.send_replace(Some(result));
        self.published = true;
    }
}

impl<T> Drop for InFlightLease<T> {
    fn drop(&mut self) {
        if !self.published {
            tracing::debug!(
                request_id = %self.request_id,
                entity_id = %self.entity_id,
                "lease dropped before settling"
            );
        }
        self.tracker.release(&self.entity_id, self.request_id);
    }
}

/// Handle to await another caller's outstanding request.
#[derive(Debug)]
pub struct JoinedRequest<T> {
    request_id: RequestId,
    result: watch::Receiver<Option<T>>,
}

impl<T: Clone> JoinedRequest<T> {
    /// Id of the joined request.
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Wait for the joined request to settle.
    ///
    /// Returns `None` if its lease was dropped without publishing.
    pub async fn wait(mut self) -> Option<T> {
        match self.result.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        }
    }
}
