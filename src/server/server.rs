//! In-memory reference server.
//!
//! Implements both remote endpoints over an entity table, with the same
//! toggle rules the client applies optimistically. Fault injection hooks
//! reproduce the failure modes the engine must survive.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::replay::ReplayCache;
use crate::core::{
    EntityId, RemoteError, RequestId, STATUS_BAD_REQUEST, STATUS_NOT_FOUND, STATUS_SERVER_ERROR,
};
use crate::store::{CanonicalEntity, InteractionState, apply_toggle};
use crate::sync::{EntityReader, ToggleEndpoint, ToggleRequest, ToggleResponse};

/// Call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Toggle calls received.
    pub toggle_calls: u64,
    /// Toggles actually applied to an entity.
    pub toggles_applied: u64,
    /// Toggle calls answered from the replay cache.
    pub replays: u64,
    /// Entity reads received.
    pub reads: u64,
}

#[derive(Debug, Default)]
struct Faults {
    fail_toggles: u32,
    apply_then_fail: u32,
    foreign_echo: u32,
    fail_reads: bool,
}

#[derive(Debug, Default)]
struct ServerState {
    entities: HashMap<EntityId, InteractionState>,
    replies: ReplayCache,
    faults: Faults,
    stats: ServerStats,
}

/// In-memory implementation of [`ToggleEndpoint`] and [`EntityReader`].
///
/// Cheap to clone; clones share the entity table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServer {
    state: Arc<Mutex<ServerState>>,
    latency: Option<Duration>,
}

impl InMemoryServer {
    /// Create an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed the server with an entity.
    pub fn with_entity(self, entity: CanonicalEntity) -> Self {
        self.insert(entity);
        self
    }

    /// Insert or replace an entity.
    pub fn insert(&self, entity: CanonicalEntity) {
        self.state.lock().entities.insert(entity.id, entity.state);
    }

    /// Current canonical state of an entity.
    pub fn entity(&self, entity_id: &EntityId) -> Option<CanonicalEntity> {
        self.state
            .lock()
            .entities
            .get(entity_id)
            .map(|state| CanonicalEntity::new(entity_id.clone(), state.clone()))
    }

    /// Reject the next `n` toggle calls with a server error, without
    /// applying them.
    pub fn fail_next_toggles(&self, n: u32) {
        self.state.lock().faults.fail_toggles = n;
    }

    /// Apply the next `n` toggles but lose their responses.
    pub fn apply_then_fail_next(&self, n: u32) {
        self.state.lock().faults.apply_then_fail = n;
    }

    /// Apply the next `n` toggles but echo a request id nobody sent.
    pub fn echo_foreign_id_next(&self, n: u32) {
        self.state.lock().faults.foreign_echo = n;
    }

    /// Make entity reads fail until turned off.
    pub fn fail_reads(&self, enabled: bool) {
        self.state.lock().faults.fail_reads = enabled;
    }

    /// Call counters so far.
    pub fn stats(&self) -> ServerStats {
        self.state.lock().stats
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn handle_toggle(&self, request: &ToggleRequest) -> Result<ToggleResponse, RemoteError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.stats.toggle_calls += 1;

        if state.faults.fail_toggles > 0 {
            state.faults.fail_toggles -= 1;
            tracing::debug!(request_id = %request.request_id, "injected toggle failure");
            return Err(RemoteError::Status {
                code: STATUS_SERVER_ERROR,
                message: "injected failure".into(),
            });
        }

        if let Some(reply) = state.replies.get(&request.request_id) {
            state.stats.replays += 1;
            tracing::debug!(request_id = %request.request_id, "replayed toggle");
            return Ok(reply.clone());
        }

        let entity = state
            .entities
            .get_mut(&request.entity_id)
            .ok_or_else(|| RemoteError::Status {
                code: STATUS_NOT_FOUND,
                message: format!("entity {} not found", request.entity_id),
            })?;

        apply_toggle(entity, &request.actor_id, request.reaction_type.as_ref()).map_err(
            |mode| RemoteError::Status {
                code: STATUS_BAD_REQUEST,
                message: format!("entity {} takes {} toggles", request.entity_id, mode.as_str()),
            },
        )?;

        let canonical = CanonicalEntity::new(request.entity_id.clone(), entity.clone());
        let response = ToggleResponse::for_actor(request.request_id, &request.actor_id, canonical);
        state.replies.insert(response.clone());
        state.stats.toggles_applied += 1;

        tracing::debug!(
            request_id = %request.request_id,
            entity_id = %request.entity_id,
            "applied toggle"
        );

        if state.faults.apply_then_fail > 0 {
            state.faults.apply_then_fail -= 1;
            tracing::debug!(request_id = %request.request_id, "dropping response");
            return Err(RemoteError::Network("response lost".into()));
        }
        if state.faults.foreign_echo > 0 {
            state.faults.foreign_echo -= 1;
            let foreign = RequestId::generate();
            tracing::debug!(request_id = %request.request_id, echoed = %foreign, "echoing foreign id");
            return Ok(ToggleResponse::for_actor(
                foreign,
                &request.actor_id,
                response.entity().clone(),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl ToggleEndpoint for InMemoryServer {
    async fn toggle(&self, request: ToggleRequest) -> Result<ToggleResponse, RemoteError> {
        self.delay().await;
        self.handle_toggle(&request)
    }
}

#[async_trait]
impl EntityReader for InMemoryServer {
    async fn get_by_id(&self, entity_id: &EntityId) -> Result<CanonicalEntity, RemoteError> {
        self.delay().await;
        let mut state = self.state.lock();
        state.stats.reads += 1;

        if state.faults.fail_reads {
            return Err(RemoteError::Network("injected read failure".into()));
        }
        state
            .entities
            .get(entity_id)
            .map(|s| CanonicalEntity::new(entity_id.clone(), s.clone()))
            .ok_or_else(|| RemoteError::Status {
                code: STATUS_NOT_FOUND,
                message: format!("entity {entity_id} not found"),
            })
    }
}
