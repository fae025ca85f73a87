//! Entity Store
//!
//! Single source of truth for interaction state visible to the view layer.
//! All mutation goes through `hydrate`, `apply_optimistic`, `commit` and
//! `rollback`; the pending flag and rollback snapshot are owned by exactly
//! one request at a time.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::entity::{CanonicalEntity, InteractableEntity, InteractionState, Intent};
use super::transition::apply_toggle;
use crate::core::{ActorId, DEFAULT_EVENT_CAPACITY, EntityId, ReactionType, RequestId, StoreError};

/// Kind of store mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEventKind {
    /// Entity loaded or refreshed from a canonical fetch.
    Hydrated,
    /// Optimistic toggle written.
    Optimistic,
    /// Canonical state committed, pending cleared.
    Committed,
    /// Snapshot restored, pending cleared.
    RolledBack,
}

/// Change notification published after every store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    /// Mutated entity.
    pub entity_id: EntityId,
    /// What happened.
    pub kind: StoreEventKind,
    /// Request responsible, if any.
    pub request_id: Option<RequestId>,
}

/// Result of [`EntityStore::hydrate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrateOutcome {
    /// Entity was not known before.
    Inserted,
    /// Known entity replaced with the fetched state.
    Refreshed,
    /// Entity is pending; the fetched state was ignored.
    SkippedPending,
}

/// Normalized store of interactable entities.
///
/// Cheap to clone; clones share the same table and change feed. Every
/// operation completes synchronously, so callers on one event loop observe
/// each mutation atomically.
#[derive(Debug, Clone)]
pub struct EntityStore {
    entities: Arc<Mutex<HashMap<EntityId, InteractableEntity>>>,
    events: broadcast::Sender<StoreEvent>,
}

impl EntityStore {
    /// Create an empty store with the default change-feed capacity.
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create an empty store with a custom change-feed capacity.
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            entities: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    /// Subscribe to the change feed.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Read a copy of an entity.
    pub fn read(&self, entity_id: &EntityId) -> Result<InteractableEntity, StoreError> {
        self.entities
            .lock()
            .get(entity_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(entity_id.clone()))
    }

    /// Number of entities held.
    pub fn len(&self) -> usize {
        self.entities.lock().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Request that owns the entity's pending state, if any.
    pub fn pending_owner(&self, entity_id: &EntityId) -> Option<RequestId> {
        self.entities
            .lock()
            .get(entity_id)
            .and_then(InteractableEntity::pending_owner)
    }

    /// Load or refresh an entity from a canonical fetch.
    ///
    /// A pending entity is left alone: its in-flight request will commit or
    /// roll back on its own.
    pub fn hydrate(&self, canonical: CanonicalEntity) -> HydrateOutcome {
        if let Err(violation) = canonical.state.validate() {
            tracing::warn!(entity_id = %canonical.id, %violation, "hydrating inconsistent entity");
        }

        let entity_id = canonical.id.clone();
        let outcome = {
            let mut entities = self.entities.lock();
            match entities.get_mut(&entity_id) {
                Some(entity) if entity.is_pending() => HydrateOutcome::SkippedPending,
                Some(entity) => {
                    entity.state = canonical.state;
                    HydrateOutcome::Refreshed
                }
                None => {
                    entities.insert(entity_id.clone(), InteractableEntity::from_canonical(canonical));
                    HydrateOutcome::Inserted
                }
            }
        };

        if outcome == HydrateOutcome::SkippedPending {
            tracing::debug!(entity_id = %entity_id, "hydrate skipped, entity is pending");
        } else {
            self.publish(entity_id, StoreEventKind::Hydrated, None);
        }
        outcome
    }

    /// Write the optimistic result of one toggle and take ownership of the
    /// entity's pending state.
    ///
    /// If the entity is already pending, the call succeeds only when the
    /// current owner is `supersedes`; ownership then transfers to `owner`,
    /// the original snapshot is kept and the toggle is applied on top of the
    /// current optimistic state. Any other pending entity yields
    /// [`StoreError::AlreadyPending`] without side effects.
    pub fn apply_optimistic(
        &self,
        entity_id: &EntityId,
        actor: &ActorId,
        reaction: Option<&ReactionType>,
        owner: RequestId,
        supersedes: Option<RequestId>,
    ) -> Result<Intent, StoreError> {
        let intent = {
            let mut entities = self.entities.lock();
            let entity = entities
                .get_mut(entity_id)
                .ok_or_else(|| StoreError::NotFound(entity_id.clone()))?;

            if let Some(current) = entity.pending {
                if supersedes != Some(current) {
                    return Err(StoreError::AlreadyPending {
                        entity_id: entity_id.clone(),
                        owner: current,
                    });
                }
            }

            let mut next = entity.state.clone();
            let intent = apply_toggle(&mut next, actor, reaction).map_err(|mode| {
                StoreError::InteractionMismatch {
                    entity_id: entity_id.clone(),
                    expected: mode.as_str(),
                }
            })?;

            let previous = std::mem::replace(&mut entity.state, next);
            if entity.snapshot.is_none() {
                entity.snapshot = Some(previous);
            }
            entity.pending = Some(owner);
            intent
        };

        self.publish(entity_id.clone(), StoreEventKind::Optimistic, Some(owner));
        Ok(intent)
    }

    /// Replace the entity's state with the server's canonical state and clear
    /// the pending state.
    ///
    /// Only the owning request may commit.
    pub fn commit(
        &self,
        entity_id: &EntityId,
        canonical: InteractionState,
        owner: RequestId,
    ) -> Result<(), StoreError> {
        if let Err(violation) = canonical.validate() {
            tracing::warn!(
                entity_id = %entity_id,
                request_id = %owner,
                %violation,
                "committing inconsistent canonical state"
            );
        }

        {
            let mut entities = self.entities.lock();
            let entity = entities
                .get_mut(entity_id)
                .ok_or_else(|| StoreError::NotFound(entity_id.clone()))?;

            if entity.pending != Some(owner) {
                return Err(StoreError::NotOwner {
                    entity_id: entity_id.clone(),
                    request_id: owner,
                });
            }

            entity.state = canonical;
            entity.pending = None;
            entity.snapshot = None;
        }

        self.publish(entity_id.clone(), StoreEventKind::Committed, Some(owner));
        Ok(())
    }

    /// Restore the snapshot taken when the optimistic mutation began and
    /// clear the pending state.
    ///
    /// Returns `false` (and does nothing) if `owner` does not hold a
    /// snapshot for the entity.
    pub fn rollback(&self, entity_id: &EntityId, owner: RequestId) -> bool {
        {
            let mut entities = self.entities.lock();
            let Some(entity) = entities.get_mut(entity_id) else {
                return false;
            };
            if entity.pending != Some(owner) {
                return false;
            }
            let Some(snapshot) = entity.snapshot.take() else {
                return false;
            };

            entity.state = snapshot;
            entity.pending = None;
        }

        self.publish(entity_id.clone(), StoreEventKind::RolledBack, Some(owner));
        true
    }

    fn publish(&self, entity_id: EntityId, kind: StoreEventKind, request_id: Option<RequestId>) {
        // No subscribers is fine.
        let _ = self.events.send(StoreEvent {
            entity_id,
            kind,
            request_id,
        });
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
