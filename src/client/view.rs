//! View adapter
//!
//! Read-only projection of store entities for one actor. Renders what the
//! UI shows and decides when the "just reacted" animation plays.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::broadcast::{self, error::RecvError};

use crate::core::{ActorId, EntityId, ReactionType};
use crate::store::{EntityStore, InteractableEntity, StoreEvent};
use crate::sync::{InFlightTracker, ToggleResult};

/// What the UI renders for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityView {
    /// Whether the actor currently holds an interaction.
    pub reacted: bool,
    /// The actor's interaction type (`like` for single-type entities).
    pub reaction_type: Option<ReactionType>,
    /// Total count.
    pub count: u64,
    /// Per-type counts, empty for single-type entities.
    pub counts_by_type: BTreeMap<ReactionType, u64>,
    /// A toggle is in flight; the control should be disabled.
    pub pending: bool,
    /// The optimistic state was left behind by a request that settled with
    /// a stale response. Nothing is in flight and the next toggle adopts it.
    pub stale: bool,
    /// Play the "just reacted" animation.
    pub animate: bool,
}

/// Change observed by [`ViewAdapter::changed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewChange {
    /// One entity changed.
    Entity(StoreEvent),
    /// Events were missed; re-render everything shown.
    Lagged(u64),
}

/// Renders store entities for one actor.
#[derive(Debug)]
pub struct ViewAdapter {
    store: EntityStore,
    actor: ActorId,
    events: broadcast::Receiver<StoreEvent>,
    last_reacted: HashMap<EntityId, bool>,
    tracker: Option<InFlightTracker<ToggleResult>>,
}

impl ViewAdapter {
    /// Create an adapter over `store` for `actor`.
    pub fn new(store: EntityStore, actor: ActorId) -> Self {
        let events = store.subscribe();
        Self {
            store,
            actor,
            events,
            last_reacted: HashMap::new(),
            tracker: None,
        }
    }

    /// Consult `tracker` for orphaned requests, so an entity left pending
    /// by a stale response stays triggerable.
    pub fn with_tracker(mut self, tracker: InFlightTracker<ToggleResult>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Actor this adapter renders for.
    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    /// Render an entity, or `None` if the store does not hold it.
    ///
    /// `animate` is set when the actor's interaction appeared since this
    /// adapter last rendered the entity.
    pub fn render(&mut self, entity_id: &EntityId) -> Option<EntityView> {
        let entity = self.store.read(entity_id).ok()?;
        let state = entity.state();
        let reacted = state.has_interacted(&self.actor);

        let previous = self.last_reacted.insert(entity_id.clone(), reacted);
        let animate = reacted && previous == Some(false);
        let stale = self.is_orphaned(&entity);

        Some(EntityView {
            reacted,
            reaction_type: state.reaction_of(&self.actor),
            count: state.count,
            counts_by_type: state.counts_by_type.clone(),
            pending: entity.is_pending() && !stale,
            stale,
            animate,
        })
    }

    /// Whether a toggle may be triggered on the entity right now.
    pub fn can_trigger(&self, entity_id: &EntityId) -> bool {
        self.store
            .read(entity_id)
            .map(|entity| !entity.is_pending() || self.is_orphaned(&entity))
            .unwrap_or(false)
    }

    /// Wait for the next store change.
    pub async fn changed(&mut self) -> ViewChange {
        loop {
            match self.events.recv().await {
                Ok(event) => return ViewChange::Entity(event),
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!(actor_id = %self.actor, missed, "view adapter lagged");
                    return ViewChange::Lagged(missed);
                }
                // The adapter's store handle keeps the feed open.
                Err(RecvError::Closed) => self.events = self.store.subscribe(),
            }
        }
    }

    fn is_orphaned(&self, entity: &InteractableEntity) -> bool {
        match (&self.tracker, entity.pending_owner()) {
            (Some(tracker), Some(owner)) => tracker.is_orphaned(entity.id(), owner),
            _ => false,
        }
    }

    /// Forget render history, so no animation plays on the next render.
    pub fn reset(&mut self) {
        self.last_reacted.clear();
    }
}
