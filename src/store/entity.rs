//! Interaction state of an entity.
//!
//! [`InteractionState`] is the unit the store snapshots, commits and rolls
//! back. [`CanonicalEntity`] is the server's authoritative view of it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::{ActorId, EntityId, InvariantViolation, ReactionType, RequestId};

/// One actor's reaction on a multi-type entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    /// Reacting actor.
    pub actor: ActorId,
    /// Reaction type.
    pub reaction_type: ReactionType,
}

impl Reaction {
    /// Create a reaction.
    pub fn new(actor: impl Into<ActorId>, reaction_type: impl Into<ReactionType>) -> Self {
        Self {
            actor: actor.into(),
            reaction_type: reaction_type.into(),
        }
    }
}

/// Toggle mode of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    /// Single-type toggles (likes).
    Like,
    /// Multi-type reactions.
    Reaction,
}

impl InteractionMode {
    /// Mode name used in errors.
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionMode::Like => "like",
            InteractionMode::Reaction => "reaction",
        }
    }
}

/// Who currently interacts with an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interactions {
    /// Actors holding a like.
    Likes(BTreeSet<ActorId>),
    /// Reactions, at most one per actor.
    Reactions(Vec<Reaction>),
}

impl Interactions {
    /// Number of interactions held.
    pub fn len(&self) -> usize {
        match self {
            Interactions::Likes(actors) => actors.len(),
            Interactions::Reactions(reactions) => reactions.len(),
        }
    }

    /// Whether nobody interacts.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mode implied by the variant.
    pub fn mode(&self) -> InteractionMode {
        match self {
            Interactions::Likes(_) => InteractionMode::Like,
            Interactions::Reactions(_) => InteractionMode::Reaction,
        }
    }
}

/// Interaction fields of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionState {
    /// Current interactions.
    pub interactions: Interactions,
    /// Total count; equals `interactions.len()`.
    pub count: u64,
    /// Per-type counts for reactions; zero counts are absent.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub counts_by_type: BTreeMap<ReactionType, u64>,
}

impl InteractionState {
    /// Empty single-type state.
    pub fn empty_likes() -> Self {
        Self::from_likes(std::iter::empty::<ActorId>())
    }

    /// Empty multi-type state.
    pub fn empty_reactions() -> Self {
        Self::from_reactions(std::iter::empty())
    }

    /// Build a consistent single-type state from the liking actors.
    pub fn from_likes<I, A>(actors: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<ActorId>,
    {
        let actors: BTreeSet<ActorId> = actors.into_iter().map(Into::into).collect();
        Self {
            count: actors.len() as u64,
            interactions: Interactions::Likes(actors),
            counts_by_type: BTreeMap::new(),
        }
    }

    /// Build a consistent multi-type state from a reaction list.
    ///
    /// A later reaction by the same actor replaces the earlier one.
    pub fn from_reactions(reactions: impl IntoIterator<Item = Reaction>) -> Self {
        let mut list: Vec<Reaction> = Vec::new();
        for reaction in reactions {
            list.retain(|r| r.actor != reaction.actor);
            list.push(reaction);
        }

        let mut counts_by_type = BTreeMap::new();
        for reaction in &list {
            *counts_by_type
                .entry(reaction.reaction_type.clone())
                .or_insert(0) += 1;
        }

        Self {
            count: list.len() as u64,
            interactions: Interactions::Reactions(list),
            counts_by_type,
        }
    }

    /// Toggle mode of this state.
    pub fn mode(&self) -> InteractionMode {
        self.interactions.mode()
    }

    /// The actor's current interaction, if any.
    ///
    /// Likes report [`ReactionType::like`].
    pub fn reaction_of(&self, actor: &ActorId) -> Option<ReactionType> {
        match &self.interactions {
            Interactions::Likes(actors) => actors.contains(actor).then(ReactionType::like),
            Interactions::Reactions(reactions) => reactions
                .iter()
                .find(|r| &r.actor == actor)
                .map(|r| r.reaction_type.clone()),
        }
    }

    /// Whether the actor currently interacts.
    pub fn has_interacted(&self, actor: &ActorId) -> bool {
        match &self.interactions {
            Interactions::Likes(actors) => actors.contains(actor),
            Interactions::Reactions(reactions) => reactions.iter().any(|r| &r.actor == actor),
        }
    }

    /// Check every interaction invariant.
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let members = self.interactions.len();
        if self.count != members as u64 {
            return Err(InvariantViolation::CountMismatch {
                count: self.count,
                members,
            });
        }

        match &self.interactions {
            Interactions::Likes(_) => {
                if !self.counts_by_type.is_empty() {
                    return Err(InvariantViolation::TypeCountsOnLikes);
                }
            }
            Interactions::Reactions(reactions) => {
                let mut seen = BTreeSet::new();
                let mut counted: BTreeMap<&ReactionType, u64> = BTreeMap::new();
                for reaction in reactions {
                    if !seen.insert(&reaction.actor) {
                        return Err(InvariantViolation::DuplicateActor(reaction.actor.clone()));
                    }
                    *counted.entry(&reaction.reaction_type).or_insert(0) += 1;
                }

                for (reaction_type, &recorded) in &self.counts_by_type {
                    if recorded == 0 {
                        return Err(InvariantViolation::ZeroTypeCount(reaction_type.clone()));
                    }
                    let counted = counted.get(reaction_type).copied().unwrap_or(0);
                    if counted != recorded {
                        return Err(InvariantViolation::TypeCountMismatch {
                            reaction_type: reaction_type.clone(),
                            recorded,
                            counted,
                        });
                    }
                }
                for (reaction_type, &counted) in &counted {
                    if !self.counts_by_type.contains_key(*reaction_type) {
                        return Err(InvariantViolation::TypeCountMismatch {
                            reaction_type: (*reaction_type).clone(),
                            recorded: 0,
                            counted,
                        });
                    }
                }

                let sum: u64 = self.counts_by_type.values().sum();
                if sum != self.count {
                    return Err(InvariantViolation::TypeSumMismatch {
                        sum,
                        count: self.count,
                    });
                }
            }
        }

        Ok(())
    }
}

/// The server's authoritative view of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEntity {
    /// Entity id.
    pub id: EntityId,
    /// Interaction fields.
    #[serde(flatten)]
    pub state: InteractionState,
}

impl CanonicalEntity {
    /// Create a canonical entity.
    pub fn new(id: impl Into<EntityId>, state: InteractionState) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }
}

/// The actor's intended state after a toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Whether the actor should hold a like.
    Liked(bool),
    /// Which reaction the actor should hold, if any.
    Reacted(Option<ReactionType>),
}

impl Intent {
    /// Whether `state` already shows this intent for `actor`.
    pub fn is_reflected_in(&self, state: &InteractionState, actor: &ActorId) -> bool {
        match self {
            Intent::Liked(liked) => {
                state.mode() == InteractionMode::Like && state.has_interacted(actor) == *liked
            }
            Intent::Reacted(target) => {
                state.mode() == InteractionMode::Reaction && state.reaction_of(actor) == *target
            }
        }
    }
}

/// A locally held entity.
///
/// Fields are read-only outside the store; all mutation goes through
/// [`EntityStore`](super::EntityStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractableEntity {
    pub(crate) id: EntityId,
    pub(crate) state: InteractionState,
    pub(crate) pending: Option<RequestId>,
    pub(crate) snapshot: Option<InteractionState>,
}

impl InteractableEntity {
    pub(crate) fn from_canonical(canonical: CanonicalEntity) -> Self {
        Self {
            id: canonical.id,
            state: canonical.state,
            pending: None,
            snapshot: None,
        }
    }

    /// Entity id.
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// Current (possibly optimistic) interaction state.
    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    /// Total interaction count.
    pub fn count(&self) -> u64 {
        self.state.count
    }

    /// Whether an optimistic mutation is outstanding.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Request that owns the outstanding mutation.
    pub fn pending_owner(&self) -> Option<RequestId> {
        self.pending
    }

    /// Last server-confirmed state, held while pending.
    pub fn snapshot(&self) -> Option<&InteractionState> {
        self.snapshot.as_ref()
    }
}
