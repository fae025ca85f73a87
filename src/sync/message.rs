//! Toggle wire messages
//!
//! JSON shapes exchanged with the remote toggle endpoint. Responses are a
//! tagged union so each variant's required fields are enforced by the type:
//!
//! ```text
//! { "kind": "like",     "requestId": "...", "liked": true,  "likeCount": 1, "entity": {...} }
//! { "kind": "reaction", "requestId": "...", "reacted": true, "reactionType": "love",
//!   "count": 3, "countsByType": { "love": 2, "wow": 1 }, "entity": {...} }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{ActorId, DecodeError, EntityId, ReactionType, RemoteError, RequestId};
use crate::store::{CanonicalEntity, InteractionMode};

/// Outbound toggle call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    /// Client-generated id; the server must echo it.
    pub request_id: RequestId,
    /// Target entity.
    pub entity_id: EntityId,
    /// Acting user.
    pub actor_id: ActorId,
    /// Reaction type for multi-type toggles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction_type: Option<ReactionType>,
}

impl ToggleRequest {
    /// Encode as JSON.
    pub fn encode(&self) -> Result<Vec<u8>, DecodeError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from JSON.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Result of a single-type toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeResult {
    /// Echoed request id.
    pub request_id: RequestId,
    /// Whether the actor now holds a like.
    pub liked: bool,
    /// Total likes.
    pub like_count: u64,
    /// Canonical entity after the toggle.
    pub entity: CanonicalEntity,
}

/// Result of a multi-type toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionResult {
    /// Echoed request id.
    pub request_id: RequestId,
    /// Whether the actor now holds a reaction.
    pub reacted: bool,
    /// The actor's reaction type, if any.
    #[serde(default)]
    pub reaction_type: Option<ReactionType>,
    /// Total reactions.
    pub count: u64,
    /// Reactions per type.
    #[serde(default)]
    pub counts_by_type: BTreeMap<ReactionType, u64>,
    /// Canonical entity after the toggle.
    pub entity: CanonicalEntity,
}

/// Response of the remote toggle endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToggleResponse {
    /// Single-type toggle.
    Like(LikeResult),
    /// Multi-type toggle.
    Reaction(ReactionResult),
}

impl ToggleResponse {
    /// Build the response describing `entity` from `actor`'s point of view.
    ///
    /// The variant follows the entity's mode.
    pub fn for_actor(request_id: RequestId, actor: &ActorId, entity: CanonicalEntity) -> Self {
        let state = &entity.state;
        match state.mode() {
            InteractionMode::Like => ToggleResponse::Like(LikeResult {
                request_id,
                liked: state.has_interacted(actor),
                like_count: state.count,
                entity,
            }),
            InteractionMode::Reaction => ToggleResponse::Reaction(ReactionResult {
                request_id,
                reacted: state.has_interacted(actor),
                reaction_type: state.reaction_of(actor),
                count: state.count,
                counts_by_type: state.counts_by_type.clone(),
                entity,
            }),
        }
    }

    /// Echoed request id.
    pub fn request_id(&self) -> RequestId {
        match self {
            ToggleResponse::Like(result) => result.request_id,
            ToggleResponse::Reaction(result) => result.request_id,
        }
    }

    /// Canonical entity carried by the response.
    pub fn entity(&self) -> &CanonicalEntity {
        match self {
            ToggleResponse::Like(result) => &result.entity,
            ToggleResponse::Reaction(result) => &result.entity,
        }
    }

    /// Check that the response describes `entity_id` in a matching mode.
    pub fn check_entity(&self, entity_id: &EntityId) -> Result<(), RemoteError> {
        let entity = self.entity();
        if &entity.id != entity_id {
            return Err(RemoteError::Malformed(format!(
                "response describes entity {}, expected {}",
                entity.id, entity_id
            )));
        }

        let expected = match self {
            ToggleResponse::Like(_) => InteractionMode::Like,
            ToggleResponse::Reaction(_) => InteractionMode::Reaction,
        };
        if entity.state.mode() != expected {
            return Err(RemoteError::Malformed(format!(
                "{} response carries a {} entity",
                expected.as_str(),
                entity.state.mode().as_str()
            )));
        }
        Ok(())
    }

    /// Encode as JSON.
    pub fn encode(&self) -> Result<Vec<u8>, DecodeError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from JSON.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(data)?)
    }
}
