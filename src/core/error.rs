//! Error types for the toggle engine.
//!
//! Every error is `Clone`: a single settled result is handed to the leading
//! caller and to every caller that joined it.

use thiserror::Error;

use super::types::{ActorId, EntityId, ReactionType, RequestId};

/// Failures reported by the remote endpoints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The call never produced a response (connection reset, DNS, ...).
    #[error("network failure: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("server returned status {code}: {message}")]
    Status {
        /// Status code.
        code: u16,
        /// Server supplied message.
        message: String,
    },

    /// The call did not settle within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Errors decoding identifiers or wire messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Request id is not 32 hex characters.
    #[error("invalid request id: {0}")]
    InvalidRequestId(String),

    /// JSON payload did not match the message schema.
    #[error("invalid json: {0}")]
    Json(String),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        DecodeError::Json(err.to_string())
    }
}

impl From<DecodeError> for RemoteError {
    fn from(err: DecodeError) -> Self {
        RemoteError::Malformed(err.to_string())
    }
}

/// A broken interaction-state invariant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Total count differs from the number of interacting actors.
    #[error("count {count} does not match {members} interactions")]
    CountMismatch {
        /// Recorded total.
        count: u64,
        /// Number of interactions actually held.
        members: usize,
    },

    /// An actor holds more than one reaction on the same entity.
    #[error("actor {0} holds more than one reaction")]
    DuplicateActor(ActorId),

    /// A per-type count disagrees with the reaction list.
    #[error("type {reaction_type} counted {recorded}, list holds {counted}")]
    TypeCountMismatch {
        /// Reaction type.
        reaction_type: ReactionType,
        /// Value in the per-type map.
        recorded: u64,
        /// Reactions of that type in the list.
        counted: u64,
    },

    /// A per-type count of zero was stored instead of removing the key.
    #[error("type {0} stored with a zero count")]
    ZeroTypeCount(ReactionType),

    /// Per-type counts do not sum to the total.
    #[error("per-type counts sum to {sum}, total is {count}")]
    TypeSumMismatch {
        /// Sum of the per-type map.
        sum: u64,
        /// Recorded total.
        count: u64,
    },

    /// A single-type entity carries per-type counts.
    #[error("single-type entity carries per-type counts")]
    TypeCountsOnLikes,
}

/// Errors from Entity Store operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The entity was never hydrated into the store.
    #[error("entity {0} not found")]
    NotFound(EntityId),

    /// Another request owns the entity's optimistic state.
    #[error("entity {entity_id} already has a pending mutation ({owner})")]
    AlreadyPending {
        /// Entity.
        entity_id: EntityId,
        /// Request that owns the pending state.
        owner: RequestId,
    },

    /// The caller does not own the entity's pending state.
    #[error("request {request_id} does not own entity {entity_id}")]
    NotOwner {
        /// Entity.
        entity_id: EntityId,
        /// Caller's request.
        request_id: RequestId,
    },

    /// Interaction type presence does not match the entity mode.
    #[error("entity {entity_id} expects a {expected} toggle")]
    InteractionMismatch {
        /// Entity.
        entity_id: EntityId,
        /// Mode the entity uses ("like" or "reaction").
        expected: &'static str,
    },
}

/// Outcome errors of `toggle_interaction`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToggleError {
    /// The response echoed a different request id than the one awaiting it.
    #[error("stale response: expected {expected}, received {received}")]
    StaleResponse {
        /// Request that was awaiting the response.
        expected: RequestId,
        /// Request id the response carried.
        received: RequestId,
    },

    /// The remote call failed and reconciliation was disabled.
    #[error("toggle {request_id} failed: {cause}")]
    TransientNetworkFailure {
        /// Failed request.
        request_id: RequestId,
        /// Remote failure.
        #[source]
        cause: RemoteError,
    },

    /// The remote call failed and the reconciliation read failed too.
    #[error("toggle {request_id} failed ({cause}) and reconciliation failed ({reconcile})")]
    ReconciliationFailure {
        /// Failed request.
        request_id: RequestId,
        /// Original remote failure.
        #[source]
        cause: RemoteError,
        /// Failure of the reconciliation read.
        reconcile: RemoteError,
    },

    /// The remote call failed and the server state shows it was not applied.
    #[error("toggle {request_id} was not applied: {cause}")]
    NotApplied {
        /// Failed request.
        request_id: RequestId,
        /// Original remote failure.
        #[source]
        cause: RemoteError,
    },

    /// Another mutation already owns the entity's optimistic state.
    #[error("entity {entity_id} already has a pending mutation")]
    AlreadyPending {
        /// Entity.
        entity_id: EntityId,
    },

    /// A newer request took over the entity before this one settled.
    #[error("request {request_id} was superseded")]
    Superseded {
        /// Superseded request.
        request_id: RequestId,
    },

    /// The joined request was dropped before it settled.
    #[error("request {request_id} was abandoned before settling")]
    Abandoned {
        /// Abandoned request.
        request_id: RequestId,
    },

    /// The entity is unknown to the store.
    #[error("entity {entity_id} not found")]
    NotFound {
        /// Entity.
        entity_id: EntityId,
    },

    /// Interaction type presence does not match the entity mode.
    #[error("entity {entity_id} expects a {expected} toggle")]
    InteractionMismatch {
        /// Entity.
        entity_id: EntityId,
        /// Expected mode.
        expected: &'static str,
    },
}

impl ToggleError {
    /// Whether the error is surfaced to the end user.
    ///
    /// Stale, superseded and defensive no-op outcomes are absorbed into a
    /// consistent final state and never shown.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            ToggleError::ReconciliationFailure { .. }
                | ToggleError::NotApplied { .. }
                | ToggleError::TransientNetworkFailure { .. }
        )
    }
}

impl From<StoreError> for ToggleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(entity_id) => ToggleError::NotFound { entity_id },
            StoreError::AlreadyPending { entity_id, .. } => ToggleError::AlreadyPending { entity_id },
            StoreError::NotOwner { request_id, .. } => ToggleError::Superseded { request_id },
            StoreError::InteractionMismatch {
                entity_id,
                expected,
            } => ToggleError::InteractionMismatch {
                entity_id,
                expected,
            },
        }
    }
}
