//! Remote collaborator interfaces.
//!
//! The transport behind these traits (HTTP client, RPC stub, ...) owns retry
//! and timeout policy; the engine only adds an optional overall deadline.

use async_trait::async_trait;

use super::message::{ToggleRequest, ToggleResponse};
use crate::core::{EntityId, RemoteError};
use crate::store::CanonicalEntity;

/// Remote toggle endpoint.
///
/// # Requirements
///
/// - MUST be idempotent per `request_id`: replaying a request never toggles twice
/// - MUST echo the `request_id` it received
#[async_trait]
pub trait ToggleEndpoint: Send + Sync {
    /// Toggle the actor's interaction on the entity.
    async fn toggle(&self, request: ToggleRequest) -> Result<ToggleResponse, RemoteError>;
}

/// Read-only entity fetch, used by reconciliation.
#[async_trait]
pub trait EntityReader: Send + Sync {
    /// Fetch the canonical state of an entity.
    async fn get_by_id(&self, entity_id: &EntityId) -> Result<CanonicalEntity, RemoteError>;
}
