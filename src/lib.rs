//! # Toggle Sync
//!
//! Optimistic toggle engine for like and reaction controls.
//!
//! A toggle is shown to the user immediately, sent to the server with a
//! unique request id, and then either committed with the server's canonical
//! state or undone. The engine keeps the rendered state consistent with the
//! server under duplicate clicks, high latency and partial failures:
//!
//! - **Deduplication**: toggles on one entity within a short window share a
//!   single network request
//! - **Ownership**: only the request that wrote the optimistic state may
//!   commit or roll it back
//! - **Stale protection**: a response echoing the wrong request id never
//!   touches the store
//! - **Reconciliation**: after a failure the engine fetches the canonical
//!   entity before deciding to roll back
//!
//! ## Feature Flags
//!
//! - `sync` (default): tracker, coordinator, reconciliation, wire messages
//! - `client` (default): `ToggleEngine` facade and view adapter
//! - `server` (default): in-memory reference server
//!
//! ## Modules
//!
//! - [`core`]: identifiers, constants, error types and traits (always included)
//! - [`store`]: interaction state and the Entity Store (always included)
//! - [`sync`]: toggle coordination (requires `sync` feature)
//! - [`client`]: high-level engine API (requires `client` feature)
//! - [`server`]: reference server (requires `server` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use toggle_sync::prelude::*;
//!
//! # fn block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! # block_on(async {
//! let post = CanonicalEntity::new(
//!     "post-1",
//!     InteractionState::from_reactions([Reaction::new("bob", "love")]),
//! );
//! let server = Arc::new(InMemoryServer::new().with_entity(post.clone()));
//!
//! let engine = ToggleEngine::builder()
//!     .notifier(|err: &ToggleError| eprintln!("{err}"))
//!     .build(server.clone(), server);
//! engine.hydrate(post);
//!
//! let mut view = engine.view("alice");
//! engine.react(&"post-1".into(), &"alice".into(), "haha").await?;
//!
//! let rendered = view.render(&"post-1".into()).unwrap();
//! assert!(rendered.reacted);
//! assert_eq!(rendered.count, 2);
//! # Ok::<(), ToggleError>(())
//! # }).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Entity Store (always included)
pub mod store;

// Sync layer (feature-gated)
#[cfg(feature = "sync")]
#[cfg_attr(docsrs, doc(cfg(feature = "sync")))]
pub mod sync;

// Client API (feature-gated)
#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod client;

// Server API (feature-gated)
#[cfg(feature = "server")]
#[cfg_attr(docsrs, doc(cfg(feature = "server")))]
pub mod server;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits and types
    pub use crate::core::*;

    // Store types
    pub use crate::store::{
        CanonicalEntity, EntityStore, InteractableEntity, InteractionState, Reaction,
        StoreEvent, StoreEventKind,
    };

    // Coordination (when enabled)
    #[cfg(feature = "sync")]
    pub use crate::sync::{
        EntityReader, ToggleCoordinator, ToggleEndpoint, ToggleOutcome, ToggleRequest,
        ToggleResponse, ToggleResult,
    };

    // Engine facade (when enabled)
    #[cfg(feature = "client")]
    pub use crate::client::{EngineConfig, EntityView, ToggleEngine, ToggleEngineBuilder, ViewAdapter};

    // Reference server (when enabled)
    #[cfg(feature = "server")]
    pub use crate::server::InMemoryServer;
}

// Re-export commonly used items at crate root
pub use self::core::{ActorId, EntityId, ReactionType, RequestId, ToggleError};
pub use self::store::{CanonicalEntity, EntityStore, InteractionState};

#[cfg(feature = "client")]
pub use client::{ToggleEngine, ToggleEngineBuilder};
