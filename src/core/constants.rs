//! Engine constants and defaults.

use std::time::Duration;

// =============================================================================
// DEDUPLICATION
// =============================================================================

/// Window during which repeated toggles on one entity coalesce into a
/// single network request.
pub const DEFAULT_DEDUPE_WINDOW: Duration = Duration::from_millis(500);

// =============================================================================
// REQUEST IDENTIFIERS
// =============================================================================

/// Request id size in bytes (128 random bits).
pub const REQUEST_ID_SIZE: usize = 16;

/// Request id length when hex encoded on the wire.
pub const REQUEST_ID_HEX_LEN: usize = REQUEST_ID_SIZE * 2;

// =============================================================================
// STORE
// =============================================================================

/// Default capacity of the store change feed.
///
/// Receivers that fall further behind than this observe a lag and should
/// re-read the entities they render.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Reaction type used by single-type ("like") toggles in outcomes.
pub const LIKE_REACTION: &str = "like";

// =============================================================================
// REMOTE STATUS CODES
// =============================================================================

/// Status reported when the toggle payload does not match the entity mode.
pub const STATUS_BAD_REQUEST: u16 = 400;

/// Status reported for an unknown entity.
pub const STATUS_NOT_FOUND: u16 = 404;

/// Status reported for an injected or internal server failure.
pub const STATUS_SERVER_ERROR: u16 = 500;
