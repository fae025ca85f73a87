//! Identifiers shared by every layer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::constants::{LIKE_REACTION, REQUEST_ID_HEX_LEN, REQUEST_ID_SIZE};
use super::error::DecodeError;

/// Opaque identifier of an interactable entity (e.g. a post).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create an entity id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque identifier of the user performing an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    /// Create an actor id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ActorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Label of a multi-type reaction ("love", "haha", ...).
///
/// Ordered so per-type counts iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReactionType(String);

impl ReactionType {
    /// Create a reaction type.
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The implicit type of single-type toggles.
    pub fn like() -> Self {
        Self::new(LIKE_REACTION)
    }

    /// Borrow the label.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReactionType {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// Client-generated token identifying one mutation request.
///
/// Sent with the remote toggle call and echoed back by the server. Encoded
/// on the wire as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId([u8; REQUEST_ID_SIZE]);

impl RequestId {
    /// Create a request id from raw bytes.
    pub fn from_bytes(bytes: [u8; REQUEST_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random request id.
    pub fn generate() -> Self {
        Self(rand::random())
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; REQUEST_ID_SIZE] {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for RequestId {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != REQUEST_ID_HEX_LEN {
            return Err(DecodeError::InvalidRequestId(format!(
                "expected {REQUEST_ID_HEX_LEN} hex characters, got {}",
                s.len()
            )));
        }
        let mut bytes = [0u8; REQUEST_ID_SIZE];
        hex::decode_to_slice(s, &mut bytes)
            .map_err(|e| DecodeError::InvalidRequestId(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl From<[u8; REQUEST_ID_SIZE]> for RequestId {
    fn from(bytes: [u8; REQUEST_ID_SIZE]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
