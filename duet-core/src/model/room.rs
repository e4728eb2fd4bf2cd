use crate::error::PreconditionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-supplied room identifier. Opaque, but never empty once parsed.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Trims surrounding whitespace and rejects an empty result.
    pub fn parse(raw: &str) -> Result<Self, PreconditionError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PreconditionError::EmptyRoomId);
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
