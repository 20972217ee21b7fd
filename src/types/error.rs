//! Engine error taxonomy
//!
//! Precondition violations are fatal for the specific computation and are
//! never silently defaulted. Producer-level failures inside the rotation
//! build are caught by the caller and degraded to zero candidates.

use serde::{Deserialize, Serialize};

/// Errors raised by the analytics engines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineError {
    /// Session exists but has not been finalized
    SessionNotFinalized { session_id: String },
    /// Session has zero user-authored messages
    EmptySession { session_id: String },
    /// A required trait is absent from every message
    MissingTraitData { trait_key: String },
    /// Session id unknown to the session source
    SessionNotFound { session_id: String },
    /// Document store read/write failure
    Storage { detail: String },
    /// Payload could not be (de)serialized
    Serialization { detail: String },
    /// Two catalog templates share an id
    DuplicateTemplate { id: String },
}

impl EngineError {
    /// Stable code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionNotFinalized { .. } => "E100_SESSION_NOT_FINALIZED",
            Self::EmptySession { .. } => "E101_EMPTY_SESSION",
            Self::MissingTraitData { .. } => "E102_MISSING_TRAIT_DATA",
            Self::SessionNotFound { .. } => "E103_SESSION_NOT_FOUND",
            Self::Storage { .. } => "E200_STORAGE",
            Self::Serialization { .. } => "E201_SERIALIZATION",
            Self::DuplicateTemplate { .. } => "E300_DUPLICATE_TEMPLATE",
        }
    }

    /// Is this a build-time precondition violation (vs infrastructure)?
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFinalized { .. }
                | Self::EmptySession { .. }
                | Self::MissingTraitData { .. }
        )
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionNotFinalized { session_id } => {
                write!(f, "{}: session {} not finalized", self.code(), session_id)
            }
            Self::EmptySession { session_id } => {
                write!(f, "{}: session {} has no user messages", self.code(), session_id)
            }
            Self::MissingTraitData { trait_key } => {
                write!(f, "{}: trait {} missing from session", self.code(), trait_key)
            }
            Self::SessionNotFound { session_id } => {
                write!(f, "{}: session {} not found", self.code(), session_id)
            }
            Self::Storage { detail } => write!(f, "{}: {}", self.code(), detail),
            Self::Serialization { detail } => write!(f, "{}: {}", self.code(), detail),
            Self::DuplicateTemplate { id } => {
                write!(f, "{}: duplicate template id {}", self.code(), id)
            }
        }
    }
}

impl std::error::Error for EngineError {}
