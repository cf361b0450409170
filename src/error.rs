//! Error types for the rating engine and team balancer
//!
//! Validation problems name the exact constraint that was not met so callers can
//! surface them verbatim. Computation errors are internal invariant violations
//! and are never accompanied by a partial result.

use crate::types::{CompetitorId, SchemeKind};

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error returned by the engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Internal computation error: {message}")]
    Computation { message: String },

    #[error("Stale {scheme} rating for competitor {competitor}: it changed since the match was read")]
    StaleRating {
        competitor: CompetitorId,
        scheme: SchemeKind,
    },

    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl EngineError {
    /// Build a computation error from anything printable
    pub fn computation(message: impl Into<String>) -> Self {
        Self::Computation {
            message: message.into(),
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::Computation { .. } => "computation",
            EngineError::StaleRating { .. } => "stale_rating",
            EngineError::Storage { .. } => "storage",
        }
    }
}

/// A malformed or unsatisfiable request
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("player count {count} is outside the allowed range {min}..={max}")]
    PlayerCount { count: usize, min: usize, max: usize },

    #[error("team count {count} is outside the allowed range {min}..={max}")]
    TeamCount { count: usize, min: usize, max: usize },

    #[error("requested team sizes add up to {requested} but {players} players were supplied")]
    SizeMismatch { requested: usize, players: usize },

    #[error("team slot {index} has size zero")]
    EmptyTeamSlot { index: usize },

    #[error("layout {requested} does not fit {players} players, which always play as {required}")]
    FixedLayout {
        requested: String,
        players: usize,
        required: String,
    },

    #[error("region {region} needs {required} players (one per team) but only {available} are available")]
    InsufficientRegionalPlayers {
        region: String,
        available: usize,
        required: usize,
    },

    #[error("competitor {id} appears more than once")]
    DuplicateCompetitor { id: CompetitorId },

    #[error("team {team} has no members")]
    EmptyTeam { team: u32 },

    #[error("team {team} has no placement")]
    MissingPlacement { team: u32 },

    #[error("team {team} has invalid placement {placement}")]
    InvalidPlacement { team: u32, placement: u32 },

    #[error("the {scheme} scheme cannot rate a match with {count} teams")]
    TeamCountForScheme { scheme: SchemeKind, count: usize },

    #[error("invalid team format '{input}', expected sizes like 4:4:2")]
    InvalidTeamFormat { input: String },

    #[error("competitor {id} has a non-finite rating or non-positive uncertainty")]
    InvalidRating { id: CompetitorId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_constraint() {
        let err: EngineError = ValidationError::InsufficientRegionalPlayers {
            region: "NA".to_string(),
            available: 1,
            required: 3,
        }
        .into();

        let message = err.to_string();
        assert!(message.contains("NA"));
        assert!(message.contains("3"));
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(EngineError::computation("boom").kind(), "computation");
        let stale = EngineError::StaleRating {
            competitor: "p1".to_string(),
            scheme: SchemeKind::Placement,
        };
        assert_eq!(stale.kind(), "stale_rating");
        assert!(stale.to_string().contains("placement"));
    }
}
