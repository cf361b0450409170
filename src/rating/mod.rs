//! Rating schemes and rating persistence
//!
//! This module provides the three rating schemes behind one calculator
//! capability, the match records they consume, and the storage contracts
//! used to persist their results.

pub mod calculator;
pub mod multi_team;
pub mod placement;
pub mod simple;
pub mod storage;

// Re-export commonly used types
pub use calculator::{
    Diagnostic, MatchContext, MatchTeam, Participant, RatingCalculator, RatingChange, RatingScheme,
    RatingUpdate,
};
pub use multi_team::{classify_field, FieldKind, FieldSummary, MultiTeamSkillEstimator};
pub use placement::{
    base_score, expected_team_rating_for_rank, Breakdown, PlacementRatingCalculator, RatingTier,
};
pub use simple::{SimpleTeamRatingUpdater, TeamOutcome};
pub use storage::{InMemoryRatingStorage, RatingEntry, RatingKey, RatingStorage, RosterProvider};
