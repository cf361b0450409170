//! Teamforge - rating engine and team balancer for community scrim groups
//!
//! This crate splits rosters into balanced teams and keeps per-group player
//! ratings under three interchangeable schemes: a win/loss baseline, a
//! placement-based scheme with auditable breakdowns, and a multi-team
//! Plackett-Luce scheme that accounts for unseen opponents.

pub mod balance;
pub mod config;
pub mod error;
pub mod metrics;
pub mod rating;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{EngineError, Result, ValidationError};
pub use types::*;

// Re-export key components
pub use balance::{BalanceConstraints, TeamBalancer, TeamLayout};
pub use rating::{MatchContext, RatingCalculator, RatingScheme, RatingUpdate};
pub use service::MatchmakingEngine;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
