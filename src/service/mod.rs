//! Service layer for teamforge
//!
//! This module contains the engine that coordinates balancing, the rating
//! schemes, rating storage and metrics.

pub mod engine;

pub use engine::MatchmakingEngine;
