//! Team balancing
//!
//! This module splits a roster into teams of similar strength:
//! - Layout resolution from explicit sizes, a team count, or the player count
//! - Controlled shuffling of near-equal players so repeated requests vary
//! - A rotated snake draft with optional regional seeding

pub mod balancer;
pub mod randomize;
pub mod sizing;

pub use balancer::{BalanceConstraints, TeamBalancer};
pub use randomize::randomize_order;
pub use sizing::{even_sizes, parse_team_format, recommended_team_count, TeamLayout};
