//! Team balancing configuration

use serde::{Deserialize, Serialize};

/// Tunables for the team balancer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Width of the rating bands shuffled internally
    pub band_width: f64,
    /// Adjacent players closer than this form a shufflable run
    pub similarity_threshold: f64,
    /// Uncertainties subtracted from the mean for the effective rating
    pub uncertainty_weight: f64,
    pub min_players: usize,
    pub max_players: usize,
    pub max_teams: usize,
    /// Up to this many players always play as a single team
    pub single_team_threshold: usize,
    /// Exactly this many players are split two and three
    pub split_threshold: usize,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            band_width: 100.0,
            similarity_threshold: 50.0,
            uncertainty_weight: 0.5,
            min_players: 1,
            max_players: 24,
            max_teams: 6,
            single_team_threshold: 4,
            split_threshold: 5,
        }
    }
}
