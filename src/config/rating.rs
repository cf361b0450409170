//! Rating system configuration

use serde::{Deserialize, Serialize};

/// Tunables shared by the three rating schemes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Simple scheme K for two-team results
    pub k_factor: f64,
    /// Simple scheme K for ranked results
    pub ranked_k_factor: f64,
    /// Uncertainty at which K is applied unscaled
    pub reference_uncertainty: f64,
    pub uncertainty_decay: f64,
    pub uncertainty_floor: f64,
    /// Placement scheme absolute change limit
    pub max_change: f64,
    /// Placement scheme change limit as a fraction of the current rating
    pub max_change_fraction: f64,
    /// Weng-Lin beta for the multi-team scheme
    pub beta: f64,
    pub uncertainty_tolerance: f64,
    /// Members assumed on each unseen external team
    pub assumed_external_team_size: usize,
    /// Multiplier from multi-team mean to the 1500-style display rating
    pub display_scale: f64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            k_factor: 32.0,
            ranked_k_factor: 20.0,
            reference_uncertainty: 350.0,
            uncertainty_decay: 0.99,
            uncertainty_floor: 50.0,
            max_change: 150.0,
            max_change_fraction: 0.15,
            beta: 25.0 / 6.0,
            uncertainty_tolerance: 0.000_001,
            assumed_external_team_size: 4,
            display_scale: 60.0,
        }
    }
}
