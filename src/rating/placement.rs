//! Placement-based rating scheme
//!
//! A player's change is built from six auditable factors:
//!
//! 1. a base score looked up from the team's placement
//! 2. a multiplier for how strong the opposing teams were
//! 3. an adjustment for the player's rating relative to their own team
//! 4. the preliminary product of the three
//! 5. a tier curve that slows climbing and speeds up falling at the top
//! 6. a clamp to `min(150, 15%)` of the current rating
//!
//! All of them are returned in a [`Breakdown`] so persisted changes can be
//! explained after the fact.

use crate::config::RatingConfig;
use crate::error::{Result, ValidationError};
use crate::rating::calculator::{MatchContext, RatingCalculator, RatingChange, RatingUpdate};
use crate::types::{RatingState, SchemeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Base score for placements 1 through 30
const BASE_SCORES: [f64; 30] = [
    50.0, 35.0, 25.0, 18.0, 12.0, 8.0, 4.0, 0.0, -5.0, -10.0, //
    -16.0, -23.0, -31.0, -40.0, -50.0, -62.0, -75.0, -89.0, -104.0, -120.0, //
    -138.0, -157.0, -177.0, -198.0, -220.0, -243.0, -267.0, -292.0, -318.0, -345.0,
];

/// Placements shown by [`PlacementRatingCalculator::preview_rating_changes`]
pub const PREVIEW_PLACEMENTS: [u32; 8] = [1, 3, 5, 10, 15, 20, 25, 30];

/// Every factor that went into one player's rating change
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub base_score: f64,
    pub opponent_multiplier: f64,
    pub individual_adjustment: f64,
    pub curve_multiplier: f64,
    pub preliminary_change: f64,
    pub final_change: f64,
    pub max_change_limit: f64,
}

/// Display tier of a placement rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RatingTier {
    Learning,
    Novice,
    Beginner,
    Intermediate,
    Advanced,
    Expert,
    Elite,
    Legendary,
}

impl RatingTier {
    pub const ALL: [RatingTier; 8] = [
        RatingTier::Learning,
        RatingTier::Novice,
        RatingTier::Beginner,
        RatingTier::Intermediate,
        RatingTier::Advanced,
        RatingTier::Expert,
        RatingTier::Elite,
        RatingTier::Legendary,
    ];

    /// Tier containing `rating`
    pub fn of(rating: f64) -> Self {
        Self::ALL
            .iter()
            .rev()
            .copied()
            .find(|tier| rating >= tier.min_rating())
            .unwrap_or(RatingTier::Learning)
    }

    /// Lowest rating in the tier
    pub fn min_rating(self) -> f64 {
        match self {
            RatingTier::Learning => f64::NEG_INFINITY,
            RatingTier::Novice => 1000.0,
            RatingTier::Beginner => 1200.0,
            RatingTier::Intermediate => 1400.0,
            RatingTier::Advanced => 1600.0,
            RatingTier::Expert => 1800.0,
            RatingTier::Elite => 2000.0,
            RatingTier::Legendary => 2200.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RatingTier::Learning => "Learning",
            RatingTier::Novice => "Novice",
            RatingTier::Beginner => "Beginner",
            RatingTier::Intermediate => "Intermediate",
            RatingTier::Advanced => "Advanced",
            RatingTier::Expert => "Expert",
            RatingTier::Elite => "Elite",
            RatingTier::Legendary => "Legendary",
        }
    }
}

impl fmt::Display for RatingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Base score for a placement; out-of-table placements take the nearest end
pub fn base_score(placement: u32) -> f64 {
    let index = (placement.max(1) as usize).min(BASE_SCORES.len()) - 1;
    BASE_SCORES[index]
}

/// Multiplier from the gap between the opponents' average and the team's
///
/// `strength_diff` is positive when the opponents were stronger.
pub fn opponent_multiplier(strength_diff: f64, placement: u32) -> f64 {
    let base = if strength_diff > 500.0 {
        2.2
    } else if strength_diff > 300.0 {
        1.8
    } else if strength_diff > 150.0 {
        1.4
    } else if strength_diff > 50.0 {
        1.2
    } else if strength_diff > -50.0 {
        1.0
    } else if strength_diff > -150.0 {
        0.8
    } else if strength_diff > -300.0 {
        0.6
    } else if strength_diff > -500.0 {
        0.4
    } else {
        0.2
    };

    if placement <= 3 && strength_diff < -200.0 {
        // top finish against a much weaker field
        base * 0.7
    } else if placement >= 15 && strength_diff > 200.0 {
        base * 1.3
    } else {
        base
    }
}

/// Dampens players carrying their team, amplifies players being carried
pub fn individual_adjustment(player_rating: f64, team_average: f64) -> f64 {
    let diff = player_rating - team_average;
    if diff > 200.0 {
        0.8
    } else if diff > 100.0 {
        0.9
    } else if diff > -100.0 {
        1.0
    } else if diff > -200.0 {
        1.1
    } else {
        1.2
    }
}

/// Tier curve: slower climbing and faster falling at higher ratings
pub fn curve_multiplier(rating: f64, change: f64) -> f64 {
    if change > 0.0 {
        if rating >= 2000.0 {
            0.3
        } else if rating >= 1800.0 {
            0.5
        } else if rating >= 1600.0 {
            0.7
        } else if rating >= 1400.0 {
            0.85
        } else {
            1.0
        }
    } else if rating >= 2000.0 {
        1.5
    } else if rating >= 1800.0 {
        1.3
    } else if rating >= 1600.0 {
        1.1
    } else {
        1.0
    }
}

/// Typical team average for a finishing rank in a full field
pub fn expected_team_rating_for_rank(rank: u32) -> f64 {
    let rank = f64::from(rank);
    if rank <= 1.0 {
        2200.0
    } else if rank <= 5.0 {
        2200.0 - (rank - 1.0) * 175.0
    } else if rank <= 15.0 {
        1500.0 - (rank - 5.0) * 50.0
    } else if rank <= 30.0 {
        1000.0 - (rank - 15.0) * (200.0 / 15.0)
    } else {
        800.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlacementRatingCalculator {
    config: RatingConfig,
}

impl PlacementRatingCalculator {
    pub fn new(config: RatingConfig) -> Self {
        Self { config }
    }

    /// Largest change allowed for a player at `rating`
    pub fn max_change_limit(&self, rating: f64) -> f64 {
        self.config
            .max_change
            .min(rating * self.config.max_change_fraction)
            .max(0.0)
    }

    /// Full breakdown of one player's change
    ///
    /// `opponent_averages` holds one average rating per opposing team; an
    /// empty list means the opponents are unknown and counts as even.
    pub fn compute(
        &self,
        player_rating: f64,
        team_average: f64,
        placement: u32,
        opponent_averages: &[f64],
    ) -> Breakdown {
        let base_score = base_score(placement);
        let opponent_multiplier = if opponent_averages.is_empty() {
            1.0
        } else {
            let opponents = opponent_averages.iter().sum::<f64>() / opponent_averages.len() as f64;
            opponent_multiplier(opponents - team_average, placement)
        };
        let individual_adjustment = individual_adjustment(player_rating, team_average);
        let preliminary_change = base_score * opponent_multiplier * individual_adjustment;
        let curve_multiplier = curve_multiplier(player_rating, preliminary_change);
        let max_change_limit = self.max_change_limit(player_rating);
        let final_change =
            (preliminary_change * curve_multiplier).clamp(-max_change_limit, max_change_limit);

        Breakdown {
            base_score,
            opponent_multiplier,
            individual_adjustment,
            curve_multiplier,
            preliminary_change,
            final_change,
            max_change_limit,
        }
    }

    /// Final change at a spread of placements, best first
    pub fn preview_rating_changes(
        &self,
        player_rating: f64,
        team_average: f64,
        opponent_averages: &[f64],
    ) -> Vec<(u32, f64)> {
        PREVIEW_PLACEMENTS
            .iter()
            .map(|&placement| {
                let breakdown =
                    self.compute(player_rating, team_average, placement, opponent_averages);
                (placement, breakdown.final_change)
            })
            .collect()
    }

    /// Opponent averages seen by the team at `index`
    ///
    /// Known teams contribute their real averages. When the context names a
    /// larger field, each unclaimed rank contributes its expected average.
    fn opponent_averages(&self, context: &MatchContext, index: usize) -> Vec<f64> {
        let mut averages: Vec<f64> = context
            .teams
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != index)
            .map(|(_, team)| team.average_mean())
            .collect();

        if let Some(total) = context.total_field_size {
            let claimed: BTreeSet<u32> = context.placement_by_team.values().copied().collect();
            averages.extend(
                (1..=total)
                    .filter(|rank| !claimed.contains(rank))
                    .map(expected_team_rating_for_rank),
            );
        }
        averages
    }
}

impl RatingCalculator for PlacementRatingCalculator {
    fn scheme(&self) -> SchemeKind {
        SchemeKind::Placement
    }

    fn compute_update(&self, context: &MatchContext) -> Result<RatingUpdate> {
        context.validate()?;
        if context.teams.is_empty() {
            return Err(ValidationError::TeamCountForScheme {
                scheme: SchemeKind::Placement,
                count: 0,
            }
            .into());
        }

        let mut changes = Vec::with_capacity(context.participant_count());
        for (index, team) in context.teams.iter().enumerate() {
            let placement = context.placement(team.team_number).unwrap_or(1);
            let team_average = team.average_mean();
            let opponents = self.opponent_averages(context, index);

            for member in &team.members {
                let breakdown =
                    self.compute(member.before.mean, team_average, placement, &opponents);
                debug!(
                    "Placement change for {}: #{} base {:.1} x opp {:.2} x ind {:.2} x curve {:.2} = {:.1}",
                    member.id,
                    placement,
                    breakdown.base_score,
                    breakdown.opponent_multiplier,
                    breakdown.individual_adjustment,
                    breakdown.curve_multiplier,
                    breakdown.final_change
                );
                let after = RatingState::new(
                    member.before.mean + breakdown.final_change,
                    member
                        .before
                        .decayed(self.config.uncertainty_decay, self.config.uncertainty_floor),
                );
                changes.push(RatingChange {
                    id: member.id.clone(),
                    team_number: team.team_number,
                    placement,
                    before: member.before,
                    after,
                    breakdown: Some(breakdown),
                });
            }
        }

        Ok(RatingUpdate {
            scheme: SchemeKind::Placement,
            match_id: context.match_id,
            changes,
            field: None,
            diagnostic: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::calculator::{MatchTeam, Participant};
    use std::collections::BTreeMap;

    fn calculator() -> PlacementRatingCalculator {
        PlacementRatingCalculator::default()
    }

    #[test]
    fn test_base_score_table() {
        assert_eq!(base_score(1), 50.0);
        assert_eq!(base_score(8), 0.0);
        assert_eq!(base_score(30), -345.0);
        assert_eq!(base_score(0), 50.0);
        assert_eq!(base_score(45), -345.0);
        for placement in 1..30 {
            assert!(base_score(placement) >= base_score(placement + 1));
        }
    }

    #[test]
    fn test_opponent_multiplier_steps() {
        assert_eq!(opponent_multiplier(600.0, 8), 2.2);
        assert_eq!(opponent_multiplier(500.0, 8), 1.8);
        assert_eq!(opponent_multiplier(400.0, 8), 1.8);
        assert_eq!(opponent_multiplier(100.0, 8), 1.2);
        assert_eq!(opponent_multiplier(50.0, 8), 1.0);
        assert_eq!(opponent_multiplier(0.0, 8), 1.0);
        assert_eq!(opponent_multiplier(-50.0, 8), 0.8);
        assert_eq!(opponent_multiplier(-500.0, 8), 0.2);
    }

    #[test]
    fn test_opponent_multiplier_placement_adjustments() {
        // winning against a much weaker field pays less
        assert!((opponent_multiplier(-250.0, 2) - 0.6 * 0.7).abs() < 1e-12);
        // finishing low against a much stronger field
        assert!((opponent_multiplier(250.0, 20) - 1.4 * 1.3).abs() < 1e-12);
        assert_eq!(opponent_multiplier(250.0, 5), 1.4);
    }

    #[test]
    fn test_individual_adjustment() {
        assert_eq!(individual_adjustment(1800.0, 1500.0), 0.8);
        assert_eq!(individual_adjustment(1650.0, 1500.0), 0.9);
        assert_eq!(individual_adjustment(1500.0, 1500.0), 1.0);
        assert_eq!(individual_adjustment(1350.0, 1500.0), 1.1);
        assert_eq!(individual_adjustment(1200.0, 1500.0), 1.2);
    }

    #[test]
    fn test_curve_multiplier() {
        assert_eq!(curve_multiplier(2100.0, 10.0), 0.3);
        assert_eq!(curve_multiplier(2100.0, -10.0), 1.5);
        assert_eq!(curve_multiplier(1450.0, 10.0), 0.85);
        assert_eq!(curve_multiplier(1450.0, -10.0), 1.0);
        assert_eq!(curve_multiplier(1200.0, 10.0), 1.0);
        assert_eq!(curve_multiplier(1700.0, 0.0), 1.1);
    }

    #[test]
    fn test_underdog_scenario() {
        let breakdown = calculator().compute(1200.0, 1200.0, 1, &[1600.0]);
        assert!(breakdown.opponent_multiplier >= 1.4);
        assert_eq!(breakdown.opponent_multiplier, 1.8);
        assert!(breakdown.final_change > base_score(1));
        assert!((breakdown.final_change - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_elite_penalty_scenario() {
        let breakdown = calculator().compute(2000.0, 2000.0, 25, &[2000.0]);
        assert!(breakdown.curve_multiplier >= 1.5);
        assert_eq!(breakdown.preliminary_change, -220.0);
        assert_eq!(breakdown.max_change_limit, 150.0);
        assert_eq!(breakdown.final_change.abs(), breakdown.max_change_limit);
    }

    #[test]
    fn test_clamp_uses_fraction_for_low_ratings() {
        let breakdown = calculator().compute(400.0, 400.0, 30, &[]);
        assert_eq!(breakdown.max_change_limit, 60.0);
        assert_eq!(breakdown.final_change, -60.0);
    }

    #[test]
    fn test_no_opponents_is_neutral() {
        let breakdown = calculator().compute(1500.0, 1500.0, 8, &[]);
        assert_eq!(breakdown.opponent_multiplier, 1.0);
        assert_eq!(breakdown.final_change, 0.0);
    }

    #[test]
    fn test_tiers() {
        assert_eq!(RatingTier::of(999.9), RatingTier::Learning);
        assert_eq!(RatingTier::of(-50.0), RatingTier::Learning);
        assert_eq!(RatingTier::of(1000.0), RatingTier::Novice);
        assert_eq!(RatingTier::of(1399.0), RatingTier::Beginner);
        assert_eq!(RatingTier::of(1500.0), RatingTier::Intermediate);
        assert_eq!(RatingTier::of(1600.0), RatingTier::Advanced);
        assert_eq!(RatingTier::of(1850.0), RatingTier::Expert);
        assert_eq!(RatingTier::of(2000.0), RatingTier::Elite);
        assert_eq!(RatingTier::of(2200.0), RatingTier::Legendary);
        assert_eq!(RatingTier::Legendary.to_string(), "Legendary");
    }

    #[test]
    fn test_expected_team_rating_for_rank() {
        assert_eq!(expected_team_rating_for_rank(1), 2200.0);
        assert_eq!(expected_team_rating_for_rank(5), 1500.0);
        assert_eq!(expected_team_rating_for_rank(15), 1000.0);
        assert!((expected_team_rating_for_rank(30) - 800.0).abs() < 1e-9);
        assert_eq!(expected_team_rating_for_rank(31), 800.0);
    }

    #[test]
    fn test_preview() {
        let preview = calculator().preview_rating_changes(1500.0, 1500.0, &[1500.0]);
        let placements: Vec<u32> = preview.iter().map(|(p, _)| *p).collect();
        assert_eq!(placements, PREVIEW_PLACEMENTS.to_vec());
        assert!((preview[0].1 - 50.0 * 0.85).abs() < 1e-9);
        for pair in preview.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn test_compute_update_applies_breakdowns() {
        let context = MatchContext::new(
            vec![
                MatchTeam::new(
                    1,
                    vec![
                        Participant::new("a", RatingState::new(1500.0, 200.0)),
                        Participant::new("b", RatingState::new(1500.0, 50.0)),
                    ],
                ),
                MatchTeam::new(2, vec![Participant::new("c", RatingState::new(1500.0, 200.0))]),
            ],
            BTreeMap::from([(1, 1), (2, 2)]),
        );
        let update = calculator().compute_update(&context).unwrap();

        let a = update.change_for("a").unwrap();
        assert_eq!(a.breakdown.unwrap().base_score, 50.0);
        assert!((a.delta() - 42.5).abs() < 1e-9);
        assert!((a.after.uncertainty - 198.0).abs() < 1e-9);
        assert_eq!(update.change_for("b").unwrap().after.uncertainty, 50.0);

        let c = update.change_for("c").unwrap();
        assert_eq!(c.breakdown.unwrap().base_score, 35.0);
    }

    #[test]
    fn test_uncertainty_below_floor_never_rises() {
        let context = MatchContext::new(
            vec![
                MatchTeam::new(1, vec![Participant::new("a", RatingState::new(1500.0, 30.0))]),
                MatchTeam::new(2, vec![Participant::new("b", RatingState::new(1500.0, 30.0))]),
            ],
            BTreeMap::from([(1, 1), (2, 2)]),
        );
        let update = calculator().compute_update(&context).unwrap();

        for change in &update.changes {
            assert_eq!(change.after.uncertainty, 30.0);
            assert!(change.after.uncertainty <= change.before.uncertainty);
        }
    }

    #[test]
    fn test_external_field_adds_expected_opponents() {
        let context = MatchContext::new(
            vec![MatchTeam::new(1, vec![Participant::new("a", RatingState::new(1500.0, 200.0))])],
            BTreeMap::from([(1, 3)]),
        )
        .with_total_field_size(5);

        let opponents = calculator().opponent_averages(&context, 0);
        assert_eq!(opponents, vec![2200.0, 2025.0, 1675.0, 1500.0]);
    }
}
