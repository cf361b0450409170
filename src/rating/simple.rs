//! Win/loss/draw baseline scheme
//!
//! Teams are reduced to one aggregate rating, the Elo expectation decides how
//! surprising the result was, and every member of a team moves by the same
//! amount. Matches with other than two teams use the ranked variant, which
//! scores each team by its placement.

use crate::config::RatingConfig;
use crate::error::{Result, ValidationError};
use crate::rating::calculator::{MatchContext, RatingCalculator, RatingChange, RatingUpdate};
use crate::types::{RatingState, SchemeKind};
use serde::{Deserialize, Serialize};
use skillratings::elo::{expected_score, EloRating};
use tracing::debug;

/// Result of a two-team match from the first team's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamOutcome {
    Win,
    Draw,
    Loss,
}

impl TeamOutcome {
    pub fn score(self) -> f64 {
        match self {
            TeamOutcome::Win => 1.0,
            TeamOutcome::Draw => 0.5,
            TeamOutcome::Loss => 0.0,
        }
    }

    /// Lower placement wins; equal placements draw
    pub fn from_placements(first: u32, second: u32) -> Self {
        match first.cmp(&second) {
            std::cmp::Ordering::Less => TeamOutcome::Win,
            std::cmp::Ordering::Equal => TeamOutcome::Draw,
            std::cmp::Ordering::Greater => TeamOutcome::Loss,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimpleTeamRatingUpdater {
    config: RatingConfig,
}

impl SimpleTeamRatingUpdater {
    pub fn new(config: RatingConfig) -> Self {
        Self { config }
    }

    /// Mean of member means; uncertainty is sqrt(sum of variances) / size
    pub fn team_rating(&self, members: &[RatingState]) -> RatingState {
        if members.is_empty() {
            return SchemeKind::Simple.default_rating();
        }
        let size = members.len() as f64;
        let mean = members.iter().map(|r| r.mean).sum::<f64>() / size;
        let variance: f64 = members.iter().map(|r| r.uncertainty.powi(2)).sum();
        RatingState::new(mean, variance.sqrt() / size)
    }

    /// Elo expectation that team `a` beats team `b`
    pub fn expected_score(&self, a: &RatingState, b: &RatingState) -> f64 {
        let (expected, _) = expected_score(
            &EloRating { rating: a.mean },
            &EloRating { rating: b.mean },
        );
        expected
    }

    /// Two-team update: A moves by `delta`, B by `-delta`
    ///
    /// The step size scales with team A's aggregate uncertainty.
    pub fn update_on_team_result(
        &self,
        team_a: &[RatingState],
        team_b: &[RatingState],
        outcome: TeamOutcome,
    ) -> (Vec<RatingState>, Vec<RatingState>) {
        let rating_a = self.team_rating(team_a);
        let rating_b = self.team_rating(team_b);
        let expected = self.expected_score(&rating_a, &rating_b);
        let k = self.config.k_factor * (rating_a.uncertainty / self.config.reference_uncertainty);
        let delta = k * (outcome.score() - expected);

        debug!(
            "Team result {:?}: expected {:.3}, k {:.2}, delta {:.2}",
            outcome, expected, k, delta
        );

        (
            team_a.iter().map(|r| self.shifted(r, delta)).collect(),
            team_b.iter().map(|r| self.shifted(r, -delta)).collect(),
        )
    }

    /// Score for a team finishing at `placement` among `team_count` teams
    pub fn ranked_score(placement: u32, team_count: usize) -> f64 {
        if team_count <= 1 {
            return 0.5;
        }
        let score = (team_count as f64 - placement as f64) / (team_count as f64 - 1.0);
        score.clamp(0.0, 1.0)
    }

    /// Ranked variant: each player moves by
    /// `ranked_k * (score - 0.5) * uncertainty / reference`
    pub fn update_ranked(&self, teams: &[Vec<RatingState>], placements: &[u32]) -> Vec<Vec<RatingState>> {
        teams
            .iter()
            .zip(placements)
            .map(|(members, &placement)| {
                let score = Self::ranked_score(placement, teams.len());
                members
                    .iter()
                    .map(|r| {
                        let delta = self.config.ranked_k_factor
                            * (score - 0.5)
                            * (r.uncertainty / self.config.reference_uncertainty);
                        self.shifted(r, delta)
                    })
                    .collect()
            })
            .collect()
    }

    fn shifted(&self, rating: &RatingState, delta: f64) -> RatingState {
        RatingState::new(
            rating.mean + delta,
            rating.decayed(self.config.uncertainty_decay, self.config.uncertainty_floor),
        )
    }
}

impl RatingCalculator for SimpleTeamRatingUpdater {
    fn scheme(&self) -> SchemeKind {
        SchemeKind::Simple
    }

    fn compute_update(&self, context: &MatchContext) -> Result<RatingUpdate> {
        context.validate()?;
        if context.teams.is_empty() {
            return Err(ValidationError::TeamCountForScheme {
                scheme: SchemeKind::Simple,
                count: 0,
            }
            .into());
        }

        let ratings: Vec<Vec<RatingState>> = context
            .teams
            .iter()
            .map(|team| team.members.iter().map(|m| m.before).collect())
            .collect();
        let placements: Vec<u32> = context
            .teams
            .iter()
            .map(|team| context.placement(team.team_number).unwrap_or(1))
            .collect();

        let after = if let ([team_a, team_b], [first, second]) = (ratings.as_slice(), placements.as_slice()) {
            let (a, b) = self.update_on_team_result(
                team_a,
                team_b,
                TeamOutcome::from_placements(*first, *second),
            );
            vec![a, b]
        } else {
            self.update_ranked(&ratings, &placements)
        };

        let changes = context
            .teams
            .iter()
            .zip(&placements)
            .zip(after)
            .flat_map(|((team, &placement), after)| {
                team.members
                    .iter()
                    .zip(after)
                    .map(move |(member, after)| RatingChange {
                        id: member.id.clone(),
                        team_number: team.team_number,
                        placement,
                        before: member.before,
                        after,
                        breakdown: None,
                    })
            })
            .collect();

        Ok(RatingUpdate {
            scheme: SchemeKind::Simple,
            match_id: context.match_id,
            changes,
            field: None,
            diagnostic: None,
        })
    }
}
