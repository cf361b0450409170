//! Multi-team Plackett-Luce rating scheme
//!
//! Teams are ranked by placement and updated together with the Weng-Lin
//! multi-team model. When placements run past the number of known teams the
//! untaken ranks belong to teams outside the group; these are stood in for by
//! synthetic teams whose strength is estimated from the known teams, and their
//! outputs are thrown away after the update.
//!
//! This scheme never fails a caller: malformed input or a numerically broken
//! update returns every rating unchanged together with a [`Diagnostic`].

use crate::config::RatingConfig;
use crate::error::Result;
use crate::rating::calculator::{
    Diagnostic, MatchContext, RatingCalculator, RatingChange, RatingUpdate,
};
use crate::types::{RatingState, SchemeKind};
use crate::utils::mean;
use serde::{Deserialize, Serialize};
use skillratings::weng_lin::{
    expected_score, expected_score_multi_team, weng_lin_multi_team, WengLinConfig, WengLinRating,
};
use skillratings::MultiTeamOutcome;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Lowest mean a multi-team rating may hold
pub const MIN_MEAN: f64 = 0.0;
/// Lowest uncertainty a multi-team rating may hold
pub const MIN_UNCERTAINTY: f64 = 0.1;

/// Whether every team in the field was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Placements are exactly 1..=K
    Closed,
    /// Ties or gaps among the known placements, none past K
    Mixed,
    /// At least one placement past the number of known teams
    External,
}

/// Shape of the field a match was played in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub kind: FieldKind,
    pub total_competitors: usize,
    pub known_teams: usize,
    pub external_teams: usize,
}

/// Classify a field from the known teams' placements
///
/// Returns the summary and the ranks that belong to unseen teams. Unseen
/// teams only exist when some placement runs past the number of known teams;
/// a tied or gapped field inside 1..=K is mixed but fully observed.
pub fn classify_field(placements: &[u32]) -> (FieldSummary, Vec<u32>) {
    let known_teams = placements.len();
    let worst = placements.iter().copied().max().unwrap_or(0);
    let taken: BTreeSet<u32> = placements.iter().copied().collect();
    let consecutive: BTreeSet<u32> = (1..=known_teams as u32).collect();

    let (kind, missing) = if taken == consecutive {
        (FieldKind::Closed, Vec::new())
    } else if worst as usize > known_teams {
        let missing = (1..=worst).filter(|rank| !taken.contains(rank)).collect();
        (FieldKind::External, missing)
    } else {
        (FieldKind::Mixed, Vec::new())
    };

    let summary = FieldSummary {
        kind,
        total_competitors: known_teams + missing.len(),
        known_teams,
        external_teams: missing.len(),
    };
    (summary, missing)
}

#[derive(Debug, Clone, Default)]
pub struct MultiTeamSkillEstimator {
    config: RatingConfig,
}

impl MultiTeamSkillEstimator {
    pub fn new(config: RatingConfig) -> Self {
        Self { config }
    }

    fn weng_lin_config(&self) -> WengLinConfig {
        WengLinConfig {
            beta: self.config.beta,
            uncertainty_tolerance: self.config.uncertainty_tolerance,
        }
    }

    /// Per-player rating assumed for members of unseen teams
    ///
    /// `team_strengths` are the summed means of the known teams. Their average
    /// is shaded 5% weaker when the known teams placed well (average placement
    /// below 4) and 10% stronger when they placed badly (above 6), then spread
    /// over `assumed_external_team_size` players.
    pub fn estimate_external_rating(&self, team_strengths: &[f64], placements: &[u32]) -> RatingState {
        let default = SchemeKind::MultiTeam.default_rating();
        let Some(average_strength) = mean(team_strengths) else {
            return default;
        };
        let placements: Vec<f64> = placements.iter().map(|&p| f64::from(p)).collect();
        let average_placement = mean(&placements).unwrap_or(1.0);

        let factor = if average_placement < 4.0 {
            0.95
        } else if average_placement > 6.0 {
            1.1
        } else {
            1.0
        };
        let size = self.config.assumed_external_team_size.max(1) as f64;
        RatingState::new(average_strength * factor / size, default.uncertainty)
    }

    /// Combined strength of a team: summed means, uncertainties added in quadrature
    pub fn team_strength(&self, members: &[RatingState]) -> RatingState {
        if members.is_empty() {
            return SchemeKind::MultiTeam.default_rating();
        }
        let total: f64 = members.iter().map(|r| r.mean).sum();
        let variance: f64 = members.iter().map(|r| r.uncertainty.powi(2)).sum();
        RatingState::new(total, variance.sqrt())
    }

    /// Probability of each team winning outright, in input order
    ///
    /// Falls back to equal odds when any rating is unusable.
    pub fn predict_match_outcome(&self, teams: &[Vec<RatingState>]) -> Vec<f64> {
        if teams.is_empty() {
            return Vec::new();
        }
        let even = vec![1.0 / teams.len() as f64; teams.len()];
        if teams.iter().any(|team| team.is_empty() || !team.iter().all(RatingState::is_valid)) {
            warn!("Cannot predict outcome for {} teams, using even odds", teams.len());
            return even;
        }

        let converted: Vec<Vec<WengLinRating>> = teams
            .iter()
            .map(|team| team.iter().map(|&r| r.into()).collect())
            .collect();
        let slices: Vec<&[WengLinRating]> = converted.iter().map(Vec::as_slice).collect();
        let probabilities = expected_score_multi_team(&slices, &self.weng_lin_config());
        if probabilities.iter().all(|p| p.is_finite()) {
            probabilities
        } else {
            even
        }
    }

    /// Probability that `a` beats `b` head to head
    pub fn compare_players(&self, a: &RatingState, b: &RatingState) -> f64 {
        let (win, _) = expected_score(
            &WengLinRating::from(*a),
            &WengLinRating::from(*b),
            &self.weng_lin_config(),
        );
        win
    }

    /// Mean on the familiar 1500-centred scale
    pub fn display_rating(&self, rating: &RatingState) -> f64 {
        rating.mean * self.config.display_scale
    }

    /// Rank-based update of every known team
    ///
    /// Infallible: failures come back as an unchanged update with a diagnostic.
    pub fn update_ranked(&self, context: &MatchContext) -> RatingUpdate {
        match self.try_update(context) {
            Ok(update) => update,
            Err(reason) => {
                warn!(
                    "Multi-team update for match {} degraded, keeping ratings: {}",
                    context.match_id, reason
                );
                RatingUpdate::unchanged(SchemeKind::MultiTeam, context, Diagnostic::new(reason))
            }
        }
    }

    fn try_update(&self, context: &MatchContext) -> std::result::Result<RatingUpdate, String> {
        if context.teams.is_empty() {
            return Err("no teams in match".to_string());
        }
        context.validate().map_err(|e| e.to_string())?;

        let placements: Vec<u32> = context
            .teams
            .iter()
            .map(|team| context.placement(team.team_number).unwrap_or(1))
            .collect();
        let (field, missing) = classify_field(&placements);
        info!(
            "Processing {:?} field: {} known teams, {} external teams",
            field.kind, field.known_teams, field.external_teams
        );

        // (rank, index of the known team or None for a synthetic one, members)
        let mut entries: Vec<(u32, Option<usize>, Vec<WengLinRating>)> = context
            .teams
            .iter()
            .zip(&placements)
            .enumerate()
            .map(|(index, (team, &rank))| {
                let members: Vec<WengLinRating> =
                    team.members.iter().map(|m| m.before.into()).collect();
                (rank, Some(index), members)
            })
            .collect();

        if !missing.is_empty() {
            let strengths: Vec<f64> = context
                .teams
                .iter()
                .map(|team| {
                    let members: Vec<RatingState> = team.members.iter().map(|m| m.before).collect();
                    self.team_strength(&members).mean
                })
                .collect();
            let external = self.estimate_external_rating(&strengths, &placements);
            debug!(
                "Estimated external player rating {:.3} +/- {:.3} for ranks {:?}",
                external.mean, external.uncertainty, missing
            );
            let size = self.config.assumed_external_team_size.max(1);
            for rank in &missing {
                entries.push((*rank, None, vec![external.into(); size]));
            }
        }
        entries.sort_by_key(|(rank, _, _)| *rank);

        let teams_and_ranks: Vec<(&[WengLinRating], MultiTeamOutcome)> = entries
            .iter()
            .map(|(rank, _, members)| (members.as_slice(), MultiTeamOutcome::new(*rank as usize)))
            .collect();
        let results = weng_lin_multi_team(&teams_and_ranks, &self.weng_lin_config());
        if results.len() != entries.len() {
            return Err(format!(
                "model returned {} teams for {} inputs",
                results.len(),
                entries.len()
            ));
        }

        let mut changes = Vec::with_capacity(context.participant_count());
        for ((_, index, _), new_ratings) in entries.iter().zip(results) {
            let Some(index) = *index else {
                continue;
            };
            let team = &context.teams[index];
            if new_ratings.len() != team.members.len() {
                return Err(format!(
                    "model returned {} ratings for team {} of {}",
                    new_ratings.len(),
                    team.team_number,
                    team.members.len()
                ));
            }
            for (member, rating) in team.members.iter().zip(new_ratings) {
                if !rating.rating.is_finite() || !rating.uncertainty.is_finite() {
                    return Err(format!("non-finite rating computed for {}", member.id));
                }
                let after = RatingState::new(
                    rating.rating.max(MIN_MEAN),
                    rating
                        .uncertainty
                        .max(MIN_UNCERTAINTY)
                        .min(member.before.uncertainty),
                );
                changes.push(RatingChange {
                    id: member.id.clone(),
                    team_number: team.team_number,
                    placement: placements[index],
                    before: member.before,
                    after,
                    breakdown: None,
                });
            }
        }

        Ok(RatingUpdate {
            scheme: SchemeKind::MultiTeam,
            match_id: context.match_id,
            changes,
            field: Some(field),
            diagnostic: None,
        })
    }
}

impl RatingCalculator for MultiTeamSkillEstimator {
    fn scheme(&self) -> SchemeKind {
        SchemeKind::MultiTeam
    }

    fn compute_update(&self, context: &MatchContext) -> Result<RatingUpdate> {
        Ok(self.update_ranked(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rating::calculator::{MatchTeam, Participant};
    use std::collections::BTreeMap;

    fn estimator() -> MultiTeamSkillEstimator {
        MultiTeamSkillEstimator::default()
    }

    fn team(number: u32, ids: &[&str]) -> MatchTeam {
        MatchTeam::new(
            number,
            ids.iter()
                .map(|id| Participant::new(*id, SchemeKind::MultiTeam.default_rating()))
                .collect(),
        )
    }

    #[test]
    fn test_closed_field_has_no_externals() {
        let (summary, missing) = classify_field(&[2, 1, 3]);
        assert_eq!(summary.kind, FieldKind::Closed);
        assert_eq!(summary.external_teams, 0);
        assert_eq!(summary.total_competitors, 3);
        assert!(missing.is_empty());
    }

    #[test]
    fn test_external_and_mixed_fields() {
        let (external, missing) = classify_field(&[2, 5]);
        assert_eq!(external.kind, FieldKind::External);
        assert_eq!(missing, vec![1, 3, 4]);
        assert_eq!(external.total_competitors, 5);
        assert_eq!(external.external_teams, 3);

        let (mixed, missing) = classify_field(&[1, 3, 3]);
        assert_eq!(mixed.kind, FieldKind::Mixed);
        assert_eq!(mixed.external_teams, 0);
        assert_eq!(mixed.total_competitors, 3);
        assert!(missing.is_empty());
    }

    #[test]
    fn test_tied_ranks_are_mixed_not_closed() {
        let (summary, missing) = classify_field(&[1, 1, 2]);
        assert_eq!(summary.kind, FieldKind::Mixed);
        assert_eq!(summary.external_teams, 0);
        assert!(missing.is_empty());

        // Ties past K still leave every untaken rank to unseen teams
        let (summary, missing) = classify_field(&[1, 1, 4]);
        assert_eq!(summary.kind, FieldKind::External);
        assert_eq!(missing, vec![2, 3]);
        assert_eq!(summary.total_competitors, 5);
    }

    #[test]
    fn test_tied_update_adds_no_synthetic_teams() {
        let context = MatchContext::new(
            vec![team(1, &["a"]), team(2, &["b"]), team(3, &["c"])],
            BTreeMap::from([(1, 1), (2, 1), (3, 2)]),
        );
        let update = estimator().update_ranked(&context);

        assert!(!update.is_degraded());
        let field = update.field.clone().unwrap();
        assert_eq!(field.kind, FieldKind::Mixed);
        assert_eq!(field.external_teams, 0);
        assert_eq!(update.changes.len(), 3);
        assert!(update.change_for("c").unwrap().delta() < 0.0);
    }

    #[test]
    fn test_external_strength_estimate() {
        let estimator = estimator();
        // Team sums of 80 and 120 average 100, spread over four players
        let strong = estimator.estimate_external_rating(&[80.0, 120.0], &[1, 2]);
        assert!((strong.mean - 25.0 * 0.95).abs() < 1e-12);
        assert_eq!(strong.uncertainty, 8.333);

        let average = estimator.estimate_external_rating(&[100.0], &[5]);
        assert_eq!(average.mean, 25.0);

        let weak = estimator.estimate_external_rating(&[100.0], &[9]);
        assert!((weak.mean - 27.5).abs() < 1e-12);

        assert_eq!(
            estimator.estimate_external_rating(&[], &[]),
            SchemeKind::MultiTeam.default_rating()
        );
    }

    #[test]
    fn test_external_strength_from_small_teams() {
        let estimator = estimator();
        let pair = [RatingState::new(25.0, 8.333), RatingState::new(25.0, 8.333)];
        let strengths = [estimator.team_strength(&pair).mean, estimator.team_strength(&pair).mean];
        assert_eq!(strengths, [50.0, 50.0]);

        let external = estimator.estimate_external_rating(&strengths, &[1, 3]);
        assert!((external.mean - 11.875).abs() < 1e-12);
    }

    #[test]
    fn test_team_strength() {
        let estimator = estimator();
        let strength = estimator.team_strength(&[RatingState::new(20.0, 3.0), RatingState::new(30.0, 4.0)]);
        assert_eq!(strength.mean, 50.0);
        assert!((strength.uncertainty - 5.0).abs() < 1e-12);
        assert_eq!(estimator.team_strength(&[]), SchemeKind::MultiTeam.default_rating());
    }

    #[test]
    fn test_predict_match_outcome() {
        let estimator = estimator();
        let even = SchemeKind::MultiTeam.default_rating();
        let teams = vec![
            vec![RatingState::new(35.0, 4.0), RatingState::new(35.0, 4.0)],
            vec![even, even],
            vec![RatingState::new(15.0, 4.0), RatingState::new(15.0, 4.0)],
        ];
        let odds = estimator.predict_match_outcome(&teams);

        assert_eq!(odds.len(), 3);
        assert!((odds.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(odds[0] > odds[1] && odds[1] > odds[2]);

        let broken = vec![vec![even], vec![RatingState::new(f64::NAN, 1.0)]];
        assert_eq!(estimator.predict_match_outcome(&broken), vec![0.5, 0.5]);
        assert!(estimator.predict_match_outcome(&[]).is_empty());
    }

    #[test]
    fn test_closed_update_orders_by_placement() {
        let context = MatchContext::new(
            vec![team(1, &["a", "b"]), team(2, &["c", "d"]), team(3, &["e", "f"])],
            BTreeMap::from([(1, 1), (2, 2), (3, 3)]),
        );
        let update = estimator().update_ranked(&context);

        assert!(!update.is_degraded());
        assert_eq!(update.field.as_ref().map(|f| f.kind), Some(FieldKind::Closed));
        assert_eq!(update.changes.len(), 6);
        let a = update.change_for("a").unwrap();
        let e = update.change_for("e").unwrap();
        assert!(a.delta() > 0.0);
        assert!(e.delta() < 0.0);
        assert!(a.after.uncertainty < a.before.uncertainty);
    }

    #[test]
    fn test_external_teams_are_not_returned() {
        let context = MatchContext::new(
            vec![team(1, &["a", "b"]), team(2, &["c", "d"])],
            BTreeMap::from([(1, 3), (2, 7)]),
        );
        let update = estimator().update_ranked(&context);

        let field = update.field.clone().unwrap();
        assert_eq!(field.kind, FieldKind::External);
        assert_eq!(field.external_teams, 5);
        assert_eq!(update.changes.len(), 4);
        assert!(update.changes.iter().all(|c| ["a", "b", "c", "d"].contains(&c.id.as_str())));
        // Seventh of seven loses more than third of seven
        assert!(update.change_for("c").unwrap().delta() < update.change_for("a").unwrap().delta());
    }

    #[test]
    fn test_malformed_input_returns_unchanged() {
        let context = MatchContext::new(
            vec![team(1, &["a"]), team(2, &["b"])],
            BTreeMap::from([(1, 1), (2, 0)]),
        );
        let update = estimator().compute_update(&context).unwrap();

        assert!(update.is_degraded());
        assert!(update.changes.iter().all(|c| c.after == c.before));

        let empty = MatchContext::new(Vec::new(), BTreeMap::new());
        let update = estimator().compute_update(&empty).unwrap();
        assert!(update.is_degraded());
        assert!(update.changes.is_empty());
    }

    #[test]
    fn test_floors_applied() {
        let context = MatchContext::new(
            vec![
                MatchTeam::new(1, vec![Participant::new("a", RatingState::new(40.0, 8.0))]),
                MatchTeam::new(2, vec![Participant::new("b", RatingState::new(0.01, 8.0))]),
            ],
            BTreeMap::from([(1, 1), (2, 2)]),
        );
        let update = estimator().update_ranked(&context);
        let b = update.change_for("b").unwrap();
        assert!(b.after.mean >= MIN_MEAN);
        assert!(b.after.uncertainty >= MIN_UNCERTAINTY);
    }

    #[test]
    fn test_uncertainty_below_floor_never_rises() {
        let context = MatchContext::new(
            vec![
                MatchTeam::new(1, vec![Participant::new("a", RatingState::new(30.0, 0.05))]),
                MatchTeam::new(2, vec![Participant::new("b", RatingState::new(20.0, 0.05))]),
            ],
            BTreeMap::from([(1, 1), (2, 2)]),
        );
        let update = estimator().update_ranked(&context);

        assert!(!update.is_degraded());
        for change in &update.changes {
            assert!(change.after.uncertainty <= change.before.uncertainty);
        }
    }

    #[test]
    fn test_compare_and_display() {
        let estimator = estimator();
        let even = SchemeKind::MultiTeam.default_rating();
        assert!((estimator.compare_players(&even, &even) - 0.5).abs() < 1e-9);

        let strong = RatingState::new(35.0, 4.0);
        assert!(estimator.compare_players(&strong, &even) > 0.5);
        assert_eq!(estimator.display_rating(&even), 1500.0);
    }
}
