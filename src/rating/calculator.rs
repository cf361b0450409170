//! Rating calculator trait and the match records it works on
//!
//! Every scheme consumes the same [`MatchContext`] snapshot and produces the
//! same [`RatingUpdate`], so callers pick a [`RatingScheme`] per group instead
//! of wiring each scheme separately.

use crate::config::RatingConfig;
use crate::error::{Result, ValidationError};
use crate::rating::multi_team::{FieldSummary, MultiTeamSkillEstimator};
use crate::rating::placement::{Breakdown, PlacementRatingCalculator};
use crate::rating::simple::SimpleTeamRatingUpdater;
use crate::rating::storage::RosterProvider;
use crate::types::{CompetitorId, GroupId, MatchId, RatingState, SchemeKind};
use crate::utils::generate_match_id;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A competitor and the rating they held when the match was read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: CompetitorId,
    pub before: RatingState,
}

impl Participant {
    pub fn new(id: impl Into<CompetitorId>, before: RatingState) -> Self {
        Self {
            id: id.into(),
            before,
        }
    }
}

/// One team as it took part in a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchTeam {
    pub team_number: u32,
    pub members: Vec<Participant>,
}

impl MatchTeam {
    pub fn new(team_number: u32, members: Vec<Participant>) -> Self {
        Self {
            team_number,
            members,
        }
    }

    /// Mean of the members' means, 0 for an empty team
    pub fn average_mean(&self) -> f64 {
        if self.members.is_empty() {
            return 0.0;
        }
        self.members.iter().map(|m| m.before.mean).sum::<f64>() / self.members.len() as f64
    }
}

/// Snapshot of a finished match: who played, with which ratings, and where
/// each team placed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchContext {
    #[serde(default = "generate_match_id")]
    pub match_id: MatchId,
    pub teams: Vec<MatchTeam>,
    /// Team number to 1-based placement
    pub placement_by_team: BTreeMap<u32, u32>,
    /// Total number of teams in the field, including unobserved ones
    #[serde(default)]
    pub total_field_size: Option<u32>,
}

impl MatchContext {
    pub fn new(teams: Vec<MatchTeam>, placement_by_team: BTreeMap<u32, u32>) -> Self {
        Self {
            match_id: generate_match_id(),
            teams,
            placement_by_team,
            total_field_size: None,
        }
    }

    pub fn with_total_field_size(mut self, total: u32) -> Self {
        self.total_field_size = Some(total);
        self
    }

    /// Build a context by reading each member's current rating from `roster`
    pub fn from_roster(
        roster: &dyn RosterProvider,
        group: GroupId,
        scheme: SchemeKind,
        teams: &[(u32, Vec<CompetitorId>)],
        placement_by_team: BTreeMap<u32, u32>,
    ) -> Result<Self> {
        let mut match_teams = Vec::with_capacity(teams.len());
        for (team_number, ids) in teams {
            let mut members = Vec::with_capacity(ids.len());
            for id in ids {
                let before = roster.rating(group, id, scheme)?;
                members.push(Participant::new(id.clone(), before));
            }
            match_teams.push(MatchTeam::new(*team_number, members));
        }
        Ok(Self::new(match_teams, placement_by_team))
    }

    pub fn placement(&self, team_number: u32) -> Option<u32> {
        self.placement_by_team.get(&team_number).copied()
    }

    pub fn participant_count(&self) -> usize {
        self.teams.iter().map(|t| t.members.len()).sum()
    }

    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.teams.iter().flat_map(|t| t.members.iter())
    }

    /// Structural checks shared by every scheme
    ///
    /// Teams must be non-empty with a placement of at least 1, and no
    /// competitor may appear twice in the same match.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for team in &self.teams {
            if team.members.is_empty() {
                return Err(ValidationError::EmptyTeam {
                    team: team.team_number,
                });
            }
            match self.placement(team.team_number) {
                None => {
                    return Err(ValidationError::MissingPlacement {
                        team: team.team_number,
                    })
                }
                Some(0) => {
                    return Err(ValidationError::InvalidPlacement {
                        team: team.team_number,
                        placement: 0,
                    })
                }
                Some(_) => {}
            }
            for member in &team.members {
                if !seen.insert(member.id.as_str()) {
                    return Err(ValidationError::DuplicateCompetitor {
                        id: member.id.clone(),
                    });
                }
                if !member.before.is_valid() {
                    return Err(ValidationError::InvalidRating {
                        id: member.id.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Why a multi-team update fell back to the unchanged ratings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub reason: String,
}

impl Diagnostic {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Before and after rating of one competitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingChange {
    pub id: CompetitorId,
    pub team_number: u32,
    pub placement: u32,
    pub before: RatingState,
    pub after: RatingState,
    /// Every intermediate factor, for schemes that produce one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Breakdown>,
}

impl RatingChange {
    pub fn delta(&self) -> f64 {
        self.after.mean - self.before.mean
    }
}

/// Result of rating one match under one scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingUpdate {
    pub scheme: SchemeKind,
    pub match_id: MatchId,
    pub changes: Vec<RatingChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}

impl RatingUpdate {
    /// Every participant keeps the rating it came in with
    pub fn unchanged(scheme: SchemeKind, context: &MatchContext, diagnostic: Diagnostic) -> Self {
        let changes = context
            .teams
            .iter()
            .flat_map(|team| {
                let placement = context.placement(team.team_number).unwrap_or(0);
                team.members.iter().map(move |member| RatingChange {
                    id: member.id.clone(),
                    team_number: team.team_number,
                    placement,
                    before: member.before,
                    after: member.before,
                    breakdown: None,
                })
            })
            .collect();

        Self {
            scheme,
            match_id: context.match_id,
            changes,
            field: None,
            diagnostic: Some(diagnostic),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.diagnostic.is_some()
    }

    pub fn change_for(&self, id: &str) -> Option<&RatingChange> {
        self.changes.iter().find(|change| change.id == id)
    }
}

/// Trait for computing the ratings that result from a finished match
pub trait RatingCalculator: Send + Sync {
    fn scheme(&self) -> SchemeKind;

    /// Rating for a competitor with no history under this scheme
    fn initial_rating(&self) -> RatingState {
        self.scheme().default_rating()
    }

    /// Compute every participant's post-match rating
    ///
    /// Pure: the context is a snapshot and nothing is persisted here.
    fn compute_update(&self, context: &MatchContext) -> Result<RatingUpdate>;
}

/// The available schemes behind one capability
#[derive(Debug, Clone)]
pub enum RatingScheme {
    Simple(SimpleTeamRatingUpdater),
    Placement(PlacementRatingCalculator),
    MultiTeam(MultiTeamSkillEstimator),
}

impl RatingScheme {
    pub fn from_config(kind: SchemeKind, config: &RatingConfig) -> Self {
        match kind {
            SchemeKind::Simple => RatingScheme::Simple(SimpleTeamRatingUpdater::new(config.clone())),
            SchemeKind::Placement => {
                RatingScheme::Placement(PlacementRatingCalculator::new(config.clone()))
            }
            SchemeKind::MultiTeam => {
                RatingScheme::MultiTeam(MultiTeamSkillEstimator::new(config.clone()))
            }
        }
    }

    fn calculator(&self) -> &dyn RatingCalculator {
        match self {
            RatingScheme::Simple(calculator) => calculator,
            RatingScheme::Placement(calculator) => calculator,
            RatingScheme::MultiTeam(calculator) => calculator,
        }
    }
}

impl RatingCalculator for RatingScheme {
    fn scheme(&self) -> SchemeKind {
        self.calculator().scheme()
    }

    fn initial_rating(&self) -> RatingState {
        self.calculator().initial_rating()
    }

    fn compute_update(&self, context: &MatchContext) -> Result<RatingUpdate> {
        self.calculator().compute_update(context)
    }
}
