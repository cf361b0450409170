//! Common types used throughout the rating engine

use serde::{Deserialize, Serialize};
use skillratings::weng_lin::WengLinRating;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identifier for a competitor
pub type CompetitorId = String;

/// Identifier of the community group a rating belongs to
pub type GroupId = u64;

/// Unique identifier for matches
pub type MatchId = Uuid;

/// Rating scheme a [`RatingState`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemeKind {
    /// Win/loss/draw baseline
    Simple,
    /// Multi-factor placement scheme
    Placement,
    /// Plackett-Luce multi-team scheme
    MultiTeam,
}

impl SchemeKind {
    pub const ALL: [SchemeKind; 3] = [
        SchemeKind::Simple,
        SchemeKind::Placement,
        SchemeKind::MultiTeam,
    ];

    /// Rating given to a competitor the first time they are seen
    pub fn default_rating(self) -> RatingState {
        match self {
            SchemeKind::Simple | SchemeKind::Placement => RatingState {
                mean: 1500.0,
                uncertainty: 350.0,
            },
            SchemeKind::MultiTeam => RatingState {
                mean: 25.0,
                uncertainty: 8.333,
            },
        }
    }

    /// Factor that brings this scheme onto the 1500-centred balancing scale
    pub fn balance_scale(self) -> f64 {
        match self {
            SchemeKind::Simple | SchemeKind::Placement => 1.0,
            SchemeKind::MultiTeam => 60.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchemeKind::Simple => "simple",
            SchemeKind::Placement => "placement",
            SchemeKind::MultiTeam => "multi_team",
        }
    }
}

impl fmt::Display for SchemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "simple" | "glicko" | "traditional" => Ok(SchemeKind::Simple),
            "placement" | "advanced" => Ok(SchemeKind::Placement),
            "multi_team" | "openskill" => Ok(SchemeKind::MultiTeam),
            other => Err(format!("unknown rating scheme '{}'", other)),
        }
    }
}

/// Skill estimate under one scheme
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingState {
    pub mean: f64,
    pub uncertainty: f64,
}

impl RatingState {
    pub fn new(mean: f64, uncertainty: f64) -> Self {
        Self { mean, uncertainty }
    }

    /// Finite mean and strictly positive, finite uncertainty
    pub fn is_valid(&self) -> bool {
        self.mean.is_finite() && self.uncertainty.is_finite() && self.uncertainty > 0.0
    }

    /// Pessimistic estimate: mean minus `weight` uncertainties
    pub fn conservative(&self, weight: f64) -> f64 {
        self.mean - weight * self.uncertainty
    }

    /// Uncertainty after one completed match
    ///
    /// Never below `floor` unless it already was, and never above the current value.
    pub fn decayed(&self, decay: f64, floor: f64) -> f64 {
        (self.uncertainty * decay).max(floor).min(self.uncertainty)
    }
}

impl From<WengLinRating> for RatingState {
    fn from(rating: WengLinRating) -> Self {
        Self {
            mean: rating.rating,
            uncertainty: rating.uncertainty,
        }
    }
}

impl From<RatingState> for WengLinRating {
    fn from(rating: RatingState) -> Self {
        Self {
            rating: rating.mean,
            uncertainty: rating.uncertainty,
        }
    }
}

/// Region code such as `NA` or `EU`, normalised to upper case
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Region(String);

impl Region {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_uppercase();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("invalid region code '{}'", s));
        }
        Ok(Region(code))
    }
}

impl TryFrom<String> for Region {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Region> for String {
    fn from(region: Region) -> Self {
        region.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered competitor and their per-scheme ratings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competitor {
    pub id: CompetitorId,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default)]
    pub ratings: BTreeMap<SchemeKind, RatingState>,
}

impl Competitor {
    /// New competitor with scheme defaults everywhere
    pub fn new(id: impl Into<CompetitorId>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            region: None,
            ratings: BTreeMap::new(),
        }
    }

    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_rating(mut self, scheme: SchemeKind, rating: RatingState) -> Self {
        self.ratings.insert(scheme, rating);
        self
    }

    /// Stored rating, or the scheme default for a first-time competitor
    pub fn rating(&self, scheme: SchemeKind) -> RatingState {
        self.ratings
            .get(&scheme)
            .copied()
            .unwrap_or_else(|| scheme.default_rating())
    }

    pub fn is_in_region(&self, region: &Region) -> bool {
        self.region.as_ref() == Some(region)
    }

    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// An unordered set of competitors playing together in one match
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub members: Vec<Competitor>,
}

impl Team {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ids(&self) -> Vec<CompetitorId> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }

    /// Average of member means under `scheme`, on the scheme's own scale
    pub fn average_rating(&self, scheme: SchemeKind) -> f64 {
        if self.members.is_empty() {
            return scheme.default_rating().mean;
        }
        let total: f64 = self.members.iter().map(|m| m.rating(scheme).mean).sum();
        total / self.members.len() as f64
    }
}

/// How a balancing request was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStrategy {
    /// Four or fewer players play as one team
    SingleTeam,
    /// Five players split two and three
    FivePlayerSplit,
    /// Randomised snake draft
    SnakeDraft,
    /// Snake draft after seeding one regional player per team
    RegionalSnakeDraft,
}

impl BalanceStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            BalanceStrategy::SingleTeam => "single_team",
            BalanceStrategy::FivePlayerSplit => "five_player_split",
            BalanceStrategy::SnakeDraft => "snake_draft",
            BalanceStrategy::RegionalSnakeDraft => "regional_snake_draft",
        }
    }
}

/// Partition produced by the balancer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceResult {
    pub strategy: BalanceStrategy,
    pub teams: Vec<Team>,
    pub average_rating_by_team: Vec<f64>,
    /// Standard deviation of the team averages; 0 is perfectly even
    pub balance_score: f64,
}

impl BalanceResult {
    pub fn team_sizes(&self) -> Vec<usize> {
        self.teams.iter().map(Team::len).collect()
    }

    pub fn player_count(&self) -> usize {
        self.teams.iter().map(Team::len).sum()
    }
}
