//! Team balancer
//!
//! Partitions a roster into teams of near-equal strength. Players are ranked by
//! a conservative effective rating, lightly shuffled among near-equals, and then
//! handed out by a snake draft whose starting team is drawn from the supplied
//! random source. Small rosters follow fixed special cases.

use crate::balance::randomize::randomize_order;
use crate::balance::sizing::{resolve_sizes, validate_layout, TeamLayout};
use crate::config::BalanceConfig;
use crate::error::{EngineError, Result, ValidationError};
use crate::types::{BalanceResult, BalanceStrategy, Competitor, Region, SchemeKind, Team};
use crate::utils::population_std_dev;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, error, info};

/// Optional constraints on a balancing request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceConstraints {
    /// Every team must contain at least one player from this region
    pub required_region: Option<Region>,
}

impl BalanceConstraints {
    pub fn region(region: Region) -> Self {
        Self {
            required_region: Some(region),
        }
    }
}

/// A roster entry paired with its draft value
#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    competitor: &'a Competitor,
    effective: f64,
}

/// Ping-pong team order: 0, 1, .., k-1, k-1, .., 0, 0, 1, ..
/// rotated so the first pick goes to `start`.
#[derive(Debug, Clone)]
struct SnakeOrder {
    teams: usize,
    start: usize,
    step: usize,
}

impl SnakeOrder {
    fn new(teams: usize, start: usize) -> Self {
        Self {
            teams,
            start,
            step: 0,
        }
    }

    /// The same snake with its first forward leg already taken
    fn after_first_leg(teams: usize, start: usize) -> Self {
        Self {
            teams,
            start,
            step: teams,
        }
    }
}

impl Iterator for SnakeOrder {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let cycle = 2 * self.teams;
        let position = self.step % cycle;
        self.step += 1;
        let offset = if position < self.teams {
            position
        } else {
            cycle - 1 - position
        };
        Some((self.start + offset) % self.teams)
    }
}

/// Partitions rosters into balanced teams
#[derive(Debug, Clone, Default)]
pub struct TeamBalancer {
    config: BalanceConfig,
}

impl TeamBalancer {
    pub fn new(config: BalanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BalanceConfig {
        &self.config
    }

    /// Conservative rating on the 1500-centred balancing scale
    pub fn effective_rating(&self, competitor: &Competitor, scheme: SchemeKind) -> f64 {
        let rating = competitor.rating(scheme);
        rating.conservative(self.config.uncertainty_weight) * scheme.balance_scale()
    }

    /// Partition `players` into teams using ratings from `scheme`
    ///
    /// Every player ends up on exactly one team and every team slot is filled;
    /// anything else is reported as a computation error rather than returned.
    pub fn balance<R>(
        &self,
        players: &[Competitor],
        scheme: SchemeKind,
        layout: &TeamLayout,
        constraints: &BalanceConstraints,
        rng: &mut R,
    ) -> Result<BalanceResult>
    where
        R: Rng + ?Sized,
    {
        self.validate_request(players, scheme, layout)?;

        let mut order: Vec<Candidate<'_>> = players
            .iter()
            .map(|competitor| Candidate {
                competitor,
                effective: self.effective_rating(competitor, scheme),
            })
            .collect();
        order.sort_by(|a, b| b.effective.total_cmp(&a.effective));

        let count = players.len();
        if let Some(fixed) = self.fixed_sizes(count) {
            check_fixed_layout(layout, &fixed)?;
        }
        let (strategy, sizes, teams) = if count <= self.config.single_team_threshold {
            info!("Special case: {} players - creating single team", count);
            (BalanceStrategy::SingleTeam, vec![count], vec![order])
        } else if count == self.config.split_threshold {
            info!("Special case: {} players - splitting 2:3", count);
            let teams = self.split_five(order, constraints.required_region.as_ref());
            (BalanceStrategy::FivePlayerSplit, vec![2, 3], teams)
        } else {
            let sizes = resolve_sizes(layout, count, &self.config)?;
            randomize_order(
                &mut order,
                |candidate| candidate.effective,
                self.config.band_width,
                self.config.similarity_threshold,
                rng,
            );
            let start = rng.random_range(0..sizes.len());
            match &constraints.required_region {
                Some(region) => {
                    let teams = self.regional_draft(&order, &sizes, region, start)?;
                    (BalanceStrategy::RegionalSnakeDraft, sizes, teams)
                }
                None => {
                    let mut teams = vec![Vec::new(); sizes.len()];
                    let snake = SnakeOrder::new(sizes.len(), start);
                    snake_draft(&order, &sizes, snake, &mut teams)?;
                    (BalanceStrategy::SnakeDraft, sizes, teams)
                }
            }
        };

        validate_partition(players, &sizes, &teams)?;

        let teams: Vec<Team> = teams
            .into_iter()
            .map(|members| Team {
                members: members.into_iter().map(|c| c.competitor.clone()).collect(),
            })
            .collect();
        let average_rating_by_team: Vec<f64> =
            teams.iter().map(|team| team.average_rating(scheme)).collect();
        let balance_score = population_std_dev(&average_rating_by_team);

        info!(
            "Created {} teams via {} with balance score: {:.2}",
            teams.len(),
            strategy.as_str(),
            balance_score
        );
        info!(
            "Team ratings: {:?}",
            average_rating_by_team
                .iter()
                .map(|rating| format!("{:.1}", rating))
                .collect::<Vec<_>>()
        );

        Ok(BalanceResult {
            strategy,
            teams,
            average_rating_by_team,
            balance_score,
        })
    }

    /// Sizes the special cases always produce, if `count` hits one
    fn fixed_sizes(&self, count: usize) -> Option<Vec<usize>> {
        if count <= self.config.single_team_threshold {
            Some(vec![count])
        } else if count == self.config.split_threshold {
            Some(vec![2, count.saturating_sub(2)])
        } else {
            None
        }
    }

    fn validate_request(
        &self,
        players: &[Competitor],
        scheme: SchemeKind,
        layout: &TeamLayout,
    ) -> std::result::Result<(), ValidationError> {
        let count = players.len();
        if count < self.config.min_players || count > self.config.max_players {
            return Err(ValidationError::PlayerCount {
                count,
                min: self.config.min_players,
                max: self.config.max_players,
            });
        }

        let mut seen = HashSet::with_capacity(count);
        for player in players {
            if !seen.insert(player.id.as_str()) {
                return Err(ValidationError::DuplicateCompetitor {
                    id: player.id.clone(),
                });
            }
            if !player.rating(scheme).is_valid() {
                return Err(ValidationError::InvalidRating {
                    id: player.id.clone(),
                });
            }
        }

        validate_layout(layout, count, &self.config)
    }

    /// Two strongest players against the other three
    ///
    /// With a region requirement and at least two regional players, each team
    /// is first seeded with one of the two best regional players and the
    /// strongest remaining player joins the pair.
    fn split_five<'a>(
        &self,
        order: Vec<Candidate<'a>>,
        region: Option<&Region>,
    ) -> Vec<Vec<Candidate<'a>>> {
        let regional: Vec<usize> = match region {
            Some(region) => order
                .iter()
                .enumerate()
                .filter(|(_, c)| c.competitor.is_in_region(region))
                .map(|(i, _)| i)
                .take(2)
                .collect(),
            None => Vec::new(),
        };

        if regional.len() < 2 {
            if region.is_some() {
                debug!("Fewer than 2 regional players, using the plain 2:3 split");
            }
            let mut order = order;
            let rest = order.split_off(2);
            return vec![order, rest];
        }

        let mut pair = vec![order[regional[0]]];
        let mut trio = vec![order[regional[1]]];
        let mut remaining = order
            .iter()
            .enumerate()
            .filter(|(i, _)| !regional.contains(i))
            .map(|(_, c)| *c);
        pair.extend(remaining.next());
        trio.extend(remaining);
        vec![pair, trio]
    }

    /// Seed one regional player per team, then snake-draft everyone else
    ///
    /// Seeding counts as the snake's first leg, so the team holding the best
    /// regional player picks last among the rest.
    fn regional_draft<'a>(
        &self,
        order: &[Candidate<'a>],
        sizes: &[usize],
        region: &Region,
        start: usize,
    ) -> Result<Vec<Vec<Candidate<'a>>>> {
        let (regional, others): (Vec<Candidate<'a>>, Vec<Candidate<'a>>) = order
            .iter()
            .copied()
            .partition(|c| c.competitor.is_in_region(region));

        let team_count = sizes.len();
        if regional.len() < team_count {
            return Err(ValidationError::InsufficientRegionalPlayers {
                region: region.to_string(),
                available: regional.len(),
                required: team_count,
            }
            .into());
        }

        let mut teams = vec![Vec::new(); team_count];
        for (i, candidate) in regional.iter().take(team_count).enumerate() {
            let team = (start + i) % team_count;
            debug!(
                "Seeding regional player {} onto team {}",
                candidate.competitor.id,
                team + 1
            );
            teams[team].push(*candidate);
        }

        let remaining: Vec<Candidate<'a>> = regional
            .into_iter()
            .skip(team_count)
            .chain(others)
            .collect();
        let snake = SnakeOrder::after_first_leg(team_count, start);
        snake_draft(&remaining, sizes, snake, &mut teams)?;
        Ok(teams)
    }
}

/// An explicit layout must describe the shape a special case produces
fn check_fixed_layout(
    layout: &TeamLayout,
    fixed: &[usize],
) -> std::result::Result<(), ValidationError> {
    let matches = match layout {
        TeamLayout::Auto => true,
        TeamLayout::Count(count) => *count == fixed.len(),
        TeamLayout::Sizes(sizes) => sizes.as_slice() == fixed,
    };
    if matches {
        return Ok(());
    }
    Err(ValidationError::FixedLayout {
        requested: layout.to_string(),
        players: fixed.iter().sum(),
        required: TeamLayout::Sizes(fixed.to_vec()).to_string(),
    })
}

/// Assign `order` to teams following `snake`, skipping full teams
fn snake_draft<'a>(
    order: &[Candidate<'a>],
    sizes: &[usize],
    mut snake: SnakeOrder,
    teams: &mut [Vec<Candidate<'a>>],
) -> Result<()> {
    let team_count = sizes.len();

    for candidate in order {
        let team = snake
            .by_ref()
            .take(2 * team_count)
            .find(|&team| teams[team].len() < sizes[team])
            .ok_or_else(|| {
                error!(
                    "No open team slot for competitor {}",
                    candidate.competitor.id
                );
                EngineError::computation(format!(
                    "no open team slot for competitor {}",
                    candidate.competitor.id
                ))
            })?;
        debug!(
            "Drafted {} ({:.1}) to team {}",
            candidate.competitor.id,
            candidate.effective,
            team + 1
        );
        teams[team].push(*candidate);
    }
    Ok(())
}

/// Every input player placed exactly once and every slot filled
fn validate_partition(
    players: &[Competitor],
    sizes: &[usize],
    teams: &[Vec<Candidate<'_>>],
) -> Result<()> {
    let fail = |message: String| {
        error!("Team validation failed: {}", message);
        Err(EngineError::computation(message))
    };

    if teams.len() != sizes.len() {
        return fail(format!(
            "expected {} teams but built {}",
            sizes.len(),
            teams.len()
        ));
    }
    for (index, (team, size)) in teams.iter().zip(sizes).enumerate() {
        if team.len() != *size {
            return fail(format!(
                "team {} has {} players, expected {}",
                index + 1,
                team.len(),
                size
            ));
        }
    }

    let placed: Vec<&str> = teams
        .iter()
        .flatten()
        .map(|c| c.competitor.id.as_str())
        .collect();
    if placed.len() != players.len() {
        return fail(format!(
            "team player count mismatch: {} != {}",
            placed.len(),
            players.len()
        ));
    }
    let placed: HashSet<&str> = placed.into_iter().collect();
    let expected: HashSet<&str> = players.iter().map(|p| p.id.as_str()).collect();
    if placed != expected {
        return fail("team players don't match the roster".to_string());
    }
    Ok(())
}
