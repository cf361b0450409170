//! Team layout resolution
//!
//! Turns a requested layout (explicit sizes, a team count, or nothing at all)
//! into the concrete number of players each team should receive.

use crate::config::BalanceConfig;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested shape of the partition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamLayout {
    /// Pick a team count from the player count
    #[default]
    Auto,
    /// Split evenly into this many teams
    Count(usize),
    /// Exact sizes, team by team
    Sizes(Vec<usize>),
}

impl fmt::Display for TeamLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamLayout::Auto => write!(f, "auto"),
            TeamLayout::Count(count) => write!(f, "{} teams", count),
            TeamLayout::Sizes(sizes) => {
                let parts: Vec<String> = sizes.iter().map(|s| s.to_string()).collect();
                write!(f, "{}", parts.join(":"))
            }
        }
    }
}

impl FromStr for TeamLayout {
    type Err = ValidationError;

    /// Accepts `auto`, a bare team count such as `3`, or sizes such as `4:4:2`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("auto") {
            return Ok(TeamLayout::Auto);
        }
        if trimmed.contains(':') {
            return parse_team_format(trimmed).map(TeamLayout::Sizes);
        }
        match trimmed.parse::<usize>() {
            Ok(count) if count > 0 => Ok(TeamLayout::Count(count)),
            _ => Err(ValidationError::InvalidTeamFormat {
                input: s.to_string(),
            }),
        }
    }
}

/// Parse a team format like `4:4:2` into `[4, 4, 2]`
pub fn parse_team_format(format: &str) -> Result<Vec<usize>, ValidationError> {
    let invalid = || ValidationError::InvalidTeamFormat {
        input: format.to_string(),
    };

    let sizes = format
        .split(':')
        .map(|part| part.trim().parse::<usize>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;

    if sizes.is_empty() || sizes.iter().any(|&size| size == 0) {
        return Err(invalid());
    }
    Ok(sizes)
}

/// Team count used when the caller does not ask for one
///
/// Small groups play as one team or a single split; larger groups aim for
/// three or four players per team, capped at six teams.
pub fn recommended_team_count(players: usize) -> usize {
    match players {
        0..=4 => 1,
        5..=8 => 2,
        _ => {
            let by_four = (players + 3) / 4;
            let cap = (players / 3).min(6);
            by_four.max(3).min(cap)
        }
    }
}

/// Equal split with the remainder going to the first teams
pub fn even_sizes(players: usize, teams: usize) -> Vec<usize> {
    if teams == 0 {
        return Vec::new();
    }
    let base = players / teams;
    let remainder = players % teams;
    (0..teams)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

/// Check a layout against the configured bounds without resolving it
pub fn validate_layout(
    layout: &TeamLayout,
    players: usize,
    config: &BalanceConfig,
) -> Result<(), ValidationError> {
    match layout {
        TeamLayout::Auto => Ok(()),
        TeamLayout::Count(count) => {
            if *count == 0 || *count > config.max_teams {
                return Err(ValidationError::TeamCount {
                    count: *count,
                    min: 1,
                    max: config.max_teams,
                });
            }
            Ok(())
        }
        TeamLayout::Sizes(sizes) => {
            if sizes.is_empty() || sizes.len() > config.max_teams {
                return Err(ValidationError::TeamCount {
                    count: sizes.len(),
                    min: 1,
                    max: config.max_teams,
                });
            }
            if let Some(index) = sizes.iter().position(|&size| size == 0) {
                return Err(ValidationError::EmptyTeamSlot { index });
            }
            let requested: usize = sizes.iter().sum();
            if requested != players {
                return Err(ValidationError::SizeMismatch { requested, players });
            }
            Ok(())
        }
    }
}

/// Resolve a validated layout into per-team target sizes
pub fn resolve_sizes(
    layout: &TeamLayout,
    players: usize,
    config: &BalanceConfig,
) -> Result<Vec<usize>, ValidationError> {
    validate_layout(layout, players, config)?;

    let sizes = match layout {
        TeamLayout::Auto => even_sizes(players, recommended_team_count(players).min(config.max_teams)),
        TeamLayout::Count(count) => even_sizes(players, *count),
        TeamLayout::Sizes(sizes) => sizes.clone(),
    };

    if let Some(index) = sizes.iter().position(|&size| size == 0) {
        return Err(ValidationError::EmptyTeamSlot { index });
    }
    Ok(sizes)
}
