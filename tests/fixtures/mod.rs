//! Test fixtures and stub implementations for integration testing

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use teamforge::error::{EngineError, Result};
use teamforge::rating::{RatingEntry, RatingKey, RatingStorage, RatingUpdate, RosterProvider};
use teamforge::types::{
    BalanceResult, Competitor, CompetitorId, GroupId, RatingState, Region, SchemeKind,
};

/// Roster of `count` players rated 1000, 1100, ... under `scheme`
pub fn ladder(count: usize, scheme: SchemeKind) -> Vec<Competitor> {
    (0..count)
        .map(|i| {
            Competitor::new(format!("player{:02}", i + 1))
                .with_rating(scheme, RatingState::new(1000.0 + 100.0 * i as f64, 120.0))
        })
        .collect()
}

/// Ladder where every other player is from `region`, starting with the best
pub fn regional_ladder(count: usize, scheme: SchemeKind, region: &str) -> Vec<Competitor> {
    let region: Region = region.parse().expect("valid region code");
    ladder(count, scheme)
        .into_iter()
        .rev()
        .enumerate()
        .map(|(i, competitor)| {
            if i % 2 == 0 {
                competitor.with_region(region.clone())
            } else {
                competitor
            }
        })
        .collect()
}

/// Sorted ids of every player in a balance result
pub fn placed_ids(result: &BalanceResult) -> Vec<CompetitorId> {
    let mut ids: Vec<CompetitorId> = result.teams.iter().flat_map(|team| team.ids()).collect();
    ids.sort();
    ids
}

/// Sorted ids of a roster
pub fn roster_ids(roster: &[Competitor]) -> Vec<CompetitorId> {
    let mut ids: Vec<CompetitorId> = roster.iter().map(|c| c.id.clone()).collect();
    ids.sort();
    ids
}

pub fn placements(pairs: &[(u32, u32)]) -> BTreeMap<u32, u32> {
    pairs.iter().copied().collect()
}

/// Roster provider backed by a fixed table
#[derive(Debug, Default)]
pub struct FixedRoster {
    ratings: HashMap<(GroupId, CompetitorId, SchemeKind), RatingState>,
    lookups: AtomicUsize,
}

impl FixedRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, group: GroupId, id: &str, scheme: SchemeKind, rating: RatingState) -> Self {
        self.ratings.insert((group, id.to_string(), scheme), rating);
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl RosterProvider for FixedRoster {
    fn rating(&self, group: GroupId, id: &str, scheme: SchemeKind) -> Result<RatingState> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .ratings
            .get(&(group, id.to_string(), scheme))
            .copied()
            .unwrap_or_else(|| scheme.default_rating()))
    }
}

/// Storage whose writes always fail, for exercising error propagation
#[derive(Debug, Default)]
pub struct FailingStorage {
    attempts: Mutex<Vec<GroupId>>,
}

impl FailingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> Vec<GroupId> {
        self.attempts
            .lock()
            .map(|attempts| attempts.clone())
            .unwrap_or_default()
    }

    fn unavailable() -> EngineError {
        EngineError::Storage {
            message: "backend unavailable".to_string(),
        }
    }
}

impl RatingStorage for FailingStorage {
    fn get_rating(&self, _key: &RatingKey) -> Result<Option<RatingEntry>> {
        Ok(None)
    }

    fn store_rating(&self, _key: RatingKey, _entry: RatingEntry) -> Result<()> {
        Err(Self::unavailable())
    }

    fn get_ratings(
        &self,
        _group: GroupId,
        _scheme: SchemeKind,
        _ids: &[CompetitorId],
    ) -> Result<HashMap<CompetitorId, RatingEntry>> {
        Ok(HashMap::new())
    }

    fn apply_update(&self, group: GroupId, _update: &RatingUpdate) -> Result<Vec<RatingEntry>> {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(group);
        }
        Err(Self::unavailable())
    }

    fn remove_rating(&self, _key: &RatingKey) -> Result<bool> {
        Ok(false)
    }

    fn leaderboard(
        &self,
        _group: GroupId,
        _scheme: SchemeKind,
        _limit: Option<usize>,
    ) -> Result<Vec<(CompetitorId, RatingEntry)>> {
        Ok(Vec::new())
    }

    fn get_entry_count(&self) -> Result<usize> {
        Ok(0)
    }
}
