//! Rating storage interface and implementations
//!
//! This module defines the persistence and roster contracts the engine relies
//! on, with an in-memory implementation that applies whole match updates
//! atomically.

use crate::error::{EngineError, Result};
use crate::rating::calculator::{RatingChange, RatingUpdate};
use crate::rating::placement::Breakdown;
use crate::types::{CompetitorId, GroupId, MatchId, RatingState, SchemeKind};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Ratings are tracked per group, competitor and scheme
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RatingKey {
    pub group: GroupId,
    pub competitor: CompetitorId,
    pub scheme: SchemeKind,
}

impl RatingKey {
    pub fn new(group: GroupId, competitor: impl Into<CompetitorId>, scheme: SchemeKind) -> Self {
        Self {
            group,
            competitor: competitor.into(),
            scheme,
        }
    }
}

/// Storage entry for a competitor's rating with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingEntry {
    pub rating: RatingState,
    pub games_played: u64,
    /// Factors behind the most recent placement-scheme change
    pub last_breakdown: Option<Breakdown>,
    pub last_match: Option<MatchId>,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RatingEntry {
    /// Create a new rating entry for a first-time competitor
    pub fn new(initial_rating: RatingState) -> Self {
        let now = current_timestamp();
        Self {
            rating: initial_rating,
            games_played: 0,
            last_breakdown: None,
            last_match: None,
            last_updated: now,
            created_at: now,
        }
    }

    /// Record the outcome of one match
    pub fn record(&mut self, change: &RatingChange, match_id: MatchId) {
        self.rating = change.after;
        self.games_played += 1;
        self.last_breakdown = change.breakdown;
        self.last_match = Some(match_id);
        self.last_updated = current_timestamp();
    }
}

/// Source of competitors' current ratings
#[cfg_attr(test, mockall::automock)]
pub trait RosterProvider: Send + Sync {
    /// Stored rating, or the scheme default for a first-time competitor
    fn rating(&self, group: GroupId, id: &str, scheme: SchemeKind) -> Result<RatingState>;
}

/// Trait for rating storage operations
pub trait RatingStorage: Send + Sync {
    /// Get a competitor's rating entry
    fn get_rating(&self, key: &RatingKey) -> Result<Option<RatingEntry>>;

    /// Store or replace a competitor's rating entry
    fn store_rating(&self, key: RatingKey, entry: RatingEntry) -> Result<()>;

    /// Get entries for several competitors in one group and scheme
    fn get_ratings(
        &self,
        group: GroupId,
        scheme: SchemeKind,
        ids: &[CompetitorId],
    ) -> Result<HashMap<CompetitorId, RatingEntry>>;

    /// Persist every change of a match update, or none of them
    ///
    /// Each change's `before` must equal the currently stored rating (or the
    /// scheme default when nothing is stored). If any differs, another update
    /// got there first and the whole update is rejected with
    /// [`EngineError::StaleRating`].
    fn apply_update(&self, group: GroupId, update: &RatingUpdate) -> Result<Vec<RatingEntry>>;

    /// Remove a competitor's rating
    fn remove_rating(&self, key: &RatingKey) -> Result<bool>;

    /// Highest-rated competitors of a group under one scheme
    fn leaderboard(
        &self,
        group: GroupId,
        scheme: SchemeKind,
        limit: Option<usize>,
    ) -> Result<Vec<(CompetitorId, RatingEntry)>>;

    /// Get total number of stored ratings
    fn get_entry_count(&self) -> Result<usize>;
}

/// In-memory rating storage implementation
#[derive(Debug, Default)]
pub struct InMemoryRatingStorage {
    ratings: RwLock<HashMap<RatingKey, RatingEntry>>,
}

impl InMemoryRatingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<RatingKey, RatingEntry>>> {
        self.ratings.read().map_err(|_| EngineError::Storage {
            message: "Failed to acquire ratings read lock".to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<RatingKey, RatingEntry>>> {
        self.ratings.write().map_err(|_| EngineError::Storage {
            message: "Failed to acquire ratings write lock".to_string(),
        })
    }
}

impl RatingStorage for InMemoryRatingStorage {
    fn get_rating(&self, key: &RatingKey) -> Result<Option<RatingEntry>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn store_rating(&self, key: RatingKey, entry: RatingEntry) -> Result<()> {
        self.write()?.insert(key, entry);
        Ok(())
    }

    fn get_ratings(
        &self,
        group: GroupId,
        scheme: SchemeKind,
        ids: &[CompetitorId],
    ) -> Result<HashMap<CompetitorId, RatingEntry>> {
        let ratings = self.read()?;
        let mut result = HashMap::new();
        for id in ids {
            if let Some(entry) = ratings.get(&RatingKey::new(group, id.clone(), scheme)) {
                result.insert(id.clone(), entry.clone());
            }
        }
        Ok(result)
    }

    fn apply_update(&self, group: GroupId, update: &RatingUpdate) -> Result<Vec<RatingEntry>> {
        let mut ratings = self.write()?;

        // Check every change before touching anything
        for change in &update.changes {
            let key = RatingKey::new(group, change.id.clone(), update.scheme);
            let current = ratings
                .get(&key)
                .map(|entry| entry.rating)
                .unwrap_or_else(|| update.scheme.default_rating());
            if current != change.before {
                warn!(
                    "Rejecting update for match {}: {} rating for {} changed since it was read",
                    update.match_id, update.scheme, change.id
                );
                return Err(EngineError::StaleRating {
                    competitor: change.id.clone(),
                    scheme: update.scheme,
                });
            }
        }

        let mut stored = Vec::with_capacity(update.changes.len());
        for change in &update.changes {
            let key = RatingKey::new(group, change.id.clone(), update.scheme);
            let entry = ratings
                .entry(key)
                .or_insert_with(|| RatingEntry::new(change.before));
            entry.record(change, update.match_id);
            stored.push(entry.clone());
        }

        debug!(
            "Stored {} {} ratings for match {}",
            stored.len(),
            update.scheme,
            update.match_id
        );
        Ok(stored)
    }

    fn remove_rating(&self, key: &RatingKey) -> Result<bool> {
        Ok(self.write()?.remove(key).is_some())
    }

    fn leaderboard(
        &self,
        group: GroupId,
        scheme: SchemeKind,
        limit: Option<usize>,
    ) -> Result<Vec<(CompetitorId, RatingEntry)>> {
        let ratings = self.read()?;
        let mut entries: Vec<(CompetitorId, RatingEntry)> = ratings
            .iter()
            .filter(|(key, _)| key.group == group && key.scheme == scheme)
            .map(|(key, entry)| (key.competitor.clone(), entry.clone()))
            .collect();

        entries.sort_by(|a, b| b.1.rating.mean.total_cmp(&a.1.rating.mean));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    fn get_entry_count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

impl RosterProvider for InMemoryRatingStorage {
    fn rating(&self, group: GroupId, id: &str, scheme: SchemeKind) -> Result<RatingState> {
        let key = RatingKey::new(group, id, scheme);
        Ok(self
            .get_rating(&key)?
            .map(|entry| entry.rating)
            .unwrap_or_else(|| scheme.default_rating()))
    }
}
