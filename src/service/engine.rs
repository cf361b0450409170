//! Engine façade tying balancing, rating schemes, storage and metrics together
//!
//! The balancer and the schemes are pure; this layer supplies the entropy for
//! each balancing call, reads "before" ratings from storage, and persists
//! rating updates atomically so concurrent matches cannot lose an update.

use crate::balance::{BalanceConstraints, TeamBalancer, TeamLayout};
use crate::config::{validate_config, AppConfig};
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::rating::{
    InMemoryRatingStorage, MatchContext, RatingCalculator, RatingEntry, RatingKey, RatingScheme,
    RatingStorage, RatingUpdate, RosterProvider,
};
use crate::types::{BalanceResult, Competitor, CompetitorId, GroupId, RatingState, SchemeKind};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Balancing and rating entry point used by the binaries
pub struct MatchmakingEngine {
    config: AppConfig,
    balancer: TeamBalancer,
    schemes: BTreeMap<SchemeKind, RatingScheme>,
    storage: Arc<dyn RatingStorage>,
    metrics: Arc<MetricsCollector>,
}

impl MatchmakingEngine {
    /// Engine backed by in-memory storage
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        Self::with_storage(config, Arc::new(InMemoryRatingStorage::new()))
    }

    pub fn with_storage(config: AppConfig, storage: Arc<dyn RatingStorage>) -> anyhow::Result<Self> {
        validate_config(&config)?;
        let metrics = Arc::new(MetricsCollector::new()?);
        let balancer = TeamBalancer::new(config.balance.clone());
        let schemes = SchemeKind::ALL
            .iter()
            .map(|&kind| (kind, RatingScheme::from_config(kind, &config.rating)))
            .collect();

        info!(
            "Engine '{}' ready with schemes: {}",
            config.service.name,
            SchemeKind::ALL
                .iter()
                .map(|kind| kind.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            config,
            balancer,
            schemes,
            storage,
            metrics,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn balancer(&self) -> &TeamBalancer {
        &self.balancer
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn storage(&self) -> Arc<dyn RatingStorage> {
        self.storage.clone()
    }

    pub fn scheme(&self, kind: SchemeKind) -> &RatingScheme {
        &self.schemes[&kind]
    }

    /// Balance with a freshly entropy-seeded random source
    pub fn propose_teams(
        &self,
        players: &[Competitor],
        scheme: SchemeKind,
        layout: &TeamLayout,
        constraints: &BalanceConstraints,
    ) -> Result<BalanceResult> {
        let mut rng = ChaCha20Rng::from_os_rng();
        self.propose_teams_with_rng(players, scheme, layout, constraints, &mut rng)
    }

    /// Balance with a caller-supplied random source
    pub fn propose_teams_with_rng<R>(
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
        let timer = self.metrics.start_timer();
        match self
            .balancer
            .balance(players, scheme, layout, constraints, rng)
        {
            Ok(result) => {
                self.metrics.record_balance(&result, timer.stop());
                Ok(result)
            }
            Err(e) => {
                warn!("Balancing {} players failed: {}", players.len(), e);
                self.metrics.record_balance_failure(e.kind());
                Err(e)
            }
        }
    }

    /// Compute an update without persisting it
    pub fn compute_update(&self, scheme: SchemeKind, context: &MatchContext) -> Result<RatingUpdate> {
        let timer = self.metrics.start_timer();
        match self.scheme(scheme).compute_update(context) {
            Ok(update) => {
                self.metrics.record_rating_update(&update, timer.stop());
                Ok(update)
            }
            Err(e) => {
                self.metrics.record_rating_failure(scheme, e.kind());
                Err(e)
            }
        }
    }

    /// Compute and persist the ratings resulting from a match
    ///
    /// A degraded multi-team update leaves storage untouched. A stale
    /// context (any "before" rating no longer current) is rejected whole.
    pub fn record_result(
        &self,
        group: GroupId,
        scheme: SchemeKind,
        context: &MatchContext,
    ) -> Result<RatingUpdate> {
        let update = self.compute_update(scheme, context)?;
        if let Some(diagnostic) = &update.diagnostic {
            warn!(
                "Not persisting degraded {} update for match {}: {}",
                scheme, update.match_id, diagnostic.reason
            );
            return Ok(update);
        }

        if let Err(e) = self.storage.apply_update(group, &update) {
            error!(
                "Failed to persist {} update for match {}: {}",
                scheme, update.match_id, e
            );
            self.metrics.record_rating_failure(scheme, e.kind());
            return Err(e);
        }

        info!(
            "Recorded {} update for match {} in group {}: {} players",
            scheme,
            update.match_id,
            group,
            update.changes.len()
        );
        Ok(update)
    }

    /// Read current ratings for the given teams, then record the result
    pub fn record_placements(
        &self,
        group: GroupId,
        scheme: SchemeKind,
        teams: &[(u32, Vec<CompetitorId>)],
        placement_by_team: BTreeMap<u32, u32>,
    ) -> Result<RatingUpdate> {
        let context = MatchContext::from_roster(self, group, scheme, teams, placement_by_team)?;
        self.record_result(group, scheme, &context)
    }

    /// Current stored entry, if any
    pub fn rating_entry(
        &self,
        group: GroupId,
        id: &str,
        scheme: SchemeKind,
    ) -> Result<Option<RatingEntry>> {
        self.storage.get_rating(&RatingKey::new(group, id, scheme))
    }

    pub fn leaderboard(
        &self,
        group: GroupId,
        scheme: SchemeKind,
        limit: Option<usize>,
    ) -> Result<Vec<(CompetitorId, RatingEntry)>> {
        self.storage.leaderboard(group, scheme, limit)
    }

    /// Competitor carrying its current stored ratings under every scheme
    pub fn hydrate(&self, group: GroupId, competitor: &Competitor) -> Result<Competitor> {
        let mut hydrated = competitor.clone();
        for kind in SchemeKind::ALL {
            if let Some(entry) = self.rating_entry(group, &competitor.id, kind)? {
                hydrated.ratings.insert(kind, entry.rating);
            }
        }
        Ok(hydrated)
    }
}

impl RosterProvider for MatchmakingEngine {
    fn rating(&self, group: GroupId, id: &str, scheme: SchemeKind) -> Result<RatingState> {
        Ok(self
            .rating_entry(group, id, scheme)?
            .map(|entry| entry.rating)
            .unwrap_or_else(|| self.scheme(scheme).initial_rating()))
    }
}
