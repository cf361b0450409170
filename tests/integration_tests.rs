//! Integration tests for the teamforge engine
//!
//! These tests validate the crate working together, including:
//! - Balancing through the engine with seeded and entropy-seeded randomness
//! - Regional seeding on real rosters
//! - Recording results under every scheme and reading them back
//! - Stale and failing storage handling
//! - Configuration loading and metrics export

mod fixtures;

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use teamforge::balance::{BalanceConstraints, TeamLayout};
use teamforge::config::AppConfig;
use teamforge::rating::{FieldKind, MatchContext, RatingTier};
use teamforge::types::{BalanceStrategy, CompetitorId, RatingState, Region, SchemeKind};
use teamforge::{EngineError, MatchmakingEngine};

use fixtures::{ladder, placed_ids, placements, regional_ladder, roster_ids, FailingStorage, FixedRoster};

fn create_engine() -> MatchmakingEngine {
    MatchmakingEngine::new(AppConfig::default()).expect("Failed to create engine")
}

fn team_ids(result: &teamforge::BalanceResult) -> Vec<(u32, Vec<CompetitorId>)> {
    result
        .teams
        .iter()
        .enumerate()
        .map(|(index, team)| (index as u32 + 1, team.ids()))
        .collect()
}

#[test]
fn test_complete_placement_season_round() {
    let engine = create_engine();
    let roster = ladder(12, SchemeKind::Placement);
    let mut rng = ChaCha20Rng::seed_from_u64(11);

    // Step 1: balance into three teams
    let result = engine
        .propose_teams_with_rng(
            &roster,
            SchemeKind::Placement,
            &TeamLayout::Count(3),
            &BalanceConstraints::default(),
            &mut rng,
        )
        .unwrap();
    assert_eq!(result.strategy, BalanceStrategy::SnakeDraft);
    assert_eq!(result.team_sizes(), vec![4, 4, 4]);
    assert_eq!(placed_ids(&result), roster_ids(&roster));

    // Step 2: seed storage with the roster ratings
    let storage = engine.storage();
    for competitor in &roster {
        storage
            .store_rating(
                teamforge::rating::RatingKey::new(1, competitor.id.clone(), SchemeKind::Placement),
                teamforge::rating::RatingEntry::new(competitor.rating(SchemeKind::Placement)),
            )
            .unwrap();
    }

    // Step 3: record the result
    let teams = team_ids(&result);
    let update = engine
        .record_placements(
            1,
            SchemeKind::Placement,
            &teams,
            placements(&[(1, 1), (2, 2), (3, 3)]),
        )
        .unwrap();
    assert_eq!(update.changes.len(), 12);
    assert!(!update.is_degraded());

    // Winners gain and every change carries a breakdown within its limit
    for change in &update.changes {
        let breakdown = change.breakdown.expect("placement changes carry a breakdown");
        assert!(breakdown.final_change.abs() <= breakdown.max_change_limit + 1e-9);
        assert!((change.delta() - breakdown.final_change).abs() < 1e-9);
        if change.placement == 1 {
            assert!(change.delta() > 0.0);
        }
        let entry = engine
            .rating_entry(1, &change.id, SchemeKind::Placement)
            .unwrap()
            .unwrap();
        assert_eq!(entry.rating, change.after);
        assert_eq!(entry.games_played, 1);
        assert_eq!(entry.last_match, Some(update.match_id));
    }

    // Step 4: the next draft sees the new ratings
    let hydrated = roster
        .iter()
        .map(|c| engine.hydrate(1, c))
        .collect::<teamforge::Result<Vec<_>>>()
        .unwrap();
    let leaderboard = engine.leaderboard(1, SchemeKind::Placement, Some(3)).unwrap();
    assert_eq!(leaderboard.len(), 3);
    let best = hydrated
        .iter()
        .max_by(|a, b| {
            a.rating(SchemeKind::Placement)
                .mean
                .total_cmp(&b.rating(SchemeKind::Placement).mean)
        })
        .unwrap();
    assert_eq!(leaderboard[0].0, best.id);
}

#[test]
fn test_entropy_seeded_drafts_vary() {
    let engine = create_engine();
    let roster = ladder(12, SchemeKind::Simple);

    let mut seen = BTreeSet::new();
    for _ in 0..30 {
        let result = engine
            .propose_teams(
                &roster,
                SchemeKind::Simple,
                &TeamLayout::Count(3),
                &BalanceConstraints::default(),
            )
            .unwrap();
        seen.insert(team_ids(&result));
    }

    assert!(seen.len() > 1, "30 entropy-seeded drafts were identical");
}

#[test]
fn test_seeded_drafts_are_reproducible() {
    let engine = create_engine();
    let roster = ladder(10, SchemeKind::Placement);
    let layout: TeamLayout = "4:3:3".parse().unwrap();

    let run = |seed| {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        engine
            .propose_teams_with_rng(
                &roster,
                SchemeKind::Placement,
                &layout,
                &BalanceConstraints::default(),
                &mut rng,
            )
            .unwrap()
    };

    let first = run(99);
    assert_eq!(first, run(99));
    assert_eq!(first.team_sizes(), vec![4, 3, 3]);
}

#[test]
fn test_regional_draft_end_to_end() {
    let engine = create_engine();
    let roster = regional_ladder(12, SchemeKind::Placement, "EU");
    let region: Region = "eu".parse().unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(5);

    let result = engine
        .propose_teams_with_rng(
            &roster,
            SchemeKind::Placement,
            &TeamLayout::Count(4),
            &BalanceConstraints::region(region.clone()),
            &mut rng,
        )
        .unwrap();

    assert_eq!(result.strategy, BalanceStrategy::RegionalSnakeDraft);
    assert_eq!(placed_ids(&result), roster_ids(&roster));
    for team in &result.teams {
        assert!(team.members.iter().any(|m| m.is_in_region(&region)));
    }
}

#[test]
fn test_unsatisfiable_region_is_rejected() {
    let engine = create_engine();
    let roster = regional_ladder(12, SchemeKind::Placement, "EU");

    let err = engine
        .propose_teams(
            &roster,
            SchemeKind::Placement,
            &TeamLayout::Count(3),
            &BalanceConstraints::region("OCE".parse().unwrap()),
        )
        .unwrap_err();

    assert_eq!(err.kind(), "validation");
}

#[test]
fn test_simple_two_team_result_is_zero_sum() {
    let engine = create_engine();
    let teams = vec![
        (1, vec!["a".to_string(), "b".to_string()]),
        (2, vec!["c".to_string(), "d".to_string()]),
    ];

    let update = engine
        .record_placements(2, SchemeKind::Simple, &teams, placements(&[(1, 1), (2, 2)]))
        .unwrap();

    let total: f64 = update.changes.iter().map(|c| c.delta()).sum();
    assert!(total.abs() < 1e-9);
    assert!(update.change_for("a").unwrap().delta() > 0.0);
    assert!(update.change_for("d").unwrap().delta() < 0.0);
}

#[test]
fn test_multi_team_external_field() {
    let engine = create_engine();
    let teams = vec![
        (1, vec!["a".to_string(), "b".to_string()]),
        (2, vec!["c".to_string(), "d".to_string()]),
    ];

    let update = engine
        .record_placements(4, SchemeKind::MultiTeam, &teams, placements(&[(1, 2), (2, 5)]))
        .unwrap();

    let field = update.field.as_ref().expect("multi-team updates describe the field");
    assert_eq!(field.kind, FieldKind::External);
    assert_eq!(field.known_teams, 2);
    assert_eq!(field.external_teams, 3);
    assert_eq!(field.total_competitors, 5);

    // Only known players are rated
    assert_eq!(update.changes.len(), 4);
    assert!(update.change_for("a").unwrap().delta() > 0.0);
    assert!(update.change_for("c").unwrap().delta() < 0.0);
    for change in &update.changes {
        assert!(change.after.mean >= 0.0);
        assert!(change.after.uncertainty >= 0.1);
    }
}

#[test]
fn test_context_from_fixed_roster() {
    let roster = FixedRoster::new()
        .with(7, "a", SchemeKind::Placement, RatingState::new(1900.0, 100.0))
        .with(7, "b", SchemeKind::Placement, RatingState::new(1100.0, 100.0));
    let teams = vec![(1, vec!["a".to_string()]), (2, vec!["b".to_string(), "c".to_string()])];

    let context = MatchContext::from_roster(
        &roster,
        7,
        SchemeKind::Placement,
        &teams,
        placements(&[(1, 2), (2, 1)]),
    )
    .unwrap();

    assert_eq!(roster.lookups(), 3);
    assert_eq!(context.teams[0].members[0].before.mean, 1900.0);
    assert_eq!(
        context.teams[1].members[1].before,
        SchemeKind::Placement.default_rating()
    );
    assert_eq!(context.teams[1].average_mean(), 1300.0);
}

#[test]
fn test_storage_failure_propagates() {
    let storage = Arc::new(FailingStorage::new());
    let engine = MatchmakingEngine::with_storage(AppConfig::default(), storage.clone()).unwrap();
    let teams = vec![(1, vec!["a".to_string()]), (2, vec!["b".to_string()])];

    let err = engine
        .record_placements(9, SchemeKind::Placement, &teams, placements(&[(1, 1), (2, 2)]))
        .unwrap_err();

    assert!(matches!(err, EngineError::Storage { .. }));
    assert_eq!(storage.attempts(), vec![9]);
    assert_eq!(
        engine
            .metrics()
            .rating()
            .rating_failures_total
            .with_label_values(&["placement", "storage"])
            .get(),
        1
    );
}

#[test]
fn test_concurrent_updates_from_same_snapshot() {
    let engine = Arc::new(create_engine());
    let teams = vec![(1, vec!["a".to_string()]), (2, vec!["b".to_string()])];
    let context = MatchContext::from_roster(
        engine.as_ref(),
        1,
        SchemeKind::Placement,
        &teams,
        placements(&[(1, 1), (2, 2)]),
    )
    .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            let context = context.clone();
            std::thread::spawn(move || engine.record_result(1, SchemeKind::Placement, &context))
        })
        .collect();
    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker panicked"))
        .collect();

    // Exactly one writer wins; the rest see a stale snapshot
    let accepted = outcomes.iter().filter(|o| o.is_ok()).count();
    assert_eq!(accepted, 1);
    assert!(outcomes
        .iter()
        .filter_map(|o| o.as_ref().err())
        .all(|e| matches!(e, EngineError::StaleRating { .. })));

    let entry = engine
        .rating_entry(1, "a", SchemeKind::Placement)
        .unwrap()
        .unwrap();
    assert_eq!(entry.games_played, 1);
}

#[test]
fn test_config_file_round_trip() {
    let path = std::env::temp_dir().join(format!("teamforge-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(
        &path,
        r#"
[service]
name = "scrims"
log_level = "debug"
default_group = 42

[balance]
max_teams = 4

[rating]
max_change = 200.0
"#,
    )
    .unwrap();

    let config = AppConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(config.service.name, "scrims");
    assert_eq!(config.service.default_group, 42);
    assert_eq!(config.balance.max_teams, 4);
    assert_eq!(config.rating.max_change, 200.0);
    assert_eq!(config.balance.band_width, 100.0);
}

#[test]
fn test_metrics_export_after_activity() {
    let engine = create_engine();
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    engine
        .propose_teams_with_rng(
            &ladder(8, SchemeKind::Simple),
            SchemeKind::Simple,
            &TeamLayout::Auto,
            &BalanceConstraints::default(),
            &mut rng,
        )
        .unwrap();

    let text = engine.metrics().export().unwrap();
    assert!(text.contains("teamforge_balance_requests_total"));
    assert!(text.contains("teamforge_balance_duration_seconds"));
}

#[test]
fn test_tiers_cover_the_ladder() {
    assert_eq!(RatingTier::of(3000.0), RatingTier::Legendary);
    assert_eq!(RatingTier::of(0.0), RatingTier::Learning);
    for tier in RatingTier::ALL.iter().skip(1) {
        assert_eq!(RatingTier::of(tier.min_rating()), *tier);
    }
}
