//! Season Simulator CLI Tool
//!
//! Plays a synthetic season through the engine: each round the roster is
//! balanced, a winner order is drawn from hidden skills, and the result is
//! recorded under the chosen scheme. Reports how well the learned ratings
//! recover the hidden ordering and how even the drafted teams were.
//!
//! Usage:
//!   cargo run --bin season-sim -- --help
//!   cargo run --bin season-sim run --players 12 --teams 3 --rounds 50 --scheme placement
//!   cargo run --bin season-sim run-scenario --scenario regional
//!   cargo run --bin season-sim compare --rounds 40

use anyhow::Result;
use clap::{Parser, Subcommand};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::collections::BTreeMap;
use teamforge::balance::{BalanceConstraints, TeamLayout};
use teamforge::config::AppConfig;
use teamforge::types::{Competitor, CompetitorId, Region, SchemeKind};
use teamforge::MatchmakingEngine;
use tracing::debug;

#[derive(Parser)]
#[command(name = "season-sim")]
#[command(about = "Simulate a season of balanced matches and measure rating recovery")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Seed for the whole simulation
    #[arg(long, global = true, default_value = "7")]
    seed: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one season
    Run {
        #[arg(short, long, default_value = "12")]
        players: usize,
        #[arg(short, long, default_value = "3")]
        teams: usize,
        #[arg(short, long, default_value = "50")]
        rounds: usize,
        #[arg(short, long, default_value = "placement")]
        scheme: SchemeKind,
    },
    /// Run a predefined scenario
    RunScenario {
        /// Scenario name (duel, squads, regional, open-field)
        #[arg(short, long)]
        scenario: String,
    },
    /// Run the same season under every scheme
    Compare {
        #[arg(short, long, default_value = "40")]
        rounds: usize,
    },
}

/// Parameters of one simulated season
#[derive(Debug, Clone)]
struct SeasonConfig {
    name: String,
    players: usize,
    teams: usize,
    rounds: usize,
    scheme: SchemeKind,
    region: Option<Region>,
    /// Field size reported to the rating scheme; larger than `teams` for open fields
    total_field_size: Option<u32>,
}

impl SeasonConfig {
    fn new(name: &str, players: usize, teams: usize, rounds: usize, scheme: SchemeKind) -> Self {
        Self {
            name: name.to_string(),
            players,
            teams,
            rounds,
            scheme,
            region: None,
            total_field_size: None,
        }
    }
}

/// Outcome of a season
#[derive(Debug, Default, Clone)]
struct SeasonStats {
    rounds_played: usize,
    failed_rounds: usize,
    degraded_updates: usize,
    average_balance_score: f64,
    /// Fraction of player pairs whose learned order matches the hidden order
    pair_agreement: f64,
}

struct Season {
    config: SeasonConfig,
    engine: MatchmakingEngine,
    roster: Vec<Competitor>,
    hidden_skill: BTreeMap<CompetitorId, f64>,
    rng: ChaCha20Rng,
}

impl Season {
    fn new(config: SeasonConfig, seed: u64) -> Result<Self> {
        let engine = MatchmakingEngine::new(AppConfig::default())?;
        let mut rng = ChaCha20Rng::seed_from_u64(seed);

        let regions: Vec<Region> = ["NA", "EU"]
            .iter()
            .map(|code| code.parse().map_err(|e: String| anyhow::anyhow!(e)))
            .collect::<Result<_>>()?;

        let mut roster = Vec::with_capacity(config.players);
        let mut hidden_skill = BTreeMap::new();
        for i in 0..config.players {
            let id = format!("player{:02}", i + 1);
            hidden_skill.insert(id.clone(), rng.random_range(800.0..2200.0));
            roster.push(Competitor::new(id).with_region(regions[i % regions.len()].clone()));
        }

        Ok(Self {
            config,
            engine,
            roster,
            hidden_skill,
            rng,
        })
    }

    fn skill(&self, id: &str) -> f64 {
        self.hidden_skill.get(id).copied().unwrap_or(1500.0)
    }

    fn play(&mut self) -> Result<SeasonStats> {
        let group = self.engine.config().service.default_group;
        let scheme = self.config.scheme;
        let layout = TeamLayout::Count(self.config.teams);
        let constraints = self
            .config
            .region
            .clone()
            .map(BalanceConstraints::region)
            .unwrap_or_default();

        let mut stats = SeasonStats::default();
        let mut balance_total = 0.0;

        for round in 0..self.config.rounds {
            let players = self
                .roster
                .iter()
                .map(|c| self.engine.hydrate(group, c))
                .collect::<teamforge::Result<Vec<_>>>()?;

            let result = match self.engine.propose_teams_with_rng(
                &players,
                scheme,
                &layout,
                &constraints,
                &mut self.rng,
            ) {
                Ok(result) => result,
                Err(e) => {
                    debug!("Round {} could not be balanced: {}", round + 1, e);
                    stats.failed_rounds += 1;
                    continue;
                }
            };
            balance_total += result.balance_score;

            // Strength plus noise decides the finishing order
            let strengths: Vec<f64> = result
                .teams
                .iter()
                .map(|team| {
                    team.members.iter().map(|m| self.skill(&m.id)).sum::<f64>()
                        / team.len().max(1) as f64
                })
                .collect();
            let mut performances: Vec<(u32, f64)> = Vec::with_capacity(strengths.len());
            for (index, strength) in strengths.into_iter().enumerate() {
                let noise: f64 = self.rng.random_range(-250.0..250.0);
                performances.push((index as u32 + 1, strength + noise));
            }
            performances.sort_by(|a, b| b.1.total_cmp(&a.1));

            let placements: BTreeMap<u32, u32> = performances
                .iter()
                .enumerate()
                .map(|(rank, (team_number, _))| (*team_number, rank as u32 + 1))
                .collect();
            let teams: Vec<(u32, Vec<CompetitorId>)> = result
                .teams
                .iter()
                .enumerate()
                .map(|(index, team)| (index as u32 + 1, team.ids()))
                .collect();

            let mut context = teamforge::MatchContext::from_roster(
                &self.engine,
                group,
                scheme,
                &teams,
                placements,
            )?;
            context.total_field_size = self.config.total_field_size;

            match self.engine.record_result(group, scheme, &context) {
                Ok(update) if update.is_degraded() => stats.degraded_updates += 1,
                Ok(_) => stats.rounds_played += 1,
                Err(e) => {
                    debug!("Round {} was not recorded: {}", round + 1, e);
                    stats.failed_rounds += 1;
                }
            }
        }

        let balanced = stats.rounds_played + stats.degraded_updates;
        if balanced > 0 {
            stats.average_balance_score = balance_total / balanced as f64;
        }
        stats.pair_agreement = self.pair_agreement()?;
        Ok(stats)
    }

    fn pair_agreement(&self) -> Result<f64> {
        let group = self.engine.config().service.default_group;
        let learned = self
            .roster
            .iter()
            .map(|c| {
                Ok((
                    self.skill(&c.id),
                    self.engine.hydrate(group, c)?.rating(self.config.scheme).mean,
                ))
            })
            .collect::<Result<Vec<(f64, f64)>>>()?;

        let mut agree = 0usize;
        let mut total = 0usize;
        for (i, a) in learned.iter().enumerate() {
            for b in &learned[i + 1..] {
                total += 1;
                if (a.0 - b.0).signum() == (a.1 - b.1).signum() {
                    agree += 1;
                }
            }
        }
        Ok(if total == 0 {
            1.0
        } else {
            agree as f64 / total as f64
        })
    }
}

fn scenario(name: &str) -> Result<SeasonConfig> {
    let config = match name.to_lowercase().as_str() {
        "duel" => SeasonConfig::new("duel", 8, 2, 60, SchemeKind::Simple),
        "squads" => SeasonConfig::new("squads", 12, 3, 50, SchemeKind::Placement),
        "regional" => SeasonConfig {
            region: Some("NA".parse().map_err(|e: String| anyhow::anyhow!(e))?),
            ..SeasonConfig::new("regional", 12, 4, 40, SchemeKind::Placement)
        },
        "open-field" => SeasonConfig {
            total_field_size: Some(10),
            ..SeasonConfig::new("open-field", 12, 3, 40, SchemeKind::MultiTeam)
        },
        _ => {
            return Err(anyhow::anyhow!(
                "Unknown scenario '{}'. Available: duel, squads, regional, open-field",
                name
            ))
        }
    };
    Ok(config)
}

fn report(config: &SeasonConfig, stats: &SeasonStats) {
    println!(
        "📊 {} ({} players, {} teams, {} scheme)",
        config.name, config.players, config.teams, config.scheme
    );
    println!("  Rounds recorded: {}", stats.rounds_played);
    println!("  Degraded updates: {}", stats.degraded_updates);
    println!("  Failed rounds: {}", stats.failed_rounds);
    println!("  Average balance score: {:.1}", stats.average_balance_score);
    println!("  Pair agreement: {:.1}%", stats.pair_agreement * 100.0);
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            players,
            teams,
            rounds,
            scheme,
        } => {
            let config = SeasonConfig::new("custom", players, teams, rounds, scheme);
            let stats = Season::new(config.clone(), cli.seed)?.play()?;
            report(&config, &stats);
        }

        Commands::RunScenario { scenario: name } => {
            let config = scenario(&name)?;
            println!("🧪 Running scenario: {}", config.name);
            let stats = Season::new(config.clone(), cli.seed)?.play()?;
            report(&config, &stats);
            if stats.rounds_played == 0 {
                println!("❌ No rounds were recorded.");
                std::process::exit(1);
            }
        }

        Commands::Compare { rounds } => {
            println!("🧪 Comparing schemes over {} rounds...\n", rounds);
            for scheme in SchemeKind::ALL {
                let config = SeasonConfig::new(scheme.as_str(), 12, 3, rounds, scheme);
                let stats = Season::new(config.clone(), cli.seed)?.play()?;
                report(&config, &stats);
                println!();
            }
        }
    }

    Ok(())
}
