//! Command line entry point for teamforge
//!
//! Balances rosters, rates finished matches, previews placement changes and
//! classifies ratings into tiers. Input files are JSON; results are printed as
//! pretty JSON on stdout while logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use teamforge::balance::{parse_team_format, BalanceConstraints, TeamLayout};
use teamforge::config::AppConfig;
use teamforge::rating::placement::PlacementRatingCalculator;
use teamforge::rating::{MatchContext, RatingEntry, RatingKey, RatingTier};
use teamforge::types::{Competitor, CompetitorId, GroupId, Region, SchemeKind};
use teamforge::MatchmakingEngine;
use tracing::{error, info};

/// Teamforge - balanced teams and ratings for community scrim groups
#[derive(Parser)]
#[command(
    name = "teamforge",
    version,
    about = "Balance rosters into fair teams and keep placement-aware ratings",
    long_about = "Teamforge splits a roster into teams of similar strength using a randomised \
                 snake draft and rates finished matches under a win/loss scheme, a placement \
                 scheme with auditable breakdowns, or a multi-team Plackett-Luce scheme."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        global = true,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Enable debug mode
    #[arg(short, long, global = true, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, global = true, help = "Validate configuration and exit")]
    dry_run: bool,

    /// Print collected metrics after the command
    #[arg(long, global = true, help = "Print Prometheus metrics to stderr when done")]
    metrics: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Split a roster into balanced teams
    Balance {
        /// JSON array of competitors
        #[arg(long, value_name = "FILE")]
        roster: PathBuf,

        /// Number of evenly sized teams
        #[arg(long, conflicts_with = "format")]
        teams: Option<usize>,

        /// Explicit team sizes such as 4:4:2
        #[arg(long)]
        format: Option<String>,

        /// Require one player from this region on every team
        #[arg(long)]
        region: Option<String>,

        /// Scheme whose ratings drive the draft
        #[arg(long, default_value = "placement")]
        scheme: SchemeKind,

        /// Fixed seed for a reproducible draft
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Rate a finished match
    Rate {
        #[arg(long)]
        scheme: SchemeKind,

        /// Match context JSON, or a match sheet when --roster is given
        #[arg(long = "match", value_name = "FILE")]
        match_file: PathBuf,

        /// JSON array of competitors supplying current ratings
        #[arg(long, value_name = "FILE")]
        roster: Option<PathBuf>,

        /// Group the ratings belong to
        #[arg(long)]
        group: Option<GroupId>,
    },

    /// Show placement-scheme changes across a spread of placements
    Preview {
        #[arg(long, allow_negative_numbers = true)]
        rating: f64,

        #[arg(long)]
        team_average: f64,

        /// Opposing team averages, comma separated
        #[arg(long, value_delimiter = ',')]
        opponents: Vec<f64>,
    },

    /// Print the tier of a placement rating
    Tier {
        #[arg(allow_negative_numbers = true)]
        rating: f64,
    },
}

/// Team members by id; ratings come from the roster
#[derive(Debug, Deserialize)]
struct MatchSheet {
    teams: Vec<SheetTeam>,
    placement_by_team: BTreeMap<u32, u32>,
    #[serde(default)]
    total_field_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SheetTeam {
    team_number: u32,
    members: Vec<CompetitorId>,
}

#[derive(Serialize)]
struct TierReport {
    rating: f64,
    tier: RatingTier,
}

#[derive(Serialize)]
struct PreviewRow {
    placement: u32,
    final_change: f64,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    teamforge::config::validate_config(&config)?;
    Ok(config)
}

/// Display configuration summary
fn display_banner(config: &AppConfig) {
    info!("Teamforge v{}", teamforge::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   Players per request: {}..={}",
        config.balance.min_players, config.balance.max_players
    );
    info!("   Max teams: {}", config.balance.max_teams);
    info!(
        "   Band width / similarity: {} / {}",
        config.balance.band_width, config.balance.similarity_threshold
    );
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_balance(
    engine: &MatchmakingEngine,
    roster: &Path,
    teams: Option<usize>,
    format: Option<&str>,
    region: Option<&str>,
    scheme: SchemeKind,
    seed: Option<u64>,
) -> Result<()> {
    let players: Vec<Competitor> = read_json(roster)?;
    let layout = match (teams, format) {
        (_, Some(format)) => TeamLayout::Sizes(parse_team_format(format)?),
        (Some(count), None) => TeamLayout::Count(count),
        (None, None) => TeamLayout::Auto,
    };
    let constraints = match region {
        Some(code) => BalanceConstraints::region(
            code.parse::<Region>().map_err(|e| anyhow::anyhow!(e))?,
        ),
        None => BalanceConstraints::default(),
    };

    info!(
        "Balancing {} players ({}) with {} ratings",
        players.len(),
        layout,
        scheme
    );
    let result = match seed {
        Some(seed) => {
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            engine.propose_teams_with_rng(&players, scheme, &layout, &constraints, &mut rng)?
        }
        None => engine.propose_teams(&players, scheme, &layout, &constraints)?,
    };
    print_json(&result)
}

fn run_rate(
    engine: &MatchmakingEngine,
    scheme: SchemeKind,
    match_file: &Path,
    roster: Option<&Path>,
    group: GroupId,
) -> Result<()> {
    let update = match roster {
        Some(roster) => {
            let players: Vec<Competitor> = read_json(roster)?;
            let storage = engine.storage();
            for player in &players {
                if let Some(rating) = player.ratings.get(&scheme) {
                    storage.store_rating(
                        RatingKey::new(group, player.id.clone(), scheme),
                        RatingEntry::new(*rating),
                    )?;
                }
            }

            let sheet: MatchSheet = read_json(match_file)?;
            let teams: Vec<(u32, Vec<CompetitorId>)> = sheet
                .teams
                .into_iter()
                .map(|team| (team.team_number, team.members))
                .collect();
            let mut context =
                MatchContext::from_roster(engine, group, scheme, &teams, sheet.placement_by_team)?;
            context.total_field_size = sheet.total_field_size;
            engine.record_result(group, scheme, &context)?
        }
        None => {
            let context: MatchContext = read_json(match_file)?;
            engine.compute_update(scheme, &context)?
        }
    };
    print_json(&update)
}

fn run_preview(engine: &MatchmakingEngine, rating: f64, team_average: f64, opponents: &[f64]) -> Result<()> {
    let calculator = PlacementRatingCalculator::new(engine.config().rating.clone());
    let rows: Vec<PreviewRow> = calculator
        .preview_rating_changes(rating, team_average, opponents)
        .into_iter()
        .map(|(placement, final_change)| PreviewRow {
            placement,
            final_change,
        })
        .collect();
    print_json(&rows)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_banner(&config);
        info!("Dry run completed - exiting");
        return Ok(());
    }

    let Some(command) = args.command else {
        display_banner(&config);
        info!("No command given, see --help");
        return Ok(());
    };

    let group = config.service.default_group;
    let engine = MatchmakingEngine::new(config)?;

    let outcome = match command {
        Command::Balance {
            roster,
            teams,
            format,
            region,
            scheme,
            seed,
        } => run_balance(
            &engine,
            &roster,
            teams,
            format.as_deref(),
            region.as_deref(),
            scheme,
            seed,
        ),
        Command::Rate {
            scheme,
            match_file,
            roster,
            group: group_override,
        } => run_rate(
            &engine,
            scheme,
            &match_file,
            roster.as_deref(),
            group_override.unwrap_or(group),
        ),
        Command::Preview {
            rating,
            team_average,
            opponents,
        } => run_preview(&engine, rating, team_average, &opponents),
        Command::Tier { rating } => print_json(&TierReport {
            rating,
            tier: RatingTier::of(rating),
        }),
    };

    if let Err(e) = &outcome {
        error!("Command failed: {:#}", e);
    }

    if args.metrics {
        eprintln!("{}", engine.metrics().export()?);
    }

    outcome
}
