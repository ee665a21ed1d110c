//! Command line entry point for the session-elo rating service
//!
//! Administrative commands operate on the configured player store; `demo`
//! runs a scripted session through the full watch loop.

use anyhow::Result;
use clap::{Parser, Subcommand};
use session_elo::config::{AppConfig, SessionConfig};
use session_elo::metrics::{HealthServer, HealthServerConfig, MetricsCollector};
use session_elo::rating::{EloRatingEngine, InMemoryPlayerStore, PlayerStore, ResultProcessor};
use session_elo::service::{MatchOutcome, MatchWatcher, RatingService};
use session_elo::session::{
    MatchRoster, MockSessionPlatform, ReportedScore, SessionDriver, SessionStateMachine,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_stream::StreamExt;
use tracing::{error, info, warn};

/// Session Elo - multiplayer Elo ratings for repeating competitive sessions
#[derive(Parser)]
#[command(
    name = "session-elo",
    version,
    about = "Keeps multiplayer Elo ratings for participants of repeating competitive sessions",
    long_about = "Session Elo watches a competitive session, rates every finished match with a \
                 generalized pairwise Elo and persists the ratings. The administrative commands \
                 query and edit the player store directly."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Player store override
    #[arg(long, value_name = "FILE", help = "Override the player store snapshot file")]
    store: Option<PathBuf>,

    /// Metrics port override
    #[arg(long, value_name = "PORT", help = "Override metrics server port")]
    metrics_port: Option<u16>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(long, help = "Validate configuration and exit without running a command")]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show one page of the leaderboard
    Leaderboard {
        /// 1-based page number
        #[arg(default_value_t = 1)]
        page: usize,
        #[arg(long)]
        page_size: Option<usize>,
    },
    /// Show a player's rating and rank
    Rank { name: String },
    /// Chance of one player beating another head to head
    Simulate { player: String, opponent: String },
    /// Overwrite a player's rating
    SetRating { name: String, rating: f64 },
    /// Put a player back at the initial rating
    ResetRating { name: String },
    /// Remove a player from the store
    DeletePlayer { name: String },
    /// Run scripted matches through the full watch loop
    Demo {
        #[arg(long, default_value_t = 3)]
        matches: usize,
        /// Spectate the live stream instead of hosting a lobby (defaults to `session.live`)
        #[arg(long)]
        live: bool,
        /// Use millisecond timings instead of the configured session timings
        #[arg(long)]
        fast: bool,
    },
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
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

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(store) = &args.store {
        config.storage.player_store_path = Some(store.clone());
    }

    if let Some(metrics_port) = args.metrics_port {
        config.service.metrics_port = Some(metrics_port);
    }

    session_elo::config::validate_config(&config)?;
    Ok(config)
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("Session Elo rating service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    match &config.storage.player_store_path {
        Some(path) => info!("   Player store: {}", path.display()),
        None => info!("   Player store: in memory"),
    }
    info!(
        "   Elo: initial {} / K {} / scale {}",
        config.rating.initial_rating, config.rating.default_k_factor, config.rating.scale
    );
    info!(
        "   Participant wait: {}s, countdown: {}s",
        config.session.participant_timeout_seconds, config.session.countdown_seconds
    );
}

fn open_store(config: &AppConfig) -> Result<Arc<InMemoryPlayerStore>> {
    let store = match &config.storage.player_store_path {
        Some(path) => InMemoryPlayerStore::open(path, &config.rating)?,
        None => {
            warn!("No player store path configured, changes will not be kept");
            InMemoryPlayerStore::new(&config.rating)
        }
    };
    Ok(Arc::new(store))
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Queue `matches` scripted matches between four demo players
fn script_demo_matches(platform: &MockSessionPlatform, matches: usize) {
    const NAMES: [&str; 4] = ["Alice", "Bob", "Charlie", "Dana"];

    for round in 0..matches {
        let mut roster = MatchRoster::new();
        let mut reports = Vec::new();

        for (seat, name) in NAMES.iter().enumerate() {
            let id = (seat + 1).to_string();
            roster.register(id.clone(), *name);

            if round % 3 == 2 && seat == NAMES.len() - 1 {
                reports.push(ReportedScore::forfeited(id));
            } else {
                let place = (seat + round) % NAMES.len();
                reports.push(ReportedScore::finished(id, (place + 1) as f64 * 10.0));
            }
        }

        platform.queue_match(roster, reports);
    }
}

fn print_outcome(outcome: &MatchOutcome) {
    match outcome {
        MatchOutcome::Rated(result) => {
            println!("Match results:");
            for entry in &result.entries {
                println!(
                    "  {:<12} score {:>6.1}  {:+6.1}  -> {}",
                    entry.player.name,
                    entry.score,
                    entry.delta,
                    entry.player.display_rating()
                );
            }
        }
        MatchOutcome::NoChange => println!("No rating change (not enough players)"),
    }
}

/// Session timings for the demo; `fast` keeps the configured idle stop and workers
fn demo_session_config(config: &AppConfig, fast: bool) -> SessionConfig {
    let configured = config.session_config();
    if !fast {
        return configured;
    }

    SessionConfig {
        max_idle_cycles: configured.max_idle_cycles.max(1),
        driver_workers: configured.driver_workers,
        ..SessionConfig::fast()
    }
}

async fn run_demo(
    config: &AppConfig,
    store: Arc<InMemoryPlayerStore>,
    matches: usize,
    live: bool,
    fast: bool,
) -> Result<()> {
    let metrics = Arc::new(MetricsCollector::new()?);
    let engine = Arc::new(EloRatingEngine::new(&config.rating)?);
    let processor = ResultProcessor::new(store.clone(), engine).with_metrics(metrics.clone());

    let platform = Arc::new(MockSessionPlatform::new());
    script_demo_matches(&platform, matches);

    let session_config = demo_session_config(config, fast);
    info!(
        "Demo session: {}s participant wait, {}s countdown",
        session_config.participant_timeout.as_secs_f64(),
        session_config.countdown.as_secs_f64()
    );
    let session = Arc::new(
        SessionStateMachine::new(platform.clone(), session_config).with_metrics(metrics.clone()),
    );

    let health_server = config.service.metrics_port.map(|port| {
        Arc::new(
            HealthServer::new(
                HealthServerConfig {
                    port,
                    ..HealthServerConfig::default()
                },
                metrics.clone(),
            )
            .with_store(store.clone())
            .with_session(session.clone()),
        )
    });
    if let Some(server) = &health_server {
        let server = server.clone();
        tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("Health server failed: {:#}", e);
            }
        });
    }

    let reference = session.create_game(live || config.session.live).await?;
    println!("Session ready, join at {}", reference);

    let watcher = MatchWatcher::new(session.clone(), processor);
    let mut outcomes = watcher.watch().await?;

    let shutdown = wait_for_shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received, abandoning the session");
                match tokio::time::timeout(config.shutdown_timeout(), session.force_quit()).await {
                    Ok(result) => result?,
                    Err(_) => warn!("Shutdown timeout exceeded, leaving the session behind"),
                }
                break;
            }
            outcome = outcomes.next() => match outcome {
                Some(Ok(outcome)) => print_outcome(&outcome),
                Some(Err(e)) => {
                    error!("Operational failure: {:#}", e);
                    println!("Operational failure: {:#}", e);
                }
                None => break,
            }
        }
    }

    if let Some(server) = &health_server {
        server.stop().await?;
    }

    println!(
        "Played {} matches, {} players rated",
        platform.matches_started(),
        store.player_count()?
    );
    Ok(())
}

async fn run_command(command: Command, config: &AppConfig) -> Result<()> {
    let store = open_store(config)?;

    let engine = Arc::new(EloRatingEngine::new(&config.rating)?);
    let processor = ResultProcessor::new(store.clone(), engine);
    let ratings = RatingService::new(&processor, config.rating.clone());

    match command {
        Command::Leaderboard { page, page_size } => {
            let rows = ratings.leaderboard(page, page_size)?;
            if rows.is_empty() {
                println!("No players on page {}", page);
            }
            for row in rows {
                println!(
                    "{:>4}. {:<20} {:>6}  ({} games)",
                    row.rank,
                    row.player.name,
                    row.player.display_rating(),
                    row.player.games_played
                );
            }
        }
        Command::Rank { name } => {
            let row = ratings.rank(&name)?;
            println!(
                "{} is ranked #{} with {}",
                row.player.name,
                row.rank,
                row.player.display_rating()
            );
        }
        Command::Simulate { player, opponent } => {
            let chance = ratings.simulate_1v1(&player, &opponent)?;
            println!(
                "{} beats {} with probability {:.1}%",
                player,
                opponent,
                chance * 100.0
            );
        }
        Command::SetRating { name, rating } => {
            let player = ratings.set_rating(&name, rating).await?;
            println!("{} now has {}", player.name, player.display_rating());
        }
        Command::ResetRating { name } => {
            let player = ratings.reset_rating(&name).await?;
            println!("{} reset to {}", player.name, player.display_rating());
        }
        Command::DeletePlayer { name } => {
            ratings.delete_player(&name).await?;
            println!("Deleted {}", name);
        }
        Command::Demo {
            matches,
            live,
            fast,
        } => {
            run_demo(config, store, matches, live, fast).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without running a command");
        return Ok(());
    }

    display_startup_banner(&config);

    let command = args.command.unwrap_or(Command::Leaderboard {
        page: 1,
        page_size: None,
    });

    if let Err(e) = run_command(command, &config).await {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    info!("Session Elo finished");
    Ok(())
}
