use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use match_insights::display::output::{
    display_error, display_info, display_invalidation, display_scene, display_success,
    display_summary,
};
use match_insights::{
    api::RiotApiClient, CacheOrchestrator, Config, FileStore, QueueFilter, SceneId, Season,
    StatsQuery, TypeFilter,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "Match Insights")]
#[command(about = "Cached match-history statistics for League of Legends players", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Win rate, KDA, per-minute rates and champion breakdown
    Stats {
        /// Riot Game Name
        game_name: String,

        /// Riot Tag (tag line)
        tag_line: String,

        /// Region (default: RIOT_REGION or na1)
        #[arg(short, long)]
        region: Option<String>,

        /// Queue id (420 = ranked solo, 440 = flex, ...) or "all"
        #[arg(short, long, default_value = "all")]
        queue: QueueFilter,

        /// "all" or "ranked"
        #[arg(short = 't', long = "type", default_value = "all")]
        match_type: TypeFilter,

        /// Calendar year from MATCH_SEASONS, or "all"
        #[arg(short, long, default_value = "all")]
        season: Season,

        /// Drop every cached entry for this player before computing
        #[arg(long)]
        refresh: bool,
    },

    /// One precomputed view such as year-in-review or weaknesses
    Scene {
        game_name: String,
        tag_line: String,
        scene: SceneId,

        #[arg(short, long)]
        region: Option<String>,

        #[arg(long)]
        refresh: bool,
    },

    /// Clear every cached entry derived from this player's match history
    Invalidate { game_name: String, tag_line: String },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,match_insights=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let args = Args::parse();

    if let Err(e) = run(args) {
        display_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let client = RiotApiClient::new(config.clone());

    let (game_name, tag_line) = match &args.command {
        Command::Stats { game_name, tag_line, .. }
        | Command::Scene { game_name, tag_line, .. }
        | Command::Invalidate { game_name, tag_line } => (game_name.clone(), tag_line.clone()),
    };
    let player_name = format!("{}#{}", game_name, tag_line);

    display_info(&format!("Looking up {}...", player_name));
    let account = client
        .get_account(&game_name, &tag_line)
        .with_context(|| format!("resolving {}", player_name))?;
    display_success(&format!("Found PUUID: {}", account.puuid.get(..8).unwrap_or(&account.puuid)));

    let store = FileStore::new(&config.cache_dir)?;
    let orchestrator = CacheOrchestrator::new(store, client, &config);

    match args.command {
        Command::Stats {
            region,
            queue,
            match_type,
            season,
            refresh,
            ..
        } => {
            if refresh {
                display_invalidation(&orchestrator.invalidate_all(&account.puuid));
            }
            let region = region.unwrap_or_else(|| config.region.clone());
            let query = StatsQuery::new(&account.puuid, &region)
                .queue(queue)
                .match_type(match_type)
                .season(season);

            let pb = spinner("Aggregating match history");
            let summary = orchestrator.get_or_compute(&query);
            pb.finish_and_clear();
            display_summary(&summary?, &player_name);
        }
        Command::Scene {
            scene,
            region,
            refresh,
            ..
        } => {
            if refresh {
                display_invalidation(&orchestrator.invalidate_all(&account.puuid));
            }
            let region = region.unwrap_or_else(|| config.region.clone());

            let pb = spinner(&format!("Building {}", scene));
            let report = orchestrator.get_or_compute_scene(&account.puuid, &region, scene);
            pb.finish_and_clear();
            display_scene(&report?);
        }
        Command::Invalidate { .. } => {
            display_invalidation(&orchestrator.invalidate_all(&account.puuid));
        }
    }

    Ok(())
}
