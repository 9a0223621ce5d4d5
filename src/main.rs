use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use medal_pool::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_LINEUP, DEFAULT_POOL_SEED, DEFAULT_POOL_SIZE, DEFAULT_TRIALS,
    DEFAULT_TRIAL_SEED, LINEUP_SIZE, RECENT_WINDOW_GAMES,
};
use medal_pool::data::{load_history, load_roster, winter_games, Dataset};
use medal_pool::opponents::{OpponentPolicy, TierPopularity};
use medal_pool::pool::{run_pool, run_rankings, SimulationConfig};
use medal_pool::ranking::write_rankings_csv;

/// Win probability of a medal-pool lineup against a field of opponents.
#[derive(Parser, Debug)]
#[command(name = "medal-pool", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Roster CSV (name,tier). Defaults to the built-in Winter Games roster.
    #[arg(long, global = true, env = "MEDAL_POOL_ROSTER")]
    roster: Option<PathBuf>,

    /// Recent-window medal CSV (name,gold,silver,bronze[,opportunities])
    #[arg(long, global = true, env = "MEDAL_POOL_RECENT")]
    recent: Option<PathBuf>,

    /// All-time medal CSV (name,gold,silver,bronze,opportunities)
    #[arg(long, global = true, env = "MEDAL_POOL_LONG_RUN")]
    long_run: Option<PathBuf>,

    /// Games covered by a recent CSV that has no opportunities column
    #[arg(long, global = true, default_value_t = RECENT_WINDOW_GAMES)]
    recent_window: u32,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate one lineup against a sampled pool
    Winprob(WinprobArgs),
    /// Rank every lineup of a set of entities by head-to-head win rate
    Rank(RankArgs),
}

#[derive(Args, Debug)]
struct WinprobArgs {
    /// Players in the pool, you included
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    players: usize,

    /// Games to simulate
    #[arg(long, alias = "olympics", default_value_t = DEFAULT_TRIALS)]
    trials: usize,

    #[arg(
        long,
        aliases = ["seed_trials", "seed-olympics", "seed_olympics"],
        default_value_t = DEFAULT_TRIAL_SEED
    )]
    seed_trials: u64,

    #[arg(long, alias = "seed_pool", default_value_t = DEFAULT_POOL_SEED)]
    seed_pool: u64,

    /// How opponents choose their lineups
    #[arg(
        long,
        aliases = ["opponent-model", "opponent_model"],
        value_enum,
        default_value_t = OpponentPolicy::Uniform
    )]
    policy: OpponentPolicy,

    /// Comma-separated lineup
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_LINEUP.map(String::from))]
    lineup: Vec<String>,

    #[arg(long, default_value_t = LINEUP_SIZE)]
    lineup_size: usize,

    /// Opponents scored per chunk; bounds peak memory
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk: usize,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct RankArgs {
    /// Comma-separated entities to draw lineups from (default: the fifteen
    /// leading nations, or the whole roster if any of them is missing)
    #[arg(long, value_delimiter = ',')]
    entities: Vec<String>,

    #[arg(long, default_value_t = 50_000)]
    trials: usize,

    #[arg(long, default_value_t = DEFAULT_TRIAL_SEED)]
    seed: u64,

    #[arg(long, default_value_t = LINEUP_SIZE)]
    lineup_size: usize,

    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk: usize,

    /// Lineups to print
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Write the full ranking to this CSV
    #[arg(long)]
    output: Option<PathBuf>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,medal_pool=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_dataset(cli: &Cli) -> anyhow::Result<Dataset> {
    let mut data = winter_games()?;
    if let Some(path) = &cli.roster {
        data.roster =
            load_roster(path).with_context(|| format!("reading roster {}", path.display()))?;
    }
    if let Some(path) = &cli.recent {
        data.recent = load_history(path, Some(cli.recent_window))
            .with_context(|| format!("reading recent history {}", path.display()))?;
    }
    if let Some(path) = &cli.long_run {
        data.long_run = load_history(path, None)
            .with_context(|| format!("reading long-run history {}", path.display()))?;
    }
    Ok(data)
}

fn winprob(data: &Dataset, args: &WinprobArgs) -> anyhow::Result<()> {
    let config = SimulationConfig {
        pool_size: args.players,
        trials: args.trials,
        trial_seed: args.seed_trials,
        pool_seed: args.seed_pool,
        policy: args.policy,
        lineup: args.lineup.clone(),
        lineup_size: args.lineup_size,
        chunk_size: args.chunk,
        tier_popularity: TierPopularity::default(),
    };
    let report = run_pool(data, &config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

fn rank(data: &Dataset, args: &RankArgs) -> anyhow::Result<()> {
    let rankings = run_rankings(
        data,
        &args.entities,
        args.lineup_size,
        args.trials,
        args.seed,
        args.chunk,
    )?;

    if let Some(path) = &args.output {
        write_rankings_csv(path, &rankings)?;
        println!("Wrote {}", path.display());
    }

    println!(
        "{:>4}  {:<60} {:>9} {:>8} {:>8} {:>8} {:>9}",
        "rank", "lineup", "expected", "median", "p90", "p99", "win_rate"
    );
    for row in rankings.iter().take(args.top) {
        println!(
            "{:>4}  {:<60} {:>9.2} {:>8.1} {:>8.1} {:>8.1} {:>9.5}",
            row.rank, row.lineup, row.expected_points, row.median, row.p90, row.p99, row.win_rate
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let data = load_dataset(&cli)?;

    match &cli.command {
        Command::Winprob(args) => winprob(&data, args),
        Command::Rank(args) => rank(&data, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_winprob_accepts_underscore_flags() {
        let cli = Cli::try_parse_from([
            "medal-pool",
            "winprob",
            "--olympics",
            "500",
            "--seed_olympics",
            "7",
            "--seed_pool",
            "9",
            "--opponent_model",
            "tier_biased",
            "--lineup",
            "Norway,USA,Canada,Germany,Japan,Italy",
        ])
        .unwrap();
        let Command::Winprob(args) = cli.command else {
            panic!("expected winprob");
        };
        assert_eq!(args.trials, 500);
        assert_eq!(args.seed_trials, 7);
        assert_eq!(args.seed_pool, 9);
        assert_eq!(args.policy, OpponentPolicy::TierBiased);
        assert_eq!(args.lineup.len(), 6);
    }

    #[test]
    fn test_winprob_defaults() {
        let cli = Cli::try_parse_from(["medal-pool", "winprob"]).unwrap();
        let Command::Winprob(args) = cli.command else {
            panic!("expected winprob");
        };
        assert_eq!(args.players, DEFAULT_POOL_SIZE);
        assert_eq!(args.policy, OpponentPolicy::Uniform);
        assert_eq!(args.lineup, DEFAULT_LINEUP.map(String::from).to_vec());
    }

    #[test]
    fn test_rank_entities_default_empty() {
        let cli = Cli::try_parse_from(["medal-pool", "rank", "--trials", "10"]).unwrap();
        let Command::Rank(args) = cli.command else {
            panic!("expected rank");
        };
        assert!(args.entities.is_empty());
        assert_eq!(args.trials, 10);
    }
}
