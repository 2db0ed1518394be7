use clap::Parser;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::process;

use pgn_replay::chess::json::batch_to_json;
use pgn_replay::chess::log;
use pgn_replay::chess::reader::{CompressionMode, read_games};
use pgn_replay::chess::summary::{BatchSummary, ResultCounts, batch_positions_text};
use pgn_replay::{GameInfo, ReplayOptions, Tier, extract_batch, extract_batch_parallel};

/// Replay PGN games into per-ply FEN positions.
///
/// Set PGN_REPLAY_LOG=warn|info|debug for progress on stderr.
#[derive(Parser)]
#[command(name = "pgn-replay")]
#[command(about = "Replay PGN games into per-ply FEN positions")]
#[command(version)]
struct Args {
    /// PGN file or glob pattern (e.g. 'games/*.pgn.zst')
    #[arg(value_name = "PATTERN")]
    pattern: String,

    /// Input compression; defaults to zstd for '.zst' files and plain otherwise
    #[arg(long, value_name = "MODE", value_parser = parse_compression)]
    compression: Option<CompressionMode>,

    /// Replay games on all cores
    #[arg(long)]
    parallel: bool,

    /// Only use the strict tier, no recovery
    #[arg(long, conflicts_with = "max_tier")]
    strict_only: bool,

    /// Last recovery tier to try: strict, cleaned, manual or lenient
    #[arg(long, value_name = "TIER", value_parser = parse_tier)]
    max_tier: Option<Tier>,

    /// Print totals instead of JSON
    #[arg(long)]
    summary: bool,

    /// Print a plain-text position listing instead of JSON
    #[arg(long, conflicts_with = "summary")]
    positions_text: bool,

    /// Maximum number of games to replay (0 = all games)
    #[arg(long, default_value = "0")]
    max_games: usize,

    /// Write output to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

fn parse_compression(raw: &str) -> Result<CompressionMode, String> {
    CompressionMode::parse(raw).map_err(|e| e.to_string())
}

fn parse_tier(raw: &str) -> Result<Tier, String> {
    Tier::parse(raw).ok_or_else(|| format!("unknown tier '{}'", raw))
}

fn main() {
    let args = Args::parse();

    let mut games = match read_games(&args.pattern, args.compression) {
        Ok(games) => games,
        Err(e) => {
            log::error(format!("Error reading '{}': {}", args.pattern, e));
            process::exit(1);
        }
    };
    if args.max_games > 0 {
        games.truncate(args.max_games);
    }
    log::info(format!("Read {} games from '{}'", games.len(), args.pattern));

    let options = if args.strict_only {
        ReplayOptions::new()
            .with_lenient(false)
            .with_max_tier(Tier::Strict)
    } else if let Some(tier) = args.max_tier {
        ReplayOptions::new().with_max_tier(tier)
    } else {
        ReplayOptions::new()
    };

    // Same first-wins rule as the batch, so headers stay with their game.
    let mut infos: HashMap<String, GameInfo> = HashMap::with_capacity(games.len());
    for (id, raw) in &games {
        infos.entry(id.clone()).or_insert_with(|| {
            GameInfo::from_pgn_with_overrides(&raw.text, raw.header_overrides.as_ref())
        });
    }

    let batch = if args.parallel {
        extract_batch_parallel(games, &options)
    } else {
        extract_batch(games, &options)
    };

    let rendered = if args.summary {
        let results = ResultCounts::from_infos(batch.ids().filter_map(|id| infos.get(id)));
        format!(
            "{}\nResults: 1-0 {}, 0-1 {}, draws {}, unfinished {}\n",
            BatchSummary::from_batch(&batch),
            results.white_wins,
            results.black_wins,
            results.draws,
            results.unfinished
        )
    } else if args.positions_text {
        batch_positions_text(&batch, &infos)
    } else {
        let mut json = batch_to_json(&batch, &infos);
        json.push('\n');
        json
    };

    match &args.output {
        Some(path) => {
            if let Err(e) = fs::write(path, rendered) {
                log::error(format!("Error writing '{}': {}", path.display(), e));
                process::exit(1);
            }
        }
        None => print!("{}", rendered),
    }
}
