//! Training engine CLI
//!
//! Loads recorded games, starts a Stockfish pool and runs one explorer or
//! puzzle scan, printing the finished task as JSON.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chess_core::OpeningCatalog;
use tracing::info;

use training_engine::{
    Difficulty, EngineConfig, EnginePool, ExplorerQuery, MemoryStore, PuzzleScanParams,
    TaskOrchestrator, TaskStatus,
};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

const USAGE: &str = "usage:
  training-engine explore (--fen <FEN> | --moves <e4,e5,...>) --color <white|black> [--user <name,...>] [--time <blitz,...>]
  training-engine puzzles --username <name> [--max N] [--difficulty easy|medium|hard] [--seed N]";

/// Value following `--name`, if present
fn arg_value(args: &[String], name: &str) -> Option<String> {
    for i in 0..args.len() {
        if args[i] == name {
            return args.get(i + 1).cloned();
        }
    }
    None
}

/// Comma-separated list following `--name`
fn arg_list(args: &[String], name: &str) -> Vec<String> {
    arg_value(args, name)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn arg_parsed<T: std::str::FromStr>(args: &[String], name: &str) -> anyhow::Result<Option<T>> {
    match arg_value(args, name) {
        Some(v) => match v.parse() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => bail!("invalid value for {name}: {v}"),
        },
        None => Ok(None),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().cloned() else {
        bail!("{USAGE}");
    };

    let config = EngineConfig::from_env()?;
    let games_path = std::env::var("GAMES_PATH").context("GAMES_PATH must be set")?;
    let store = MemoryStore::load(&games_path)
        .with_context(|| format!("failed to load games from {games_path}"))?;
    let catalog = OpeningCatalog::load(&config.openings_path);

    info!(
        stockfish_path = %config.stockfish_path,
        games = store.len(),
        "Starting training engine"
    );
    let pool = Arc::new(EnginePool::spawn(&config).await?);
    info!(engines = pool.size(), "Engine pool ready");

    let orchestrator = TaskOrchestrator::new(
        Arc::new(store),
        pool.clone(),
        Arc::new(catalog),
        config,
    );

    let task_id = match command.as_str() {
        "explore" => {
            let color = arg_value(&args, "--color").context("--color is required")?;
            orchestrator.start_explorer_scan(ExplorerQuery {
                fen: arg_value(&args, "--fen"),
                moves: arg_list(&args, "--moves"),
                color,
                usernames: arg_list(&args, "--user"),
                time_controls: arg_list(&args, "--time"),
                from_date: None,
                to_date: None,
            })?
        }
        "puzzles" => {
            let username = arg_value(&args, "--username").context("--username is required")?;
            let mut params = PuzzleScanParams::new(username);
            if let Some(max) = arg_parsed::<usize>(&args, "--max")? {
                params.max_puzzles = max;
            }
            params.difficulty = arg_parsed::<Difficulty>(&args, "--difficulty")?;
            params.seed = arg_parsed::<u64>(&args, "--seed")?;
            orchestrator.start_puzzle_scan(params)?
        }
        other => bail!("unknown command {other:?}\n{USAGE}"),
    };

    let mut last_progress = 0;
    let record = loop {
        let record = orchestrator.poll(&task_id)?;
        if record.status != TaskStatus::Running {
            break record;
        }
        if record.progress != last_progress {
            last_progress = record.progress;
            info!(
                task_id = %task_id,
                progress = record.progress,
                examined = record.games_examined,
                found = record.items_found,
                "Scan progress"
            );
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };

    println!("{}", serde_json::to_string_pretty(&record)?);
    pool.shutdown().await;

    if record.status == TaskStatus::Failed {
        bail!(
            "task failed: {}",
            record.error.unwrap_or_else(|| "unknown error".into())
        );
    }
    Ok(())
}
