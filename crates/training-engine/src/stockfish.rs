//! Stockfish engine wrapper using UCI protocol (async I/O)

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::analysis::Score;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::evaluator::{Evaluation, MAX_PV_LEN};

/// Stockfish engine instance
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    timeout: Duration,
    healthy: bool,
}

impl StockfishEngine {
    /// Spawn a new Stockfish process and initialize UCI
    pub async fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut process = Command::new(&config.stockfish_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                EngineError::Unavailable(format!(
                    "Failed to spawn Stockfish at {}: {e}",
                    config.stockfish_path
                ))
            })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Unavailable("Stockfish stdin not captured".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineError::Unavailable("Stockfish stdout not captured".into()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
            timeout: config.timeout,
            healthy: true,
        };

        // Initialize UCI
        engine.send("uci").await?;
        engine.wait_for("uciok").await?;

        // Configure for analysis
        engine
            .send(&format!("setoption name Threads value {}", config.threads))
            .await?;
        engine
            .send(&format!("setoption name Hash value {}", config.hash_mb))
            .await?;
        engine.send("setoption name UCI_AnalyseMode value true").await?;
        engine.is_ready().await?;

        Ok(engine)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// Send a command to Stockfish
    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(cmd, "SF <");
        let written = async {
            self.stdin.write_all(format!("{cmd}\n").as_bytes()).await?;
            self.stdin.flush().await
        }
        .await;
        written.map_err(|e| {
            self.healthy = false;
            EngineError::Unavailable(format!("Failed to write to Stockfish: {e}"))
        })
    }

    /// Read one line, bounded by the configured timeout
    async fn read_line(&mut self) -> Result<String, EngineError> {
        let mut line = String::new();
        let read = timeout(self.timeout, self.stdout.read_line(&mut line)).await;
        match read {
            Err(_) => {
                self.healthy = false;
                Err(EngineError::Timeout(self.timeout.as_secs()))
            }
            Ok(Err(e)) => {
                self.healthy = false;
                Err(EngineError::Unavailable(format!(
                    "Failed to read from Stockfish: {e}"
                )))
            }
            Ok(Ok(0)) => {
                self.healthy = false;
                Err(EngineError::Unavailable("Stockfish closed its output".into()))
            }
            Ok(Ok(_)) => {
                let trimmed = line.trim().to_string();
                debug!(line = %trimmed, "SF >");
                Ok(trimmed)
            }
        }
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), EngineError> {
        loop {
            if self.read_line().await? == expected {
                return Ok(());
            }
        }
    }

    /// Round-trip `isready` to confirm the process still answers
    pub async fn is_ready(&mut self) -> Result<(), EngineError> {
        self.send("isready").await?;
        self.wait_for("readyok").await
    }

    /// Evaluate a position to a fixed depth
    pub async fn evaluate(&mut self, fen: &str, depth: u32) -> Result<Evaluation, EngineError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let mut score: Option<Score> = None;
        let mut pv: Vec<String> = Vec::new();

        loop {
            let line = self.read_line().await?;

            if line.starts_with("info") && line.contains(" score ") {
                if let Some(cp) = parse_cp(&line) {
                    score = Some(Score::Cp(cp));
                } else if let Some(mate) = parse_mate(&line) {
                    score = Some(Score::from_uci_mate(mate));
                }
                if line.contains(" pv ") {
                    pv = parse_pv(&line);
                }
            } else if line.starts_with("bestmove") {
                let best_move = parse_bestmove(&line);
                let score = score.ok_or_else(|| {
                    EngineError::Protocol(format!("No score before bestmove for {fen}"))
                })?;
                pv.truncate(MAX_PV_LEN);
                return Ok(Evaluation {
                    best_move,
                    score,
                    pv,
                });
            }
        }
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        if timeout(Duration::from_secs(2), self.process.wait()).await.is_err() {
            warn!("Stockfish did not exit after quit, killing");
            let _ = self.process.start_kill();
        }
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

/// Parse centipawn score from info line
fn parse_cp(line: &str) -> Option<i32> {
    value_after(line, "cp")
}

/// Parse mate score from info line
fn parse_mate(line: &str) -> Option<i32> {
    value_after(line, "mate")
}

fn value_after(line: &str, key: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == key && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// Parse PV moves from info line
fn parse_pv(line: &str) -> Vec<String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut in_pv = false;
    let mut moves = Vec::new();

    for part in parts {
        if part == "pv" {
            in_pv = true;
            continue;
        }
        if in_pv {
            // PV ends at next keyword or end of line
            if part.starts_with("bmc") || part == "string" {
                break;
            }
            moves.push(part.to_string());
        }
    }

    moves
}

/// `bestmove e2e4 ponder e7e5` -> Some("e2e4"); `bestmove (none)` -> None
fn parse_bestmove(line: &str) -> Option<String> {
    line.split_whitespace()
        .nth(1)
        .filter(|m| *m != "(none)" && *m != "0000")
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cp() {
        let line = "info depth 20 seldepth 25 multipv 1 score cp 35 nodes 100000 pv e2e4";
        assert_eq!(parse_cp(line), Some(35));
        assert_eq!(parse_mate(line), None);
    }

    #[test]
    fn test_parse_mate() {
        let line = "info depth 20 score mate -3 nodes 100000 pv e2e4";
        assert_eq!(parse_mate(line), Some(-3));
        assert_eq!(parse_mate("info depth 0 score mate 0"), Some(0));
    }

    #[test]
    fn test_parse_pv() {
        let line = "info depth 20 score cp 35 pv e2e4 e7e5 g1f3";
        let pv = parse_pv(line);
        assert_eq!(pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn test_parse_bestmove() {
        assert_eq!(parse_bestmove("bestmove e2e4 ponder e7e5").as_deref(), Some("e2e4"));
        assert_eq!(parse_bestmove("bestmove (none)"), None);
        assert_eq!(parse_bestmove("bestmove"), None);
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let config = EngineConfig {
            stockfish_path: "/nonexistent/stockfish".into(),
            ..EngineConfig::default()
        };
        let err = StockfishEngine::new(&config).await.err();
        assert!(matches!(err, Some(EngineError::Unavailable(_))));
    }
}
