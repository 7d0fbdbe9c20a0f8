//! Engine and scan configuration from environment variables

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::TrainerError;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Path to Stockfish binary
    pub stockfish_path: String,

    /// Number of Stockfish processes kept alive
    pub pool_size: usize,

    /// Threads per Stockfish process
    pub threads: u32,

    /// Hash table size per process (MB)
    pub hash_mb: u32,

    /// Upper bound on a single engine response
    pub timeout: Duration,

    /// Depth for the explorer's evaluation of the queried position
    pub explorer_depth: u32,

    /// Depth for each continuation's evaluation
    pub continuation_depth: u32,

    /// Depth for puzzle-scan evaluations
    pub puzzle_depth: u32,

    /// Openings catalog (JSON tree keyed by UCI moves)
    pub openings_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stockfish_path: "/usr/local/bin/stockfish".to_string(),
            pool_size: num_cpus::get().max(1),
            threads: 1,
            hash_mb: 256,
            timeout: Duration::from_secs(30),
            explorer_depth: 18,
            continuation_depth: 15,
            puzzle_depth: 15,
            openings_path: "data/openings.json".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables, keeping defaults for
    /// anything unset. A value that is set but malformed is an error.
    pub fn from_env() -> Result<Self, TrainerError> {
        let defaults = Self::default();

        let pool_size: usize = parse_var("ENGINE_POOL_SIZE", "ENGINE_POOL_SIZE must be a number")?
            .unwrap_or(defaults.pool_size);
        if pool_size == 0 {
            return Err(TrainerError::Config("ENGINE_POOL_SIZE must be at least 1"));
        }

        let timeout_secs: u64 =
            parse_var("ENGINE_TIMEOUT_SECS", "ENGINE_TIMEOUT_SECS must be a number")?
                .unwrap_or(defaults.timeout.as_secs());

        Ok(Self {
            stockfish_path: env::var("STOCKFISH_PATH").unwrap_or(defaults.stockfish_path),
            pool_size,
            threads: parse_var("ENGINE_THREADS", "ENGINE_THREADS must be a number")?
                .unwrap_or(defaults.threads),
            hash_mb: parse_var("ENGINE_HASH_MB", "ENGINE_HASH_MB must be a number")?
                .unwrap_or(defaults.hash_mb),
            timeout: Duration::from_secs(timeout_secs),
            explorer_depth: parse_var("EXPLORER_DEPTH", "EXPLORER_DEPTH must be a number")?
                .unwrap_or(defaults.explorer_depth),
            continuation_depth: parse_var(
                "CONTINUATION_DEPTH",
                "CONTINUATION_DEPTH must be a number",
            )?
            .unwrap_or(defaults.continuation_depth),
            puzzle_depth: parse_var("PUZZLE_DEPTH", "PUZZLE_DEPTH must be a number")?
                .unwrap_or(defaults.puzzle_depth),
            openings_path: env::var("OPENINGS_PATH").unwrap_or(defaults.openings_path),
        })
    }
}

fn parse_var<T: FromStr>(name: &str, err: &'static str) -> Result<Option<T>, TrainerError> {
    match env::var(name) {
        Ok(v) => v.trim().parse().map(Some).map_err(|_| TrainerError::Config(err)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.explorer_depth, 18);
        assert_eq!(config.continuation_depth, 15);
        assert!(config.pool_size >= 1);
    }

    #[test]
    fn test_parse_var() {
        env::set_var("TRAINER_TEST_DEPTH_OK", "12");
        env::set_var("TRAINER_TEST_DEPTH_BAD", "twelve");
        let ok: Option<u32> = parse_var("TRAINER_TEST_DEPTH_OK", "bad").unwrap();
        assert_eq!(ok, Some(12));
        assert!(parse_var::<u32>("TRAINER_TEST_DEPTH_BAD", "bad").is_err());
        assert_eq!(parse_var::<u32>("TRAINER_TEST_DEPTH_UNSET", "bad").unwrap(), None);
    }
}
