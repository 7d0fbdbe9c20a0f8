//! Error types

use chess_core::ReplayError;
use thiserror::Error;

/// Failures talking to the evaluation engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Engine protocol error: {0}")]
    Protocol(String),

    #[error("Engine timed out after {0}s")]
    Timeout(u64),
}

#[derive(Error, Debug)]
pub enum TrainerError {
    #[error("Configuration error: {0}")]
    Config(&'static str),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Replay error: {0}")]
    Replay(#[from] ReplayError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Game not found: {0}")]
    GameNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("cancelled")]
    Cancelled,

    #[error("Scan aborted: {0}")]
    Aborted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
