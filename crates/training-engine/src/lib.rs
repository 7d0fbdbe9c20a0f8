//! Opening explorer and puzzle generator over a player's recorded games.
//!
//! Scans read games from a [`GameStore`], replay them with `chess_core`, ask an
//! [`Evaluator`] (normally a Stockfish [`EnginePool`]) for scores, and run as
//! background tasks under a [`TaskOrchestrator`].

pub mod analysis;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod explorer;
pub mod progress;
pub mod puzzles;
pub mod stockfish;
pub mod store;
pub mod tasks;

pub use analysis::{Difficulty, PuzzleKind, Score};
pub use config::EngineConfig;
pub use error::{EngineError, TrainerError};
pub use evaluator::{EnginePool, Evaluation, Evaluator};
pub use explorer::{
    explore, find_continuations, Continuation, ExplorerDepths, ExplorerQuery, ExplorerReport,
};
pub use progress::{NoProgress, ProgressSink, ScanProgress};
pub use puzzles::{generate_puzzles, PuzzleCandidate, PuzzleScanParams};
pub use store::{GameFilter, GameStore, MemoryStore};
pub use tasks::{TaskKind, TaskOrchestrator, TaskOutput, TaskRecord, TaskStatus};
