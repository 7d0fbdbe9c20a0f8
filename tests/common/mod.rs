#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chess_core::replay::{parse_fen, position_at, to_fen, to_uci};
use chess_core::{Game, GameResult};
use shakmaty::Position;
use training_engine::{EngineError, Evaluation, Evaluator, Score};

/// Main line of a closed Ruy Lopez, 40 plies, all legal.
pub const RUY_LOPEZ: &[&str] = &[
    "e4", "e5", "Nf3", "Nc6", "Bb5", "a6", "Ba4", "Nf6", "O-O", "Be7", //
    "Re1", "b5", "Bb3", "d6", "c3", "O-O", "h3", "Nb8", "d4", "Nbd7", //
    "Nbd2", "Bb7", "Bc2", "Re8", "Nf1", "Bf8", "Ng3", "g6", "a4", "c5", //
    "d5", "c4", "Bg5", "h6", "Be3", "Nc5", "Qd2", "h5", "Bg5", "Be7",
];

pub fn moves(list: &[&str]) -> Vec<String> {
    list.iter().map(|m| m.to_string()).collect()
}

pub fn game(id: &str, white: &str, black: &str, result: GameResult, list: &[&str]) -> Game {
    Game {
        id: id.to_string(),
        platform: "lichess".to_string(),
        date: "2024-05-01T12:00:00".parse().unwrap(),
        white: white.to_string(),
        black: black.to_string(),
        result,
        time_control: "300+0".to_string(),
        rated: true,
        pgn: String::new(),
        moves: moves(list),
    }
}

/// FEN after playing `list` from the initial position.
pub fn fen_after(list: &[&str]) -> String {
    to_fen(&position_at(&moves(list), list.len()).unwrap())
}

/// Scores every position the same and suggests its first legal move.
pub struct ConstantEvaluator {
    pub cp: i32,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl ConstantEvaluator {
    pub fn new(cp: i32) -> Self {
        Self {
            cp,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(cp: i32, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(cp)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Evaluator for ConstantEvaluator {
    async fn evaluate(&self, fen: &str, _depth: u32) -> Result<Evaluation, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let pos = parse_fen(fen).map_err(|e| EngineError::Protocol(e.to_string()))?;
        let best = pos.legal_moves().first().map(|mv| to_uci(*mv));
        Ok(Evaluation {
            best_move: best.clone(),
            score: Score::Cp(self.cp),
            pv: best.into_iter().collect(),
        })
    }
}

/// Answers only for scripted FENs; anything else is a protocol error.
#[derive(Default)]
pub struct ScriptedEvaluator {
    answers: HashMap<String, Evaluation>,
}

impl ScriptedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, fen: String, best_move: Option<&str>, score: Score, pv: &[&str]) -> Self {
        self.answers.insert(
            fen,
            Evaluation {
                best_move: best_move.map(String::from),
                score,
                pv: moves(pv),
            },
        );
        self
    }
}

#[async_trait]
impl Evaluator for ScriptedEvaluator {
    async fn evaluate(&self, fen: &str, _depth: u32) -> Result<Evaluation, EngineError> {
        self.answers
            .get(fen)
            .cloned()
            .ok_or_else(|| EngineError::Protocol(format!("unscripted position {fen}")))
    }
}

/// An engine that never started.
pub struct UnavailableEvaluator;

#[async_trait]
impl Evaluator for UnavailableEvaluator {
    async fn evaluate(&self, _fen: &str, _depth: u32) -> Result<Evaluation, EngineError> {
        Err(EngineError::Unavailable("no engine".into()))
    }

    async fn ensure_ready(&self) -> Result<(), EngineError> {
        Err(EngineError::Unavailable("no engine".into()))
    }
}

/// Passes the readiness check, then panics on the first evaluation.
pub struct PanickingEvaluator;

#[async_trait]
impl Evaluator for PanickingEvaluator {
    async fn evaluate(&self, _fen: &str, _depth: u32) -> Result<Evaluation, EngineError> {
        panic!("engine crashed");
    }
}
