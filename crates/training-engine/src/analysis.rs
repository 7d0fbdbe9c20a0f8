//! Evaluation scores and puzzle classification. Pure functions, no engine
//! or store access.

use std::fmt;
use std::ops::Neg;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Centipawn value standing in for a forced mate
pub const MATE_SCORE: i32 = 10_000;

/// Minimum evaluation swing (centipawns) for a position to become a puzzle
pub const PUZZLE_THRESHOLD: i32 = 100;

/// Loss at which a mistake puzzle becomes medium
pub const MEDIUM_THRESHOLD: i32 = 300;

/// Loss at which a mistake puzzle becomes hard
pub const HARD_THRESHOLD: i32 = 600;

/// Engine score, always from the point of view of the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Score {
    Cp(i32),
    /// Forced mate in `moves`; `winning` is false when the side to move is
    /// the one getting mated (`moves == 0` means it already is).
    Mate { moves: u32, winning: bool },
}

impl Score {
    /// Build from a UCI `score mate N` value.
    pub fn from_uci_mate(n: i32) -> Self {
        Score::Mate {
            moves: n.unsigned_abs(),
            winning: n > 0,
        }
    }

    /// Collapse to a single centipawn number. Shorter mates score higher.
    pub fn to_cp(self) -> i32 {
        match self {
            Score::Cp(cp) => cp,
            Score::Mate { moves, winning } => {
                let moves = moves.min(999) as i32;
                let value = MATE_SCORE - moves * 10;
                if winning {
                    value
                } else {
                    -value
                }
            }
        }
    }
}

impl Neg for Score {
    type Output = Score;

    fn neg(self) -> Score {
        match self {
            Score::Cp(cp) => Score::Cp(-cp),
            Score::Mate { moves, winning } => Score::Mate {
                moves,
                winning: !winning,
            },
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Cp(cp) => write!(f, "{:.2}", *cp as f64 / 100.0),
            Score::Mate { moves, winning: true } => write!(f, "M{moves}"),
            Score::Mate { moves, winning: false } => write!(f, "-M{moves}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PuzzleKind {
    /// The player's move lost significant evaluation
    Mistake,
    /// A strong move was available, whatever was played
    Tactical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: PuzzleKind,
    /// Centipawns lost by the played move; 0 for tactical puzzles
    pub eval_loss: i32,
    pub difficulty: Difficulty,
}

pub fn difficulty_for(kind: PuzzleKind, eval_loss: i32) -> Difficulty {
    if kind == PuzzleKind::Tactical {
        return Difficulty::Easy;
    }
    if eval_loss < MEDIUM_THRESHOLD {
        Difficulty::Easy
    } else if eval_loss < HARD_THRESHOLD {
        Difficulty::Medium
    } else {
        Difficulty::Hard
    }
}

/// Decide whether a position is a puzzle. All evaluations are centipawns
/// from the player's point of view.
pub fn classify_position(
    eval_before: i32,
    eval_after_best: i32,
    eval_after_played: i32,
    played_is_best: bool,
) -> Option<Classification> {
    let eval_loss = eval_before - eval_after_played;
    if !played_is_best && eval_loss >= PUZZLE_THRESHOLD {
        return Some(Classification {
            kind: PuzzleKind::Mistake,
            eval_loss,
            difficulty: difficulty_for(PuzzleKind::Mistake, eval_loss),
        });
    }

    if eval_before - eval_after_best >= PUZZLE_THRESHOLD {
        return Some(Classification {
            kind: PuzzleKind::Tactical,
            eval_loss: 0,
            difficulty: difficulty_for(PuzzleKind::Tactical, 0),
        });
    }

    None
}
