//! Position replay: walks a recorded move list through shakmaty.
//!
//! Both the explorer and the puzzle generator go through here so they agree
//! on what position a game was in at every ply.

use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus};
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Move, Position};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    #[error("illegal move {mv:?} at ply {ply}")]
    IllegalMove { ply: usize, mv: String },

    #[error("invalid FEN {fen:?}: {reason}")]
    InvalidFen { fen: String, reason: String },
}

/// A fully replayed game: `positions[i]` is the position before `moves[i]`,
/// and the last entry is the final position.
#[derive(Debug, Clone)]
pub struct Replay {
    positions: Vec<Chess>,
    moves: Vec<Move>,
}

impl Replay {
    /// Number of plies replayed.
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn positions(&self) -> &[Chess] {
        &self.positions
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// Position in which `ply` was played.
    pub fn position_before(&self, ply: usize) -> Option<&Chess> {
        if ply < self.moves.len() {
            self.positions.get(ply)
        } else {
            None
        }
    }

    /// Position right after `ply` was played.
    pub fn position_after(&self, ply: usize) -> Option<&Chess> {
        if ply < self.moves.len() {
            self.positions.get(ply + 1)
        } else {
            None
        }
    }

    pub fn final_position(&self) -> &Chess {
        // positions always holds the start position
        &self.positions[self.positions.len() - 1]
    }
}

/// Replay `moves` from the standard starting position.
pub fn replay(moves: &[String]) -> Result<Replay, ReplayError> {
    replay_from(Chess::default(), moves)
}

/// Replay `moves` from `start`, failing on the first illegal move.
pub fn replay_from(start: Chess, moves: &[String]) -> Result<Replay, ReplayError> {
    let mut positions = Vec::with_capacity(moves.len() + 1);
    let mut played = Vec::with_capacity(moves.len());
    let mut pos = start;

    for (ply, text) in moves.iter().enumerate() {
        let mv = parse_move(&pos, text).ok_or_else(|| ReplayError::IllegalMove {
            ply,
            mv: text.clone(),
        })?;
        let next = pos.clone().play(mv).map_err(|_| ReplayError::IllegalMove {
            ply,
            mv: text.clone(),
        })?;
        positions.push(pos);
        played.push(mv);
        pos = next;
    }
    positions.push(pos);

    Ok(Replay {
        positions,
        moves: played,
    })
}

/// Replay only the first `ply` moves and return the position reached.
/// Moves past `ply` are never looked at.
pub fn position_at(moves: &[String], ply: usize) -> Result<Chess, ReplayError> {
    let prefix = &moves[..ply.min(moves.len())];
    let replay = replay(prefix)?;
    Ok(replay.final_position().clone())
}

/// Parse a move written in SAN (with or without check marks) or UCI.
pub fn parse_move(pos: &Chess, text: &str) -> Option<Move> {
    let text = text.trim().trim_end_matches(['!', '?']);
    if let Ok(san) = text.parse::<SanPlus>() {
        if let Ok(mv) = san.san.to_move(pos) {
            return Some(mv);
        }
    }
    let uci: UciMove = text.parse().ok()?;
    uci.to_move(pos).ok()
}

pub fn parse_fen(fen: &str) -> Result<Chess, ReplayError> {
    let invalid = |reason: String| ReplayError::InvalidFen {
        fen: fen.to_string(),
        reason,
    };
    let parsed: Fen = fen.trim().parse().map_err(|e| invalid(format!("{e}")))?;
    parsed
        .into_position::<Chess>(CastlingMode::Standard)
        .map_err(|e| invalid(format!("{e}")))
}

pub fn to_fen(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

/// Piece placement only (first FEN field).
pub fn placement(pos: &Chess) -> String {
    pos.board().to_string()
}

/// True when both positions have the same pieces on the same squares.
/// Side to move, castling rights and clocks are ignored.
pub fn same_placement(a: &Chess, b: &Chess) -> bool {
    a.board() == b.board()
}

/// SAN for `mv` in `pos`, with `+` / `#` suffix.
pub fn to_san(pos: &Chess, mv: Move) -> String {
    let san = San::from_move(pos, mv).to_string();
    match pos.clone().play(mv) {
        Ok(after) if after.is_checkmate() => format!("{san}#"),
        Ok(after) if after.is_check() => format!("{san}+"),
        _ => san,
    }
}

pub fn to_uci(mv: Move) -> String {
    mv.to_uci(CastlingMode::Standard).to_string()
}

/// Convert a UCI move (as engines print it) into SAN for `pos`.
pub fn uci_to_san(pos: &Chess, uci: &str) -> Option<String> {
    let parsed: UciMove = uci.parse().ok()?;
    let mv = parsed.to_move(pos).ok()?;
    Some(to_san(pos, mv))
}

/// Convert a UCI line into SAN, stopping at the first move that does not apply.
pub fn uci_line_to_san(pos: &Chess, line: &[String]) -> Vec<String> {
    let mut pos = pos.clone();
    let mut out = Vec::with_capacity(line.len());
    for uci in line {
        let Some(mv) = uci
            .parse::<UciMove>()
            .ok()
            .and_then(|u| u.to_move(&pos).ok())
        else {
            break;
        };
        out.push(to_san(&pos, mv));
        match pos.clone().play(mv) {
            Ok(next) => pos = next,
            Err(_) => break,
        }
    }
    out
}
