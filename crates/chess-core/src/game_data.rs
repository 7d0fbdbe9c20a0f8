use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use shakmaty::Color;

use crate::pgn;

/// Final outcome of a recorded game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    #[serde(alias = "1-0")]
    WhiteWin,
    #[serde(alias = "0-1")]
    BlackWin,
    #[serde(alias = "1/2-1/2", alias = "*")]
    Draw,
}

/// Outcome of a game seen from one player's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

impl GameResult {
    pub fn outcome_for(self, color: Color) -> Outcome {
        match (self, color) {
            (GameResult::Draw, _) => Outcome::Draw,
            (GameResult::WhiteWin, Color::White) | (GameResult::BlackWin, Color::Black) => {
                Outcome::Win
            }
            _ => Outcome::Loss,
        }
    }
}

/// A previously recorded game as the store hands it out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    #[serde(alias = "game_id")]
    pub id: String,
    pub platform: String,
    pub date: NaiveDateTime,
    #[serde(alias = "white_player")]
    pub white: String,
    #[serde(alias = "black_player")]
    pub black: String,
    pub result: GameResult,
    #[serde(default)]
    pub time_control: String,
    #[serde(default)]
    pub rated: bool,
    #[serde(default)]
    pub pgn: String,
    /// SAN (or UCI) moves from the initial position
    #[serde(default)]
    pub moves: Vec<String>,
}

impl Game {
    /// Moves to replay. Falls back to the PGN move text when no list was stored.
    pub fn move_list(&self) -> Vec<String> {
        if self.moves.is_empty() {
            pgn::extract_moves(&self.pgn)
        } else {
            self.moves.clone()
        }
    }

    /// Color `username` played in this game (case-insensitive), if any.
    pub fn color_of(&self, username: &str) -> Option<Color> {
        if self.white.eq_ignore_ascii_case(username) {
            Some(Color::White)
        } else if self.black.eq_ignore_ascii_case(username) {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn player(&self, color: Color) -> &str {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }
}

/// Lowercase name of a color, as used on the wire.
pub fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

/// Parse "white" / "black" (any case).
pub fn parse_color(s: &str) -> Option<Color> {
    match s.trim().to_ascii_lowercase().as_str() {
        "white" | "w" => Some(Color::White),
        "black" | "b" => Some(Color::Black),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_aliases() {
        let r: GameResult = serde_json::from_str("\"1-0\"").unwrap();
        assert_eq!(r, GameResult::WhiteWin);
        let r: GameResult = serde_json::from_str("\"black_win\"").unwrap();
        assert_eq!(r, GameResult::BlackWin);
        let r: GameResult = serde_json::from_str("\"1/2-1/2\"").unwrap();
        assert_eq!(r, GameResult::Draw);
    }

    #[test]
    fn test_outcome_for() {
        assert_eq!(GameResult::WhiteWin.outcome_for(Color::White), Outcome::Win);
        assert_eq!(GameResult::WhiteWin.outcome_for(Color::Black), Outcome::Loss);
        assert_eq!(GameResult::Draw.outcome_for(Color::Black), Outcome::Draw);
    }

    #[test]
    fn test_deserialize_legacy_storage_shape() {
        let json = r#"{
            "game_id": "abc",
            "platform": "lichess",
            "date": "2024-03-01T18:22:05",
            "white_player": "Alice",
            "black_player": "bob",
            "result": "0-1",
            "time_control": "180+2",
            "rated": true,
            "pgn": "1. e4 e5 0-1",
            "moves": ["e4", "e5"]
        }"#;
        let game: Game = serde_json::from_str(json).unwrap();
        assert_eq!(game.id, "abc");
        assert_eq!(game.color_of("BOB"), Some(Color::Black));
        assert_eq!(game.color_of("carol"), None);
        assert_eq!(game.player(Color::White), "Alice");
    }

    #[test]
    fn test_move_list_falls_back_to_pgn() {
        let json = r#"{
            "id": "x", "platform": "chess.com", "date": "2024-03-01T00:00:00",
            "white": "a", "black": "b", "result": "draw",
            "pgn": "[White \"a\"]\n\n1. d4 d5 2. c4 1/2-1/2"
        }"#;
        let game: Game = serde_json::from_str(json).unwrap();
        assert_eq!(game.move_list(), vec!["d4", "d5", "c4"]);
    }
}
