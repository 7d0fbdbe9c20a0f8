//! Read access to recorded games.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chess_core::Game;
use chrono::NaiveDateTime;
use serde::Deserialize;
use shakmaty::Color;
use tracing::info;

use crate::error::TrainerError;

/// Optional restrictions applied when listing games.
#[derive(Debug, Clone, Default)]
pub struct GameFilter {
    pub from_date: Option<NaiveDateTime>,
    pub to_date: Option<NaiveDateTime>,
    /// Only games where this user played this color
    pub player: Option<(String, Color)>,
}

impl GameFilter {
    pub fn matches(&self, game: &Game) -> bool {
        if self.from_date.is_some_and(|from| game.date < from) {
            return false;
        }
        if self.to_date.is_some_and(|to| game.date > to) {
            return false;
        }
        match &self.player {
            Some((username, color)) => game.player(*color).eq_ignore_ascii_case(username),
            None => true,
        }
    }
}

/// Source of recorded games. Scans only read from it.
pub trait GameStore: Send + Sync {
    fn list_games(&self, filter: &GameFilter) -> Vec<Game>;

    fn get_game(&self, id: &str) -> Result<Game, TrainerError>;
}

/// Games held in memory, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    games: Vec<Game>,
    index: HashMap<String, usize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredGames {
    List(Vec<Game>),
    ById(HashMap<String, Game>),
}

impl MemoryStore {
    pub fn new(games: Vec<Game>) -> Self {
        let mut store = Self::default();
        for game in games {
            store.insert(game);
        }
        store
    }

    /// Insert or replace a game by id.
    pub fn insert(&mut self, game: Game) {
        match self.index.get(&game.id) {
            Some(&i) => self.games[i] = game,
            None => {
                self.index.insert(game.id.clone(), self.games.len());
                self.games.push(game);
            }
        }
    }

    /// Parse a JSON array of games, or an object keyed by game id.
    pub fn from_json(json: &str) -> Result<Self, TrainerError> {
        let games = match serde_json::from_str::<StoredGames>(json)? {
            StoredGames::List(games) => games,
            StoredGames::ById(map) => {
                let mut games: Vec<Game> = map.into_values().collect();
                games.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
                games
            }
        };
        Ok(Self::new(games))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TrainerError> {
        let path = path.as_ref();
        let store = Self::from_json(&fs::read_to_string(path)?)?;
        info!(path = %path.display(), games = store.len(), "Loaded game store");
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

impl GameStore for MemoryStore {
    fn list_games(&self, filter: &GameFilter) -> Vec<Game> {
        self.games
            .iter()
            .filter(|g| filter.matches(g))
            .cloned()
            .collect()
    }

    fn get_game(&self, id: &str) -> Result<Game, TrainerError> {
        self.index
            .get(id)
            .map(|&i| self.games[i].clone())
            .ok_or_else(|| TrainerError::GameNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAMES: &str = r#"[
        {"id": "g1", "platform": "lichess", "date": "2024-01-10T10:00:00",
         "white": "Alice", "black": "bob", "result": "1-0", "time_control": "180+0",
         "moves": ["e4", "e5"]},
        {"id": "g2", "platform": "chess.com", "date": "2024-02-10T10:00:00",
         "white": "bob", "black": "alice", "result": "0-1", "time_control": "600",
         "moves": ["d4", "d5"]}
    ]"#;

    fn date(s: &str) -> NaiveDateTime {
        s.parse().unwrap()
    }

    #[test]
    fn test_list_with_filters() {
        let store = MemoryStore::from_json(GAMES).unwrap();
        assert_eq!(store.list_games(&GameFilter::default()).len(), 2);

        let filter = GameFilter {
            from_date: Some(date("2024-02-01T00:00:00")),
            ..Default::default()
        };
        let games = store.list_games(&filter);
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].id, "g2");

        let filter = GameFilter {
            player: Some(("ALICE".into(), Color::White)),
            ..Default::default()
        };
        let games = store.list_games(&filter);
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].id, "g1");
    }

    #[test]
    fn test_get_game() {
        let store = MemoryStore::from_json(GAMES).unwrap();
        assert_eq!(store.get_game("g2").unwrap().black, "alice");
        assert!(matches!(
            store.get_game("missing"),
            Err(TrainerError::GameNotFound(_))
        ));
    }

    #[test]
    fn test_from_json_map_shape() {
        let json = r#"{
            "b": {"game_id": "b", "platform": "lichess", "date": "2024-01-02T00:00:00",
                  "white_player": "x", "black_player": "y", "result": "draw"},
            "a": {"game_id": "a", "platform": "lichess", "date": "2024-01-01T00:00:00",
                  "white_player": "x", "black_player": "y", "result": "draw"}
        }"#;
        let store = MemoryStore::from_json(json).unwrap();
        let ids: Vec<String> = store
            .list_games(&GameFilter::default())
            .into_iter()
            .map(|g| g.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
