//! Opening-name lookup over a tree keyed by UCI moves.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use shakmaty::{Chess, Position};

use crate::game_data::Game;
use crate::pgn;
use crate::replay::{parse_move, to_uci};

pub const UNKNOWN_OPENING: &str = "Unknown Opening";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opening {
    pub name: String,
    pub eco: String,
}

impl Opening {
    pub fn unknown() -> Self {
        Self {
            name: UNKNOWN_OPENING.to_string(),
            eco: String::new(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.name == UNKNOWN_OPENING
    }
}

#[derive(Debug, Default, Deserialize)]
struct TreeNode {
    name: Option<String>,
    eco: Option<String>,
    #[serde(default)]
    moves: HashMap<String, TreeNode>,
}

/// Catalog of named openings. The file format is a JSON object mapping a UCI
/// move to `{ "name", "eco", "moves": { ... } }`, nested to any depth.
#[derive(Debug, Default)]
pub struct OpeningCatalog {
    root: HashMap<String, TreeNode>,
}

impl OpeningCatalog {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let root: HashMap<String, TreeNode> = serde_json::from_str(json)?;
        Ok(Self { root })
    }

    /// Load from disk. A missing or broken file yields an empty catalog.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|s| Self::from_json(&s).map_err(|e| e.to_string()));
        match parsed {
            Ok(catalog) => {
                tracing::info!(
                    path = %path.display(),
                    roots = catalog.root.len(),
                    "Loaded openings catalog"
                );
                catalog
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to load openings catalog");
                tracing::warn!("Opening names will be reported as unknown");
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Longest-prefix match of `moves` (SAN or UCI) against the tree.
    pub fn classify(&self, moves: &[String]) -> Opening {
        if moves.is_empty() || self.root.is_empty() {
            return Opening::unknown();
        }

        let mut uci_moves = Vec::with_capacity(moves.len());
        let mut pos = Chess::default();
        for text in moves {
            let Some(mv) = parse_move(&pos, text) else {
                break;
            };
            uci_moves.push(to_uci(mv));
            match pos.play(mv) {
                Ok(next) => pos = next,
                Err(_) => break,
            }
        }

        let mut current = &self.root;
        let mut last_known = Opening::unknown();
        for uci in &uci_moves {
            let Some(node) = current.get(uci) else {
                break;
            };
            if let Some(name) = &node.name {
                last_known = Opening {
                    name: name.clone(),
                    eco: node.eco.clone().unwrap_or_default(),
                };
            }
            current = &node.moves;
        }

        last_known
    }

    /// Classify a stored game, falling back to its PGN `Opening`/`ECO` headers.
    pub fn classify_game(&self, game: &Game) -> Opening {
        let opening = self.classify(&game.move_list());
        if !opening.is_unknown() {
            return opening;
        }
        match pgn::extract_header(&game.pgn, "Opening") {
            Some(name) => Opening {
                name,
                eco: pgn::extract_header(&game.pgn, "ECO").unwrap_or_default(),
            },
            None => opening,
        }
    }
}
