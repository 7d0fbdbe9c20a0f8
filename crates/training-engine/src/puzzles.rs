//! Puzzle extraction: sample the user's moves, ask the engine what they
//! should have played, keep the positions where the difference is large.

use chess_core::replay::{self, parse_move, to_fen, to_san, to_uci, uci_line_to_san, Replay};
use chess_core::{color_name, Game, OpeningCatalog};
use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use shakmaty::{Chess, Color, Position};
use tracing::{debug, info, warn};

use crate::analysis::{classify_position, Difficulty, PuzzleKind, Score};
use crate::error::TrainerError;
use crate::evaluator::{Evaluator, MAX_PV_LEN};
use crate::progress::{ProgressSink, ScanProgress};
use crate::store::GameFilter;

/// Plies per game sent to the engine
pub const MAX_SAMPLED_PLIES: usize = 5;

/// Puzzles kept from any single game
pub const MAX_PUZZLES_PER_GAME: usize = 2;

fn default_max_puzzles() -> usize {
    10
}

fn default_min_ply() -> usize {
    10
}

fn default_max_ply() -> usize {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PuzzleScanParams {
    pub username: String,
    #[serde(default = "default_max_puzzles")]
    pub max_puzzles: usize,
    /// Keep only puzzles of this difficulty
    pub difficulty: Option<Difficulty>,
    /// First ply considered (inclusive)
    #[serde(default = "default_min_ply")]
    pub min_ply: usize,
    /// Last ply considered (exclusive)
    #[serde(default = "default_max_ply")]
    pub max_ply: usize,
    pub from_date: Option<NaiveDateTime>,
    pub to_date: Option<NaiveDateTime>,
    /// Fixed seed for repeatable sampling
    pub seed: Option<u64>,
}

impl PuzzleScanParams {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            max_puzzles: default_max_puzzles(),
            difficulty: None,
            min_ply: default_min_ply(),
            max_ply: default_max_ply(),
            from_date: None,
            to_date: None,
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<(), TrainerError> {
        if self.username.trim().is_empty() {
            return Err(TrainerError::Validation("username is required".into()));
        }
        if self.max_puzzles == 0 {
            return Err(TrainerError::Validation(
                "max_puzzles must be at least 1".into(),
            ));
        }
        if self.min_ply >= self.max_ply {
            return Err(TrainerError::Validation(format!(
                "min_ply ({}) must be below max_ply ({})",
                self.min_ply, self.max_ply
            )));
        }
        Ok(())
    }

    /// Store-side filter. The username is matched per game afterwards since
    /// the user may have played either color.
    pub fn game_filter(&self) -> GameFilter {
        GameFilter {
            from_date: self.from_date,
            to_date: self.to_date,
            player: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PuzzleCandidate {
    pub id: String,
    pub game_id: String,
    /// Position before the critical move
    pub fen: String,
    pub ply: usize,
    pub move_number: usize,
    pub best_move_uci: String,
    pub best_move_san: String,
    pub pv_uci: Vec<String>,
    pub pv_san: Vec<String>,
    /// Only set for mistakes
    pub played_move_uci: Option<String>,
    pub played_move_san: Option<String>,
    /// Centipawns from the player's point of view
    pub eval_before: i32,
    pub eval_after_best: i32,
    pub eval_after_played: i32,
    pub eval_loss: i32,
    pub difficulty: Difficulty,
    pub kind: PuzzleKind,
    pub opening_name: String,
    pub opening_eco: String,
    pub player_color: String,
    pub opponent: String,
    pub date: NaiveDateTime,
    pub platform: String,
    pub pgn: String,
}

/// Per-scan context shared by every game.
struct Scan<'a> {
    evaluator: &'a dyn Evaluator,
    catalog: &'a OpeningCatalog,
    params: &'a PuzzleScanParams,
    depth: u32,
}

/// Scan `games` for puzzles in `params.username`'s play.
///
/// Games are visited in random order until `max_puzzles` have been found or
/// the games run out. The result is shuffled again before it is returned.
pub async fn generate_puzzles(
    evaluator: &dyn Evaluator,
    catalog: &OpeningCatalog,
    games: &[Game],
    params: &PuzzleScanParams,
    depth: u32,
    progress: &dyn ProgressSink,
) -> Result<Vec<PuzzleCandidate>, TrainerError> {
    params.validate()?;
    evaluator.ensure_ready().await?;

    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut eligible: Vec<(&Game, Color)> = games
        .iter()
        .filter_map(|g| g.color_of(&params.username).map(|c| (g, c)))
        .collect();
    eligible.shuffle(&mut rng);

    info!(
        username = %params.username,
        games = eligible.len(),
        max_puzzles = params.max_puzzles,
        "Scanning games for puzzles"
    );

    let scan = Scan {
        evaluator,
        catalog,
        params,
        depth,
    };
    let mut puzzles: Vec<PuzzleCandidate> = Vec::new();
    let mut examined = 0usize;

    for (game, color) in &eligible {
        if puzzles.len() >= params.max_puzzles {
            break;
        }
        if progress.is_cancelled() {
            info!(examined, found = puzzles.len(), "Puzzle scan cancelled");
            return Err(TrainerError::Cancelled);
        }
        examined += 1;

        match replay::replay(&game.move_list()) {
            Ok(replayed) => {
                let remaining = params.max_puzzles - puzzles.len();
                let found = scan_game(&scan, game, *color, &replayed, &mut rng).await;
                puzzles.extend(found.into_iter().take(remaining));
            }
            Err(e) => warn!(game_id = %game.id, error = %e, "Skipping game that does not replay"),
        }

        progress.report(ScanProgress {
            games_total: eligible.len(),
            games_examined: examined,
            items_found: puzzles.len(),
        });
    }

    puzzles.shuffle(&mut rng);
    info!(examined, found = puzzles.len(), "Puzzle scan finished");
    Ok(puzzles)
}

/// Plies in `[min_ply, max_ply)` where `color` is to move.
fn user_plies(replayed: &Replay, color: Color, min_ply: usize, max_ply: usize) -> Vec<usize> {
    let end = max_ply.min(replayed.len());
    (min_ply..end)
        .filter(|&ply| replayed.positions()[ply].turn() == color)
        .collect()
}

async fn scan_game(
    scan: &Scan<'_>,
    game: &Game,
    color: Color,
    replayed: &Replay,
    rng: &mut StdRng,
) -> Vec<PuzzleCandidate> {
    let plies = user_plies(replayed, color, scan.params.min_ply, scan.params.max_ply);
    let mut sampled: Vec<usize> = plies
        .choose_multiple(rng, MAX_SAMPLED_PLIES)
        .copied()
        .collect();
    sampled.sort_unstable();

    let mut found = Vec::new();
    for ply in sampled {
        if found.len() >= MAX_PUZZLES_PER_GAME {
            break;
        }
        if let Some(puzzle) = examine_ply(scan, game, color, replayed, ply).await {
            found.push(puzzle);
        }
    }
    found
}

/// Evaluate after `mv` from `pos`, negated back to the mover's point of view.
async fn eval_after(scan: &Scan<'_>, pos: &Chess, uci: &str) -> Option<Score> {
    let mv = parse_move(pos, uci)?;
    let after = pos.clone().play(mv).ok()?;
    match scan.evaluator.evaluate(&to_fen(&after), scan.depth).await {
        Ok(eval) => Some(-eval.score),
        Err(e) => {
            debug!(error = %e, "No evaluation after move");
            None
        }
    }
}

async fn examine_ply(
    scan: &Scan<'_>,
    game: &Game,
    color: Color,
    replayed: &Replay,
    ply: usize,
) -> Option<PuzzleCandidate> {
    let pos = replayed.position_before(ply)?;
    let played = *replayed.moves().get(ply)?;
    let fen = to_fen(pos);

    let before = match scan.evaluator.evaluate(&fen, scan.depth).await {
        Ok(eval) => eval,
        Err(e) => {
            warn!(game_id = %game.id, ply, error = %e, "Evaluation failed, skipping ply");
            return None;
        }
    };
    let Some(best_uci) = before.best_move.clone() else {
        debug!(game_id = %game.id, ply, "No best move, skipping ply");
        return None;
    };
    let best = parse_move(pos, &best_uci)?;

    let played_uci = to_uci(played);
    let played_is_best = played == best;

    let after_best = eval_after(scan, pos, &best_uci).await?;
    let after_played = if played_is_best {
        after_best
    } else {
        eval_after(scan, pos, &played_uci).await?
    };

    let eval_before = before.score.to_cp();
    let eval_after_best = after_best.to_cp();
    let eval_after_played = after_played.to_cp();

    let Some(class) =
        classify_position(eval_before, eval_after_best, eval_after_played, played_is_best)
    else {
        debug!(game_id = %game.id, ply, eval_before, eval_after_played, "Not a puzzle");
        return None;
    };
    if scan.params.difficulty.is_some_and(|d| d != class.difficulty) {
        debug!(game_id = %game.id, ply, difficulty = ?class.difficulty, "Filtered by difficulty");
        return None;
    }

    let pv_uci: Vec<String> = before.pv.iter().take(MAX_PV_LEN).cloned().collect();
    let pv_san = uci_line_to_san(pos, &pv_uci);
    let (played_move_uci, played_move_san) = match class.kind {
        PuzzleKind::Mistake => (Some(played_uci), Some(to_san(pos, played))),
        PuzzleKind::Tactical => (None, None),
    };
    let opening = scan.catalog.classify_game(game);

    debug!(game_id = %game.id, ply, kind = ?class.kind, loss = class.eval_loss, "Puzzle found");

    Some(PuzzleCandidate {
        id: format!("{}-{}", game.id, ply),
        game_id: game.id.clone(),
        fen,
        ply,
        move_number: ply / 2 + 1,
        best_move_san: to_san(pos, best),
        best_move_uci: best_uci,
        pv_uci,
        pv_san,
        played_move_uci,
        played_move_san,
        eval_before,
        eval_after_best,
        eval_after_played,
        eval_loss: class.eval_loss,
        difficulty: class.difficulty,
        kind: class.kind,
        opening_name: opening.name,
        opening_eco: opening.eco,
        player_color: color_name(color).to_string(),
        opponent: game.player(!color).to_string(),
        date: game.date,
        platform: game.platform.clone(),
        pgn: game.pgn.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(PuzzleScanParams::new("alice").validate().is_ok());
        assert!(PuzzleScanParams::new("  ").validate().is_err());

        let mut params = PuzzleScanParams::new("alice");
        params.max_puzzles = 0;
        assert!(matches!(params.validate(), Err(TrainerError::Validation(_))));

        let mut params = PuzzleScanParams::new("alice");
        params.min_ply = 20;
        params.max_ply = 20;
        assert!(matches!(params.validate(), Err(TrainerError::Validation(_))));
    }

    #[test]
    fn test_params_defaults_from_json() {
        let params: PuzzleScanParams =
            serde_json::from_str(r#"{"username": "alice", "difficulty": "hard"}"#).unwrap();
        assert_eq!(params.max_puzzles, 10);
        assert_eq!((params.min_ply, params.max_ply), (10, 60));
        assert_eq!(params.difficulty, Some(Difficulty::Hard));
        assert_eq!(params.seed, None);
    }

    #[test]
    fn test_user_plies_respect_window_and_turn() {
        let moves: Vec<String> = ["e4", "e5", "Nf3", "Nc6", "Bb5", "a6", "Ba4", "Nf6"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let replayed = replay::replay(&moves).unwrap();
        assert_eq!(user_plies(&replayed, Color::White, 2, 60), vec![2, 4, 6]);
        assert_eq!(user_plies(&replayed, Color::Black, 0, 5), vec![1, 3]);
        assert!(user_plies(&replayed, Color::White, 8, 60).is_empty());
    }
}
