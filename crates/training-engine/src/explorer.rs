//! Opening explorer: which moves a player chose from a position, and how
//! those games ended.

use std::collections::HashMap;

use chess_core::replay::{
    self, parse_fen, parse_move, position_at, same_placement, to_fen, to_san, to_uci, uci_to_san,
};
use chess_core::{parse_color, Game, Opening, OpeningCatalog, Outcome, TimeClass};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use shakmaty::{Chess, Color, Position};
use tracing::{debug, info, warn};

use crate::analysis::Score;
use crate::error::TrainerError;
use crate::evaluator::Evaluator;
use crate::progress::{NoProgress, ProgressSink, ScanProgress};
use crate::store::{GameFilter, GameStore};

/// Explorer request as the caller sends it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplorerQuery {
    /// Target position; when absent the position after `moves` is used
    pub fen: Option<String>,
    /// Moves leading to the target, used for the opening name
    #[serde(default)]
    pub moves: Vec<String>,
    /// "white" or "black"
    pub color: String,
    #[serde(default)]
    pub usernames: Vec<String>,
    #[serde(default)]
    pub time_controls: Vec<String>,
    pub from_date: Option<NaiveDateTime>,
    pub to_date: Option<NaiveDateTime>,
}

/// Query after validation.
#[derive(Debug, Clone)]
pub struct ResolvedQuery {
    pub target: Chess,
    pub color: Color,
    pub usernames: Vec<String>,
    pub time_controls: Vec<TimeClass>,
    pub filter: GameFilter,
}

impl ExplorerQuery {
    /// Reject bad positions and filters before any game is read.
    pub fn resolve(&self) -> Result<ResolvedQuery, TrainerError> {
        let color = parse_color(&self.color).ok_or_else(|| {
            TrainerError::Validation(format!("color must be 'white' or 'black', got {:?}", self.color))
        })?;

        let target = match &self.fen {
            Some(fen) => parse_fen(fen).map_err(|e| TrainerError::Validation(e.to_string()))?,
            None => position_at(&self.moves, self.moves.len())
                .map_err(|e| TrainerError::Validation(e.to_string()))?,
        };

        let time_controls = self
            .time_controls
            .iter()
            .map(|tc| tc.parse::<TimeClass>().map_err(TrainerError::Validation))
            .collect::<Result<Vec<_>, _>>()?;

        if let (Some(from), Some(to)) = (self.from_date, self.to_date) {
            if from > to {
                return Err(TrainerError::Validation(
                    "from_date must not be after to_date".into(),
                ));
            }
        }

        Ok(ResolvedQuery {
            target,
            color,
            usernames: self.usernames.clone(),
            time_controls,
            filter: GameFilter {
                from_date: self.from_date,
                to_date: self.to_date,
                player: None,
            },
        })
    }
}

/// One move played from the target position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Continuation {
    #[serde(rename = "move")]
    pub san: String,
    pub uci: String,
    pub count: u32,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub win_pct: f64,
    pub draw_pct: f64,
    pub loss_pct: f64,
    /// Position after the move, when the move applies to the target
    pub fen_after: Option<String>,
    /// Engine score after the move, from White's point of view
    pub evaluation: Option<Score>,
    pub eval_display: String,
}

impl Continuation {
    fn new(san: String, uci: String) -> Self {
        Self {
            san,
            uci,
            count: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            win_pct: 0.0,
            draw_pct: 0.0,
            loss_pct: 0.0,
            fen_after: None,
            evaluation: None,
            eval_display: "N/A".to_string(),
        }
    }

    fn record(&mut self, outcome: Outcome) {
        self.count += 1;
        match outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Draw => self.draws += 1,
            Outcome::Loss => self.losses += 1,
        }
    }

    fn finish(&mut self) {
        self.win_pct = percentage(self.wins, self.count);
        self.draw_pct = percentage(self.draws, self.count);
        self.loss_pct = percentage(self.losses, self.count);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplorerReport {
    pub fen: String,
    pub opening: Opening,
    /// Score of the target position, from White's point of view
    pub position_eval: Option<Score>,
    pub best_move_san: Option<String>,
    pub best_move_uci: Option<String>,
    pub continuations: Vec<Continuation>,
    pub total_games: u32,
    pub games_examined: usize,
}

/// Search depths used by the explorer.
#[derive(Debug, Clone, Copy)]
pub struct ExplorerDepths {
    pub position: u32,
    pub continuation: u32,
}

/// Share of `part` in `total` as a percentage with one decimal.
pub fn percentage(part: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((part as f64 / total as f64) * 1000.0).round() / 10.0
}

/// True when the game passes the identity and time-control filters.
fn game_selected(game: &Game, query: &ResolvedQuery) -> bool {
    if !query.usernames.is_empty() {
        let player = game.player(query.color);
        if !query
            .usernames
            .iter()
            .any(|u| u.eq_ignore_ascii_case(player))
        {
            return false;
        }
    }
    query.time_controls.is_empty()
        || query
            .time_controls
            .contains(&TimeClass::classify(&game.time_control))
}

/// Tally continuations from `target` over `games`, most played first.
/// Games that fail to replay are skipped but still count as examined.
pub fn collect_continuations(
    games: &[Game],
    query: &ResolvedQuery,
    progress: &dyn ProgressSink,
) -> Result<(Vec<Continuation>, usize), TrainerError> {
    let selected: Vec<&Game> = games.iter().filter(|g| game_selected(g, query)).collect();
    let mut continuations: Vec<Continuation> = Vec::new();
    let mut by_move: HashMap<String, usize> = HashMap::new();
    let mut examined = 0usize;

    for game in &selected {
        if progress.is_cancelled() {
            return Err(TrainerError::Cancelled);
        }
        examined += 1;

        match replay::replay(&game.move_list()) {
            Ok(replayed) => {
                let hit = (0..replayed.len())
                    .find(|&ply| same_placement(&replayed.positions()[ply], &query.target));
                if let Some(ply) = hit {
                    let pos = &replayed.positions()[ply];
                    let mv = replayed.moves()[ply];
                    let san = to_san(pos, mv);
                    let i = *by_move.entry(san.clone()).or_insert_with(|| {
                        continuations.push(Continuation::new(san.clone(), to_uci(mv)));
                        continuations.len() - 1
                    });
                    continuations[i].record(game.result.outcome_for(query.color));
                }
            }
            Err(e) => {
                debug!(game_id = %game.id, error = %e, "Skipping game that does not replay");
            }
        }

        progress.report(ScanProgress {
            games_total: selected.len(),
            games_examined: examined,
            items_found: continuations.len(),
        });
    }

    for c in &mut continuations {
        c.finish();
    }
    // stable: ties keep encounter order
    continuations.sort_by(|a, b| b.count.cmp(&a.count));

    Ok((continuations, examined))
}

/// Express a side-to-move score from White's point of view.
fn white_pov(score: Score, pos: &Chess) -> Score {
    match pos.turn() {
        Color::White => score,
        Color::Black => -score,
    }
}

/// Attach an engine score to each continuation. A failed evaluation leaves
/// that continuation unevaluated.
pub async fn evaluate_continuations(
    evaluator: &dyn Evaluator,
    target: &Chess,
    continuations: &mut [Continuation],
    depth: u32,
    progress: &dyn ProgressSink,
) -> Result<(), TrainerError> {
    for c in continuations.iter_mut() {
        if progress.is_cancelled() {
            return Err(TrainerError::Cancelled);
        }
        // the move may not apply when the target has the other side to move
        let Some(after) = parse_move(target, &c.san).and_then(|mv| target.clone().play(mv).ok())
        else {
            debug!(mv = %c.san, "Continuation does not apply to target, leaving unevaluated");
            continue;
        };
        let fen = to_fen(&after);
        match evaluator.evaluate(&fen, depth).await {
            Ok(eval) => {
                let score = white_pov(eval.score, &after);
                c.eval_display = score.to_string();
                c.evaluation = Some(score);
            }
            Err(e) => warn!(mv = %c.san, error = %e, "Continuation evaluation failed"),
        }
        c.fen_after = Some(fen);
    }
    Ok(())
}

/// Continuations from the target, with an engine score for each.
pub async fn find_continuations(
    evaluator: &dyn Evaluator,
    games: &[Game],
    query: &ResolvedQuery,
    depth: u32,
) -> Result<Vec<Continuation>, TrainerError> {
    let (mut continuations, _) = collect_continuations(games, query, &NoProgress)?;
    evaluate_continuations(evaluator, &query.target, &mut continuations, depth, &NoProgress)
        .await?;
    Ok(continuations)
}

/// Full explorer answer: continuations, target evaluation and opening name.
pub async fn explore(
    store: &dyn GameStore,
    evaluator: &dyn Evaluator,
    catalog: &OpeningCatalog,
    query: &ExplorerQuery,
    depths: ExplorerDepths,
    progress: &dyn ProgressSink,
) -> Result<ExplorerReport, TrainerError> {
    let resolved = query.resolve()?;
    let games = store.list_games(&resolved.filter);
    info!(
        games = games.len(),
        color = %chess_core::color_name(resolved.color),
        "Explorer query"
    );

    let (mut continuations, games_examined) =
        collect_continuations(&games, &resolved, progress)?;
    evaluate_continuations(
        evaluator,
        &resolved.target,
        &mut continuations,
        depths.continuation,
        progress,
    )
    .await?;

    if progress.is_cancelled() {
        return Err(TrainerError::Cancelled);
    }
    let fen = to_fen(&resolved.target);
    let (position_eval, best_move_uci) = match evaluator.evaluate(&fen, depths.position).await {
        Ok(eval) => (Some(white_pov(eval.score, &resolved.target)), eval.best_move),
        Err(e) => {
            warn!(error = %e, "Target evaluation failed, returning continuations only");
            (None, None)
        }
    };
    let best_move_san = best_move_uci
        .as_deref()
        .and_then(|uci| uci_to_san(&resolved.target, uci));

    let opening = if query.moves.is_empty() {
        Opening::unknown()
    } else {
        catalog.classify(&query.moves)
    };

    let total_games = continuations.iter().map(|c| c.count).sum();

    Ok(ExplorerReport {
        fen,
        opening,
        position_eval,
        best_move_san,
        best_move_uci,
        continuations,
        total_games,
        games_examined,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 5), 100.0);
    }

    #[test]
    fn test_resolve_rejects_bad_input() {
        let query = ExplorerQuery {
            fen: Some("garbage".into()),
            color: "white".into(),
            ..Default::default()
        };
        assert!(matches!(query.resolve(), Err(TrainerError::Validation(_))));

        let query = ExplorerQuery {
            color: "purple".into(),
            ..Default::default()
        };
        assert!(matches!(query.resolve(), Err(TrainerError::Validation(_))));

        let query = ExplorerQuery {
            color: "black".into(),
            time_controls: vec!["hyperbullet".into()],
            ..Default::default()
        };
        assert!(matches!(query.resolve(), Err(TrainerError::Validation(_))));
    }

    #[test]
    fn test_resolve_from_moves() {
        let query = ExplorerQuery {
            moves: vec!["e4".into(), "c5".into()],
            color: "White".into(),
            ..Default::default()
        };
        let resolved = query.resolve().unwrap();
        assert_eq!(resolved.color, Color::White);
        assert_eq!(
            chess_core::replay::placement(&resolved.target),
            "rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR"
        );
    }
}
