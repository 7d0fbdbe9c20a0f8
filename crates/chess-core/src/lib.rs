//! Game model, position replay and opening/time-control classification
//! shared by the explorer and the puzzle generator.

pub mod game_data;
pub mod openings;
pub mod pgn;
pub mod replay;
pub mod time_control;

pub use game_data::{color_name, parse_color, Game, GameResult, Outcome};
pub use openings::{Opening, OpeningCatalog};
pub use replay::{Replay, ReplayError};
pub use time_control::TimeClass;
