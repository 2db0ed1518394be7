pub mod batch;
pub mod board;
mod error;
pub mod filter;
pub mod json;
pub mod log;
pub mod moves;
pub mod reader;
pub mod recovery;
pub mod san;
pub mod summary;
mod types;
pub mod visitor;

pub use batch::{extract_batch, extract_batch_parallel};
pub use board::{BoardState, CastlingFlags, PositionFields, STARTING_FEN};
pub use error::{ErrorAccumulator, MoveError, ReplayError};
pub use filter::{Tokenized, tokenize, tokenize_cleaned, tokenize_manual};
pub use moves::sequence;
pub use recovery::{ReplayOptions, extract_game};
pub use types::{
    BatchResult, CheckState, GameFenResult, Headers, MatchMode, MoveDetails, MoveToken,
    PositionRecord, RawGame, Tier,
};
pub use visitor::GameInfo;
