//! Replays noisy PGN movetext ply by ply into FEN position sequences.
//!
//! The entry points take explicit arguments and hold no process-wide state:
//! [`extract_game`] runs one game through the recovery tiers and
//! [`extract_batch`] does the same for many games keyed by identifier.

pub mod chess;

pub use chess::{
    BatchResult, BoardState, GameFenResult, GameInfo, MatchMode, MoveDetails, MoveError,
    MoveToken, PositionFields, PositionRecord, RawGame, ReplayError, ReplayOptions, Tier,
    extract_batch, extract_batch_parallel, extract_game, sequence, tokenize,
};
