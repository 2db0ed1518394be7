use std::error::Error;
use std::fmt;

/// Why the board engine refused a single token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveError {
    /// No legal move matches the token.
    Illegal { token: String },
    /// More than one legal move remains after every stated disambiguator.
    Ambiguous { token: String, candidates: usize },
}

impl MoveError {
    pub fn token(&self) -> &str {
        match self {
            Self::Illegal { token } | Self::Ambiguous { token, .. } => token,
        }
    }
}

impl fmt::Display for MoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Illegal { token } => write!(f, "illegal move '{}'", token),
            Self::Ambiguous { token, candidates } => {
                write!(f, "ambiguous move '{}' ({} candidates)", token, candidates)
            }
        }
    }
}

impl Error for MoveError {}

/// Game-level outcome of a replay that did not apply every token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// Tokenization found no moves. Informational: a move-less game is valid.
    TokenizeEmpty,
    IllegalMove { ply: u32, token: String },
    AmbiguousMove { ply: u32, token: String, candidates: usize },
    InvalidFen { fen: String, reason: String },
    /// Every recovery tier stopped before applying a single move.
    TierExhausted { tokens: usize },
}

impl ReplayError {
    pub fn at_ply(ply: u32, err: MoveError) -> Self {
        match err {
            MoveError::Illegal { token } => Self::IllegalMove { ply, token },
            MoveError::Ambiguous { token, candidates } => Self::AmbiguousMove {
                ply,
                token,
                candidates,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::TokenizeEmpty => "tokenize_empty",
            Self::IllegalMove { .. } => "illegal_move",
            Self::AmbiguousMove { .. } => "ambiguous_move",
            Self::InvalidFen { .. } => "invalid_fen",
            Self::TierExhausted { .. } => "tier_exhausted",
        }
    }
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenizeEmpty => write!(f, "no moves found in movetext"),
            Self::IllegalMove { ply, token } => {
                write!(f, "illegal move '{}' at ply {}", token, ply)
            }
            Self::AmbiguousMove {
                ply,
                token,
                candidates,
            } => write!(
                f,
                "ambiguous move '{}' at ply {} ({} candidates)",
                token, ply, candidates
            ),
            Self::InvalidFen { fen, reason } => write!(f, "invalid FEN '{}': {}", fen, reason),
            Self::TierExhausted { tokens } => write!(
                f,
                "all recovery tiers failed to apply a move ({} tokens found)",
                tokens
            ),
        }
    }
}

impl Error for ReplayError {}

#[derive(Debug, Clone, Default)]
pub struct ErrorAccumulator(Option<String>);

impl ErrorAccumulator {
    pub fn push(&mut self, msg: &str) {
        match &mut self.0 {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(msg);
            }
            None => {
                self.0 = Some(msg.to_string());
            }
        }
    }

    pub fn take(&mut self) -> Option<String> {
        self.0.take()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorAccumulator, MoveError, ReplayError};

    #[test]
    fn test_push_multiple_messages_uses_separator() {
        let mut accumulator = ErrorAccumulator::default();
        accumulator.push("strict: illegal move 'Qh5' at ply 3");
        accumulator.push("cleaned: illegal move 'Qh5' at ply 3");

        assert_eq!(
            accumulator.take().as_deref(),
            Some("strict: illegal move 'Qh5' at ply 3; cleaned: illegal move 'Qh5' at ply 3")
        );
    }

    #[test]
    fn test_take_consumes_accumulator() {
        let mut accumulator = ErrorAccumulator::default();
        assert!(accumulator.is_empty());
        accumulator.push("error");

        assert_eq!(accumulator.take().as_deref(), Some("error"));
        assert!(accumulator.is_empty());
        assert!(accumulator.take().is_none());
    }

    #[test]
    fn test_replay_error_keeps_ply_and_token() {
        let err = ReplayError::at_ply(
            7,
            MoveError::Ambiguous {
                token: "Nd2".to_string(),
                candidates: 2,
            },
        );

        assert_eq!(err.kind(), "ambiguous_move");
        assert_eq!(err.to_string(), "ambiguous move 'Nd2' at ply 7 (2 candidates)");
    }

    #[test]
    fn test_move_error_token_accessor() {
        let err = MoveError::Illegal {
            token: "Ke9".to_string(),
        };
        assert_eq!(err.token(), "Ke9");
        assert_eq!(err.to_string(), "illegal move 'Ke9'");
    }
}
