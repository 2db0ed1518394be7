use shakmaty::san::{San, SanError, SanPlus, Suffix};
use shakmaty::{
    CastlingMode, CastlingSide, Chess, Color, EnPassantMode, File, Move, Position, Rank, Role,
    Square, fen::Fen,
};
use smallvec::SmallVec;

use super::error::{MoveError, ReplayError};
use super::san;
use super::types::{CheckState, MatchMode, MoveDetails};

type Candidates = SmallVec<[Move; 8]>;

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// The board of one game in progress. Rules bookkeeping (castling rights,
/// en-passant target, clocks) is kept by the underlying `shakmaty` position.
#[derive(Debug, Clone, Default)]
pub struct BoardState {
    pos: Chess,
}

impl BoardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fen(fen: &str) -> Result<Self, ReplayError> {
        let invalid = |reason: String| ReplayError::InvalidFen {
            fen: fen.to_string(),
            reason,
        };

        let parsed: Fen = fen.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
        let pos: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| invalid(format!("{}", e)))?;
        Ok(Self { pos })
    }

    pub fn turn(&self) -> Color {
        self.pos.turn()
    }

    pub fn fullmove_number(&self) -> u32 {
        self.pos.fullmoves().get()
    }

    /// Six-field FEN. The en-passant square is written after every double
    /// pawn push, whether or not a capture is possible.
    pub fn fen(&self) -> String {
        Fen::from_position(&self.pos, EnPassantMode::Always).to_string()
    }

    pub fn fields(&self) -> PositionFields {
        let board = self.pos.board();
        let mut placement = [None; 64];
        for (index, slot) in placement.iter_mut().enumerate() {
            let square = Square::from_coords(File::new(index as u32 % 8), Rank::new(index as u32 / 8));
            *slot = board
                .piece_at(square)
                .map(|piece| piece.char());
        }

        let castles = self.pos.castles();
        PositionFields {
            placement,
            side_to_move: self.pos.turn(),
            castling: CastlingFlags {
                white_king: castles.has(Color::White, CastlingSide::KingSide),
                white_queen: castles.has(Color::White, CastlingSide::QueenSide),
                black_king: castles.has(Color::Black, CastlingSide::KingSide),
                black_queen: castles.has(Color::Black, CastlingSide::QueenSide),
            },
            en_passant: self.pos.ep_square(EnPassantMode::Always),
            halfmove_clock: self.pos.halfmoves(),
            fullmove_number: self.pos.fullmoves().get(),
        }
    }

    /// Applies one token. In lenient mode a token that fails strict
    /// resolution is retried against loose hints before giving up.
    pub fn apply(&mut self, token: &str, mode: MatchMode) -> Result<MoveDetails, MoveError> {
        let (m, matched) = match self.resolve_strict(token) {
            Ok(m) => (m, MatchMode::Strict),
            Err(err) if mode == MatchMode::Lenient => match self.resolve_lenient(token) {
                Some(m) => (m, MatchMode::Lenient),
                None => return Err(err),
            },
            Err(err) => return Err(err),
        };

        Ok(self.play(m, matched))
    }

    fn resolve_strict(&self, token: &str) -> Result<Move, MoveError> {
        let illegal = || MoveError::Illegal {
            token: token.to_string(),
        };

        let san = san::parse_strict(token).ok_or_else(illegal)?;
        san.to_move(&self.pos).map_err(|err| match err {
            SanError::IllegalSan => illegal(),
            SanError::AmbiguousSan => MoveError::Ambiguous {
                token: token.to_string(),
                candidates: self.count_matching(san),
            },
        })
    }

    fn count_matching(&self, san: San) -> usize {
        self.pos
            .legal_moves()
            .iter()
            .filter(|m| san.matches(**m))
            .count()
    }

    fn resolve_lenient(&self, token: &str) -> Option<Move> {
        let hints = san::loose_hints(token)?;
        let legal = self.pos.legal_moves();

        let mut candidates: Candidates = if let Some(side) = hints.castle {
            legal
                .into_iter()
                .filter(|m| m.castling_side() == Some(side))
                .collect()
        } else {
            let to = hints.to?;
            let mut candidates: Candidates = legal
                .into_iter()
                .filter(|m| target_square(m) == to)
                .collect();

            if let Some(from) = hints.from {
                candidates.retain(|m| m.from() == Some(from));
            }
            match hints.role {
                Some(role) => candidates.retain(|m| m.role() == role),
                None if hints.from.is_none() => prefer(&mut candidates, |m| m.role() == Role::Pawn),
                None => {}
            }
            if let Some(file) = hints.file {
                prefer(&mut candidates, |m| m.from().is_some_and(|s| s.file() == file));
            }
            if let Some(rank) = hints.rank {
                prefer(&mut candidates, |m| m.from().is_some_and(|s| s.rank() == rank));
            }
            if let Some(promotion) = hints.promotion {
                prefer(&mut candidates, |m| m.promotion() == Some(promotion));
            }
            candidates
        };

        candidates.sort_by_key(tie_break_key);
        candidates.into_iter().next()
    }

    fn play(&mut self, m: Move, matched: MatchMode) -> MoveDetails {
        let to = target_square(&m);
        let from = m.from().unwrap_or(to);
        let piece = m.role();
        let captured = m.capture();
        let promotion = m.promotion();

        let san = SanPlus::from_move_and_play_unchecked(&mut self.pos, m);
        let check = match san.suffix {
            Some(Suffix::Checkmate) => CheckState::Mate,
            Some(Suffix::Check) => CheckState::Check,
            None => CheckState::None,
        };

        MoveDetails {
            from,
            to,
            piece,
            captured,
            promotion,
            check,
            san: san.to_string(),
            matched,
        }
    }
}

/// Keeps only the candidates matching `pred`, unless none do.
fn prefer(candidates: &mut Candidates, pred: impl Fn(&Move) -> bool) {
    if candidates.iter().any(&pred) {
        candidates.retain(|m| pred(m));
    }
}

/// Shortest origin-to-destination distance first, then lowest origin file,
/// then lowest origin rank, then queen > rook > bishop > knight promotions.
fn tie_break_key(m: &Move) -> (i32, i32, i32, u8) {
    let (to_file, to_rank) = coords(target_square(m));
    let (from_file, from_rank) = m.from().map_or((to_file, to_rank), coords);
    let distance = (to_file - from_file).abs().max((to_rank - from_rank).abs());
    let promotion = match m.promotion() {
        None | Some(Role::Queen) => 0,
        Some(Role::Rook) => 1,
        Some(Role::Bishop) => 2,
        Some(_) => 3,
    };
    (distance, from_file, from_rank, promotion)
}

fn coords(square: Square) -> (i32, i32) {
    (
        square.file().char() as i32 - 'a' as i32,
        square.rank().char() as i32 - '1' as i32,
    )
}

/// Destination as written in SAN: the king's square for castling moves.
fn target_square(m: &Move) -> Square {
    match (m.castling_side(), m.from()) {
        (Some(side), Some(king)) => {
            let file = match side {
                CastlingSide::KingSide => File::G,
                CastlingSide::QueenSide => File::C,
            };
            Square::from_coords(file, king.rank())
        }
        _ => m.to(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CastlingFlags {
    pub white_king: bool,
    pub white_queen: bool,
    pub black_king: bool,
    pub black_queen: bool,
}

impl CastlingFlags {
    fn parse(field: &str) -> Option<Self> {
        let mut flags = Self::default();
        if field == "-" {
            return Some(flags);
        }

        for c in field.chars() {
            let slot = match c {
                'K' => &mut flags.white_king,
                'Q' => &mut flags.white_queen,
                'k' => &mut flags.black_king,
                'q' => &mut flags.black_queen,
                _ => return None,
            };
            if *slot {
                return None;
            }
            *slot = true;
        }
        Some(flags)
    }

    fn to_field(self) -> String {
        let mut field = String::with_capacity(4);
        for (set, c) in [
            (self.white_king, 'K'),
            (self.white_queen, 'Q'),
            (self.black_king, 'k'),
            (self.black_queen, 'q'),
        ] {
            if set {
                field.push(c);
            }
        }
        if field.is_empty() {
            field.push('-');
        }
        field
    }
}

/// A FEN decoded field by field, independent of the rules engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionFields {
    /// Index 0 is a1, 7 is h1, 63 is h8. FEN piece letters.
    pub placement: [Option<char>; 64],
    pub side_to_move: Color,
    pub castling: CastlingFlags,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl PositionFields {
    pub fn parse(fen: &str) -> Result<Self, ReplayError> {
        let invalid = |reason: &str| ReplayError::InvalidFen {
            fen: fen.to_string(),
            reason: reason.to_string(),
        };

        let fields: Vec<&str> = fen.split_whitespace().collect();
        let [placement_field, side, castling, ep, halfmove, fullmove] = fields[..] else {
            return Err(invalid("expected six fields"));
        };

        let ranks: Vec<&str> = placement_field.split('/').collect();
        if ranks.len() != 8 {
            return Err(invalid("expected eight ranks"));
        }

        let mut placement = [None; 64];
        for (row, rank_text) in ranks.iter().enumerate() {
            let base = (7 - row) * 8;
            let mut file = 0usize;
            for c in rank_text.chars() {
                if let Some(skip) = c.to_digit(10).filter(|d| (1..=8).contains(d)) {
                    file += skip as usize;
                } else if "PNBRQKpnbrqk".contains(c) {
                    if file >= 8 {
                        return Err(invalid("rank overflows eight files"));
                    }
                    placement[base + file] = Some(c);
                    file += 1;
                } else {
                    return Err(invalid("unexpected character in piece placement"));
                }
            }
            if file != 8 {
                return Err(invalid("rank does not cover eight files"));
            }
        }

        let side_to_move = match side {
            "w" => Color::White,
            "b" => Color::Black,
            _ => return Err(invalid("side to move must be 'w' or 'b'")),
        };

        let castling = CastlingFlags::parse(castling).ok_or_else(|| invalid("bad castling field"))?;

        let en_passant = match ep {
            "-" => None,
            square => {
                let square: Square = square
                    .parse()
                    .map_err(|_| invalid("bad en-passant square"))?;
                if !matches!(square.rank(), Rank::Third | Rank::Sixth) {
                    return Err(invalid("en-passant square must be on rank 3 or 6"));
                }
                Some(square)
            }
        };

        let halfmove_clock = halfmove
            .parse()
            .map_err(|_| invalid("bad halfmove clock"))?;
        let fullmove_number: u32 = fullmove
            .parse()
            .map_err(|_| invalid("bad fullmove number"))?;
        if fullmove_number == 0 {
            return Err(invalid("fullmove number starts at 1"));
        }

        Ok(Self {
            placement,
            side_to_move,
            castling,
            en_passant,
            halfmove_clock,
            fullmove_number,
        })
    }

    pub fn piece_at(&self, square: Square) -> Option<char> {
        let (file, rank) = coords(square);
        self.placement[(rank * 8 + file) as usize]
    }

    pub fn to_fen(&self) -> String {
        let mut fen = String::with_capacity(90);
        for row in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.placement[row * 8 + file] {
                    Some(c) => {
                        if empty > 0 {
                            fen.push_str(&empty.to_string());
                            empty = 0;
                        }
                        fen.push(c);
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                fen.push_str(&empty.to_string());
            }
            if row > 0 {
                fen.push('/');
            }
        }

        let side = match self.side_to_move {
            Color::White => 'w',
            Color::Black => 'b',
        };
        let ep = self
            .en_passant
            .map_or_else(|| "-".to_string(), |s| s.to_string());

        format!(
            "{} {} {} {} {} {}",
            fen,
            side,
            self.castling.to_field(),
            ep,
            self.halfmove_clock,
            self.fullmove_number
        )
    }
}
