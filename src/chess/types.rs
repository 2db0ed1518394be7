use shakmaty::{Color, Role, Square};
use std::collections::{BTreeMap, HashMap};

use super::error::ReplayError;

/// PGN tag pairs keyed by tag name.
pub type Headers = BTreeMap<String, String>;

/// One game as handed over by the fetch layer.
#[derive(Debug, Clone, Default)]
pub struct RawGame {
    pub text: String,
    /// Caller-supplied tags; these win over tags found in `text`.
    pub header_overrides: Option<Headers>,
}

impl RawGame {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            header_overrides: None,
        }
    }

    pub fn with_overrides(mut self, headers: Headers) -> Self {
        self.header_overrides = Some(headers);
        self
    }

    pub fn override_fen(&self) -> Option<&str> {
        self.header_overrides
            .as_ref()?
            .get("FEN")
            .map(String::as_str)
            .map(str::trim)
            .filter(|fen| !fen.is_empty())
    }
}

/// A single ply's notation as found in the movetext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveToken {
    pub text: String,
    /// 1-based ply index within the game.
    pub ply: u32,
    pub side: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMode {
    Strict,
    Lenient,
}

impl MatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lenient => "lenient",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    None,
    Check,
    Mate,
}

/// What the engine actually did for one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveDetails {
    pub from: Square,
    /// King destination for castling moves.
    pub to: Square,
    pub piece: Role,
    pub captured: Option<Role>,
    pub promotion: Option<Role>,
    pub check: CheckState,
    /// Canonical SAN of the applied move.
    pub san: String,
    pub matched: MatchMode,
}

/// Board state after one ply. Ply 0 is the initial position and carries no move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionRecord {
    pub ply: u32,
    /// Fullmove number the move was played in (or the initial fullmove number at ply 0).
    pub move_number: u32,
    /// Side that made the move; `None` at ply 0.
    pub mover: Option<Color>,
    /// Token exactly as it was applied.
    pub token: Option<String>,
    pub fen: String,
    pub details: Option<MoveDetails>,
}

impl PositionRecord {
    /// `12.` for White moves, `12...` for Black moves, empty at ply 0.
    pub fn move_label(&self) -> String {
        match self.mover {
            Some(Color::White) => format!("{}.", self.move_number),
            Some(Color::Black) => format!("{}...", self.move_number),
            None => String::new(),
        }
    }
}

/// Recovery strategy that produced a result, in escalation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Strict,
    Cleaned,
    Manual,
    Lenient,
    Failed,
}

impl Tier {
    pub const ATTEMPT_ORDER: [Tier; 4] = [Tier::Strict, Tier::Cleaned, Tier::Manual, Tier::Lenient];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Cleaned => "cleaned",
            Self::Manual => "manual",
            Self::Lenient => "lenient",
            Self::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "cleaned" => Some(Self::Cleaned),
            "manual" => Some(Self::Manual),
            "lenient" => Some(Self::Lenient),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameFenResult {
    pub positions: Vec<PositionRecord>,
    /// Number of move tokens the tokenizer found for the chosen tier.
    pub total_tokens: usize,
    pub complete: bool,
    pub tier: Tier,
    /// Why replay stopped early, if it did.
    pub stopped_by: Option<ReplayError>,
    /// Reasons the earlier tiers were rejected, `; `-separated.
    pub diagnostics: Option<String>,
}

impl GameFenResult {
    pub fn applied_moves(&self) -> usize {
        self.positions.len().saturating_sub(1)
    }

    pub fn is_failed(&self) -> bool {
        self.tier == Tier::Failed
    }

    pub fn initial_fen(&self) -> Option<&str> {
        self.positions.first().map(|p| p.fen.as_str())
    }

    pub fn final_fen(&self) -> Option<&str> {
        self.positions.last().map(|p| p.fen.as_str())
    }
}

/// Per-game results in input order, one entry per distinct identifier.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    entries: Vec<(String, GameFenResult)>,
    index: HashMap<String, usize>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Returns `false` and leaves the batch untouched when `id` is already present.
    pub fn insert(&mut self, id: String, result: GameFenResult) -> bool {
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push((id, result));
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&GameFenResult> {
        self.index.get(id).map(|&i| &self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GameFenResult)> {
        self.entries.iter().map(|(id, result)| (id.as_str(), result))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, result)| result.is_failed())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<(String, GameFenResult)> {
        self.entries
    }
}
