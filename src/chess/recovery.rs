use super::board::BoardState;
use super::error::{ErrorAccumulator, ReplayError};
use super::filter::{Tokenized, tokenize, tokenize_cleaned, tokenize_manual};
use super::log;
use super::moves::sequence;
use super::types::{GameFenResult, MatchMode, PositionRecord, RawGame, Tier};

/// Which recovery tiers [`extract_game`] may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Whether the lenient tier may run at all.
    pub allow_lenient: bool,
    /// Last tier to try before giving up.
    pub max_tier: Tier,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            allow_lenient: true,
            max_tier: Tier::Lenient,
        }
    }
}

impl ReplayOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lenient(mut self, allow: bool) -> Self {
        self.allow_lenient = allow;
        self
    }

    pub fn with_max_tier(mut self, tier: Tier) -> Self {
        self.max_tier = tier;
        self
    }

    fn tiers(&self) -> impl Iterator<Item = Tier> + '_ {
        Tier::ATTEMPT_ORDER
            .into_iter()
            .filter(move |tier| *tier <= self.max_tier)
            .filter(move |tier| *tier != Tier::Lenient || self.allow_lenient)
    }
}

/// The three tokenizations of one game, computed once and shared by the tiers.
struct Tokenizations {
    strict: Tokenized,
    cleaned: Tokenized,
    manual: Tokenized,
}

impl Tokenizations {
    fn new(text: &str) -> Self {
        Self {
            strict: tokenize(text),
            cleaned: tokenize_cleaned(text),
            manual: tokenize_manual(text),
        }
    }

    fn for_tier(&self, tier: Tier) -> &Tokenized {
        match tier {
            Tier::Strict => &self.strict,
            Tier::Cleaned => &self.cleaned,
            Tier::Manual => &self.manual,
            Tier::Lenient | Tier::Failed => {
                if self.manual.tokens.len() > self.cleaned.tokens.len() {
                    &self.manual
                } else {
                    &self.cleaned
                }
            }
        }
    }

    /// A game has no moves only when no tokenizer finds any.
    fn genuinely_empty(&self) -> bool {
        self.strict.is_empty() && self.cleaned.is_empty() && self.manual.is_empty()
    }

    fn most_tokens(&self) -> usize {
        self.strict
            .tokens
            .len()
            .max(self.cleaned.tokens.len())
            .max(self.manual.tokens.len())
    }
}

/// Replays one game, escalating through the recovery tiers.
///
/// The first tier that replays every token wins. A tier that stops early is
/// remembered, and if no later tier completes, the partial result with the
/// most applied moves is returned (earliest tier on ties). When no tier
/// applies a single move the result holds only the initial position and its
/// tier is [`Tier::Failed`]. Never fails; every rejected tier leaves its
/// reason in `diagnostics`.
pub fn extract_game(raw: &RawGame, options: &ReplayOptions) -> GameFenResult {
    let tokenizations = Tokenizations::new(&raw.text);
    let mut diagnostics = ErrorAccumulator::default();
    let mut best_partial: Option<GameFenResult> = None;

    for tier in options.tiers() {
        let tokenized = tokenizations.for_tier(tier);
        let mode = if tier == Tier::Lenient {
            MatchMode::Lenient
        } else {
            MatchMode::Strict
        };

        let fen = match starting_fen(raw, tokenized, tier) {
            Ok(fen) => fen,
            Err(err) => {
                reject(&mut diagnostics, tier, &err);
                continue;
            }
        };

        let mut result = match sequence(fen, &tokenized.tokens, mode) {
            Ok(result) => result,
            Err(err) => {
                reject(&mut diagnostics, tier, &err);
                continue;
            }
        };
        result.tier = tier;

        if tokenized.is_empty() {
            if tokenizations.genuinely_empty() {
                diagnostics.push(&format!("{}: {}", tier.as_str(), ReplayError::TokenizeEmpty));
                result.diagnostics = diagnostics.take();
                return result;
            }
            reject(&mut diagnostics, tier, &ReplayError::TokenizeEmpty);
            continue;
        }

        if result.complete {
            log::debug(format!(
                "replayed {} moves with {} tier",
                result.applied_moves(),
                tier.as_str()
            ));
            result.diagnostics = diagnostics.take();
            return result;
        }

        if let Some(err) = &result.stopped_by {
            reject(&mut diagnostics, tier, err);
        }

        let improves = result.applied_moves() > 0
            && best_partial
                .as_ref()
                .is_none_or(|best| result.applied_moves() > best.applied_moves());
        if improves {
            best_partial = Some(result);
        }
    }

    if let Some(mut best) = best_partial {
        log::debug(format!(
            "keeping partial replay from {} tier ({} of {} moves)",
            best.tier.as_str(),
            best.applied_moves(),
            best.total_tokens
        ));
        best.diagnostics = diagnostics.take();
        return best;
    }

    let tokens = tokenizations.most_tokens();
    let exhausted = ReplayError::TierExhausted { tokens };
    diagnostics.push(&exhausted.to_string());
    failed_result(raw, &tokenizations, tokens, exhausted, diagnostics.take())
}

/// Starting position for one tier. The caller's override wins over a `FEN`
/// tag in the text. The manual and lenient tiers fall back to the standard
/// start when the stated FEN is unusable; the earlier tiers report it.
fn starting_fen<'a>(
    raw: &'a RawGame,
    tokenized: &'a Tokenized,
    tier: Tier,
) -> Result<Option<&'a str>, ReplayError> {
    let Some(fen) = raw.override_fen().or(tokenized.initial_fen.as_deref()) else {
        return Ok(None);
    };

    match BoardState::from_fen(fen) {
        Ok(_) => Ok(Some(fen)),
        Err(err) if matches!(tier, Tier::Manual | Tier::Lenient) => {
            log::debug(format!("{}; {} tier uses the standard start", err, tier.as_str()));
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn reject(diagnostics: &mut ErrorAccumulator, tier: Tier, err: &ReplayError) {
    log::debug(format!("{} tier rejected: {}", tier.as_str(), err));
    diagnostics.push(&format!("{}: {}", tier.as_str(), err));
}

fn failed_result(
    raw: &RawGame,
    tokenizations: &Tokenizations,
    total_tokens: usize,
    exhausted: ReplayError,
    diagnostics: Option<String>,
) -> GameFenResult {
    let board = raw
        .override_fen()
        .or(tokenizations.strict.initial_fen.as_deref())
        .and_then(|fen| BoardState::from_fen(fen).ok())
        .unwrap_or_default();

    GameFenResult {
        positions: vec![PositionRecord {
            ply: 0,
            move_number: board.fullmove_number(),
            mover: None,
            token: None,
            fen: board.fen(),
            details: None,
        }],
        total_tokens,
        complete: false,
        tier: Tier::Failed,
        stopped_by: Some(exhausted),
        diagnostics,
    }
}
