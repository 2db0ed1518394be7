use regex::Regex;
use shakmaty::san::San;
use shakmaty::{CastlingSide, File, Rank, Role, Square};
use std::borrow::Cow;
use std::sync::LazyLock;

static BARE_PROMOTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<head>[a-h]x?[a-h]?[18])(?P<piece>[QRBN])(?P<suffix>[+#]?)$")
        .expect("valid bare promotion regex")
});

/// Parses a token under the strict grammar with shakmaty's SAN reader. A
/// promotion may be written without `=` (`e8Q`). Pawn tokens may only carry
/// a source file, and only together with a capture, so coordinate notation
/// (`e2e4`) is left to the lenient hints.
pub fn parse_strict(token: &str) -> Option<San> {
    let ascii: Cow<'_, str> = BARE_PROMOTION_RE.replace(token, "${head}=${piece}${suffix}");
    let san = San::from_ascii(ascii.as_bytes()).ok()?;

    match san {
        San::Normal {
            role: Role::Pawn,
            file,
            rank,
            capture,
            ..
        } if rank.is_some() || file.is_some() != capture => None,
        San::Normal {
            role,
            promotion: Some(_),
            ..
        } if role != Role::Pawn => None,
        San::Normal { .. } | San::Castle(_) => Some(san),
        San::Put { .. } | San::Null => None,
    }
}

/// Whatever can be read off a malformed token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LooseHints {
    pub castle: Option<CastlingSide>,
    pub from: Option<Square>,
    pub to: Option<Square>,
    pub role: Option<Role>,
    pub file: Option<File>,
    pub rank: Option<Rank>,
    pub promotion: Option<Role>,
}

/// Extracts loose hints: coordinate notation (`e2e4`, `e7-e8q`), castling
/// written with zeros or lowercase, or a piece letter (any case except `b`)
/// plus the last square in the token as destination. Returns `None` when the
/// token names no destination at all.
pub fn loose_hints(token: &str) -> Option<LooseHints> {
    let token = token.trim_end_matches(['+', '#', '!', '?']);

    if let Some(caps) = LOOSE_CASTLE_RE.captures(token) {
        let side = if caps.name("long").is_some() {
            CastlingSide::QueenSide
        } else {
            CastlingSide::KingSide
        };
        return Some(LooseHints {
            castle: Some(side),
            ..LooseHints::default()
        });
    }

    if let Some(caps) = COORDINATE_RE.captures(token) {
        return Some(LooseHints {
            from: caps.name("from")?.as_str().parse().ok(),
            to: caps.name("to")?.as_str().parse().ok(),
            promotion: caps
                .name("promotion")
                .and_then(|m| m.as_str().chars().next())
                .and_then(Role::from_char),
            ..LooseHints::default()
        });
    }

    let dest = SQUARE_RE.find_iter(token).last()?;
    let to: Square = dest.as_str().parse().ok()?;
    let head = &token[..dest.start()];
    let tail = &token[dest.end()..];

    let mut hints = LooseHints {
        to: Some(to),
        ..LooseHints::default()
    };

    let mut head_chars = head.chars().peekable();
    if let Some(&first) = head_chars.peek()
        && let Some(role) = loose_role(first)
    {
        hints.role = Some(role);
        head_chars.next();
    }
    for c in head_chars {
        if let Some(file) = File::from_char(c) {
            hints.file = Some(file);
        } else if let Some(rank) = Rank::from_char(c) {
            hints.rank = Some(rank);
        } else if hints.role.is_none()
            && c.is_ascii_uppercase()
            && let Some(role) = Role::from_char(c)
        {
            hints.role = Some(role);
        }
    }

    hints.promotion = tail
        .chars()
        .find(|c| c.is_ascii_alphabetic())
        .and_then(Role::from_char)
        .filter(|role| *role != Role::King && *role != Role::Pawn);

    Some(hints)
}

fn loose_role(c: char) -> Option<Role> {
    match c {
        'K' | 'k' => Some(Role::King),
        'Q' | 'q' => Some(Role::Queen),
        'R' | 'r' => Some(Role::Rook),
        'N' | 'n' => Some(Role::Knight),
        'B' => Some(Role::Bishop),
        'P' => Some(Role::Pawn),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Square {
        name.parse().unwrap()
    }

    #[test]
    fn test_parse_strict_pawn_push() {
        assert_eq!(
            parse_strict("e4"),
            Some(San::Normal {
                role: Role::Pawn,
                file: None,
                rank: None,
                capture: false,
                to: sq("e4"),
                promotion: None,
            })
        );
    }

    #[test]
    fn test_parse_strict_pawn_capture_promotion_with_check() {
        assert_eq!(
            parse_strict("exd8=Q+"),
            Some(San::Normal {
                role: Role::Pawn,
                file: Some(File::E),
                rank: None,
                capture: true,
                to: sq("d8"),
                promotion: Some(Role::Queen),
            })
        );
        assert_eq!(parse_strict("e8N"), parse_strict("e8=N"));
        assert_eq!(parse_strict("dxe8R#"), parse_strict("dxe8=R#"));
        assert!(parse_strict("e8N").is_some());
    }

    #[test]
    fn test_parse_strict_piece_with_full_disambiguation() {
        assert_eq!(
            parse_strict("Qh4xe1#"),
            Some(San::Normal {
                role: Role::Queen,
                file: Some(File::H),
                rank: Some(Rank::Fourth),
                capture: true,
                to: sq("e1"),
                promotion: None,
            })
        );
    }

    #[test]
    fn test_parse_strict_castling() {
        assert_eq!(parse_strict("O-O"), Some(San::Castle(CastlingSide::KingSide)));
        assert_eq!(parse_strict("O-O-O+"), Some(San::Castle(CastlingSide::QueenSide)));
        assert_eq!(parse_strict("0-0"), None);
    }

    #[test]
    fn test_parse_strict_rejects_malformed_tokens() {
        for token in [
            "", "INVALID", "e9", "ed5", "xd5", "e2e4", "Nf3=Q", "Ng1-f3", "nf3", "e4!", "--", "N@f3",
        ] {
            assert_eq!(parse_strict(token), None, "token: {token}");
        }
    }

    #[test]
    fn test_loose_hints_coordinate_notation() {
        let hints = loose_hints("e7e8q").unwrap();
        assert_eq!(hints.from, Some(sq("e7")));
        assert_eq!(hints.to, Some(sq("e8")));
        assert_eq!(hints.promotion, Some(Role::Queen));

        let hints = loose_hints("g1-f3").unwrap();
        assert_eq!(hints.from, Some(sq("g1")));
        assert_eq!(hints.to, Some(sq("f3")));
    }

    #[test]
    fn test_loose_hints_castling_variants() {
        assert_eq!(loose_hints("0-0").unwrap().castle, Some(CastlingSide::KingSide));
        assert_eq!(loose_hints("o-o-o").unwrap().castle, Some(CastlingSide::QueenSide));
        assert_eq!(loose_hints("OO+").unwrap().castle, Some(CastlingSide::KingSide));
    }

    #[test]
    fn test_loose_hints_lowercase_piece_and_disambiguators() {
        let hints = loose_hints("nbd7").unwrap();
        assert_eq!(hints.role, Some(Role::Knight));
        assert_eq!(hints.file, Some(File::B));
        assert_eq!(hints.to, Some(sq("d7")));

        // Lowercase `b` is a file, never a bishop.
        let hints = loose_hints("bxc3").unwrap();
        assert_eq!(hints.role, None);
        assert_eq!(hints.file, Some(File::B));
    }

    #[test]
    fn test_loose_hints_without_destination() {
        assert_eq!(loose_hints("INVALID"), None);
        assert_eq!(loose_hints("Nf"), None);
    }
}
