use super::board::BoardState;
use super::error::ReplayError;
use super::types::{GameFenResult, MatchMode, MoveToken, PositionRecord, Tier};

/// Replays `tokens` from `initial_fen` (standard start when `None`).
///
/// Always emits the ply-0 record first. Stops at the first token the board
/// refuses and returns the prefix with `complete = false`; the refusal is kept
/// in `stopped_by`. Only an unusable `initial_fen` is an error.
pub fn sequence(
    initial_fen: Option<&str>,
    tokens: &[MoveToken],
    mode: MatchMode,
) -> Result<GameFenResult, ReplayError> {
    let mut board = match initial_fen {
        Some(fen) => BoardState::from_fen(fen)?,
        None => BoardState::new(),
    };

    let mut positions = Vec::with_capacity(tokens.len() + 1);
    positions.push(PositionRecord {
        ply: 0,
        move_number: board.fullmove_number(),
        mover: None,
        token: None,
        fen: board.fen(),
        details: None,
    });

    let mut stopped_by = None;
    for token in tokens {
        let ply = positions.len() as u32;
        let mover = board.turn();
        let move_number = board.fullmove_number();

        match board.apply(&token.text, mode) {
            Ok(details) => positions.push(PositionRecord {
                ply,
                move_number,
                mover: Some(mover),
                token: Some(token.text.clone()),
                fen: board.fen(),
                details: Some(details),
            }),
            Err(err) => {
                stopped_by = Some(ReplayError::at_ply(ply, err));
                break;
            }
        }
    }

    Ok(GameFenResult {
        positions,
        total_tokens: tokens.len(),
        complete: stopped_by.is_none(),
        tier: match mode {
            MatchMode::Strict => Tier::Strict,
            MatchMode::Lenient => Tier::Lenient,
        },
        stopped_by,
        diagnostics: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::board::{PositionFields, STARTING_FEN};
    use shakmaty::Color;

    fn tokens(texts: &[&str]) -> Vec<MoveToken> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| MoveToken {
                text: text.to_string(),
                ply: i as u32 + 1,
                side: if i % 2 == 0 { Color::White } else { Color::Black },
            })
            .collect()
    }

    #[test]
    fn test_sequence_empty_tokens_yields_initial_position() {
        let result = sequence(None, &[], MatchMode::Strict).unwrap();

        assert_eq!(result.positions.len(), 1);
        assert!(result.complete);
        assert_eq!(result.positions[0].ply, 0);
        assert_eq!(result.positions[0].fen, STARTING_FEN);
        assert_eq!(result.positions[0].token, None);
    }

    #[test]
    fn test_sequence_single_move() {
        let result = sequence(None, &tokens(&["e4"]), MatchMode::Strict).unwrap();

        assert!(result.complete);
        assert_eq!(result.positions.len(), 2);
        assert_eq!(
            result.positions[1].fen,
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
        assert_eq!(result.positions[1].mover, Some(Color::White));
        assert_eq!(result.positions[1].move_label(), "1.");
    }

    #[test]
    fn test_sequence_stops_at_first_illegal_token() {
        let result = sequence(None, &tokens(&["d4", "d5", "Qh5", "Nf3"]), MatchMode::Strict).unwrap();

        assert!(!result.complete);
        assert_eq!(result.positions.len(), 3);
        assert_eq!(result.total_tokens, 4);
        assert_eq!(
            result.stopped_by,
            Some(ReplayError::IllegalMove {
                ply: 3,
                token: "Qh5".to_string()
            })
        );
    }

    #[test]
    fn test_sequence_unblocked_queen_move_is_applied() {
        let result = sequence(None, &tokens(&["e4", "e5", "Qh5"]), MatchMode::Strict).unwrap();
        assert!(result.complete);
        assert_eq!(result.applied_moves(), 3);
        assert_eq!(result.positions[3].move_label(), "2.");
    }

    #[test]
    fn test_sequence_ambiguous_token_stops_replay() {
        let result = sequence(
            None,
            &tokens(&["d4", "d5", "Nf3", "Nf6", "Nd2"]),
            MatchMode::Strict,
        )
        .unwrap();

        assert_eq!(result.applied_moves(), 4);
        assert!(matches!(
            result.stopped_by,
            Some(ReplayError::AmbiguousMove { ply: 5, candidates: 2, .. })
        ));
    }

    #[test]
    fn test_sequence_from_custom_fen() {
        let fen = "4k3/8/8/8/8/8/4P3/4K3 b - - 3 40";
        let result = sequence(Some(fen), &tokens(&["Kd7", "e4"]), MatchMode::Strict).unwrap();

        assert!(result.complete);
        assert_eq!(result.positions[0].fen, fen);
        assert_eq!(result.positions[0].move_number, 40);
        assert_eq!(result.positions[1].mover, Some(Color::Black));
        assert_eq!(result.positions[1].move_label(), "40...");
        assert_eq!(result.positions[2].move_label(), "41.");
        assert_eq!(result.final_fen(), Some("8/3k4/8/8/4P3/8/8/4K3 b - e3 0 41"));
    }

    #[test]
    fn test_sequence_rejects_invalid_fen() {
        assert!(matches!(
            sequence(Some("8/8/8 w - - 0 1"), &[], MatchMode::Strict),
            Err(ReplayError::InvalidFen { .. })
        ));
    }

    #[test]
    fn test_sequence_records_are_gapless_and_round_trip() {
        let moves = ["e4", "e5", "Nf3", "Nc6", "Bb5", "a6", "Ba4", "Nf6", "O-O", "Be7"];
        let result = sequence(None, &tokens(&moves), MatchMode::Strict).unwrap();

        assert!(result.complete);
        for (i, record) in result.positions.iter().enumerate() {
            assert_eq!(record.ply as usize, i);
            let fields = PositionFields::parse(&record.fen).unwrap();
            assert_eq!(fields.to_fen(), record.fen);
        }
        for pair in result.positions.windows(2) {
            let mut board = BoardState::from_fen(&pair[0].fen).unwrap();
            let token = pair[1].token.as_deref().unwrap();
            board.apply(token, MatchMode::Strict).unwrap();
            assert_eq!(board.fen(), pair[1].fen);
        }
    }

    #[test]
    fn test_sequence_lenient_mode_marks_records() {
        let result = sequence(None, &tokens(&["e2e4", "e5", "g1f3"]), MatchMode::Lenient).unwrap();

        assert!(result.complete);
        let modes: Vec<MatchMode> = result
            .positions
            .iter()
            .filter_map(|p| p.details.as_ref().map(|d| d.matched))
            .collect();
        assert_eq!(
            modes,
            vec![MatchMode::Lenient, MatchMode::Strict, MatchMode::Lenient]
        );
    }
}
