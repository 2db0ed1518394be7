use std::collections::HashMap;
use std::fmt::{self, Write};

use super::types::{BatchResult, GameFenResult, PositionRecord, Tier};
use super::visitor::GameInfo;

/// Move records before this index belong to the opening.
pub const OPENING_END: usize = 20;
/// Move records before this index (and after the opening) belong to the middlegame.
pub const MIDDLEGAME_END: usize = 40;
/// Every n-th move record is sampled as a critical position.
pub const CRITICAL_INTERVAL: usize = 5;
/// Records listed per phase in the position text.
pub const PHASE_SAMPLE: usize = 10;

/// Totals over one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub games: usize,
    pub failed: usize,
    /// Games that kept a partial replay.
    pub partial: usize,
    pub total_positions: usize,
    /// Games per tier, in escalation order; tiers that produced nothing are left out.
    pub tiers: Vec<(Tier, usize)>,
}

impl BatchSummary {
    pub fn from_batch(batch: &BatchResult) -> Self {
        let mut per_tier = [0usize; 5];
        let mut summary = Self {
            games: 0,
            failed: 0,
            partial: 0,
            total_positions: 0,
            tiers: Vec::new(),
        };

        for (_, result) in batch.iter() {
            summary.games += 1;
            summary.total_positions += result.positions.len();
            if result.is_failed() {
                summary.failed += 1;
            } else if !result.complete {
                summary.partial += 1;
            }
            per_tier[result.tier as usize] += 1;
        }

        summary.tiers = [Tier::Strict, Tier::Cleaned, Tier::Manual, Tier::Lenient, Tier::Failed]
            .into_iter()
            .zip(per_tier)
            .filter(|(_, count)| *count > 0)
            .collect();
        summary
    }

    pub fn average_positions(&self) -> f64 {
        if self.games == 0 {
            0.0
        } else {
            self.total_positions as f64 / self.games as f64
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Games processed: {}", self.games)?;
        writeln!(f, "Total positions: {}", self.total_positions)?;
        writeln!(f, "Average positions per game: {:.1}", self.average_positions())?;
        writeln!(f, "Failed games: {}", self.failed)?;
        writeln!(f, "Partial games: {}", self.partial)?;
        let tiers: Vec<String> = self
            .tiers
            .iter()
            .map(|(tier, count)| format!("{}={}", tier.as_str(), count))
            .collect();
        write!(f, "Tiers: {}", tiers.join(" "))
    }
}

/// Wins, losses and draws as seen from the result tags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultCounts {
    pub white_wins: usize,
    pub black_wins: usize,
    pub draws: usize,
    pub unfinished: usize,
}

impl ResultCounts {
    pub fn from_infos<'a>(infos: impl IntoIterator<Item = &'a GameInfo>) -> Self {
        let mut counts = Self::default();
        for info in infos {
            match info.result.as_str() {
                "1-0" => counts.white_wins += 1,
                "0-1" => counts.black_wins += 1,
                "1/2-1/2" | "½-½" => counts.draws += 1,
                _ => counts.unfinished += 1,
            }
        }
        counts
    }
}

/// Move records of one game split at fixed ply boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GamePhases<'a> {
    pub opening: &'a [PositionRecord],
    pub middlegame: &'a [PositionRecord],
    pub endgame: &'a [PositionRecord],
}

/// Splits the move records (the initial position is not a move) into
/// opening, middlegame and endgame.
pub fn phases(positions: &[PositionRecord]) -> GamePhases<'_> {
    let moves = move_records(positions);
    let opening_end = moves.len().min(OPENING_END);
    let middlegame_end = moves.len().min(MIDDLEGAME_END);

    GamePhases {
        opening: &moves[..opening_end],
        middlegame: &moves[opening_end..middlegame_end],
        endgame: &moves[middlegame_end..],
    }
}

/// Every [`CRITICAL_INTERVAL`]-th move record, starting with the first move.
pub fn critical_positions(positions: &[PositionRecord]) -> Vec<&PositionRecord> {
    move_records(positions)
        .iter()
        .step_by(CRITICAL_INTERVAL)
        .collect()
}

fn move_records(positions: &[PositionRecord]) -> &[PositionRecord] {
    match positions.first() {
        Some(first) if first.ply == 0 => &positions[1..],
        _ => positions,
    }
}

/// `Move 12. Nf3: <fen>` or `Move 12... Nc6: <fen>`.
pub fn position_line(record: &PositionRecord) -> String {
    let san = record
        .details
        .as_ref()
        .map(|d| d.san.as_str())
        .or(record.token.as_deref())
        .unwrap_or("");
    format!("Move {} {}: {}", record.move_label(), san, record.fen)
}

/// Plain-text listing of one game's positions: a few per phase, then the
/// sampled critical positions.
pub fn game_positions_text(game_number: usize, info: &GameInfo, result: &GameFenResult) -> String {
    let mut text = String::new();
    let date = info
        .date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let _ = writeln!(text, "GAME {}: {}", game_number, info);
    let _ = writeln!(text, "Date: {}", date);
    let _ = writeln!(text, "Total Moves: {}", result.applied_moves());
    let _ = writeln!(text, "Recovery: {}", result.tier.as_str());
    text.push('\n');

    let phases = phases(&result.positions);
    for (title, records) in [
        ("OPENING", phases.opening),
        ("MIDDLEGAME", phases.middlegame),
        ("ENDGAME", phases.endgame),
    ] {
        if records.is_empty() {
            continue;
        }
        let _ = writeln!(text, "{} PHASE POSITIONS:", title);
        for record in records.iter().take(PHASE_SAMPLE) {
            text.push_str(&position_line(record));
            text.push('\n');
        }
        text.push('\n');
    }

    let critical = critical_positions(&result.positions);
    if !critical.is_empty() {
        text.push_str("CRITICAL POSITIONS:\n");
        for record in critical {
            text.push_str(&position_line(record));
            text.push('\n');
        }
        text.push('\n');
    }

    let _ = writeln!(text, "--- END OF GAME {} ---", game_number);
    text
}

/// Listing of every game in the batch, headed by the totals.
pub fn batch_positions_text(batch: &BatchResult, infos: &HashMap<String, GameInfo>) -> String {
    let summary = BatchSummary::from_batch(batch);
    let mut text = String::new();
    let _ = writeln!(text, "TOTAL GAMES ANALYZED: {}", summary.games);
    let _ = writeln!(text, "TOTAL POSITIONS: {}", summary.total_positions);
    text.push('\n');
    text.push_str("=== FEN POSITION ANALYSIS DATA ===\n\n");

    let fallback = GameInfo::default();
    for (i, (id, result)) in batch.iter().enumerate() {
        let info = infos.get(id).unwrap_or(&fallback);
        text.push_str(&game_positions_text(i + 1, info, result));
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chess::{RawGame, ReplayOptions, extract_batch, extract_game};

    fn long_game() -> GameFenResult {
        // 50 plies of knight shuffling.
        let mut text = String::new();
        for i in 0..12 {
            text.push_str(&format!("{}. Nf3 Nf6 {}. Ng1 Ng8 ", 2 * i + 1, 2 * i + 2));
        }
        text.push_str("25. e4 e5");
        extract_game(&RawGame::new(text), &ReplayOptions::default())
    }

    #[test]
    fn test_phases_split_move_records() {
        let result = long_game();
        assert!(result.complete);
        assert_eq!(result.positions.len(), 51);

        let phases = phases(&result.positions);
        assert_eq!(phases.opening.len(), 20);
        assert_eq!(phases.middlegame.len(), 20);
        assert_eq!(phases.endgame.len(), 10);
        assert_eq!(phases.opening[0].ply, 1);
        assert_eq!(phases.middlegame[0].ply, 21);
        assert_eq!(phases.endgame[0].ply, 41);
    }

    #[test]
    fn test_phases_of_short_game() {
        let result = extract_game(&RawGame::new("1. e4 e5"), &ReplayOptions::default());
        let phases = phases(&result.positions);
        assert_eq!(phases.opening.len(), 2);
        assert!(phases.middlegame.is_empty());
        assert!(phases.endgame.is_empty());
    }

    #[test]
    fn test_critical_positions_sample_every_fifth_move() {
        let result = long_game();
        let plies: Vec<u32> = critical_positions(&result.positions)
            .iter()
            .map(|r| r.ply)
            .collect();
        assert_eq!(plies, vec![1, 6, 11, 16, 21, 26, 31, 36, 41, 46]);
    }

    #[test]
    fn test_position_line_labels() {
        let result = extract_game(&RawGame::new("1. e4 e5"), &ReplayOptions::default());
        assert_eq!(
            position_line(&result.positions[1]),
            "Move 1. e4: rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
        assert!(position_line(&result.positions[2]).starts_with("Move 1... e5: "));
    }

    #[test]
    fn test_batch_summary_totals() {
        let batch = extract_batch(
            vec![
                ("a", RawGame::new("1. e4 e5")),
                ("b", RawGame::new("")),
                ("c", RawGame::new("INVALID")),
                ("d", RawGame::new("1. d4 d5 2. Qh5")),
            ],
            &ReplayOptions::default(),
        );
        let summary = BatchSummary::from_batch(&batch);

        assert_eq!(summary.games, 4);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.partial, 1);
        assert_eq!(summary.total_positions, 3 + 1 + 1 + 3);
        assert_eq!(summary.average_positions(), 2.0);
        assert_eq!(summary.tiers, vec![(Tier::Strict, 3), (Tier::Failed, 1)]);
        assert!(summary.to_string().contains("Average positions per game: 2.0"));
        assert!(summary.to_string().ends_with("Tiers: strict=3 failed=1"));
    }

    #[test]
    fn test_game_text_lists_critical_positions() {
        let result = long_game();
        let text = game_positions_text(1, &GameInfo::default(), &result);
        let section = text
            .split("CRITICAL POSITIONS:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\n").next())
            .unwrap();

        assert_eq!(section.lines().count(), 10);
        assert!(section.starts_with("Move 1. Nf3: "));
        assert!(section.lines().nth(1).unwrap().starts_with("Move 3... Nf6: "));
    }

    #[test]
    fn test_result_counts() {
        let infos: Vec<GameInfo> = ["1-0", "0-1", "1/2-1/2", "*", "1-0"]
            .into_iter()
            .map(|result| GameInfo {
                result: result.to_string(),
                ..GameInfo::default()
            })
            .collect();
        let counts = ResultCounts::from_infos(&infos);
        assert_eq!(
            counts,
            ResultCounts {
                white_wins: 2,
                black_wins: 1,
                draws: 1,
                unfinished: 1
            }
        );
    }

    #[test]
    fn test_batch_positions_text() {
        let pgn = "[White \"alice\"]\n[Black \"bob\"]\n[Result \"1-0\"]\n\n1. e4 e5 1-0";
        let batch = extract_batch(vec![("g", RawGame::new(pgn))], &ReplayOptions::default());
        let mut infos = HashMap::new();
        infos.insert("g".to_string(), GameInfo::from_pgn(pgn));

        let text = batch_positions_text(&batch, &infos);
        assert!(text.starts_with("TOTAL GAMES ANALYZED: 1\nTOTAL POSITIONS: 3\n"));
        assert!(text.contains("GAME 1: alice vs bob (1-0)\nDate: Unknown\nTotal Moves: 2\n"));
        assert!(text.contains("OPENING PHASE POSITIONS:\nMove 1. e4: "));
        assert!(!text.contains("MIDDLEGAME PHASE"));
        assert!(text.contains("CRITICAL POSITIONS:\nMove 1. e4: "));
        assert!(text.contains("--- END OF GAME 1 ---"));
    }
}
