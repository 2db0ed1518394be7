use shakmaty::Color;
use std::collections::HashMap;

use super::summary::BatchSummary;
use super::types::{BatchResult, CheckState, GameFenResult, PositionRecord};
use super::visitor::GameInfo;

fn json_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

fn json_opt_string(s: Option<&str>) -> String {
    s.map(json_string).unwrap_or_else(|| "null".to_string())
}

fn json_opt_number(n: Option<u32>) -> String {
    n.map(|n| n.to_string()).unwrap_or_else(|| "null".to_string())
}

fn json_bool(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}

fn position_to_json(record: &PositionRecord) -> String {
    let side = match record.mover {
        Some(Color::White) => r#""w""#,
        Some(Color::Black) => r#""b""#,
        None => "null",
    };

    let details = match &record.details {
        Some(d) => format!(
            r#","san":{},"from":"{}","to":"{}","piece":"{}","captured":{},"promotion":{},"check":{},"mate":{},"match":"{}""#,
            json_string(&d.san),
            d.from,
            d.to,
            d.piece.char(),
            json_opt_string(d.captured.map(|r| r.char().to_string()).as_deref()),
            json_opt_string(d.promotion.map(|r| r.char().to_string()).as_deref()),
            json_bool(d.check != CheckState::None),
            json_bool(d.check == CheckState::Mate),
            d.matched.as_str()
        ),
        None => String::new(),
    };

    format!(
        r#"{{"ply":{},"move_number":{},"side":{},"move":{},"fen":{}{}}}"#,
        record.ply,
        record.move_number,
        side,
        json_opt_string(record.token.as_deref()),
        json_string(&record.fen),
        details
    )
}

/// One game's replay as a JSON object.
pub fn game_to_json(id: &str, result: &GameFenResult) -> String {
    let stopped_by = result
        .stopped_by
        .as_ref()
        .map(|err| {
            format!(
                r#"{{"kind":"{}","message":{}}}"#,
                err.kind(),
                json_string(&err.to_string())
            )
        })
        .unwrap_or_else(|| "null".to_string());

    let positions: Vec<String> = result.positions.iter().map(position_to_json).collect();

    format!(
        r#"{{"id":{},"tier":"{}","complete":{},"total_tokens":{},"applied_moves":{},"stopped_by":{},"diagnostics":{},"positions":[{}]}}"#,
        json_string(id),
        result.tier.as_str(),
        json_bool(result.complete),
        result.total_tokens,
        result.applied_moves(),
        stopped_by,
        json_opt_string(result.diagnostics.as_deref()),
        positions.join(",")
    )
}

pub fn game_info_to_json(info: &GameInfo) -> String {
    let date = info.date.map(|d| d.format("%Y-%m-%d").to_string());
    format!(
        r#"{{"white":{},"black":{},"result":{},"date":{},"site":{},"game_id":{},"white_elo":{},"black_elo":{},"eco":{},"opening":{},"termination":{},"time_control":{}}}"#,
        json_opt_string(info.white.as_deref()),
        json_opt_string(info.black.as_deref()),
        json_string(&info.result),
        json_opt_string(date.as_deref()),
        json_opt_string(info.site.as_deref()),
        json_opt_string(info.game_id.as_deref()),
        json_opt_number(info.white_elo),
        json_opt_number(info.black_elo),
        json_opt_string(info.eco.as_deref()),
        json_opt_string(info.opening.as_deref()),
        json_opt_string(info.termination.as_deref()),
        json_opt_string(info.time_control.as_deref())
    )
}

/// The whole batch, in input order, followed by its totals. Games with an
/// entry in `infos` carry an `info` object.
pub fn batch_to_json(batch: &BatchResult, infos: &HashMap<String, GameInfo>) -> String {
    let games: Vec<String> = batch
        .iter()
        .map(|(id, result)| {
            let game = game_to_json(id, result);
            match infos.get(id) {
                // Splice the info object in front of the closing brace.
                Some(info) => format!(
                    r#"{},"info":{}}}"#,
                    &game[..game.len() - 1],
                    game_info_to_json(info)
                ),
                None => game,
            }
        })
        .collect();

    let summary = BatchSummary::from_batch(batch);
    format!(
        r#"{{"games":[{}],"summary":{{"games":{},"failed":{},"partial":{},"total_positions":{},"average_positions":{:.1}}}}}"#,
        games.join(","),
        summary.games,
        summary.failed,
        summary.partial,
        summary.total_positions,
        summary.average_positions()
    )
}
