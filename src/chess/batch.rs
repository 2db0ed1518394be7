use rayon::prelude::*;
use std::collections::HashSet;

use super::log;
use super::recovery::{ReplayOptions, extract_game};
use super::types::{BatchResult, GameFenResult, RawGame};

/// Replays every game in input order. Identifiers seen before are skipped
/// with a warning; a failed game never stops the batch.
pub fn extract_batch<I, S>(games: I, options: &ReplayOptions) -> BatchResult
where
    I: IntoIterator<Item = (S, RawGame)>,
    S: Into<String>,
{
    let games = games.into_iter();
    let mut batch = BatchResult::with_capacity(games.size_hint().0);
    for (id, raw) in games {
        let id = id.into();
        if batch.contains(&id) {
            log::warn(format!("Skipping duplicate game id '{}'", id));
            continue;
        }
        let result = extract_game(&raw, options);
        record(&mut batch, id, result);
    }
    finish(batch)
}

/// Same output as [`extract_batch`], with the replays spread over the rayon
/// thread pool.
pub fn extract_batch_parallel(games: Vec<(String, RawGame)>, options: &ReplayOptions) -> BatchResult {
    let mut seen = HashSet::with_capacity(games.len());
    let unique: Vec<(String, RawGame)> = games
        .into_iter()
        .filter(|(id, _)| {
            let fresh = seen.insert(id.clone());
            if !fresh {
                log::warn(format!("Skipping duplicate game id '{}'", id));
            }
            fresh
        })
        .collect();

    let results: Vec<GameFenResult> = unique
        .par_iter()
        .map(|(_, raw)| extract_game(raw, options))
        .collect();

    let mut batch = BatchResult::with_capacity(unique.len());
    for ((id, _), result) in unique.into_iter().zip(results) {
        record(&mut batch, id, result);
    }
    finish(batch)
}

fn record(batch: &mut BatchResult, id: String, result: GameFenResult) {
    if result.is_failed() {
        log::warn(format!(
            "Game '{}' failed: {}",
            id,
            result.diagnostics.as_deref().unwrap_or("no diagnostics")
        ));
    } else {
        log::debug(format!(
            "Game '{}': {} positions via {} tier{}",
            id,
            result.positions.len(),
            result.tier.as_str(),
            if result.complete { "" } else { " (partial)" }
        ));
    }
    batch.insert(id, result);
}

fn finish(batch: BatchResult) -> BatchResult {
    let positions: usize = batch.iter().map(|(_, r)| r.positions.len()).sum();
    log::info(format!(
        "Replayed {} games ({} failed), {} positions",
        batch.len(),
        batch.failed_ids().len(),
        positions
    ));
    batch
}
