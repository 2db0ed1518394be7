use chrono::{Datelike, NaiveDate};
use pgn_reader::{Outcome, RawTag, Reader, SanPlus, Skip, Visitor};
use std::fmt;
use std::mem;
use std::ops::ControlFlow;

use super::error::ErrorAccumulator;
use super::types::Headers;

/// Descriptive metadata of one game, read from its tag pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInfo {
    pub event: Option<String>,
    pub site: Option<String>,
    /// Last path segment of the `Site` or `Link` URL.
    pub game_id: Option<String>,
    pub white: Option<String>,
    pub black: Option<String>,
    /// `*` when the game states no result.
    pub result: String,
    /// Best of `UTCDate`, `Date` and `EndDate`; unknown month or day becomes 1.
    pub date: Option<NaiveDate>,
    pub white_elo: Option<u32>,
    pub black_elo: Option<u32>,
    pub eco: Option<String>,
    pub opening: Option<String>,
    pub termination: Option<String>,
    pub time_control: Option<String>,
    /// Mainline moves the PGN reader recognized.
    pub mainline_plies: u32,
    /// Tags that were present but could not be converted.
    pub parse_error: Option<String>,
}

impl Default for GameInfo {
    fn default() -> Self {
        Self {
            event: None,
            site: None,
            game_id: None,
            white: None,
            black: None,
            result: "*".to_string(),
            date: None,
            white_elo: None,
            black_elo: None,
            eco: None,
            opening: None,
            termination: None,
            time_control: None,
            mainline_plies: 0,
            parse_error: None,
        }
    }
}

impl GameInfo {
    /// Reads the first game in `text`. Text the PGN reader cannot make sense
    /// of yields the defaults, with the reason in `parse_error`.
    pub fn from_pgn(text: &str) -> Self {
        let mut reader = Reader::new(text.as_bytes());
        let mut visitor = HeaderVisitor::new();

        match reader.read_game(&mut visitor) {
            Ok(Some(())) => visitor.current_game.take().unwrap_or_default(),
            Ok(None) => Self::default(),
            Err(e) => Self {
                parse_error: Some(format!("PGN read error: {}", e)),
                ..Self::default()
            },
        }
    }

    /// Like [`GameInfo::from_pgn`], then lets caller-supplied tags replace the
    /// ones found in the text.
    pub fn from_pgn_with_overrides(text: &str, overrides: Option<&Headers>) -> Self {
        let Some(overrides) = overrides.filter(|h| !h.is_empty()) else {
            return Self::from_pgn(text);
        };

        let mut reader = Reader::new(text.as_bytes());
        let mut visitor = HeaderVisitor::new();
        visitor.overrides = Some(overrides.clone());

        match reader.read_game(&mut visitor) {
            Ok(Some(())) => visitor.current_game.take().unwrap_or_default(),
            Ok(None) | Err(_) => {
                let mut fields = HeaderFields::default();
                for (key, value) in overrides {
                    fields.set(key.as_bytes(), value, true);
                }
                fields.into_info(0, None, &mut ErrorAccumulator::default())
            }
        }
    }

    pub fn white_name(&self) -> &str {
        self.white.as_deref().unwrap_or("Unknown")
    }

    pub fn black_name(&self) -> &str {
        self.black.as_deref().unwrap_or("Unknown")
    }
}

impl fmt::Display for GameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vs {} ({})", self.white_name(), self.black_name(), self.result)
    }
}

#[derive(Default)]
struct HeaderFields {
    event: String,
    site: String,
    link: String,
    white: String,
    black: String,
    result: String,
    white_elo: String,
    black_elo: String,
    utc_date: String,
    date: String,
    end_date: String,
    eco: String,
    opening: String,
    termination: String,
    time_control: String,
}

impl HeaderFields {
    fn opt_take(field: &mut String) -> Option<String> {
        if field.is_empty() {
            None
        } else {
            Some(mem::take(field))
        }
    }

    /// Stores a known tag. The first value seen wins unless `replace` is set.
    fn set(&mut self, key: &[u8], value: &str, replace: bool) {
        let slot: &mut String = match key {
            b"Event" => &mut self.event,
            b"Site" => &mut self.site,
            b"Link" => &mut self.link,
            b"White" => &mut self.white,
            b"Black" => &mut self.black,
            b"Result" => &mut self.result,
            b"WhiteElo" => &mut self.white_elo,
            b"BlackElo" => &mut self.black_elo,
            b"UTCDate" => &mut self.utc_date,
            b"Date" => &mut self.date,
            b"EndDate" => &mut self.end_date,
            b"ECO" => &mut self.eco,
            b"Opening" => &mut self.opening,
            b"Termination" => &mut self.termination,
            b"TimeControl" => &mut self.time_control,
            _ => return,
        };

        let value = value.trim();
        if value.is_empty() || (!replace && !slot.is_empty()) {
            return;
        }
        *slot = value.to_string();
    }

    fn into_info(
        mut self,
        mainline_plies: u32,
        outcome: Option<String>,
        parse_error: &mut ErrorAccumulator,
    ) -> GameInfo {
        let white_elo = parse_rating(&self.white_elo, "WhiteElo", parse_error);
        let black_elo = parse_rating(&self.black_elo, "BlackElo", parse_error);
        let date = parse_best_date(
            &[
                (self.utc_date.as_str(), "UTCDate"),
                (self.date.as_str(), "Date"),
                (self.end_date.as_str(), "EndDate"),
            ],
            parse_error,
        );
        let game_id = game_id_from_url(&self.site).or_else(|| game_id_from_url(&self.link));

        GameInfo {
            event: Self::opt_take(&mut self.event),
            site: Self::opt_take(&mut self.site),
            game_id,
            white: Self::opt_take(&mut self.white),
            black: Self::opt_take(&mut self.black),
            result: Self::opt_take(&mut self.result)
                .or(outcome)
                .unwrap_or_else(|| "*".to_string()),
            date,
            white_elo,
            black_elo,
            eco: Self::opt_take(&mut self.eco),
            opening: Self::opt_take(&mut self.opening),
            termination: Self::opt_take(&mut self.termination),
            time_control: Self::opt_take(&mut self.time_control),
            mainline_plies,
            parse_error: parse_error.take(),
        }
    }
}

fn parse_rating(raw: &str, label: &str, parse_error: &mut ErrorAccumulator) -> Option<u32> {
    let s = raw.trim();
    if s.is_empty() || s == "?" || s == "-" {
        return None;
    }
    match s.parse::<u32>() {
        Ok(v) => Some(v),
        Err(_) => {
            parse_error.push(&format!("Conversion error: {label}='{s}'"));
            None
        }
    }
}

fn game_id_from_url(raw: &str) -> Option<String> {
    if !raw.contains('/') {
        return None;
    }
    raw.trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Number of known components (year, month, day); 0 when the year is unknown.
fn date_completeness_score(raw: &str) -> u8 {
    let norm = raw.trim().replace('.', "-");
    let parts: Vec<&str> = norm.split('-').collect();
    if parts.len() != 3 || parts[0].contains('?') || parts[0].parse::<i32>().is_err() {
        return 0;
    }

    1 + parts[1..]
        .iter()
        .filter(|p| !p.contains('?') && p.parse::<u32>().is_ok())
        .count() as u8
}

/// Tries the candidates from most to least complete, keeping tag order on
/// ties, and returns the first that converts.
fn parse_best_date(
    candidates: &[(&str, &'static str)],
    parse_error: &mut ErrorAccumulator,
) -> Option<NaiveDate> {
    let mut ranked: Vec<(u8, usize, &str, &'static str)> = candidates
        .iter()
        .enumerate()
        .filter(|(_, (raw, _))| !raw.trim().is_empty())
        .map(|(precedence, (raw, label))| (date_completeness_score(raw), precedence, *raw, *label))
        .collect();
    ranked.sort_by(|left, right| right.0.cmp(&left.0).then_with(|| left.1.cmp(&right.1)));

    ranked
        .into_iter()
        .find_map(|(_, _, raw, label)| parse_date(raw, label, parse_error))
}

fn parse_date(raw: &str, label: &str, parse_error: &mut ErrorAccumulator) -> Option<NaiveDate> {
    let s = raw.trim();
    let norm = s.replace('.', "-");
    let parts: Vec<&str> = norm.split('-').collect();
    if parts.len() != 3 {
        if let Err(e) = NaiveDate::parse_from_str(&norm, "%Y-%m-%d") {
            parse_error.push(&format!("Conversion error: {label}='{s}' (chrono: {e})"));
        }
        return None;
    }

    // Unknown year means unknown date, not a conversion error.
    if parts[0].contains('?') {
        return None;
    }

    let parsed = (
        parts[0].parse::<i32>(),
        known_or_first(parts[1]).parse::<u32>(),
        known_or_first(parts[2]).parse::<u32>(),
    );
    let (year, month, day) = match parsed {
        (Ok(y), Ok(m), Ok(d)) => (y, m, d),
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            parse_error.push(&format!("Conversion error: {label}='{s}' (chrono: {e})"));
            return None;
        }
    };

    let Some(last_day) = last_day_of_month(year, month) else {
        parse_error.push(&format!(
            "Conversion error: {label}='{s}' (chrono: input is out of range)"
        ));
        return None;
    };

    match NaiveDate::from_ymd_opt(year, month, day.min(last_day)) {
        Some(date) if date.year() > 0 => Some(date),
        Some(_) => {
            parse_error.push(&format!(
                "Conversion error: {label}='{s}' (chrono: year must be >= 1)"
            ));
            None
        }
        None => {
            parse_error.push(&format!(
                "Conversion error: {label}='{s}' (chrono: input is out of range)"
            ));
            None
        }
    }
}

fn known_or_first(part: &str) -> &str {
    if part.contains('?') {
        "01"
    } else {
        part
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let first_day_next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month.checked_add(1)?, 1)?
    };

    first_day_next_month.pred_opt().map(|d| d.day())
}

/// Header-only pass over one game: tags are collected, mainline moves are
/// counted and variations are skipped.
struct HeaderVisitor {
    headers: HeaderFields,
    overrides: Option<Headers>,
    move_count: u32,
    outcome: Option<String>,
    parse_error: ErrorAccumulator,
    current_game: Option<GameInfo>,
}

impl HeaderVisitor {
    fn new() -> Self {
        Self {
            headers: HeaderFields::default(),
            overrides: None,
            move_count: 0,
            outcome: None,
            parse_error: ErrorAccumulator::default(),
            current_game: None,
        }
    }
}

impl Visitor for HeaderVisitor {
    type Tags = ();
    type Movetext = ();
    type Output = ();

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        self.headers = HeaderFields::default();
        self.move_count = 0;
        self.outcome = None;
        self.parse_error = ErrorAccumulator::default();
        self.current_game = None;
        ControlFlow::Continue(())
    }

    fn tag(
        &mut self,
        _: &mut Self::Tags,
        key: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let value = String::from_utf8_lossy(value.as_bytes());
        self.headers.set(key, &value, false);
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, _: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        if let Some(overrides) = &self.overrides {
            for (key, value) in overrides {
                self.headers.set(key.as_bytes(), value, true);
            }
        }
        ControlFlow::Continue(())
    }

    fn begin_variation(&mut self, _: &mut Self::Movetext) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn san(&mut self, _: &mut Self::Movetext, _: SanPlus) -> ControlFlow<Self::Output> {
        self.move_count += 1;
        ControlFlow::Continue(())
    }

    fn outcome(&mut self, _: &mut Self::Movetext, outcome: Outcome) -> ControlFlow<Self::Output> {
        self.outcome = Some(outcome.to_string());
        ControlFlow::Continue(())
    }

    fn end_game(&mut self, _: Self::Movetext) -> Self::Output {
        let headers = mem::take(&mut self.headers);
        let outcome = self.outcome.take();
        self.current_game = Some(headers.into_info(self.move_count, outcome, &mut self.parse_error));
    }
}
