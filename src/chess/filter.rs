use regex::Regex;
use shakmaty::Color;
use std::sync::LazyLock;

use super::types::{Headers, MoveToken};

static TAG_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[\s*([A-Za-z0-9_]+)\s+"((?:[^"\\]|\\.)*)"\s*\]"#).expect("valid tag pair regex")
});

static COMMENTARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[%[^\]]*\]").expect("valid commentary regex"));

static BRACKETED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("valid bracketed fragment regex"));

static NAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\d+").expect("valid NAG regex"));

static GLYPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[!?]+").expect("valid annotation glyph regex"));

static MOVE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.+$").expect("valid move number regex"));

static MOVE_NUMBER_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:\.+|…)").expect("valid move number prefix regex"));

static SQUARE_OR_CASTLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-h][1-8]|^[O0o]-?[O0o]").expect("valid square or castle regex")
});

static ZERO_CASTLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0-0(-0)?").expect("valid zero castle regex"));

const RESULT_TOKENS: [&str; 5] = ["1-0", "0-1", "1/2-1/2", "½-½", "*"];

/// Movetext split into move tokens, plus the tags found in front of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokenized {
    /// Starting position from a `FEN` tag, if present.
    pub initial_fen: Option<String>,
    pub headers: Headers,
    pub tokens: Vec<MoveToken>,
}

impl Tokenized {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.tokens.iter().map(|t| t.text.as_str()).collect()
    }
}

/// Splits raw game text into move tokens.
///
/// Tag lines are dropped (a `FEN` tag becomes the starting position), then
/// `{}` comments, `;` comments, nested `()` variations, bracketed `[%...]`
/// commentary, NAGs and `!`/`?` glyphs are removed. A trailing result token is
/// dropped and move-number labels are skipped, including labels fused to the
/// move (`12.Nf3`). Never fails; judging legality is left to the board.
pub fn tokenize(raw: &str) -> Tokenized {
    let (headers, movetext) = split_headers(raw);

    let text = strip_line_comments(&strip_brace_comments(&movetext));
    let text = strip_variations(&text);
    let text = COMMENTARY_RE.replace_all(&text, " ");
    let text = NAG_RE.replace_all(&text, " ");
    let text = GLYPH_RE.replace_all(&text, "");

    let mut words: Vec<&str> = text.split_whitespace().collect();
    if words.last().is_some_and(|w| is_result_token(w)) {
        words.pop();
    }

    let candidates = words.into_iter().filter_map(strip_move_number).map(str::to_string);
    build(headers, candidates)
}

/// Aggressive variant of [`tokenize`]: removes every bracketed fragment,
/// result tokens anywhere, ellipses, `e.p.` markers and stray delimiters,
/// maps figurine symbols to piece letters and drops tokens that cannot be a move.
pub fn tokenize_cleaned(raw: &str) -> Tokenized {
    let (headers, movetext) = split_headers(raw);
    clean_and_build(headers, &movetext)
}

/// Treats every line after the first blank line as movetext, without looking
/// for tag lines, then applies the cleaning of [`tokenize_cleaned`].
pub fn tokenize_manual(raw: &str) -> Tokenized {
    let (headers, _) = split_headers(raw);

    let mut lines = raw.lines();
    let mut movetext = String::new();
    let mut seen_blank = false;
    for line in lines.by_ref() {
        if line.trim().is_empty() {
            seen_blank = true;
            break;
        }
    }

    if seen_blank {
        for line in lines {
            movetext.push_str(line);
            movetext.push('\n');
        }
    } else {
        movetext.push_str(raw);
    }

    clean_and_build(headers, &movetext)
}

fn clean_and_build(headers: Headers, movetext: &str) -> Tokenized {
    let text = strip_line_comments(&strip_brace_comments(movetext));
    let text = strip_variations(&text);
    let text = BRACKETED_RE.replace_all(&text, " ");
    let text = NAG_RE.replace_all(&text, " ");
    let text = replace_figurines(&text);
    let text: String = text
        .chars()
        .map(|c| match c {
            '{' | '}' | '(' | ')' | '[' | ']' | '!' | '?' => ' ',
            _ => c,
        })
        .collect();

    let candidates = text
        .split_whitespace()
        .filter(|w| !is_result_token(w))
        .filter_map(strip_move_number)
        .filter_map(clean_word);
    build(headers, candidates)
}

fn clean_word(word: &str) -> Option<String> {
    let mut word = word.trim_matches(|c| c == ',' || c == ';' || c == '…');
    for suffix in ["e.p.", "ep"] {
        if let Some(stripped) = word.strip_suffix(suffix)
            && SQUARE_OR_CASTLE_RE.is_match(stripped)
        {
            word = stripped;
        }
    }
    let word = word.trim_matches('.');

    if word.is_empty() || !SQUARE_OR_CASTLE_RE.is_match(word) {
        return None;
    }

    if ZERO_CASTLE_RE.is_match(word) {
        return Some(word.replace('0', "O"));
    }

    Some(word.to_string())
}

fn build(headers: Headers, candidates: impl Iterator<Item = String>) -> Tokenized {
    let initial_fen = headers
        .get("FEN")
        .map(|fen| fen.trim().to_string())
        .filter(|fen| !fen.is_empty());

    let mut side = initial_fen
        .as_deref()
        .and_then(|fen| fen.split_whitespace().nth(1))
        .map(|field| if field == "b" { Color::Black } else { Color::White })
        .unwrap_or(Color::White);

    let mut tokens = Vec::new();
    for (i, text) in candidates.enumerate() {
        tokens.push(MoveToken {
            text,
            ply: i as u32 + 1,
            side,
        });
        side = side.other();
    }

    Tokenized {
        initial_fen,
        headers,
        tokens,
    }
}

/// Separates tag-pair lines from the rest. A line counts as a tag line when
/// nothing but tag pairs remains on it.
fn split_headers(raw: &str) -> (Headers, String) {
    let mut headers = Headers::new();
    let mut movetext = String::with_capacity(raw.len());

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && TAG_PAIR_RE.replace_all(trimmed, "").trim().is_empty() {
            for caps in TAG_PAIR_RE.captures_iter(trimmed) {
                headers
                    .entry(caps[1].to_string())
                    .or_insert_with(|| caps[2].replace("\\\"", "\""));
            }
            continue;
        }
        movetext.push_str(line);
        movetext.push('\n');
    }

    (headers, movetext)
}

fn strip_brace_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_comment = false;
    for c in text.chars() {
        match (in_comment, c) {
            (false, '{') => in_comment = true,
            (true, '}') => {
                in_comment = false;
                out.push(' ');
            }
            (false, _) => out.push(c),
            (true, _) => {}
        }
    }
    out
}

fn strip_line_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let kept = line.split_once(';').map_or(line, |(before, _)| before);
        out.push_str(kept);
        out.push('\n');
    }
    out
}

/// Removes `( ... )` variations, which may nest. An unmatched `)` is dropped;
/// an unmatched `(` swallows the rest of the text.
fn strip_variations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '(' => {
                depth += 1;
                out.push(' ');
            }
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

fn replace_figurines(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '♔' | '♚' => Some('K'),
            '♕' | '♛' => Some('Q'),
            '♖' | '♜' => Some('R'),
            '♗' | '♝' => Some('B'),
            '♘' | '♞' => Some('N'),
            '♙' | '♟' => None,
            _ => Some(c),
        })
        .collect()
}

fn strip_move_number(word: &str) -> Option<&str> {
    if MOVE_NUMBER_RE.is_match(word) {
        return None;
    }
    let stripped = match MOVE_NUMBER_PREFIX_RE.find(word) {
        Some(m) => &word[m.end()..],
        None => word,
    };
    (!stripped.is_empty()).then_some(stripped)
}

fn is_result_token(word: &str) -> bool {
    RESULT_TOKENS.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokenized: &Tokenized) -> Vec<&str> {
        tokenized.texts()
    }

    #[test]
    fn test_tokenize_complex() {
        let input = "1. e4! {Best by test} (1. d4 d5) e5?? $1 2. Nf3";
        assert_eq!(texts(&tokenize(input)), vec!["e4", "e5", "Nf3"]);
    }

    #[test]
    fn test_tokenize_glyphs() {
        for input in ["1. e4!", "1. e4?", "1. e4!!", "1. e4??", "1. e4!?", "1. e4?!", "1. e4$1"] {
            assert_eq!(texts(&tokenize(input)), vec!["e4"], "input: {input}");
        }
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t\n").is_empty());
        assert!(tokenize("{comment} {another}").is_empty());
        assert!(tokenize("(variation)").is_empty());
        assert!(tokenize("1. 2. 3.").is_empty());
        assert!(tokenize("1... 2...").is_empty());
    }

    #[test]
    fn test_tokenize_with_different_spacing() {
        let expected = vec!["e4", "e5"];
        assert_eq!(texts(&tokenize("1. e4 e5")), expected);
        assert_eq!(texts(&tokenize("1.e4 e5")), expected);
        assert_eq!(texts(&tokenize("1.  e4 \n\n e5")), expected);
    }

    #[test]
    fn test_tokenize_fused_move_numbers() {
        let tokenized = tokenize("1.e4 e5 2.Nf3 2...Nc6 3.Bb5");
        assert_eq!(texts(&tokenized), vec!["e4", "e5", "Nf3", "Nc6", "Bb5"]);
    }

    #[test]
    fn test_tokenize_trailing_result_only() {
        assert_eq!(texts(&tokenize("1. e4 e5 1-0")), vec!["e4", "e5"]);
        assert_eq!(texts(&tokenize("1. e4 e5 1/2-1/2")), vec!["e4", "e5"]);
        assert_eq!(texts(&tokenize("1. e4 e5 *")), vec!["e4", "e5"]);
        // A result in the middle is not stripped by the strict tokenizer.
        assert_eq!(texts(&tokenize("1. e4 1-0 e5")), vec!["e4", "1-0", "e5"]);
    }

    #[test]
    fn test_tokenize_lichess_style_annotations() {
        let input = "1. d4 { [%eval 0.25] [%clk 1:30:43] } Nf6 { [%eval 0.22] [%clk 1:30:42] }";
        assert_eq!(texts(&tokenize(input)), vec!["d4", "Nf6"]);
    }

    #[test]
    fn test_tokenize_clock_annotations_outside_comments() {
        let input = "1. e4 [%clk 0:09:52] e5 [%clk 0:09:50]";
        assert_eq!(texts(&tokenize(input)), vec!["e4", "e5"]);
    }

    #[test]
    fn test_tokenize_nested_variations() {
        let input = "1. e4 (1. d4 (1. c4 c5) d5) e5 2. Nf3";
        assert_eq!(texts(&tokenize(input)), vec!["e4", "e5", "Nf3"]);
    }

    #[test]
    fn test_tokenize_unbalanced_variation_swallows_rest() {
        let input = "1. e4 ((1. d4 (1. c4)) e5";
        assert_eq!(texts(&tokenize(input)), vec!["e4"]);
    }

    #[test]
    fn test_tokenize_semicolon_comment() {
        let input = "1. e4 ; king's pawn\n1... e5";
        assert_eq!(texts(&tokenize(input)), vec!["e4", "e5"]);
    }

    #[test]
    fn test_tokenize_headers_and_fen_override() {
        let input = r#"[Event "Endgame study"]
[SetUp "1"]
[FEN "4k3/8/8/8/8/8/4P3/4K3 b - - 0 1"]

1... Kd7 2. e4 *"#;
        let tokenized = tokenize(input);

        assert_eq!(
            tokenized.initial_fen.as_deref(),
            Some("4k3/8/8/8/8/8/4P3/4K3 b - - 0 1")
        );
        assert_eq!(tokenized.headers.get("Event").map(String::as_str), Some("Endgame study"));
        assert_eq!(texts(&tokenized), vec!["Kd7", "e4"]);
        assert_eq!(tokenized.tokens[0].side, Color::Black);
        assert_eq!(tokenized.tokens[0].ply, 1);
        assert_eq!(tokenized.tokens[1].side, Color::White);
        assert_eq!(tokenized.tokens[1].ply, 2);
    }

    #[test]
    fn test_tokenize_multiple_tags_on_one_line() {
        let input = "[White \"alice\"][Black \"bob\"]\n1. e4";
        let tokenized = tokenize(input);
        assert_eq!(tokenized.headers.get("Black").map(String::as_str), Some("bob"));
        assert_eq!(texts(&tokenized), vec!["e4"]);
    }

    #[test]
    fn test_tokenize_keeps_unknown_words_for_the_board_to_judge() {
        assert_eq!(texts(&tokenize("1. e4 e5 INVALID")), vec!["e4", "e5", "INVALID"]);
    }

    #[test]
    fn test_tokenize_cleaned_drops_noise() {
        let input = "1. e4 [%clk 0:09:52] e5 2. Nf3 ... Nc6 } 3. Bb5 1-0 a6 e.p. 4. 0-0";
        assert_eq!(
            texts(&tokenize_cleaned(input)),
            vec!["e4", "e5", "Nf3", "Nc6", "Bb5", "a6", "O-O"]
        );
    }

    #[test]
    fn test_tokenize_cleaned_maps_figurines() {
        assert_eq!(texts(&tokenize_cleaned("1. e4 e5 2. ♘f3 ♞c6")), vec!["e4", "e5", "Nf3", "Nc6"]);
    }

    #[test]
    fn test_tokenize_cleaned_strips_en_passant_marker() {
        assert_eq!(texts(&tokenize_cleaned("5. exd6e.p. Qxd6")), vec!["exd6", "Qxd6"]);
    }

    #[test]
    fn test_tokenize_manual_uses_text_after_first_blank_line() {
        let input = "[Event \"Broken\nheader\"]\n[Site \"x\"]\n\n1. d4 d5 2. c4";
        assert_eq!(texts(&tokenize_manual(input)), vec!["d4", "d5", "c4"]);
    }

    #[test]
    fn test_tokenize_manual_without_blank_line_uses_whole_text() {
        assert_eq!(texts(&tokenize_manual("1. e4 e5")), vec!["e4", "e5"]);
    }
}
