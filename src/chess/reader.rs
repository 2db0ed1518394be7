use super::log;
use super::types::RawGame;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use zstd::stream::read::Decoder as ZstdDecoder;

pub type PgnInput = Box<dyn Read + Send>;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum CompressionMode {
    #[default]
    Plain,
    Zstd,
}

impl CompressionMode {
    pub fn parse(raw: &str) -> Result<Self, Box<dyn Error>> {
        let normalized = raw.trim();
        if normalized.is_empty() {
            return Err("Invalid compression value ''. Supported values: 'zstd' or 'plain'."
                .to_string()
                .into());
        }

        if normalized.eq_ignore_ascii_case("zstd") {
            Ok(Self::Zstd)
        } else if normalized.eq_ignore_ascii_case("plain") || normalized.eq_ignore_ascii_case("none")
        {
            Ok(Self::Plain)
        } else {
            Err(format!(
                "Invalid compression value '{}'. Supported values: 'zstd' or 'plain'.",
                normalized
            )
            .into())
        }
    }

    /// The requested mode, or zstd for files ending in `.zst`.
    pub fn for_path(path: &Path, requested: Option<Self>) -> Self {
        requested.unwrap_or_else(|| {
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("zst")) {
                Self::Zstd
            } else {
                Self::Plain
            }
        })
    }
}

/// A PGN source that could not be opened or decoded.
#[derive(Debug)]
pub struct SourceError {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.message, self.path.display())
    }
}

impl Error for SourceError {}

/// Expands `pattern` with `glob` when it contains `*` or `?`; otherwise it
/// names a single file.
pub fn resolve_paths(pattern: &str) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    if !(pattern.contains('*') || pattern.contains('?')) {
        return Ok(vec![PathBuf::from(pattern)]);
    }

    let paths: Vec<PathBuf> = glob::glob(pattern)?.filter_map(|entry| entry.ok()).collect();
    if paths.is_empty() {
        return Err(format!("No files match pattern '{}'", pattern).into());
    }
    Ok(paths)
}

pub fn open_input_stream(path: &Path, compression: CompressionMode) -> Result<PgnInput, SourceError> {
    let file = File::open(path).map_err(|e| SourceError {
        path: path.to_path_buf(),
        message: format!("Failed to open file ({})", e),
    })?;

    match compression {
        CompressionMode::Plain => Ok(Box::new(file)),
        CompressionMode::Zstd => ZstdDecoder::new(file)
            .map(|decoder| Box::new(decoder) as PgnInput)
            .map_err(|e| SourceError {
                path: path.to_path_buf(),
                message: format!("Failed to initialize zstd decoder ({})", e),
            }),
    }
}

fn read_source(path: &Path, compression: CompressionMode) -> Result<String, SourceError> {
    let mut input = open_input_stream(path, compression)?;
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes).map_err(|e| SourceError {
        path: path.to_path_buf(),
        message: format!("Failed to read ({})", e),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

const RESULT_TOKENS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

/// Splits multi-game PGN text. A game ends at a line whose last movetext
/// token is a result, or when a tag line follows movetext. Blank-only games
/// are dropped.
pub fn split_games(text: &str) -> Vec<String> {
    let mut games = Vec::new();
    let mut current = String::new();
    let mut seen_movetext = false;
    let mut in_comment = false;

    for line in text.lines() {
        let trimmed = line.trim();
        let is_tag_line =
            !in_comment && trimmed.starts_with('[') && !trimmed.starts_with("[%");

        if is_tag_line && seen_movetext {
            games.push(std::mem::take(&mut current));
            seen_movetext = false;
        }
        if trimmed.is_empty() && current.trim().is_empty() {
            continue;
        }

        current.push_str(line);
        current.push('\n');

        if !is_tag_line && !trimmed.is_empty() {
            seen_movetext = true;
            if ends_with_result(line, &mut in_comment) {
                games.push(std::mem::take(&mut current));
                seen_movetext = false;
            }
        }
    }
    games.push(current);

    games.retain(|game| !game.trim().is_empty());
    games
}

/// Whether the movetext of `line`, outside `{}` and `;` comments, ends with a
/// result token. `in_comment` carries an open brace comment across lines.
fn ends_with_result(line: &str, in_comment: &mut bool) -> bool {
    let mut outside = String::with_capacity(line.len());
    for c in line.chars() {
        match c {
            '{' if !*in_comment => *in_comment = true,
            '}' if *in_comment => {
                *in_comment = false;
                outside.push(' ');
            }
            ';' if !*in_comment => break,
            _ if !*in_comment => outside.push(c),
            _ => {}
        }
    }
    outside
        .split_whitespace()
        .next_back()
        .is_some_and(|token| RESULT_TOKENS.contains(&token))
}

/// `games.pgn.zst` and `games.pgn` both become `games`.
fn source_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let name = name.strip_suffix(".zst").unwrap_or(&name);
    name.strip_suffix(".pgn").unwrap_or(name).to_string()
}

/// One distinct label per source. The bare stem is used when it is unique;
/// stems shared by several files are prefixed with their directory relative
/// to the deepest directory all sources share.
fn source_labels(paths: &[PathBuf]) -> Vec<String> {
    let stems: Vec<String> = paths.iter().map(|path| source_stem(path)).collect();
    let mut stem_counts: HashMap<&str, usize> = HashMap::new();
    for stem in &stems {
        *stem_counts.entry(stem.as_str()).or_default() += 1;
    }

    let root = common_parent(paths);
    let mut used = HashSet::with_capacity(paths.len());
    paths
        .iter()
        .zip(&stems)
        .enumerate()
        .map(|(i, (path, stem))| {
            let mut label = stem.clone();
            if stem_counts[stem.as_str()] > 1 {
                let relative = path.strip_prefix(&root).unwrap_or(path.as_path());
                if let Some(dir) = relative.parent().filter(|d| !d.as_os_str().is_empty()) {
                    label = format!("{}/{}", dir.display(), stem);
                }
            }
            if !used.insert(label.clone()) {
                label = format!("{}~{}", label, i + 1);
                used.insert(label.clone());
            }
            label
        })
        .collect()
}

fn common_parent(paths: &[PathBuf]) -> PathBuf {
    let mut root = paths
        .first()
        .and_then(|path| path.parent())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    while !paths.iter().all(|path| path.starts_with(&root)) {
        if !root.pop() {
            break;
        }
    }
    root
}

/// Reads every game matched by `pattern`, identified as `label#n` (1-based)
/// where the label is the file stem, qualified by its directory when another
/// matched file has the same stem.
///
/// With a single source, open and read errors are returned. With several,
/// unreadable sources are logged and skipped.
pub fn read_games(
    pattern: &str,
    compression: Option<CompressionMode>,
) -> Result<Vec<(String, RawGame)>, Box<dyn Error>> {
    let paths = resolve_paths(pattern)?;
    let labels = source_labels(&paths);
    let mut games = Vec::new();

    for (path, label) in paths.iter().zip(&labels) {
        let mode = CompressionMode::for_path(path, compression);
        let text = match read_source(path, mode) {
            Ok(text) => text,
            Err(err) if paths.len() == 1 => return Err(err.into()),
            Err(err) => {
                log::warn(err.to_string());
                continue;
            }
        };

        let before = games.len();
        games.extend(
            split_games(&text)
                .into_iter()
                .enumerate()
                .map(|(i, game)| (format!("{}#{}", label, i + 1), RawGame::new(game))),
        );
        log::debug(format!(
            "read {} games from '{}'",
            games.len() - before,
            path.display()
        ));
    }

    Ok(games)
}
