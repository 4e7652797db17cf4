use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::{EntryKind, InputEntry};

/// A line that was classified by best guess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    pub line: usize,
    pub text: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ParsedInput {
    pub entries: Vec<InputEntry>,
    pub warnings: Vec<ParseWarning>,
}

const SEPARATORS: &[&str] = &[" - ", " – "];

/// Parse the whole input list. Comment and blank lines are dropped;
/// line numbers are 1-based and refer to the original text.
pub fn parse_input(content: &str) -> ParsedInput {
    let mut parsed = ParsedInput::default();

    for (idx, raw) in content.lines().enumerate() {
        let line = idx + 1;
        let text = raw.trim().trim_start_matches('\u{feff}');
        if text.is_empty() || text.starts_with('#') {
            continue;
        }

        let kind = classify(text);
        if matches!(kind, EntryKind::Artist { .. }) && looks_like_url(text) {
            parsed.warnings.push(ParseWarning {
                line,
                text: text.to_string(),
                message: "looks like a URL but is not a valid http(s) link; treating as artist"
                    .to_string(),
            });
        }

        parsed.entries.push(InputEntry {
            line,
            raw: text.to_string(),
            kind,
        });
    }

    parsed
}

/// Classify a single trimmed line.
pub fn classify(text: &str) -> EntryKind {
    if is_url(text) {
        return EntryKind::Url {
            url: text.to_string(),
        };
    }

    if let Some((artist, title)) = split_artist_title(text) {
        return EntryKind::Song {
            artist: artist.to_string(),
            title: title.to_string(),
        };
    }

    EntryKind::Artist {
        name: text.to_string(),
    }
}

/// Well-formed http(s) URL, or a backend search prefix like `ytsearch3:`.
pub fn is_url(text: &str) -> bool {
    if search_prefix_regex().is_match(text) {
        return true;
    }
    match url::Url::parse(text) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

fn search_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^ytsearch\d*:\S").expect("valid regex"))
}

fn looks_like_url(text: &str) -> bool {
    let lowered = text.to_lowercase();
    !text.contains(' ')
        && (lowered.starts_with("www.") || lowered.starts_with("http") || lowered.contains("://"))
}

/// Split on the first `" - "` (or en dash) separator.
/// Both halves must be non-empty after trimming.
pub fn split_artist_title(text: &str) -> Option<(&str, &str)> {
    let (pos, sep) = SEPARATORS
        .iter()
        .filter_map(|sep| text.find(sep).map(|pos| (pos, *sep)))
        .min_by_key(|(pos, _)| *pos)?;

    let artist = text[..pos].trim();
    let title = text[pos + sep.len()..].trim();

    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some((artist, title))
}

/// Reverse of the output naming convention: `"Artist - Title.ext"`.
pub fn parse_filename(path: &Path) -> Option<(String, String)> {
    let stem = path.file_stem()?.to_str()?.trim();
    let (artist, title) = split_artist_title(stem)?;
    Some((artist.to_string(), title.to_string()))
}

/// Build a backend search query for a song.
pub fn build_search_query(artist: &str, title: &str) -> String {
    [artist.trim(), title.trim()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}
