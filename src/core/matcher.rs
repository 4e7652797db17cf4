//! 검색 결과 중 하나를 고르는 휴리스틱.
//!
//! 쿼리와 후보 메타데이터만 보는 순수 함수들이라 실제 검색 없이 픽스처로 테스트한다.

use std::cmp::Reverse;
use std::sync::OnceLock;

use regex::Regex;

use crate::core::parser;
use crate::models::Candidate;

const TITLE_WEIGHT: f64 = 50.0;
const TITLE_PHRASE_BONUS: i32 = 10;
const ARTIST_WEIGHT: i32 = 30;
const ARTIST_PARTIAL_WEIGHT: f64 = 20.0;
const OFFICIAL_BONUS: i32 = 10;
const AUDIO_BONUS: i32 = 5;
const TOPIC_BONUS: i32 = 5;
const LOW_PRIORITY_PENALTY: i32 = 25;

/// 사용자가 요청한 곡. 아티스트 항목이면 `title`은 `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub artist: String,
    pub title: Option<String>,
}

impl SearchQuery {
    pub fn song(artist: &str, title: &str) -> Self {
        Self {
            artist: artist.to_string(),
            title: Some(title.to_string()),
        }
    }

    pub fn artist(name: &str) -> Self {
        Self {
            artist: name.to_string(),
            title: None,
        }
    }

    fn text(&self) -> String {
        match &self.title {
            Some(title) => format!("{} {}", self.artist, title),
            None => self.artist.clone(),
        }
    }
}

fn low_priority_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)\b(?:letra|playback|cover|karaoke)\b",
            r"#\d+",
            r"(?i)\b(?:instrumental|piano|tutorial)\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
    })
}

fn decoration_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\s*[\(\[][^\)\]]*\b(?:official|video|audio|lyrics?|letra|hd|hq|4k|remaster(?:ed)?|mv|visuali[sz]er|clip)\b[^\)\]]*[\)\]]",
        )
        .expect("valid regex")
    })
}

fn tokens(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn compact(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// 메타데이터, 제목, 채널명으로 보아 후보가 `artist`의 곡인지 판단한다.
pub fn mentions_artist(artist: &str, candidate: &Candidate) -> bool {
    let wanted = tokens(artist);
    if wanted.is_empty() {
        return false;
    }
    if let Some(ref meta_artist) = candidate.artist {
        if compact(meta_artist).contains(&compact(artist)) {
            return true;
        }
    }

    let mut haystack = tokens(&candidate.title);
    if let Some(ref channel) = candidate.channel {
        haystack.extend(tokens(channel));
        if compact(channel).contains(&compact(artist)) {
            return true;
        }
    }
    wanted.iter().all(|t| haystack.contains(t))
}

fn is_low_priority(text: &str) -> bool {
    low_priority_patterns().iter().any(|re| re.is_match(text))
}

/// 쿼리에 대한 후보 점수 (높을수록 좋음).
/// 곡이라기엔 너무 길면 `None`으로 탈락시킨다.
pub fn score(query: &SearchQuery, candidate: &Candidate, max_duration_secs: u64) -> Option<i32> {
    if let Some(duration) = candidate.duration {
        if duration > max_duration_secs as f64 {
            return None;
        }
    }

    let lowered_title = candidate.title.to_lowercase();
    let title_tokens = tokens(&candidate.title);
    let mut total = 0;

    if let Some(ref wanted_title) = query.title {
        let wanted = tokens(wanted_title);
        if !wanted.is_empty() {
            let matched = wanted.iter().filter(|t| title_tokens.contains(t)).count();
            total += (TITLE_WEIGHT * matched as f64 / wanted.len() as f64).round() as i32;
            if lowered_title.contains(&wanted_title.trim().to_lowercase()) {
                total += TITLE_PHRASE_BONUS;
            }
        }
    }

    if mentions_artist(&query.artist, candidate) {
        total += ARTIST_WEIGHT;
    } else {
        let wanted = tokens(&query.artist);
        if !wanted.is_empty() {
            let matched = wanted.iter().filter(|t| title_tokens.contains(t)).count();
            total += (ARTIST_PARTIAL_WEIGHT * matched as f64 / wanted.len() as f64).round() as i32;
        }
    }

    if title_tokens.iter().any(|t| t == "official") {
        total += OFFICIAL_BONUS;
    }
    if title_tokens
        .iter()
        .any(|t| t == "audio" || t == "lyrics" || t == "lyric")
    {
        total += AUDIO_BONUS;
    }
    if candidate
        .channel
        .as_deref()
        .is_some_and(|c| c.to_lowercase().ends_with("- topic"))
    {
        total += TOPIC_BONUS;
    }

    // Covers, karaoke and the like lose unless the user asked for them.
    if is_low_priority(&candidate.title) && !is_low_priority(&query.text()) {
        total -= LOW_PRIORITY_PENALTY;
    }

    Some(total)
}

/// 점수가 높은 순으로 정렬한다. 동점이면 조회수가 많은 쪽이 앞선다.
/// 탈락한 후보는 제외한다.
pub fn rank(
    query: &SearchQuery,
    candidates: Vec<Candidate>,
    max_duration_secs: u64,
) -> Vec<(i32, Candidate)> {
    let mut scored: Vec<(i32, Candidate)> = candidates
        .into_iter()
        .filter_map(|c| score(query, &c, max_duration_secs).map(|s| (s, c)))
        .collect();
    scored.sort_by_key(|(s, c)| (Reverse(*s), Reverse(c.view_count.unwrap_or(0))));
    scored
}

/// `artist`의 후보를 조회수 순으로 반환한다.
/// 커버, 노래방 같은 저우선 버전과 지나치게 긴 업로드는 아티스트 가중치에 못 미쳐 빠진다.
pub fn rank_for_artist(
    artist: &str,
    candidates: Vec<Candidate>,
    max_duration_secs: u64,
) -> Vec<Candidate> {
    let query = SearchQuery::artist(artist);
    let mut kept: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| mentions_artist(artist, c))
        .filter(|c| score(&query, c, max_duration_secs).is_some_and(|s| s >= ARTIST_WEIGHT))
        .collect();
    kept.sort_by_key(|c| Reverse(c.view_count.unwrap_or(0)));
    kept
}

/// "(Official Video)", "[HD]" 같은 장식과 뒤쪽의 "| ..." 부분을 제거한다.
pub fn clean_title(title: &str) -> String {
    let stripped = decoration_pattern().replace_all(title, "");
    let stripped = stripped.split(" | ").next().unwrap_or_default();
    let cleaned = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        title.trim().to_string()
    } else {
        cleaned
    }
}

fn strip_topic(channel: &str) -> String {
    let trimmed = channel.trim();
    trimmed
        .strip_suffix(" - Topic")
        .or_else(|| trimmed.strip_suffix("VEVO"))
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// 사용자가 이름을 주지 않은 영상의 `(artist, title)`을 추정한다.
/// 명시적 메타데이터, "Artist - Title" 형태의 영상 제목, 채널명 순으로 시도한다.
pub fn describe(candidate: &Candidate) -> (String, String) {
    if let (Some(artist), Some(track)) = (&candidate.artist, &candidate.track) {
        let artist = artist.split(',').next().unwrap_or(artist).trim();
        if !artist.is_empty() && !track.trim().is_empty() {
            return (artist.to_string(), track.trim().to_string());
        }
    }

    let title = clean_title(&candidate.title);
    if let Some((artist, track)) = parser::split_artist_title(&title) {
        return (artist.to_string(), track.to_string());
    }

    let artist = candidate
        .channel
        .as_deref()
        .map(strip_topic)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "Unknown Artist".to_string());
    (artist, title)
}

/// 아티스트 검색으로 찾은 후보의 제목에서 아티스트 접두어를 뗀다.
pub fn title_for_artist(artist: &str, candidate: &Candidate) -> String {
    if let Some(ref track) = candidate.track {
        if !track.trim().is_empty() {
            return track.trim().to_string();
        }
    }
    let title = clean_title(&candidate.title);
    match parser::split_artist_title(&title) {
        Some((prefix, rest)) if compact(prefix).contains(&compact(artist)) => rest.to_string(),
        _ => title,
    }
}
