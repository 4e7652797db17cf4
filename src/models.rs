use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::renamer;
use crate::error::ItemError;

/// 입력 목록에서 분류된 한 줄.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEntry {
    pub line: usize,
    pub raw: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Song { artist: String, title: String },
    Artist { name: String },
    Url { url: String },
}

impl EntryKind {
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Song { .. } => "Song",
            EntryKind::Artist { .. } => "Artist",
            EntryKind::Url { .. } => "URL",
        }
    }
}

/// 추출 백엔드가 돌려준 검색 결과 또는 플레이리스트 항목.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub url: String,
    pub title: String,
    pub channel: Option<String>,
    pub duration: Option<f64>,
    pub view_count: Option<u64>,
    pub artist: Option<String>,
    pub track: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub thumbnail: Option<String>,
}

/// URL 항목의 메타데이터 조회 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum UrlInfo {
    Video(Candidate),
    Playlist {
        title: Option<String>,
        items: Vec<Candidate>,
    },
}

/// 디스패처에 넘기는 구체적인 다운로드 단위.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub id: usize,
    pub entry: Arc<InputEntry>,
    pub url: String,
    pub artist: String,
    pub title: String,
    pub rank: usize,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub thumbnail: Option<String>,
}

impl ResolvedTarget {
    pub fn key(&self) -> DedupKey {
        DedupKey::new(&self.artist, &self.title)
    }

    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

/// 트랙을 식별하는 정규화된 `(artist, title)` 쌍.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    pub artist: String,
    pub title: String,
}

impl DedupKey {
    /// 파일명에 쓰이는 형태(`sanitize_filename`)로 정규화한다.
    /// 디스크의 `"Artist - Title.ext"`에서 되살린 키와 항상 같다.
    pub fn new(artist: &str, title: &str) -> Self {
        Self {
            artist: normalize(&renamer::sanitize_filename(artist)),
            title: normalize(&renamer::sanitize_filename(title)),
        }
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug)]
pub enum DownloadStatus {
    Success(PathBuf),
    Skipped(SkipReason),
    Failed(ItemError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyDownloaded,
    DuplicateInRun,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyDownloaded => write!(f, "already downloaded"),
            SkipReason::DuplicateInRun => write!(f, "duplicate in this run"),
        }
    }
}

#[derive(Debug)]
pub struct DownloadResult {
    pub target: ResolvedTarget,
    pub status: DownloadStatus,
    pub elapsed: Duration,
}

impl DownloadResult {
    pub fn output_path(&self) -> Option<&PathBuf> {
        match &self.status {
            DownloadStatus::Success(path) => Some(path),
            _ => None,
        }
    }
}

/// 완성된 오디오 파일에 기록할 태그 정보.
#[derive(Debug, Clone, Default)]
pub struct TrackInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub comment: Option<String>,
    pub album_art: Option<Vec<u8>>,
}

impl TrackInfo {
    pub fn from_target(target: &ResolvedTarget) -> Self {
        Self {
            title: Some(target.title.clone()),
            artist: Some(target.artist.clone()),
            album: target.album.clone(),
            year: target.year,
            comment: Some(target.url.clone()),
            album_art: None,
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown")
    }

    pub fn display_artist(&self) -> &str {
        self.artist.as_deref().unwrap_or("Unknown")
    }
}
