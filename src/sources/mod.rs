pub mod ytdlp;

use std::path::{Path, PathBuf};

use crate::error::SourceError;
use crate::models::{Candidate, UrlInfo};

/// 미디어 추출 백엔드 트레이트.
/// 실제 구현은 yt-dlp이고, 테스트에서는 고정 응답을 주는 대역을 쓴다.
pub trait MediaSource: Sync {
    fn name(&self) -> &str;
    /// `query`에 맞는 영상을 최대 `limit`개 검색한다.
    fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, SourceError>;
    /// 영상, 플레이리스트, 검색 URL의 메타데이터를 다운로드 없이 가져온다.
    fn inspect(&self, url: &str) -> Result<UrlInfo, SourceError>;
    /// `url`의 최고 음질 오디오를 `dest_dir`에 `<stem>.<ext>`로 받고 그 경로를 반환한다.
    fn download(&self, url: &str, dest_dir: &Path, stem: &str) -> Result<PathBuf, SourceError>;
}

#[cfg(test)]
pub mod fake;
