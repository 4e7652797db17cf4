//! 테스트용 고정 응답 `MediaSource`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::SourceError;
use crate::models::{Candidate, UrlInfo};
use crate::sources::MediaSource;

#[derive(Default)]
pub struct FakeSource {
    searches: HashMap<String, Vec<Candidate>>,
    url_infos: HashMap<String, UrlInfo>,
    search_failures: Mutex<usize>,
    download_failures: Mutex<HashMap<String, usize>>,
    unavailable: HashSet<String>,
    pub downloads: Mutex<Vec<String>>,
}

fn transient() -> SourceError {
    SourceError::Exit {
        tool: "yt-dlp".to_string(),
        code: "1".to_string(),
        stderr: "ERROR: Unable to download webpage: timed out".to_string(),
    }
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, query: &str, results: Vec<Candidate>) -> Self {
        self.searches.insert(query.to_string(), results);
        self
    }

    pub fn with_url_info(mut self, url: &str, info: UrlInfo) -> Self {
        self.url_infos.insert(url.to_string(), info);
        self
    }

    /// 다음 `times`번의 검색이 일시적 에러로 실패한다.
    pub fn failing_searches(self, times: usize) -> Self {
        *self.search_failures.lock() = times;
        self
    }

    /// `url`의 처음 `times`번 다운로드가 일시적 에러로 실패한다.
    pub fn failing_download(self, url: &str, times: usize) -> Self {
        self.download_failures.lock().insert(url.to_string(), times);
        self
    }

    pub fn unavailable(mut self, url: &str) -> Self {
        self.unavailable.insert(url.to_string());
        self
    }

    pub fn download_count(&self, url: &str) -> usize {
        self.downloads.lock().iter().filter(|u| *u == url).count()
    }

    pub fn total_downloads(&self) -> usize {
        self.downloads.lock().len()
    }
}

impl MediaSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, SourceError> {
        {
            let mut failures = self.search_failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(transient());
            }
        }
        Ok(self
            .searches
            .get(query)
            .map(|r| r.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn inspect(&self, url: &str) -> Result<UrlInfo, SourceError> {
        self.url_infos.get(url).cloned().ok_or_else(|| SourceError::Exit {
            tool: "yt-dlp".to_string(),
            code: "1".to_string(),
            stderr: "ERROR: Unsupported URL".to_string(),
        })
    }

    fn download(&self, url: &str, dest_dir: &Path, stem: &str) -> Result<PathBuf, SourceError> {
        self.downloads.lock().push(url.to_string());

        if self.unavailable.contains(url) {
            return Err(SourceError::Exit {
                tool: "yt-dlp".to_string(),
                code: "1".to_string(),
                stderr: "ERROR: [youtube] x: Video unavailable".to_string(),
            });
        }
        if let Some(remaining) = self.download_failures.lock().get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(transient());
            }
        }

        std::fs::create_dir_all(dest_dir).map_err(|source| SourceError::Spawn {
            tool: "fake".to_string(),
            source,
        })?;
        let path = dest_dir.join(format!("{}.webm", stem));
        std::fs::write(&path, url.as_bytes()).map_err(|source| SourceError::Spawn {
            tool: "fake".to_string(),
            source,
        })?;
        Ok(path)
    }
}
