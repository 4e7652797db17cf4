use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use tracing::debug;

use crate::error::{SourceError, StartupError};
use crate::models::{Candidate, UrlInfo};
use crate::sources::MediaSource;

const TOOL: &str = "yt-dlp";

/// `yt-dlp` 실행 파일을 호출하는 백엔드.
pub struct YtDlp {
    program: String,
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    #[serde(rename = "_type")]
    kind: Option<String>,
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    ie_key: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    view_count: Option<u64>,
    artist: Option<String>,
    track: Option<String>,
    album: Option<String>,
    release_year: Option<i32>,
    upload_date: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Option<Vec<ThumbnailJson>>,
    #[serde(default)]
    entries: Option<Vec<Option<InfoJson>>>,
}

#[derive(Debug, Deserialize)]
struct ThumbnailJson {
    url: String,
}

impl InfoJson {
    fn is_playlist(&self) -> bool {
        matches!(self.kind.as_deref(), Some("playlist" | "multi_video")) || self.entries.is_some()
    }

    fn media_url(&self) -> Option<String> {
        if let Some(ref url) = self.webpage_url {
            return Some(url.clone());
        }
        match (&self.url, self.ie_key.as_deref(), &self.id) {
            (Some(url), _, _) if url.starts_with("http") => Some(url.clone()),
            (_, Some("Youtube"), Some(id)) => Some(format!("https://www.youtube.com/watch?v={}", id)),
            (Some(url), _, _) => Some(url.clone()),
            _ => None,
        }
    }

    fn year(&self) -> Option<i32> {
        self.release_year.or_else(|| {
            self.upload_date
                .as_deref()
                .and_then(|d| d.get(..4))
                .and_then(|y| y.parse().ok())
        })
    }

    fn into_candidate(self) -> Option<Candidate> {
        let url = self.media_url()?;
        let year = self.year();
        let thumbnail = self
            .thumbnail
            .or_else(|| self.thumbnails.and_then(|t| t.into_iter().last().map(|t| t.url)));

        Some(Candidate {
            url,
            title: self.title?,
            channel: self.channel.or(self.uploader),
            duration: self.duration,
            view_count: self.view_count,
            artist: self.artist,
            track: self.track,
            album: self.album,
            year,
            thumbnail,
        })
    }

    fn into_items(self) -> Vec<Candidate> {
        self.entries
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .filter_map(InfoJson::into_candidate)
            .collect()
    }
}

fn parse_info(json: &str) -> Result<InfoJson, SourceError> {
    serde_json::from_str(json).map_err(|source| SourceError::Parse {
        tool: TOOL.to_string(),
        source,
    })
}

/// 검색 쿼리에 대한 `--dump-single-json` 출력을 파싱한다.
pub fn parse_search(json: &str) -> Result<Vec<Candidate>, SourceError> {
    Ok(parse_info(json)?.into_items())
}

/// 임의 URL에 대한 `--dump-single-json --flat-playlist` 출력을 파싱한다.
pub fn parse_url_info(json: &str) -> Result<UrlInfo, SourceError> {
    let info = parse_info(json)?;
    if info.is_playlist() {
        let title = info.title.clone();
        return Ok(UrlInfo::Playlist {
            title,
            items: info.into_items(),
        });
    }
    info.into_candidate()
        .map(UrlInfo::Video)
        .ok_or_else(|| SourceError::NoOutput {
            tool: TOOL.to_string(),
        })
}

impl YtDlp {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// 실행 파일이 동작하는지 확인하고 버전 문자열을 반환한다.
    pub fn version(&self) -> Result<String, StartupError> {
        self.run(&["--version".to_string()])
            .map(|out| out.trim().to_string())
            .map_err(|e| StartupError::MissingTool {
                tool: self.program.clone(),
                reason: e.to_string(),
            })
    }

    fn run(&self, args: &[String]) -> Result<String, SourceError> {
        debug!(program = %self.program, ?args, "running");
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| SourceError::Spawn {
                tool: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SourceError::Exit {
                tool: TOOL.to_string(),
                code: output
                    .status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                stderr: tail(&String::from_utf8_lossy(&output.stderr)),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// stderr의 끝부분만 남긴다. yt-dlp는 실제 에러를 마지막에 출력한다.
fn tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(3);
    lines[start..].join(" | ")
}

pub fn search_args(query: &str, limit: usize) -> Vec<String> {
    vec![
        "--dump-single-json".to_string(),
        "--flat-playlist".to_string(),
        "--no-warnings".to_string(),
        format!("ytsearch{}:{}", limit.max(1), query),
    ]
}

pub fn inspect_args(url: &str) -> Vec<String> {
    vec![
        "--dump-single-json".to_string(),
        "--flat-playlist".to_string(),
        "--no-warnings".to_string(),
        "--".to_string(),
        url.to_string(),
    ]
}

pub fn download_args(url: &str, dest_dir: &Path, stem: &str) -> Vec<String> {
    let template = dest_dir.join(format!("{}.%(ext)s", stem));
    vec![
        "--format".to_string(),
        "bestaudio/best".to_string(),
        "--no-playlist".to_string(),
        "--no-progress".to_string(),
        "--no-warnings".to_string(),
        "--no-simulate".to_string(),
        "--print".to_string(),
        "after_move:filepath".to_string(),
        "--output".to_string(),
        template.to_string_lossy().into_owned(),
        "--".to_string(),
        url.to_string(),
    ]
}

impl MediaSource for YtDlp {
    fn name(&self) -> &str {
        TOOL
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, SourceError> {
        let stdout = self.run(&search_args(query, limit))?;
        parse_search(&stdout)
    }

    fn inspect(&self, url: &str) -> Result<UrlInfo, SourceError> {
        let stdout = self.run(&inspect_args(url))?;
        parse_url_info(&stdout)
    }

    fn download(&self, url: &str, dest_dir: &Path, stem: &str) -> Result<PathBuf, SourceError> {
        let stdout = self.run(&download_args(url, dest_dir, stem))?;
        let path = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .last()
            .map(PathBuf::from)
            .filter(|p| p.is_file());

        path.ok_or_else(|| SourceError::NoOutput {
            tool: TOOL.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_JSON: &str = r#"{
        "_type": "playlist",
        "id": "Queen Bohemian Rhapsody",
        "title": "Queen Bohemian Rhapsody",
        "entries": [
            {
                "_type": "url",
                "ie_key": "Youtube",
                "id": "fJ9rUzIMcZQ",
                "url": "https://www.youtube.com/watch?v=fJ9rUzIMcZQ",
                "title": "Queen – Bohemian Rhapsody (Official Video Remastered)",
                "channel": "Queen Official",
                "duration": 359.0,
                "view_count": 1900000000,
                "thumbnails": [
                    {"url": "https://i.ytimg.com/vi/fJ9rUzIMcZQ/hqdefault.jpg", "height": 202, "width": 360},
                    {"url": "https://i.ytimg.com/vi/fJ9rUzIMcZQ/hq720.jpg", "height": 404, "width": 720}
                ]
            },
            null,
            {
                "_type": "url",
                "ie_key": "Youtube",
                "id": "abc",
                "url": "https://www.youtube.com/watch?v=abc",
                "title": "Bohemian Rhapsody (Piano Cover)",
                "channel": "Some Pianist",
                "duration": 370.5,
                "view_count": null
            }
        ]
    }"#;

    const VIDEO_JSON: &str = r#"{
        "id": "fJ9rUzIMcZQ",
        "title": "Queen - Bohemian Rhapsody (Official Video Remastered)",
        "webpage_url": "https://www.youtube.com/watch?v=fJ9rUzIMcZQ",
        "uploader": "Queen Official",
        "duration": 359,
        "view_count": 1900000000,
        "artist": "Queen",
        "track": "Bohemian Rhapsody",
        "album": "A Night At The Opera",
        "upload_date": "20080801",
        "thumbnail": "https://i.ytimg.com/vi/fJ9rUzIMcZQ/maxresdefault.jpg"
    }"#;

    #[test]
    fn test_parse_search_skips_null_entries() {
        let items = parse_search(SEARCH_JSON).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].url, "https://www.youtube.com/watch?v=fJ9rUzIMcZQ");
        assert_eq!(items[0].channel.as_deref(), Some("Queen Official"));
        assert_eq!(items[0].view_count, Some(1_900_000_000));
        assert_eq!(
            items[0].thumbnail.as_deref(),
            Some("https://i.ytimg.com/vi/fJ9rUzIMcZQ/hq720.jpg")
        );
        assert_eq!(items[1].view_count, None);
    }

    #[test]
    fn test_parse_url_info_video() {
        match parse_url_info(VIDEO_JSON).unwrap() {
            UrlInfo::Video(c) => {
                assert_eq!(c.artist.as_deref(), Some("Queen"));
                assert_eq!(c.track.as_deref(), Some("Bohemian Rhapsody"));
                assert_eq!(c.year, Some(2008));
                assert_eq!(c.channel.as_deref(), Some("Queen Official"));
            }
            other => panic!("expected video, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_url_info_playlist() {
        match parse_url_info(SEARCH_JSON).unwrap() {
            UrlInfo::Playlist { title, items } => {
                assert_eq!(title.as_deref(), Some("Queen Bohemian Rhapsody"));
                assert_eq!(items.len(), 2);
            }
            other => panic!("expected playlist, got {:?}", other),
        }
    }

    #[test]
    fn test_flat_entry_without_full_url() {
        let json = r#"{"_type": "playlist", "entries": [
            {"ie_key": "Youtube", "id": "xyz", "url": "xyz", "title": "Song"}
        ]}"#;
        let items = parse_search(json).unwrap();
        assert_eq!(items[0].url, "https://www.youtube.com/watch?v=xyz");
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(matches!(
            parse_search("not json"),
            Err(SourceError::Parse { .. })
        ));
    }

    #[test]
    fn test_search_args() {
        let args = search_args("Queen Bohemian Rhapsody", 5);
        assert_eq!(args.last().unwrap(), "ytsearch5:Queen Bohemian Rhapsody");
        assert!(args.contains(&"--flat-playlist".to_string()));
    }

    #[test]
    fn test_download_args() {
        let args = download_args("https://youtu.be/x", Path::new("/tmp/out"), "7");
        let out_idx = args.iter().position(|a| a == "--output").unwrap();
        assert_eq!(args[out_idx + 1], "/tmp/out/7.%(ext)s");
        assert_eq!(args.last().unwrap(), "https://youtu.be/x");
        assert!(args.contains(&"after_move:filepath".to_string()));
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        let err = "WARNING: a\n\nWARNING: b\nERROR: c\nERROR: d\n";
        assert_eq!(tail(err), "WARNING: b | ERROR: c | ERROR: d");
    }

    #[test]
    fn test_missing_program_is_startup_error() {
        let ytdlp = YtDlp::new("definitely-not-a-real-yt-dlp-binary");
        assert!(matches!(
            ytdlp.version(),
            Err(StartupError::MissingTool { .. })
        ));
    }
}
