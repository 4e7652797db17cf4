use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DownloadConfig {
    pub codec: AudioCodec,
    pub bitrate: String,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub embed_thumbnail: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            codec: AudioCodec::Mp3,
            bitrate: "192k".to_string(),
            retries: 2,
            retry_delay_ms: 1000,
            embed_thumbnail: true,
        }
    }
}

impl DownloadConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// 곡 검색 한 번에 요청할 후보 수
    pub candidates: usize,
    /// 허용하는 최대 길이 (초)
    pub max_duration_secs: u64,
    pub min_score: i32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            candidates: 5,
            max_duration_secs: 15 * 60,
            min_score: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub ytdlp: String,
    pub ffmpeg: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    Mp3,
    M4a,
    Opus,
    Ogg,
    Flac,
}

impl AudioCodec {
    pub fn extension(self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "mp3",
            AudioCodec::M4a => "m4a",
            AudioCodec::Opus => "opus",
            AudioCodec::Ogg => "ogg",
            AudioCodec::Flac => "flac",
        }
    }

    pub fn encoder(self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "libmp3lame",
            AudioCodec::M4a => "aac",
            AudioCodec::Opus => "libopus",
            AudioCodec::Ogg => "libvorbis",
            AudioCodec::Flac => "flac",
        }
    }

    pub fn is_lossless(self) -> bool {
        matches!(self, AudioCodec::Flac)
    }

    /// 디스크에서 기존 파일을 읽을 때 인식하는 확장자
    pub fn all_extensions() -> &'static [&'static str] {
        &["mp3", "m4a", "opus", "ogg", "flac"]
    }
}

fn config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
        .join(".config")
        .join("tunefetch")
        .join("config.toml")
}

/// `path`(없으면 기본 위치)에서 설정을 읽는다.
/// 파일이 없으면 기본값, 형식이 잘못되면 에러.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    parse_config(&content).with_context(|| format!("invalid config file {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}
