use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::{AudioCodec, DownloadConfig};
use crate::core::{renamer, tagger};
use crate::error::{ItemError, StartupError};
use crate::models::{ResolvedTarget, TrackInfo};

const TOOL: &str = "ffmpeg";

/// 받은 원본 파일을 태그가 붙은 출력 파일로 만든다.
pub trait PostProcess: Sync {
    /// 최종 경로를 반환한다. 결과와 상관없이 원본 파일은 지워진다.
    fn process(&self, raw: &Path, target: &ResolvedTarget) -> Result<PathBuf, ItemError>;
}

/// 썸네일 URL에서 커버 이미지를 받아온다.
pub struct CoverFetcher {
    client: reqwest::blocking::Client,
}

impl CoverFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("tunefetch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .build()
            .context("cannot create the HTTP client for cover art")?;
        Ok(Self { client })
    }

    pub fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let data = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("cannot fetch cover art from {}", url))?
            .error_for_status()?
            .bytes()?
            .to_vec();
        Ok(data)
    }
}

/// ffmpeg 변환 후 태그를 쓰고 최종 위치로 옮긴다.
pub struct Ffmpeg {
    program: String,
    codec: AudioCodec,
    bitrate: String,
    output_dir: PathBuf,
    work_dir: PathBuf,
    cover: Option<CoverFetcher>,
}

impl Ffmpeg {
    pub fn new(
        program: impl Into<String>,
        download: &DownloadConfig,
        output_dir: &Path,
        work_dir: &Path,
    ) -> Result<Self> {
        let cover = if download.embed_thumbnail {
            Some(CoverFetcher::new()?)
        } else {
            None
        };
        Ok(Self {
            program: program.into(),
            codec: download.codec,
            bitrate: download.bitrate.clone(),
            output_dir: output_dir.to_path_buf(),
            work_dir: work_dir.to_path_buf(),
            cover,
        })
    }

    /// 실행 파일이 동작하는지 확인하고 `-version` 첫 줄을 반환한다.
    pub fn version(&self) -> Result<String, StartupError> {
        let missing = |reason: String| StartupError::MissingTool {
            tool: self.program.clone(),
            reason,
        };
        let output = Command::new(&self.program)
            .arg("-version")
            .output()
            .map_err(|e| missing(e.to_string()))?;
        if !output.status.success() {
            return Err(missing(format!("exited with {}", output.status)));
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    /// 대상의 최종 경로. 아티스트나 제목이 정리 후 비면 `None`.
    pub fn destination(&self, target: &ResolvedTarget) -> Option<PathBuf> {
        renamer::build_filename(&target.artist, &target.title, self.codec.extension())
            .map(|name| self.output_dir.join(name))
    }

    fn transcode(&self, raw: &Path, tmp: &Path, info: &TrackInfo) -> Result<(), ItemError> {
        // MP3 gets its tags from id3 afterwards.
        let metadata = if self.codec == AudioCodec::Mp3 {
            Vec::new()
        } else {
            tagger::ffmpeg_metadata_args(info)
        };
        let args = transcode_args(raw, tmp, self.codec, &self.bitrate, metadata);
        debug!(program = %self.program, ?args, "running");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| ItemError::PostProcess(format!("cannot run {}: {}", self.program, e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no error output")
                .trim()
                .to_string();
            return Err(ItemError::PostProcess(format!(
                "{} exited with {}: {}",
                TOOL, output.status, reason
            )));
        }
        if !tmp.is_file() {
            return Err(ItemError::PostProcess(format!("{} wrote no output", TOOL)));
        }
        Ok(())
    }

    fn track_info(&self, target: &ResolvedTarget) -> TrackInfo {
        let mut info = TrackInfo::from_target(target);
        if let (Some(cover), Some(url)) = (&self.cover, &target.thumbnail) {
            match cover.fetch(url) {
                Ok(data) => info.album_art = Some(data),
                Err(e) => warn!(item = %target.display_name(), "skipping cover art: {:#}", e),
            }
        }
        info
    }

    fn finish(&self, raw: &Path, tmp: &Path, target: &ResolvedTarget) -> Result<PathBuf, ItemError> {
        let dest = self.destination(target).ok_or_else(|| {
            ItemError::PostProcess(format!("no usable filename for '{}'", target.display_name()))
        })?;
        let info = self.track_info(target);

        self.transcode(raw, tmp, &info)?;
        if self.codec == AudioCodec::Mp3 {
            tagger::write_tags(tmp, &info)
                .map_err(|e| ItemError::PostProcess(format!("cannot write tags: {:#}", e)))?;
        }
        renamer::move_into_place(tmp, &dest)
            .map_err(|e| ItemError::PostProcess(format!("cannot move into place: {:#}", e)))
    }
}

impl PostProcess for Ffmpeg {
    fn process(&self, raw: &Path, target: &ResolvedTarget) -> Result<PathBuf, ItemError> {
        let tmp = self
            .work_dir
            .join(format!("{}.out.{}", target.id, self.codec.extension()));
        let result = self.finish(raw, &tmp, target);

        let _ = std::fs::remove_file(raw);
        if result.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        result
    }
}

pub fn transcode_args(
    raw: &Path,
    tmp: &Path,
    codec: AudioCodec,
    bitrate: &str,
    metadata: Vec<String>,
) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-y".to_string(),
        "-i".to_string(),
        raw.to_string_lossy().into_owned(),
        "-vn".to_string(),
        "-map_metadata".to_string(),
        "-1".to_string(),
        "-c:a".to_string(),
        codec.encoder().to_string(),
    ];
    if !codec.is_lossless() && !bitrate.trim().is_empty() {
        args.push("-b:a".to_string());
        args.push(bitrate.trim().to_string());
    }
    args.extend(metadata);
    args.push(tmp.to_string_lossy().into_owned());
    args
}
