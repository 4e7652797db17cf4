use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::AudioCodec;
use crate::core::{parser, tagger};
use crate::models::DedupKey;

/// 원본 다운로드와 변환 결과를 두는 작업 디렉토리.
pub const WORK_DIR_NAME: &str = ".tunefetch-partial";

pub fn work_dir(output: &Path) -> PathBuf {
    output.join(WORK_DIR_NAME)
}

/// `dir`에 이미 있는 오디오 파일의 중복 키를 모은다 (하위 디렉토리는 보지 않음).
/// 키는 `"Artist - Title.ext"` 파일명에서, 안 되면 ID3 태그에서 얻는다.
pub fn scan_existing(dir: &Path) -> Result<Vec<DedupKey>> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }

    let mut keys = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || !is_audio(&path) {
            continue;
        }
        match key_for_file(&path) {
            Some(key) => keys.push(key),
            None => debug!(file = %path.display(), "cannot derive artist/title, ignoring"),
        }
    }

    keys.sort();
    Ok(keys)
}

fn key_for_file(path: &Path) -> Option<DedupKey> {
    if let Some((artist, title)) = parser::parse_filename(path) {
        return Some(DedupKey::new(&artist, &title));
    }
    match tagger::read_tags(path) {
        Ok(Some(info)) => Some(DedupKey::new(info.artist.as_deref()?, info.title.as_deref()?)),
        Ok(None) => None,
        Err(e) => {
            debug!(file = %path.display(), error = %e, "unreadable tag");
            None
        }
    }
}

/// 확장자가 알려진 오디오 형식인지 확인한다 (대소문자 무시).
fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            AudioCodec::all_extensions()
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn is_partial(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext, "part" | "ytdl" | "temp"))
        .unwrap_or(false)
}

/// 중단된 실행이 남긴 파일을 지운다. 지운 개수를 반환한다.
pub fn cleanup_partials(output: &Path) -> Result<usize> {
    let mut removed = 0;

    let work = work_dir(output);
    if work.exists() {
        std::fs::remove_dir_all(&work)
            .with_context(|| format!("cannot remove {}", work.display()))?;
        removed += 1;
    }

    for entry in std::fs::read_dir(output)? {
        let path = entry?.path();
        if path.is_file() && is_partial(&path) {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(file = %path.display(), error = %e, "cannot remove partial file"),
            }
        }
    }

    Ok(removed)
}
