use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// 파일명에 쓸 수 없는 문자를 `_`로 바꾼다.
pub fn sanitize_filename(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| {
            if c == '/' || c == '\0' {
                return '_';
            }
            if cfg!(target_os = "windows") {
                if matches!(c, '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                    return '_';
                }
                if c.is_ascii_control() {
                    return '_';
                }
            }
            if cfg!(target_os = "macos") && c == ':' {
                return '_';
            }
            c
        })
        .collect();

    // Leading dots would hide the file; trailing dots break Windows.
    cleaned.trim().trim_matches('.').trim().to_string()
}

/// `"{artist} - {title}.{ext}"` 파일명. 어느 한쪽이라도 비면 `None`.
pub fn build_filename(artist: &str, title: &str, ext: &str) -> Option<String> {
    let artist = sanitize_filename(artist);
    let title = sanitize_filename(title);
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some(format!("{} - {}.{}", artist, title, ext))
}

/// 완성된 파일을 `dest`로 옮긴다. 기존 파일은 덮어쓴다.
/// 파일시스템이 다르면 복사 후 삭제한다.
pub fn move_into_place(src: &Path, dest: &Path) -> Result<PathBuf> {
    if src == dest {
        return Ok(dest.to_path_buf());
    }
    if !src.is_file() {
        bail!("source file is missing: {}", src.display());
    }
    if dest.exists() {
        std::fs::remove_file(dest)
            .with_context(|| format!("cannot replace {}", dest.display()))?;
    }

    if std::fs::rename(src, dest).is_err() {
        std::fs::copy(src, dest)
            .with_context(|| format!("cannot write {}", dest.display()))?;
        std::fs::remove_file(src)?;
    }
    Ok(dest.to_path_buf())
}
