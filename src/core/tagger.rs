use std::path::Path;

use anyhow::Result;
use id3::frame::Comment;
use id3::{Tag, TagLike, Version};

use crate::models::TrackInfo;

/// 오디오 파일의 ID3 태그를 읽는다.
/// 태그가 없거나 제목과 아티스트가 모두 없으면 `None`.
pub fn read_tags(path: &Path) -> Result<Option<TrackInfo>> {
    let tag = match Tag::read_from_path(path) {
        Ok(tag) => tag,
        Err(id3::Error {
            kind: id3::ErrorKind::NoTag,
            ..
        }) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if tag.title().is_none() && tag.artist().is_none() {
        return Ok(None);
    }

    let comment = tag.comments().next().map(|c| c.text.clone());

    let info = TrackInfo {
        title: tag.title().map(|s| s.to_string()),
        artist: tag.artist().map(|s| s.to_string()),
        album: tag.album().map(|s| s.to_string()),
        year: tag.year(),
        comment,
        album_art: tag.pictures().next().map(|pic| pic.data.clone()),
    };

    Ok(Some(info))
}

/// `info`를 ID3v2.4 태그로 쓴다. 값이 있는 필드만 건드린다.
pub fn write_tags(path: &Path, info: &TrackInfo) -> Result<()> {
    let mut tag = Tag::read_from_path(path).unwrap_or_else(|_| Tag::new());

    if let Some(ref title) = info.title {
        tag.set_title(title);
    }
    if let Some(ref artist) = info.artist {
        tag.set_artist(artist);
    }
    if let Some(ref album) = info.album {
        tag.set_album(album);
    }
    if let Some(year) = info.year {
        tag.set_year(year);
    }
    if let Some(ref comment) = info.comment {
        tag.remove_comment(Some("source"), None);
        tag.add_frame(Comment {
            lang: "eng".to_string(),
            description: "source".to_string(),
            text: comment.clone(),
        });
    }
    if let Some(ref art_data) = info.album_art {
        tag.remove_all_pictures();
        tag.add_frame(id3::frame::Picture {
            mime_type: detect_mime_type(art_data),
            picture_type: id3::frame::PictureType::CoverFront,
            description: String::new(),
            data: art_data.clone(),
        });
    }

    tag.write_to_path(path, Version::Id3v24)?;
    Ok(())
}

/// ffmpeg가 직접 태그를 쓰는 컨테이너용 `-metadata key=value` 인자.
pub fn ffmpeg_metadata_args(info: &TrackInfo) -> Vec<String> {
    let mut pairs = Vec::new();
    if let Some(ref title) = info.title {
        pairs.push(format!("title={}", title));
    }
    if let Some(ref artist) = info.artist {
        pairs.push(format!("artist={}", artist));
    }
    if let Some(ref album) = info.album {
        pairs.push(format!("album={}", album));
    }
    if let Some(year) = info.year {
        pairs.push(format!("date={}", year));
    }
    if let Some(ref comment) = info.comment {
        pairs.push(format!("comment={}", comment));
    }

    pairs
        .into_iter()
        .flat_map(|pair| ["-metadata".to_string(), pair])
        .collect()
}

/// 매직 바이트로 이미지 MIME 타입을 추정한다.
fn detect_mime_type(data: &[u8]) -> String {
    if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        "image/png".to_string()
    } else if data.starts_with(b"RIFF") && data.get(8..12) == Some(&b"WEBP"[..]) {
        "image/webp".to_string()
    } else {
        "image/jpeg".to_string()
    }
}
