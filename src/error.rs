use std::path::PathBuf;

use thiserror::Error;

/// 외부 도구 한 번 호출의 실패.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {code}: {stderr}")]
    Exit {
        tool: String,
        code: String,
        stderr: String,
    },
    #[error("could not parse {tool} output: {source}")]
    Parse {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{tool} reported no output file")]
    NoOutput { tool: String },
}

impl SourceError {
    /// 다시 시도하면 성공할 여지가 있는지.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Spawn { .. } | SourceError::Parse { .. } => false,
            SourceError::NoOutput { .. } => true,
            SourceError::Exit { stderr, .. } => {
                let lowered = stderr.to_lowercase();
                !PERMANENT_MARKERS.iter().any(|m| lowered.contains(m))
            }
        }
    }
}

const PERMANENT_MARKERS: &[&str] = &[
    "video unavailable",
    "private video",
    "has been removed",
    "is not available",
    "unsupported url",
    "sign in to confirm your age",
];

/// 항목 단위 실패. 해당 항목만 실패로 처리하고 계속 진행한다.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("cannot resolve: {0}")]
    Resolution(String),
    #[error("download failed: {0}")]
    Download(#[source] SourceError),
    #[error("post-processing failed: {0}")]
    PostProcess(String),
}

impl ItemError {
    pub fn stage(&self) -> &'static str {
        match self {
            ItemError::Resolution(_) => "resolve",
            ItemError::Download(_) => "download",
            ItemError::PostProcess(_) => "post-process",
        }
    }
}

/// 실행 전체를 중단시키는 에러.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("input file '{0}' not found")]
    MissingInput(PathBuf),
    #[error("no valid entries found in '{0}'")]
    EmptyInput(PathBuf),
    #[error("required tool '{tool}' is not available: {reason}")]
    MissingTool { tool: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exit(stderr: &str) -> SourceError {
        SourceError::Exit {
            tool: "yt-dlp".to_string(),
            code: "1".to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_network_errors_are_transient() {
        assert!(exit("ERROR: Unable to download webpage: timed out").is_transient());
        assert!(SourceError::NoOutput {
            tool: "yt-dlp".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_unavailable_video_is_permanent() {
        assert!(!exit("ERROR: [youtube] abc: Video unavailable").is_transient());
        assert!(!exit("ERROR: [youtube] abc: Private video").is_transient());
    }

    #[test]
    fn test_spawn_failure_is_permanent() {
        let err = SourceError::Spawn {
            tool: "yt-dlp".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn test_item_error_stage() {
        assert_eq!(ItemError::Resolution("x".into()).stage(), "resolve");
        assert_eq!(ItemError::Download(exit("boom")).stage(), "download");
        assert_eq!(ItemError::PostProcess("x".into()).stage(), "post-process");
    }
}
