use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::core::ledger::Ledger;
use crate::core::pool;
use crate::core::postprocess::PostProcess;
use crate::core::progress::{Reporter, Transition};
use crate::core::retry::RetryPolicy;
use crate::error::{ItemError, SourceError};
use crate::models::{DownloadResult, DownloadStatus, ResolvedTarget};
use crate::sources::MediaSource;

/// 확정된 대상들을 작업 풀에서 다운로드하고 후처리한다.
pub struct Dispatcher<'a> {
    source: &'a dyn MediaSource,
    post: &'a dyn PostProcess,
    ledger: &'a Ledger,
    reporter: &'a Reporter,
    retry: RetryPolicy,
    work_dir: PathBuf,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        source: &'a dyn MediaSource,
        post: &'a dyn PostProcess,
        ledger: &'a Ledger,
        reporter: &'a Reporter,
        retry: RetryPolicy,
        work_dir: &Path,
    ) -> Self {
        Self {
            source,
            post,
            ledger,
            reporter,
            retry,
            work_dir: work_dir.to_path_buf(),
        }
    }

    /// `threads`개의 작업 스레드로 모든 대상을 처리한다.
    /// 대상마다 정확히 하나의 결과를 대상 순서대로 반환한다.
    pub fn run(&self, targets: Vec<ResolvedTarget>, threads: usize) -> Vec<DownloadResult> {
        self.reporter.begin_phase("Downloading", targets.len());
        self.reporter.queue(&targets);
        pool::run_queue(targets, threads, |target| self.process(target))
    }

    fn process(&self, target: ResolvedTarget) -> DownloadResult {
        let started = Instant::now();
        let status = self.execute(&target);
        match &status {
            DownloadStatus::Success(path) => {
                info!(item = %target.display_name(), path = %path.display(), "done");
                self.reporter.transition(target.id, Transition::Done(path));
            }
            DownloadStatus::Skipped(reason) => {
                debug!(item = %target.display_name(), %reason, "skipped");
                self.reporter.transition(target.id, Transition::Skipped(*reason));
            }
            DownloadStatus::Failed(error) => {
                debug!(item = %target.display_name(), stage = error.stage(), "{}", error);
                self.reporter.transition(target.id, Transition::Failed(error));
            }
        }
        DownloadResult {
            target,
            status,
            elapsed: started.elapsed(),
        }
    }

    fn execute(&self, target: &ResolvedTarget) -> DownloadStatus {
        let key = target.key();
        if let Err(reason) = self.ledger.claim(&key) {
            return DownloadStatus::Skipped(reason);
        }

        match self.download_and_finish(target) {
            Ok(path) => {
                self.ledger.register(key);
                DownloadStatus::Success(path)
            }
            Err(e) => {
                self.ledger.release(&key);
                DownloadStatus::Failed(e)
            }
        }
    }

    fn download_and_finish(&self, target: &ResolvedTarget) -> Result<PathBuf, ItemError> {
        self.reporter.transition(target.id, Transition::Downloading);
        let stem = target.id.to_string();
        let raw = self
            .retry
            .run(
                &format!("{} download {}", self.source.name(), target.display_name()),
                |_| self.source.download(&target.url, &self.work_dir, &stem),
                SourceError::is_transient,
            )
            .map_err(ItemError::Download)?;

        self.reporter.transition(target.id, Transition::Transcoding);
        self.post.process(&raw, target)
    }
}
