use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use tracing::warn;

/// `items`를 최대 `min(threads, items.len())`개의 작업 스레드로 처리한다.
/// 결과는 입력 순서대로 돌려준다.
pub fn run_queue<T, R, F>(items: Vec<T>, threads: usize, work: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync + Send,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }
    let workers = threads.clamp(1, total);

    let pool = match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => pool,
        Err(e) => {
            warn!(error = %e, "worker pool unavailable, processing sequentially");
            return items.into_iter().map(work).collect();
        }
    };

    // One item per task so a slow download never holds back a whole chunk.
    pool.install(|| items.into_par_iter().with_max_len(1).map(&work).collect())
}
