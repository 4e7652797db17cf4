use std::thread;
use std::time::Duration;

use tracing::debug;

/// 한 번 대기하는 최대 시간.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// 블로킹 작업을 지수 백오프로 정해진 횟수만큼 재시도한다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// `retry`번째 재시도 전 대기 시간 (1부터).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_DELAY)
    }

    /// `op`가 성공하거나, 일시적이지 않은 에러를 내거나, 재시도 횟수를 다 쓸 때까지 실행한다.
    /// 실패하면 마지막 에러를 반환한다.
    pub fn run<T, E, F, P>(&self, label: &str, mut op: F, is_transient: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    debug!(
                        item = label,
                        attempt,
                        max = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying"
                    );
                    thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
