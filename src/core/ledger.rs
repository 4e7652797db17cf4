use std::collections::HashSet;

use parking_lot::Mutex;

use crate::models::{DedupKey, SkipReason};

#[derive(Debug, Default)]
struct LedgerState {
    /// 시작 시 출력 디렉토리에서 찾은 키
    on_disk: HashSet<DedupKey>,
    /// 이번 실행에서 완료한 키
    registered: HashSet<DedupKey>,
    /// 작업 스레드가 지금 다운로드 중인 키
    in_flight: HashSet<DedupKey>,
}

/// 이미 받은 트랙의 목록. 작업 스레드들이 공유한다.
#[derive(Debug, Default)]
pub struct Ledger {
    force: bool,
    state: Mutex<LedgerState>,
}

impl Ledger {
    /// `force`면 디스크의 기존 파일은 무시하지만 같은 실행 안의 중복은 여전히 걸러진다.
    pub fn new(force: bool) -> Self {
        Self {
            force,
            state: Mutex::default(),
        }
    }

    pub fn with_existing(force: bool, keys: impl IntoIterator<Item = DedupKey>) -> Self {
        let ledger = Self::new(force);
        ledger.state.lock().on_disk.extend(keys);
        ledger
    }

    pub fn seen(&self, key: &DedupKey) -> bool {
        let state = self.state.lock();
        state.registered.contains(key) || (!self.force && state.on_disk.contains(key))
    }

    pub fn register(&self, key: DedupKey) {
        let mut state = self.state.lock();
        state.in_flight.remove(&key);
        state.registered.insert(key);
    }

    /// 다운로드를 위해 `key`를 예약한다. `Err`에는 건너뛸 이유가 담긴다.
    pub fn claim(&self, key: &DedupKey) -> Result<(), SkipReason> {
        let mut state = self.state.lock();
        if state.registered.contains(key) || state.in_flight.contains(key) {
            return Err(SkipReason::DuplicateInRun);
        }
        if !self.force && state.on_disk.contains(key) {
            return Err(SkipReason::AlreadyDownloaded);
        }
        state.in_flight.insert(key.clone());
        Ok(())
    }

    /// 실패한 시도의 예약을 푼다.
    pub fn release(&self, key: &DedupKey) {
        self.state.lock().in_flight.remove(key);
    }

    pub fn existing_count(&self) -> usize {
        self.state.lock().on_disk.len()
    }

    pub fn registered_count(&self) -> usize {
        self.state.lock().registered.len()
    }
}
