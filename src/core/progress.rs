use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;

use crate::error::ItemError;
use crate::models::{InputEntry, ResolvedTarget, SkipReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ItemState {
    Queued,
    Downloading,
    Transcoding,
    Done,
    Skipped,
    Failed,
}

impl ItemState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Done | ItemState::Skipped | ItemState::Failed)
    }
}

/// 작업 스레드가 보고하는 상태 변화.
#[derive(Debug, Clone, Copy)]
pub enum Transition<'a> {
    Downloading,
    Transcoding,
    Done(&'a Path),
    Skipped(SkipReason),
    Failed(&'a ItemError),
}

impl Transition<'_> {
    fn state(&self) -> ItemState {
        match self {
            Transition::Downloading => ItemState::Downloading,
            Transition::Transcoding => ItemState::Transcoding,
            Transition::Done(_) => ItemState::Done,
            Transition::Skipped(_) => ItemState::Skipped,
            Transition::Failed(_) => ItemState::Failed,
        }
    }
}

/// 최종 상태별 개수.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub targets: usize,
    pub done: usize,
    pub skipped: usize,
    pub download_failed: usize,
    pub postprocess_failed: usize,
    pub unresolved: usize,
}

impl Summary {
    pub fn failed(&self) -> usize {
        self.download_failed + self.postprocess_failed + self.unresolved
    }
}

struct ItemSlot {
    label: String,
    state: ItemState,
    bar: Option<ProgressBar>,
}

#[derive(Default)]
struct ReporterState {
    items: HashMap<usize, ItemSlot>,
    summary: Summary,
}

/// 실행 상황을 실시간으로 보여주고 집계를 유지한다. 여러 스레드에서 호출해도 안전하다.
pub struct Reporter {
    multi: MultiProgress,
    overall: ProgressBar,
    state: Mutex<ReporterState>,
}

fn overall_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn item_style() -> ProgressStyle {
    ProgressStyle::with_template("  {spinner:.green} {prefix} {msg:.dim} ({elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

impl Reporter {
    /// `visible = false`면 아무것도 그리지 않는다 (테스트, 비대화형 출력용).
    pub fn new(visible: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let multi = MultiProgress::with_draw_target(target);
        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(overall_style());

        Self {
            multi,
            overall,
            state: Mutex::default(),
        }
    }

    /// 전체 진행 막대를 `len`단계짜리 새 단계로 초기화한다.
    pub fn begin_phase(&self, name: &str, len: usize) {
        self.overall.reset();
        self.overall.set_length(len as u64);
        self.overall.set_prefix(name.to_string());
        self.overall.set_message("");
        self.overall.enable_steady_tick(Duration::from_millis(120));
    }

    pub fn entry_resolved(&self, entry: &InputEntry, targets: usize) {
        self.overall.set_message(format!("({}) {} → {}", entry.line, entry.raw, targets));
        self.overall.inc(1);
    }

    pub fn entry_failed(&self, entry: &InputEntry, error: &ItemError) {
        self.state.lock().summary.unresolved += 1;
        self.println(format!("✗ ({}) {} '{}': {}", entry.line, entry.kind.label(), entry.raw, error));
        self.overall.inc(1);
    }

    /// 대상들을 Queued 상태로 등록한다.
    pub fn queue(&self, targets: &[ResolvedTarget]) {
        let mut state = self.state.lock();
        state.summary.targets += targets.len();
        for target in targets {
            state.items.entry(target.id).or_insert_with(|| ItemSlot {
                label: format!("({}) {}", target.entry.line, target.display_name()),
                state: ItemState::Queued,
                bar: None,
            });
        }
    }

    /// 상태 변화를 적용하고 적용 여부를 반환한다.
    /// 뒤로 가는 변화와 최종 상태 이후의 변화는 무시한다.
    pub fn transition(&self, id: usize, transition: Transition<'_>) -> bool {
        let next = transition.state();
        let mut state = self.state.lock();
        let slot = state.items.entry(id).or_insert_with(|| ItemSlot {
            label: format!("#{}", id),
            state: ItemState::Queued,
            bar: None,
        });

        if slot.state.is_terminal() || next <= slot.state {
            return false;
        }
        slot.state = next;

        match transition {
            Transition::Downloading | Transition::Transcoding => {
                let message = if next == ItemState::Downloading {
                    "downloading"
                } else {
                    "transcoding"
                };
                let label = slot.label.clone();
                let bar = slot.bar.get_or_insert_with(|| {
                    let bar = self.multi.add(ProgressBar::new_spinner());
                    bar.set_style(item_style());
                    bar.set_prefix(label);
                    bar.enable_steady_tick(Duration::from_millis(120));
                    bar
                });
                bar.set_message(message);
            }
            Transition::Done(path) => {
                let line = format!(
                    "✓ {} → {}",
                    slot.label,
                    path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
                );
                Self::close(&self.multi, slot);
                state.summary.done += 1;
                drop(state);
                self.finish_line(line);
            }
            Transition::Skipped(reason) => {
                let line = format!("- {} (skipped: {})", slot.label, reason);
                Self::close(&self.multi, slot);
                state.summary.skipped += 1;
                drop(state);
                self.finish_line(line);
            }
            Transition::Failed(error) => {
                let line = format!("✗ {}: {}", slot.label, error);
                Self::close(&self.multi, slot);
                match error {
                    ItemError::PostProcess(_) => state.summary.postprocess_failed += 1,
                    ItemError::Download(_) => state.summary.download_failed += 1,
                    ItemError::Resolution(_) => state.summary.unresolved += 1,
                }
                drop(state);
                self.finish_line(line);
            }
        }
        true
    }

    fn close(multi: &MultiProgress, slot: &mut ItemSlot) {
        if let Some(bar) = slot.bar.take() {
            bar.finish_and_clear();
            multi.remove(&bar);
        }
    }

    fn finish_line(&self, line: String) {
        self.println(line);
        self.overall.inc(1);
    }

    fn println(&self, line: String) {
        let _ = self.multi.println(line);
    }

    pub fn state_of(&self, id: usize) -> Option<ItemState> {
        self.state.lock().items.get(&id).map(|slot| slot.state)
    }

    pub fn summary(&self) -> Summary {
        self.state.lock().summary.clone()
    }

    /// 그리기를 멈추고 최종 집계를 반환한다.
    pub fn finish(&self) -> Summary {
        self.overall.finish_and_clear();
        self.summary()
    }
}
