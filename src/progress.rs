//! Terminal progress bars for the long-running build and install stages

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::{
    borrow::Cow,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Set of progress bars displayed together on stderr
///
/// Nothing else should be written to the terminal while bars are on display.
/// Diagnostics go to the log instead.
#[derive(Clone, Debug, Default)]
pub struct ProgressReport(MultiProgress);
//
impl ProgressReport {
    /// Report progress on stderr
    pub fn new() -> Self {
        Self::default()
    }

    /// Track progress without displaying anything
    ///
    /// Used by `--quiet` runs and by tests.
    pub fn hidden() -> Self {
        Self(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    /// Start tracking a new operation
    pub fn add(&self, what: impl Into<Cow<'static, str>>, config: ProgressConfig) -> ProgressTracker {
        let ProgressConfig {
            initial_work,
            can_add_work,
        } = config;
        let trailer = match initial_work {
            Work::Steps(_) => "{pos}/{len} ({per_sec})",
            Work::PercentSteps(_) => "{percent:>2}% (~{eta} left)",
            Work::Bytes(_) => "{decimal_bytes}/{decimal_total_bytes} ({decimal_bytes_per_sec})",
        };
        let style = ProgressStyle::with_template(&format!("{{prefix}} {{wide_bar}} {trailer}"))
            .expect("all templates above should be valid indicatif styles");
        let bar = ProgressBar::new(initial_work.into())
            .with_prefix(what.into())
            .with_style(style);
        let shown = u64::from(initial_work) > 0;
        if shown {
            self.0.add(bar.clone());
        }
        ProgressTracker {
            bar,
            report: self.0.clone(),
            shown: Arc::new(AtomicBool::new(shown)),
            open_ended: Arc::new(AtomicBool::new(can_add_work)),
        }
    }
}

/// Progress bar configuration
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct ProgressConfig {
    /// Initial length of the progress bar
    initial_work: Work,

    /// More work may be announced after the bar is created
    can_add_work: bool,
}
//
impl ProgressConfig {
    /// Bar with a known initial amount of work
    pub fn new(initial_work: Work) -> Self {
        Self {
            initial_work,
            can_add_work: false,
        }
    }

    /// Allow announcing more work later on
    pub fn allow_adding_work(self) -> Self {
        Self {
            can_add_work: true,
            ..self
        }
    }
}

/// Amount of work to be tracked
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Work {
    /// Steps, displayed as a precise count
    Steps(usize),

    /// Steps, displayed as a percentage
    PercentSteps(usize),

    /// Bytes to be transferred
    Bytes(u64),
}
//
impl From<Work> for u64 {
    fn from(value: Work) -> Self {
        match value {
            Work::Steps(s) | Work::PercentSteps(s) => s as u64,
            Work::Bytes(b) => b,
        }
    }
}

/// Handle to one progress bar, shareable between tasks
#[derive(Clone, Debug)]
pub struct ProgressTracker {
    /// Bar of this operation
    bar: ProgressBar,

    /// Report that the bar belongs to
    report: MultiProgress,

    /// Truth that the bar was added to the report
    shown: Arc<AtomicBool>,

    /// Truth that more work can still be announced
    open_ended: Arc<AtomicBool>,
}
//
impl ProgressTracker {
    /// Record that some work was done
    ///
    /// Returns truth that the operation is complete, in which case the bar is
    /// removed from the display.
    pub fn make_progress(&self, progress: u64) -> bool {
        self.bar.inc(progress);
        let current = self.bar.position();
        let max = self.bar.length().unwrap_or(0);
        debug_assert!(current <= max, "recorded more progress than expected");
        let finished = current >= max && !self.open_ended.load(Ordering::Acquire);
        if finished {
            self.bar.finish_and_clear();
            self.report.remove(&self.bar);
        }
        finished
    }

    /// Announce more work
    ///
    /// Only allowed if the bar was configured with
    /// [`ProgressConfig::allow_adding_work()`], and until
    /// [`done_adding_work()`](Self::done_adding_work) is called.
    pub fn add_work(&self, more: u64) {
        assert!(
            self.open_ended.load(Ordering::Acquire),
            "should not add work after done_adding_work"
        );
        if more > 0 && !self.shown.swap(true, Ordering::AcqRel) {
            self.report.add(self.bar.clone());
        }
        self.bar.inc_length(more);
    }

    /// Promise that no more work will be announced
    pub fn done_adding_work(&self) {
        assert!(
            self.open_ended.swap(false, Ordering::AcqRel),
            "should only close a progress bar once"
        );
        self.make_progress(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_work() {
        let report = ProgressReport::hidden();
        let tracker = report.add("test", ProgressConfig::new(Work::Steps(3)));
        assert!(!tracker.make_progress(1));
        assert!(!tracker.make_progress(1));
        assert!(tracker.make_progress(1));
    }

    #[test]
    fn open_ended_work() {
        let report = ProgressReport::hidden();
        let tracker = report.add(
            "download",
            ProgressConfig::new(Work::Bytes(0)).allow_adding_work(),
        );
        tracker.add_work(10);
        assert!(!tracker.make_progress(10));
        tracker.add_work(5);
        assert!(!tracker.make_progress(5));
        tracker.done_adding_work();
        assert!(tracker.bar.is_finished());
    }

    #[test]
    fn every_kind_of_work_has_a_style() {
        let report = ProgressReport::hidden();
        for work in [Work::Steps(2), Work::PercentSteps(2), Work::Bytes(2)] {
            let tracker = report.add("test", ProgressConfig::new(work));
            assert!(!tracker.make_progress(1));
            assert!(tracker.make_progress(1));
        }
    }
}
