use parking_lot::Mutex;

/// Receives `(current, total, message)` progress notifications.
///
/// Implementations must tolerate repeated calls, including several
/// completion calls in a row.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, current: usize, total: usize, message: &str);
}

/// Reporter that discards everything. The engine default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _current: usize, _total: usize, _message: &str) {}
}

impl<F> ProgressReporter for F
where
    F: Fn(usize, usize, &str) + Send + Sync,
{
    fn report(&self, current: usize, total: usize, message: &str) {
        self(current, total, message)
    }
}

/// Pipeline stages and the share of overall progress each one owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Encoding,
    Reduction,
    Clustering,
    Summarization,
}

impl Stage {
    /// Percent range `[start, end]` of the whole run covered by this stage.
    pub fn range(self) -> (usize, usize) {
        match self {
            Stage::Encoding => (0, 30),
            Stage::Reduction => (30, 60),
            Stage::Clustering => (60, 85),
            Stage::Summarization => (85, 100),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Encoding => "encoding",
            Stage::Reduction => "reduction",
            Stage::Clustering => "clustering",
            Stage::Summarization => "summarization",
        }
    }

    /// Overall percent after `done` of `total` steps of this stage.
    pub fn percent(self, done: usize, total: usize) -> usize {
        let (start, end) = self.range();
        if total == 0 {
            return end;
        }
        start + (end - start) * done.min(total) / total
    }
}

/// Wraps a reporter so the percentages it sees never go backwards.
pub struct MonotonicReporter<R> {
    inner: R,
    last: Mutex<usize>,
}

impl<R: ProgressReporter> MonotonicReporter<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            last: Mutex::new(0),
        }
    }

    pub fn last_percent(&self) -> usize {
        *self.last.lock()
    }
}

impl<R: ProgressReporter> ProgressReporter for MonotonicReporter<R> {
    fn report(&self, current: usize, total: usize, message: &str) {
        let percent = if total == 0 {
            100
        } else {
            (current.min(total) * 100) / total
        };
        let mut last = self.last.lock();
        *last = (*last).max(percent);
        self.inner.report(*last, 100, message);
    }
}
