use std::sync::atomic::{AtomicUsize, Ordering};

/// Receives completion fractions in `[0, 1]`.
pub trait ProgressSink: Sync {
    fn progress(&self, fraction: f64);
}

impl<F: Fn(f64) + Sync> ProgressSink for F {
    fn progress(&self, fraction: f64) {
        self(fraction)
    }
}

/// Sink that drops every update.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn progress(&self, _fraction: f64) {}
}

/// Batches per-item completions so the sink sees about 200 updates per stage.
pub(crate) struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    total: usize,
    step: usize,
    done: AtomicUsize,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink, total: usize) -> Self {
        Self {
            sink,
            total,
            step: (total / 200).max(1),
            done: AtomicUsize::new(0),
        }
    }

    pub(crate) fn item_done(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done % self.step == 0 || done == self.total {
            self.sink.progress(done as f64 / self.total.max(1) as f64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn tracker_throttles_updates() {
        let updates = Mutex::new(Vec::new());
        let sink = |fraction: f64| updates.lock().expect("lock").push(fraction);
        let tracker = ProgressTracker::new(&sink, 1000);
        for _ in 0..1000 {
            tracker.item_done();
        }

        let updates = updates.into_inner().expect("lock");
        assert_eq!(200, updates.len());
        assert_eq!(Some(&1.0), updates.last());
    }

    #[test]
    fn tracker_reports_every_item_for_small_batches() {
        let count = AtomicUsize::new(0);
        let sink = |_: f64| {
            count.fetch_add(1, Ordering::Relaxed);
        };
        let tracker = ProgressTracker::new(&sink, 3);
        for _ in 0..3 {
            tracker.item_done();
        }
        assert_eq!(3, count.load(Ordering::Relaxed));
    }
}
