use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Observer for batch progress. Passed explicitly to the runner; reporting
/// never affects the result of a batch.
pub trait ProgressReporter: Send + Sync {
    fn begin(&self, label: &str, total: u64);
    fn advance(&self, delta: u64);
    fn finish(&self);
}

/// Reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn begin(&self, _label: &str, _total: u64) {}
    fn advance(&self, _delta: u64) {}
    fn finish(&self) {}
}

/// Terminal progress bar.
#[derive(Default)]
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn style() -> ProgressStyle {
        match ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} | ETA: {eta}",
        ) {
            Ok(style) => style.progress_chars("█▉▊▋▌▍▎▏ "),
            Err(e) => {
                warn!("invalid progress template: {}", e);
                ProgressStyle::default_bar()
            }
        }
    }
}

impl ProgressReporter for BarProgress {
    fn begin(&self, label: &str, total: u64) {
        let pb = ProgressBar::new(total);
        pb.set_style(Self::style());
        pb.set_message(label.to_string());
        if let Some(old) = self.bar.lock().replace(pb) {
            old.finish_and_clear();
        }
    }

    fn advance(&self, delta: u64) {
        if let Some(pb) = self.bar.lock().as_ref() {
            pb.inc(delta);
        }
    }

    fn finish(&self) {
        if let Some(pb) = self.bar.lock().take() {
            pb.finish_with_message("done");
        }
    }
}

/// Counts progress events; useful for monitoring without a terminal.
#[derive(Debug, Default)]
pub struct CountingProgress {
    batches: AtomicU64,
    advanced: AtomicU64,
    expected: AtomicU64,
}

impl CountingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn advanced(&self) -> u64 {
        self.advanced.load(Ordering::Relaxed)
    }

    pub fn expected(&self) -> u64 {
        self.expected.load(Ordering::Relaxed)
    }
}

impl ProgressReporter for CountingProgress {
    fn begin(&self, _label: &str, total: u64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.expected.fetch_add(total, Ordering::Relaxed);
    }

    fn advance(&self, delta: u64) {
        self.advanced.fetch_add(delta, Ordering::Relaxed);
    }

    fn finish(&self) {}
}
