use crate::progress::{ProgressReporter, SilentProgress};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use vesselstudy_core::{Result, StudyError};

/// Outcome of a batch in which every step succeeded.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub label: String,
    pub completed: usize,
    pub elapsed: Duration,
}

/// Executes an independent per-timestep transform over a bounded pool.
///
/// Every step runs to completion even when others fail; the batch then
/// returns [`StudyError::StageFailed`] naming the first failure observed
/// and how many steps failed in total. Panics inside a task are caught and
/// reported the same way.
pub struct StageRunner {
    pool: ThreadPool,
    threads: usize,
    reporter: Arc<dyn ProgressReporter>,
}

impl StageRunner {
    pub fn new(concurrency: usize, reporter: Arc<dyn ProgressReporter>) -> Result<Self> {
        if concurrency == 0 {
            return Err(StudyError::InvalidOperation(
                "runner concurrency must be positive".to_string(),
            ));
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(concurrency)
            .thread_name(|i| format!("vesselstudy-worker-{}", i))
            .build()
            .map_err(|e| StudyError::InvalidOperation(format!("thread pool: {}", e)))?;
        Ok(Self {
            pool,
            threads: concurrency,
            reporter,
        })
    }

    pub fn silent(concurrency: usize) -> Result<Self> {
        Self::new(concurrency, Arc::new(SilentProgress))
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn run<F>(&self, label: &str, steps: &[u32], task: F) -> Result<BatchReport>
    where
        F: Fn(u32) -> Result<()> + Send + Sync,
    {
        let start = Instant::now();
        debug!(
            "{}: {} steps on {} worker(s)",
            label,
            steps.len(),
            self.threads
        );
        self.reporter.begin(label, steps.len() as u64);

        let finished = AtomicUsize::new(0);
        let reporter = &self.reporter;
        let outcomes: Vec<(usize, u32, Result<()>)> = self.pool.install(|| {
            steps
                .par_iter()
                .map(|&step| {
                    let result = catch_unwind(AssertUnwindSafe(|| task(step))).unwrap_or_else(
                        |_| {
                            Err(StudyError::InvalidOperation(format!(
                                "task for step {} panicked",
                                step
                            )))
                        },
                    );
                    let order = finished.fetch_add(1, Ordering::SeqCst);
                    reporter.advance(1);
                    (order, step, result)
                })
                .collect()
        });
        self.reporter.finish();

        let mut failures: Vec<(usize, u32, StudyError)> = outcomes
            .into_iter()
            .filter_map(|(order, step, r)| r.err().map(|e| (order, step, e)))
            .collect();

        if failures.is_empty() {
            let elapsed = start.elapsed();
            info!(
                "{}: {} steps done in {:.2}s",
                label,
                steps.len(),
                elapsed.as_secs_f64()
            );
            return Ok(BatchReport {
                label: label.to_string(),
                completed: steps.len(),
                elapsed,
            });
        }

        for (_, step, e) in &failures {
            warn!("{}: step {} failed: {}", label, step, e);
        }
        let count = failures.len();
        failures.sort_by_key(|(order, _, _)| *order);
        let (_, step, source) = failures.swap_remove(0);
        Err(StudyError::StageFailed {
            step,
            failures: count,
            source: Box::new(source),
        })
    }
}
