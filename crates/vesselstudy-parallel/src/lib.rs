//! Parallel execution of per-timestep transforms.
//!
//! Each task reads immutable inputs and writes one uniquely named snapshot,
//! so workers share nothing beyond the progress reporter.

pub mod progress;
pub mod runner;

pub use progress::{BarProgress, CountingProgress, ProgressReporter, SilentProgress};
pub use runner::{BatchReport, StageRunner};
