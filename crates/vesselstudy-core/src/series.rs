//! Discovery of time-indexed field series on disk.
//!
//! A series is a set of files named `{variable}-{step}.{ext}` in one
//! directory. Steps are discovered, never assumed contiguous or zero-based.

use crate::error::{Result, StudyError};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extension used by the solver's snapshot codec.
pub const DEFAULT_EXTENSION: &str = "D";

/// Path of one snapshot of a series.
pub fn series_path(dir: &Path, variable: &str, step: u32, ext: &str) -> PathBuf {
    dir.join(format!("{}-{}.{}", variable, step, ext))
}

/// Sorted set of timesteps present on disk for one variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesIndex {
    variable: String,
    steps: Vec<u32>,
}

impl SeriesIndex {
    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn steps(&self) -> &[u32] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn first_step(&self) -> u32 {
        self.steps[0]
    }

    /// Largest discovered step. Discovery never yields an empty index.
    pub fn final_step(&self) -> u32 {
        self.steps[self.steps.len() - 1]
    }

    pub fn contains(&self, step: u32) -> bool {
        self.steps.binary_search(&step).is_ok()
    }
}

fn series_pattern(variable: &str, ext: &str) -> Result<Regex> {
    Regex::new(&format!(
        r"^{}-(\d+)\.{}$",
        regex::escape(variable),
        regex::escape(ext)
    ))
    .map_err(|e| StudyError::InvalidOperation(format!("bad series pattern: {}", e)))
}

/// Scans `dir` for `{variable}-{step}.{ext}`.
///
/// Files whose suffix is not a plain integer (`Disp-final.D`,
/// `Disp-1a.D`) and files of other variables sharing the prefix
/// (`DispX-1.D`) are ignored. Returns [`StudyError::EmptyDiscovery`] when
/// nothing matches.
pub fn discover(dir: &Path, variable: &str, ext: &str) -> Result<SeriesIndex> {
    match try_discover(dir, variable, ext)? {
        Some(index) => Ok(index),
        None => Err(StudyError::EmptyDiscovery {
            variable: variable.to_string(),
            dir: dir.to_path_buf(),
        }),
    }
}

/// Soft form of [`discover`] for optional inputs: an empty or missing
/// directory yields `Ok(None)`.
pub fn try_discover(dir: &Path, variable: &str, ext: &str) -> Result<Option<SeriesIndex>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let pattern = series_pattern(variable, ext)?;
    let mut steps = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(caps) = pattern.captures(name) {
            // Steps beyond u32 are not produced by the solver; skip them.
            if let Ok(step) = caps[1].parse::<u32>() {
                steps.push(step);
            }
        }
    }
    if steps.is_empty() {
        return Ok(None);
    }
    steps.sort_unstable();
    steps.dedup();
    debug!(
        "discovered {} steps of '{}' in {:?} ({}..={})",
        steps.len(),
        variable,
        dir,
        steps[0],
        steps[steps.len() - 1]
    );
    Ok(Some(SeriesIndex {
        variable: variable.to_string(),
        steps,
    }))
}
