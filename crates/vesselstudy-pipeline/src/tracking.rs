//! Delayed-onset copies of a displacement series, used to build tracking
//! targets whose motion starts part way through the run.

use std::path::Path;
use tracing::info;
use vesselstudy_core::{discover, read_snapshot, series_path, write_snapshot, Result, StudyError};
use vesselstudy_parallel::StageRunner;

/// Where raw step `i` of the retimed series is sampled from the raw series.
/// Returns `None` before onset, else the left raw step and the blend weight
/// of its right neighbour.
pub fn source_position(step: u32, onset: u32, final_step: u32) -> Option<(u32, f64)> {
    if step < onset {
        return None;
    }
    if step >= final_step || onset >= final_step {
        return Some((final_step.saturating_sub(1), 1.0));
    }
    let s = (step - onset) as f64 / (final_step - onset) as f64 * final_step as f64;
    let left = s.floor() as u32;
    if left >= final_step {
        return Some((final_step - 1, 1.0));
    }
    Some((left, s - left as f64))
}

/// Writes `variable-0..=final` into `out_dir`: zeros before
/// `round(target * final)`, then the raw series from `raw_dir` linearly
/// resampled over the remaining window. The final step is copied verbatim.
pub fn retime_series(
    runner: &StageRunner,
    raw_dir: &Path,
    out_dir: &Path,
    variable: &str,
    ext: &str,
    target: f64,
) -> Result<u32> {
    let index = discover(raw_dir, variable, ext)?;
    let final_step = index.final_step();
    if let Some(hole) = (0..=final_step).find(|s| !index.contains(*s)) {
        return Err(StudyError::MissingInput(series_path(raw_dir, variable, hole, ext)));
    }
    let onset = (target * final_step as f64).round() as u32;
    let zeros = read_snapshot(&series_path(raw_dir, variable, 0, ext))? * 0.0;
    let steps: Vec<u32> = (0..=final_step).collect();

    runner.run("retime", &steps, |i| {
        let out = series_path(out_dir, variable, i, ext);
        if i == final_step {
            return write_snapshot(&out, &read_snapshot(&series_path(raw_dir, variable, i, ext))?);
        }
        match source_position(i, onset, final_step) {
            None => write_snapshot(&out, &zeros),
            Some((left, m)) => {
                let a = read_snapshot(&series_path(raw_dir, variable, left, ext))?;
                let b = read_snapshot(&series_path(raw_dir, variable, left + 1, ext))?;
                write_snapshot(&out, &(a * (1.0 - m) + b * m))
            }
        }
    })?;
    info!(
        "retimed {} over {} steps with onset at {}",
        variable,
        final_step + 1,
        onset
    );
    Ok(onset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn positions_stretch_the_window() {
        assert_eq!(source_position(3, 5, 10), None);
        assert_eq!(source_position(5, 5, 10), Some((0, 0.0)));
        let (left, m) = source_position(6, 5, 10).unwrap();
        assert_eq!(left, 2);
        assert_relative_eq!(m, 0.0);
        assert_eq!(source_position(10, 5, 10), Some((9, 1.0)));
    }

    #[test]
    fn retimed_series_starts_late() {
        let raw = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        for i in 0..=4u32 {
            write_snapshot(&series_path(raw.path(), "Disp", i, "D"), &array![[i as f64]]).unwrap();
        }
        let runner = StageRunner::silent(2).unwrap();
        let onset = retime_series(&runner, raw.path(), out.path(), "Disp", "D", 0.5).unwrap();
        assert_eq!(onset, 2);
        let at = |i: u32| read_snapshot(&series_path(out.path(), "Disp", i, "D")).unwrap()[[0, 0]];
        assert_eq!(at(0), 0.0);
        assert_eq!(at(1), 0.0);
        assert_relative_eq!(at(2), 0.0);
        assert_relative_eq!(at(3), 2.0);
        assert_eq!(at(4), 4.0);
    }

    #[test]
    fn holes_in_raw_series_are_missing_input() {
        let raw = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        for i in [0u32, 2] {
            write_snapshot(&series_path(raw.path(), "Disp", i, "D"), &array![[1.0]]).unwrap();
        }
        let runner = StageRunner::silent(1).unwrap();
        let err = retime_series(&runner, raw.path(), out.path(), "Disp", "D", 0.5).unwrap_err();
        assert!(matches!(err, StudyError::MissingInput(_)));
    }
}
