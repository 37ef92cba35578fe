//! Text codec for dense per-node arrays.
//!
//! A snapshot file starts with a `"{rows} {cols}"` header followed by one
//! whitespace-separated line per node. The same encoding is used for
//! time-indexed series (`Disp-100.D`) and for standalone fields such as
//! mesh coordinates or `.INIT` targets.

use crate::error::{Result, StudyError};
use ndarray::Array2;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::debug;

/// One array of per-node values, shape `(node_count, component_count)`.
pub type Snapshot = Array2<f64>;

pub fn read_snapshot(path: &Path) -> Result<Snapshot> {
    if !path.is_file() {
        return Err(StudyError::MissingInput(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    parse_snapshot(&content).map_err(|e| match e {
        StudyError::Parse(msg) => StudyError::Parse(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

pub fn parse_snapshot(content: &str) -> Result<Snapshot> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| StudyError::Parse("empty snapshot".to_string()))?;
    let dims: Vec<usize> = header
        .split_whitespace()
        .map(|t| t.parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| StudyError::Parse(format!("bad header '{}': {}", header, e)))?;
    let (rows, cols) = match dims.as_slice() {
        [r, c] => (*r, *c),
        _ => {
            return Err(StudyError::Parse(format!(
                "header must have two entries, got '{}'",
                header
            )))
        }
    };

    let mut values = Vec::with_capacity(rows * cols);
    let mut found_rows = 0usize;
    for line in lines {
        let before = values.len();
        for token in line.split_whitespace() {
            let v = token
                .parse::<f64>()
                .map_err(|e| StudyError::Parse(format!("bad value '{}': {}", token, e)))?;
            values.push(v);
        }
        if values.len() - before != cols {
            return Err(StudyError::shape_mismatch(
                format!("snapshot row {}", found_rows),
                &[cols],
                &[values.len() - before],
            ));
        }
        found_rows += 1;
    }
    if found_rows != rows {
        return Err(StudyError::shape_mismatch(
            "snapshot body",
            &[rows, cols],
            &[found_rows, cols],
        ));
    }

    Array2::from_shape_vec((rows, cols), values).map_err(|e| StudyError::Parse(e.to_string()))
}

pub fn format_snapshot(data: &Snapshot) -> String {
    let (rows, cols) = data.dim();
    let mut out = String::with_capacity(rows * cols * 24 + 16);
    let _ = writeln!(out, "{} {}", rows, cols);
    for row in data.rows() {
        let mut first = true;
        for v in row.iter() {
            if !first {
                out.push(' ');
            }
            first = false;
            let _ = write!(out, "{:.16e}", v);
        }
        out.push('\n');
    }
    out
}

/// Writes the whole array to a sibling temporary file and renames it into
/// place, so readers never observe a partially written snapshot.
pub fn write_snapshot(path: &Path, data: &Snapshot) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StudyError::InvalidOperation(format!("bad output path {:?}", path)))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));
    fs::write(&tmp, format_snapshot(data))?;
    fs::rename(&tmp, path)?;
    debug!("wrote {:?} {:?}", path, data.dim());
    Ok(())
}
