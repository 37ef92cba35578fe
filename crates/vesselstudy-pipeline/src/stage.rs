//! Stage state machine and the completion predicate shared by every
//! pipeline invocation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use vesselstudy_core::series_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Forward,
    Inverse,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::Forward => write!(f, "forward"),
            RunKind::Inverse => write!(f, "inverse"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    MeshPrep,
    PartitionPrep,
    ReferenceData,
    Simulate,
    Reconstruct,
    Expand,
    Export,
}

impl Stage {
    /// Stages of a run, in execution order.
    pub fn sequence(kind: RunKind) -> Vec<Stage> {
        let mut stages = vec![Stage::MeshPrep, Stage::PartitionPrep];
        if kind == RunKind::Inverse {
            stages.push(Stage::ReferenceData);
        }
        stages.extend([
            Stage::Simulate,
            Stage::Reconstruct,
            Stage::Expand,
            Stage::Export,
        ]);
        stages
    }

    /// State reached when this stage completes or is skipped.
    pub fn reaches(&self) -> PipelineState {
        match self {
            Stage::MeshPrep => PipelineState::MeshReady,
            Stage::PartitionPrep => PipelineState::PartitionsReady,
            Stage::ReferenceData => PipelineState::ReferenceReady,
            Stage::Simulate => PipelineState::Simulated,
            Stage::Reconstruct => PipelineState::Reconstructed,
            Stage::Expand => PipelineState::Expanded,
            Stage::Export => PipelineState::Exported,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::MeshPrep => "mesh-prep",
            Stage::PartitionPrep => "partition-prep",
            Stage::ReferenceData => "reference-data",
            Stage::Simulate => "simulate",
            Stage::Reconstruct => "reconstruct",
            Stage::Expand => "expand",
            Stage::Export => "export",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    MeshReady,
    PartitionsReady,
    ReferenceReady,
    Simulated,
    Reconstructed,
    Expanded,
    Exported,
    Failed,
}

/// One artifact a stage must leave behind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpectedOutput {
    /// A series snapshot at a given step, in the run directory.
    Series { variable: String, step: u32 },
    /// A standalone file.
    File(PathBuf),
}

impl ExpectedOutput {
    pub fn series(variable: impl Into<String>, step: u32) -> Self {
        ExpectedOutput::Series {
            variable: variable.into(),
            step,
        }
    }

    pub fn path(&self, dir: &Path, ext: &str) -> PathBuf {
        match self {
            ExpectedOutput::Series { variable, step } => series_path(dir, variable, *step, ext),
            ExpectedOutput::File(p) if p.is_absolute() => p.clone(),
            ExpectedOutput::File(p) => dir.join(p),
        }
    }

    pub fn exists(&self, dir: &Path, ext: &str) -> bool {
        self.path(dir, ext).is_file()
    }
}

impl fmt::Display for ExpectedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedOutput::Series { variable, step } => write!(f, "{}-{}", variable, step),
            ExpectedOutput::File(p) => write!(f, "{}", p.display()),
        }
    }
}

/// Outputs not yet present on disk.
pub fn missing_outputs(dir: &Path, outputs: &[ExpectedOutput], ext: &str) -> Vec<ExpectedOutput> {
    outputs
        .iter()
        .filter(|o| !o.exists(dir, ext))
        .cloned()
        .collect()
}

/// A stage is complete iff every declared output exists.
pub fn is_complete(dir: &Path, outputs: &[ExpectedOutput], ext: &str) -> bool {
    outputs.iter().all(|o| o.exists(dir, ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_runs_build_reference_data_before_simulating() {
        let fwd = Stage::sequence(RunKind::Forward);
        let inv = Stage::sequence(RunKind::Inverse);
        assert!(!fwd.contains(&Stage::ReferenceData));
        let r = inv.iter().position(|s| *s == Stage::ReferenceData).unwrap();
        let s = inv.iter().position(|s| *s == Stage::Simulate).unwrap();
        assert!(r < s);
        assert_eq!(inv.last(), Some(&Stage::Export));
    }

    #[test]
    fn completion_requires_every_output() {
        let dir = tempfile::tempdir().unwrap();
        let outputs = vec![
            ExpectedOutput::series("Disp", 100),
            ExpectedOutput::File(PathBuf::from("Xi.INIT")),
        ];
        assert!(!is_complete(dir.path(), &outputs, "D"));
        std::fs::write(dir.path().join("Disp-100.D"), "1 1\n0\n").unwrap();
        assert_eq!(
            missing_outputs(dir.path(), &outputs, "D"),
            vec![ExpectedOutput::File(PathBuf::from("Xi.INIT"))]
        );
        std::fs::write(dir.path().join("Xi.INIT"), "1 1\n0\n").unwrap();
        assert!(is_complete(dir.path(), &outputs, "D"));
        // Nothing declared means nothing to do.
        assert!(is_complete(dir.path(), &[], "D"));
    }

    #[test]
    fn earlier_steps_do_not_count() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Disp-99.D"), "1 1\n0\n").unwrap();
        assert!(!is_complete(
            dir.path(),
            &[ExpectedOutput::series("Disp", 100)],
            "D"
        ));
    }
}
