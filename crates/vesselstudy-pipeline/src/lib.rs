//! Resumable post-processing pipeline for disk-resident simulation output.
//!
//! A run moves through mesh preparation, partition preparation, reference
//! data synthesis (inverse runs), the external solve, reconstruction,
//! reduced-field expansion and export. Completion of every stage is decided
//! solely by the files it leaves in the run directory.

pub mod export;
pub mod mesh;
pub mod noise;
pub mod orchestrator;
pub mod postprocess;
pub mod reference;
pub mod solver;
pub mod stage;
pub mod tracking;

pub use export::{CommandExporter, Exporter};
pub use mesh::{
    MeshData, MeshDirectory, MeshProvider, PartitionProvider, Partitions, SupportFilePartitions,
    UniformPartitions,
};
pub use noise::NoiseModel;
pub use orchestrator::{Pipeline, PipelineReport, StageFailure, StageOutcome, StageReport};
pub use postprocess::Transforms;
pub use reference::{init_path, initial_scale, ReferenceSteps, ReferenceSummary, ReferenceSynthesizer};
pub use solver::{ExternalSolver, JobDescription, Solver};
pub use stage::{is_complete, missing_outputs, ExpectedOutput, PipelineState, RunKind, Stage};
pub use tracking::{retime_series, source_position};
