//! Resumable stage pipeline for one run directory.
//!
//! Each stage declares the outputs it leaves on disk. A stage whose outputs
//! already exist is skipped unless `override_existing` is set; a stage that
//! runs and still leaves outputs missing fails the run, and no later stage
//! is attempted. Re-invoking the pipeline resumes at the first incomplete
//! stage.

use crate::export::Exporter;
use crate::mesh::{MeshData, MeshProvider, PartitionProvider, Partitions};
use crate::postprocess::Transforms;
use crate::reference::{init_path, ReferenceSynthesizer, XI};
use crate::solver::{JobDescription, Solver};
use crate::stage::{is_complete, missing_outputs, ExpectedOutput, PipelineState, RunKind, Stage};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};
use vesselstudy_core::{series_path, Result, StudyConfig, StudyError};
use vesselstudy_parallel::{ProgressReporter, StageRunner};
use vesselstudy_reduce::PartitionWeights;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Skipped,
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: StudyError,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub kind: RunKind,
    pub stages: Vec<StageReport>,
    pub state: PipelineState,
    pub failure: Option<StageFailure>,
}

impl PipelineReport {
    fn new(kind: RunKind) -> Self {
        Self {
            kind,
            stages: Vec::new(),
            state: PipelineState::Pending,
            failure: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn outcome(&self, stage: Stage) -> Option<StageOutcome> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.outcome)
    }

    pub fn count(&self, outcome: StageOutcome) -> usize {
        self.stages.iter().filter(|r| r.outcome == outcome).count()
    }

    /// The report on success, the failing stage's error otherwise.
    pub fn into_result(mut self) -> Result<Self> {
        match self.failure.take() {
            Some(failure) => Err(failure.error),
            None => Ok(self),
        }
    }
}

/// Data loaded by earlier stages and consumed by later ones.
#[derive(Default)]
struct RunContext {
    mesh: Option<MeshData>,
    partitions: Option<Partitions>,
}

impl RunContext {
    fn mesh(&self) -> Result<&MeshData> {
        self.mesh
            .as_ref()
            .ok_or_else(|| StudyError::InvalidOperation("mesh is not loaded".to_string()))
    }

    fn partitions(&self) -> Result<&Partitions> {
        self.partitions
            .as_ref()
            .ok_or_else(|| StudyError::InvalidOperation("partitions are not loaded".to_string()))
    }
}

pub struct Pipeline {
    name: String,
    kind: RunKind,
    run_dir: PathBuf,
    config: StudyConfig,
    mesh: Arc<dyn MeshProvider>,
    partitions: Arc<dyn PartitionProvider>,
    solver: Arc<dyn Solver>,
    exporter: Option<Arc<dyn Exporter>>,
    reference_source: Option<PathBuf>,
    runner: StageRunner,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        kind: RunKind,
        run_dir: impl Into<PathBuf>,
        config: StudyConfig,
        mesh: Arc<dyn MeshProvider>,
        partitions: Arc<dyn PartitionProvider>,
        solver: Arc<dyn Solver>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<Self> {
        let runner = StageRunner::new(config.runner.concurrency, reporter)?;
        Ok(Self {
            name: name.into(),
            kind,
            run_dir: run_dir.into(),
            config,
            mesh,
            partitions,
            solver,
            exporter: None,
            reference_source: None,
            runner,
        })
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Forward run directory the inverse reference data is built from.
    pub fn with_reference_source(mut self, forward_dir: impl Into<PathBuf>) -> Self {
        self.reference_source = Some(forward_dir.into());
        self
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn job_path(&self) -> PathBuf {
        self.run_dir.join(format!("{}.job", self.name))
    }

    fn ext(&self) -> &str {
        &self.config.pipeline.extension
    }

    fn final_step(&self) -> u32 {
        self.config.pipeline.final_step
    }

    fn has_final(&self, variable: &str) -> bool {
        series_path(&self.run_dir, variable, self.final_step(), self.ext()).is_file()
    }

    fn series(&self, names: &[&String]) -> Vec<ExpectedOutput> {
        names
            .iter()
            .map(|v| ExpectedOutput::series(v.as_str(), self.final_step()))
            .collect()
    }

    /// Reduced centerline variables expanded onto the mesh.
    fn expanded_variables(&self) -> Vec<String> {
        let vars = &self.config.pipeline.variables;
        match self.kind {
            RunKind::Forward => vec![vars.multiplier.clone()],
            RunKind::Inverse => vars.lagrange.clone(),
        }
    }

    fn synthesizer(&self) -> ReferenceSynthesizer<'_> {
        ReferenceSynthesizer::new(
            &self.config.reference,
            &self.config.pipeline.variables,
            self.ext(),
        )
    }

    fn expected_outputs(&self, stage: Stage, ctx: &RunContext) -> Result<Vec<ExpectedOutput>> {
        let v = &self.config.pipeline.variables;
        let outputs = match (stage, self.kind) {
            (Stage::MeshPrep, _) => self.mesh.outputs(),
            (Stage::PartitionPrep, _) => self.partitions.outputs(),
            (Stage::ReferenceData, _) => self
                .synthesizer()
                .expected_outputs(&self.run_dir, ctx.partitions()?),
            (Stage::Simulate, RunKind::Forward) => self.series(&[&v.disp, &v.cl_field]),
            (Stage::Simulate, RunKind::Inverse) => {
                let mut out = self.series(&[&v.u0, &v.ut, &v.cl_field]);
                if let Some(material) = &ctx.partitions()?.material {
                    out.push(ExpectedOutput::series(
                        material.qualified(&v.dm),
                        self.final_step(),
                    ));
                }
                out
            }
            (Stage::Reconstruct, RunKind::Forward) => {
                let mut out = self.series(&[&v.space, &v.cl_z]);
                if self.has_final(&v.stiff) {
                    out.extend(self.series(&[&v.modulus]));
                }
                out
            }
            (Stage::Reconstruct, RunKind::Inverse) => {
                self.series(&[&v.disp, &v.space, &v.ref_disp, &v.cl_z])
            }
            (Stage::Expand, kind) => {
                let parts = ctx.partitions()?;
                let mut out = Vec::new();
                if parts.centerline.is_some() {
                    out.extend(
                        self.expanded_variables()
                            .into_iter()
                            .map(|name| ExpectedOutput::series(name, self.final_step())),
                    );
                }
                if kind == RunKind::Inverse && parts.material.is_some() {
                    out.extend(self.series(&[&v.dm, &v.stiff, &v.modulus]));
                }
                out
            }
            (Stage::Export, _) => self
                .exporter
                .as_ref()
                .map(|e| e.outputs(&self.run_dir))
                .unwrap_or_default(),
        };
        Ok(outputs)
    }

    /// Loads what later stages need once a stage's outputs are in place.
    fn load_after(&self, stage: Stage, ctx: &mut RunContext) -> Result<()> {
        match stage {
            Stage::MeshPrep => ctx.mesh = Some(self.mesh.load()?),
            Stage::PartitionPrep => ctx.partitions = Some(self.partitions.load()?),
            _ => {}
        }
        Ok(())
    }

    fn perform(&self, stage: Stage, ctx: &RunContext) -> Result<()> {
        match stage {
            Stage::MeshPrep => self.mesh.prepare(),
            Stage::PartitionPrep => self.partitions.prepare(ctx.mesh()?),
            Stage::ReferenceData => {
                let source = self.reference_source.as_ref().ok_or_else(|| {
                    StudyError::Config(format!(
                        "{} run '{}' has no forward run to build reference data from",
                        self.kind, self.name
                    ))
                })?;
                self.synthesizer()
                    .synthesize(source, ctx.mesh()?, ctx.partitions()?, &self.run_dir)
                    .map(|_| ())
            }
            Stage::Simulate => self.simulate(ctx),
            Stage::Reconstruct => self.reconstruct(ctx),
            Stage::Expand => self.expand(ctx),
            Stage::Export => self.export(),
        }
    }

    fn simulate(&self, ctx: &RunContext) -> Result<()> {
        let job = JobDescription {
            name: self.name.clone(),
            kind: self.kind,
            output_dir: self.run_dir.clone(),
            mesh_files: self
                .mesh
                .outputs()
                .iter()
                .map(|o| o.path(&self.run_dir, self.ext()))
                .collect(),
            partitions: ctx
                .partitions()?
                .iter()
                .map(|p| p.prefix().to_string())
                .collect(),
            final_step: self.final_step(),
            created_at: Utc::now(),
        };
        let job_path = self.job_path();
        job.write(&job_path)?;
        let code = self
            .solver
            .run(&job_path, self.config.runner.solver_cores)?;
        if code != 0 {
            return Err(StudyError::ExternalProcess {
                program: self.solver.program().to_string(),
                code,
            });
        }
        Ok(())
    }

    fn reconstruct(&self, ctx: &RunContext) -> Result<()> {
        let v = &self.config.pipeline.variables;
        let mesh = ctx.mesh()?;
        let t = Transforms::new(&self.runner, &self.run_dir, self.ext());
        if self.kind == RunKind::Inverse {
            t.difference(&v.ut, &v.u0, &v.disp)?;
        }
        t.physical_space(&v.disp, &v.space, &mesh.coordinates)?;
        if self.kind == RunKind::Inverse {
            t.negate(&v.u0, &v.ref_disp)?;
        }
        t.longitudinal_field(&v.cl_field, &v.cl_z, self.final_step())?;
        // Forward stiffness carries one column per material parameter; the
        // modulus column is what inverse runs are compared against.
        if self.kind == RunKind::Forward && self.has_final(&v.stiff) {
            t.stripe_modulus(&v.stiff, &v.modulus)?;
        }
        Ok(())
    }

    fn expand(&self, ctx: &RunContext) -> Result<()> {
        let v = &self.config.pipeline.variables;
        let mesh = ctx.mesh()?;
        let parts = ctx.partitions()?;
        let t = Transforms::new(&self.runner, &self.run_dir, self.ext());
        if let Some(cl) = &parts.centerline {
            let weights = PartitionWeights::from_partition(cl, mesh.centerline.view())?;
            t.expand_reduced(cl, &weights, &self.expanded_variables())?;
        }
        if self.kind == RunKind::Inverse {
            if let Some(material) = &parts.material {
                let weights = PartitionWeights::from_partition(material, mesh.centerline.view())?;
                t.expand_reduced(material, &weights, std::slice::from_ref(&v.dm))?;
                t.stiffness(&v.dm, &v.stiff)?;
                t.stripe_modulus(&v.stiff, &v.modulus)?;
            }
        }
        Ok(())
    }

    /// Variables with a snapshot at the final step, in export order.
    pub fn export_variables(&self) -> Vec<String> {
        let v = &self.config.pipeline.variables;
        let mut candidates: Vec<&String> = match self.kind {
            RunKind::Forward => vec![&v.space, &v.disp, &v.cl_field, &v.cl_z, &v.multiplier],
            RunKind::Inverse => vec![
                &v.disp,
                &v.ref_disp,
                &v.space,
                &v.cl_field,
                &v.cl_z,
                &v.u0,
                &v.ut,
            ],
        };
        candidates.extend([&v.stiff, &v.modulus]);
        let lagrange = self.expanded_variables();
        candidates
            .into_iter()
            .chain(lagrange.iter())
            .filter(|name| series_path(&self.run_dir, name, self.final_step(), self.ext()).is_file())
            .fold(Vec::new(), |mut acc, name| {
                if !acc.contains(name) {
                    acc.push(name.clone());
                }
                acc
            })
    }

    fn export(&self) -> Result<()> {
        let Some(exporter) = &self.exporter else {
            return Ok(());
        };
        let space = match self.kind {
            RunKind::Inverse => Some(init_path(&self.run_dir, XI)),
            RunKind::Forward => None,
        };
        exporter.export(&self.run_dir, &self.export_variables(), space.as_deref())
    }

    fn advance(&self, stage: Stage, ctx: &mut RunContext) -> Result<StageOutcome> {
        let ext = self.ext();
        let outputs = self.expected_outputs(stage, ctx)?;
        if !self.config.pipeline.override_existing && is_complete(&self.run_dir, &outputs, ext) {
            info!("{}: outputs present, skipping", stage);
            self.load_after(stage, ctx)?;
            return Ok(StageOutcome::Skipped);
        }

        info!("{}: running", stage);
        self.perform(stage, ctx)?;
        let missing = missing_outputs(&self.run_dir, &outputs, ext);
        if !missing.is_empty() {
            return Err(StudyError::StageIncomplete {
                stage: stage.to_string(),
                missing: missing.iter().map(|m| m.to_string()).collect(),
            });
        }
        self.load_after(stage, ctx)?;
        Ok(StageOutcome::Completed)
    }

    /// Runs every stage in order, stopping at the first failure. The
    /// failure is logged and recorded in the report.
    pub fn execute(&self) -> PipelineReport {
        let mut report = PipelineReport::new(self.kind);
        let mut ctx = RunContext::default();
        info!(
            "{} run '{}' in {}",
            self.kind,
            self.name,
            self.run_dir.display()
        );
        for stage in Stage::sequence(self.kind) {
            let start = Instant::now();
            match self.advance(stage, &mut ctx) {
                Ok(outcome) => {
                    debug!("{} -> {:?}", stage, stage.reaches());
                    report.state = stage.reaches();
                    report.stages.push(StageReport {
                        stage,
                        outcome,
                        elapsed: start.elapsed(),
                    });
                }
                Err(e) => {
                    error!("{} failed: {}", stage, e);
                    report.state = PipelineState::Failed;
                    report.failure = Some(StageFailure { stage, error: e });
                    return report;
                }
            }
        }
        info!(
            "run '{}' finished: {} completed, {} skipped",
            self.name,
            report.count(StageOutcome::Completed),
            report.count(StageOutcome::Skipped)
        );
        report
    }

    pub fn run(&self) -> Result<PipelineReport> {
        self.execute().into_result()
    }
}
