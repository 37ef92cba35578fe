//! Command handlers. Each returns a JSON value for the output layer.

use crate::cli::{Commands, GeometryArgs, KindArg, StudyArgs, VerifyCommands};
use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use vesselstudy_core::{discover, ConfigManager, StudyConfig};
use vesselstudy_parallel::{BarProgress, ProgressReporter, SilentProgress, StageRunner};
use vesselstudy_pipeline::{
    retime_series, CommandExporter, ExternalSolver, MeshDirectory, MeshProvider,
    PartitionProvider, Pipeline, PipelineReport, ReferenceSynthesizer, RunKind, Solver,
    SupportFilePartitions, UniformPartitions,
};
use vesselstudy_verify::{
    l2_convergence, noise_sensitivity, weighted_convergence, CenterlineMesh, ConvergenceCurve,
    NoiseCase, StudyLayout,
};

pub fn execute(command: &Commands, config: StudyConfig) -> Result<Value> {
    match command {
        Commands::Index { dir, variable } => index(dir, variable, &config),
        Commands::Run {
            kind,
            run_dir,
            name,
            geometry,
            solver,
            solver_args,
            exporter,
            reference_source,
            force,
            concurrency,
        } => {
            let mut config = config;
            if *force {
                config.pipeline.override_existing = true;
            }
            if let Some(n) = concurrency {
                config.runner.concurrency = *n;
            }
            let solver = ExternalSolver::new(solver.as_str()).with_args(solver_args.iter().cloned());
            run(
                RunRequest {
                    kind: *kind,
                    run_dir,
                    name: name.as_deref(),
                    geometry,
                    exporter: exporter.as_deref(),
                    reference_source: reference_source.as_deref(),
                },
                Arc::new(solver),
                config,
            )
        }
        Commands::Reference {
            forward_dir,
            out_dir,
            geometry,
        } => reference(forward_dir, out_dir, geometry, &config),
        Commands::Retime {
            raw_dir,
            out_dir,
            variable,
            target,
        } => retime(raw_dir, out_dir, variable, *target, &config),
        Commands::Verify(cmd) => verify(cmd, config),
        Commands::InitConfig { path, force } => init_config(path, *force),
    }
}

fn reporter(config: &StudyConfig) -> Arc<dyn ProgressReporter> {
    if config.runner.progress {
        Arc::new(BarProgress::new())
    } else {
        Arc::new(SilentProgress)
    }
}

/// Support files when any are given, else uniform partitions built in the
/// mesh directory.
fn partitions(geometry: &GeometryArgs) -> Arc<dyn PartitionProvider> {
    if geometry.uses_support_files() {
        let mut provider = SupportFilePartitions::new();
        if let Some(path) = &geometry.centerline_support {
            provider = provider.with_centerline(geometry.centerline_prefix.as_str(), path);
        }
        if let Some(path) = &geometry.material_support {
            provider = provider.with_material(geometry.material_prefix.as_str(), path);
        }
        return Arc::new(provider);
    }
    let mut provider = UniformPartitions::new(&geometry.mesh_dir);
    if let Some(n) = geometry.centerline_elements {
        provider = provider.with_centerline(geometry.centerline_prefix.as_str(), n);
    }
    if let Some(n) = geometry.material_elements {
        provider = provider.with_material(geometry.material_prefix.as_str(), n);
    }
    Arc::new(provider)
}

pub fn index(dir: &Path, variable: &str, config: &StudyConfig) -> Result<Value> {
    let index = discover(dir, variable, &config.pipeline.extension)
        .with_context(|| format!("Failed to index '{}' in {}", variable, dir.display()))?;
    Ok(json!({
        "variable": variable,
        "count": index.len(),
        "first": index.first_step(),
        "final": index.final_step(),
        "steps": index.steps(),
    }))
}

pub struct RunRequest<'a> {
    pub kind: KindArg,
    pub run_dir: &'a Path,
    pub name: Option<&'a str>,
    pub geometry: &'a GeometryArgs,
    pub exporter: Option<&'a str>,
    pub reference_source: Option<&'a Path>,
}

fn report_json(name: &str, report: &PipelineReport) -> Value {
    let stages: Vec<Value> = report
        .stages
        .iter()
        .map(|s| {
            json!({
                "stage": s.stage.name(),
                "outcome": s.outcome,
                "seconds": s.elapsed.as_secs_f64(),
            })
        })
        .collect();
    json!({
        "run": name,
        "kind": report.kind,
        "state": report.state,
        "stages": stages,
    })
}

pub fn run(
    request: RunRequest<'_>,
    solver: Arc<dyn Solver>,
    config: StudyConfig,
) -> Result<Value> {
    let kind = RunKind::from(request.kind);
    let name = match request.name {
        Some(name) => name.to_string(),
        None => request
            .run_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| kind.to_string()),
    };
    std::fs::create_dir_all(request.run_dir)
        .with_context(|| format!("Failed to create {}", request.run_dir.display()))?;

    let final_step = config.pipeline.final_step;
    let progress = reporter(&config);
    let mut pipeline = Pipeline::new(
        name.as_str(),
        kind,
        request.run_dir,
        config,
        Arc::new(MeshDirectory::new(
            &request.geometry.mesh_dir,
            request.geometry.mesh_name.as_str(),
        )),
        partitions(request.geometry),
        solver,
        progress,
    )?;
    if let Some(program) = request.exporter {
        pipeline = pipeline.with_exporter(Arc::new(CommandExporter::new(program, final_step)));
    }
    if let Some(source) = request.reference_source {
        pipeline = pipeline.with_reference_source(source);
    }

    let report = pipeline
        .run()
        .with_context(|| format!("{} run '{}' stopped", kind, name))?;
    Ok(report_json(&name, &report))
}

pub fn reference(
    forward_dir: &Path,
    out_dir: &Path,
    geometry: &GeometryArgs,
    config: &StudyConfig,
) -> Result<Value> {
    let mesh = MeshDirectory::new(&geometry.mesh_dir, geometry.mesh_name.as_str())
        .load()
        .context("Failed to load mesh")?;
    let provider = partitions(geometry);
    provider.prepare(&mesh)?;
    let parts = provider.load()?;
    std::fs::create_dir_all(out_dir)?;
    let summary = ReferenceSynthesizer::new(
        &config.reference,
        &config.pipeline.variables,
        &config.pipeline.extension,
    )
    .synthesize(forward_dir, &mesh, &parts, out_dir)
    .with_context(|| format!("Failed to build reference data from {}", forward_dir.display()))?;
    Ok(json!({
        "reference_step": summary.steps.reference,
        "final_step": summary.steps.final_step,
        "written": summary.written,
    }))
}

pub fn retime(
    raw_dir: &Path,
    out_dir: &Path,
    variable: &str,
    target: Option<f64>,
    config: &StudyConfig,
) -> Result<Value> {
    let target = target.unwrap_or(config.reference.target);
    if !(0.0..=1.0).contains(&target) {
        bail!("target must lie in [0, 1], got {}", target);
    }
    std::fs::create_dir_all(out_dir)?;
    let runner = StageRunner::new(config.runner.concurrency, reporter(config))?;
    let onset = retime_series(
        &runner,
        raw_dir,
        out_dir,
        variable,
        &config.pipeline.extension,
        target,
    )?;
    Ok(json!({ "variable": variable, "onset": onset }))
}

fn curves_json(curves: &[ConvergenceCurve], base: f64) -> Value {
    Value::Array(
        curves
            .iter()
            .map(|c| {
                json!({
                    "variable": c.variable,
                    "refinements": c.refinements,
                    "errors": c.errors,
                    "log_errors": c.log_values(base),
                    "orders": c.observed_orders(),
                })
            })
            .collect(),
    )
}

fn layout(study: &StudyArgs, config: &mut StudyConfig) -> StudyLayout {
    if let Some(refinements) = &study.refinements {
        config.verification.refinements = refinements.clone();
    }
    StudyLayout::new(&study.root, study.shape.as_str(), study.mode.as_str())
}

pub fn verify(command: &VerifyCommands, mut config: StudyConfig) -> Result<Value> {
    let ext = config.pipeline.extension.clone();
    match command {
        VerifyCommands::L2 { study, variables } => {
            let layout = layout(study, &mut config);
            let curves = l2_convergence(&layout, &config.verification, variables, &ext)?;
            Ok(curves_json(&curves, config.verification.log_base))
        }
        VerifyCommands::Weighted {
            study,
            mesh_dir,
            variables,
        } => {
            let layout = layout(study, &mut config);
            let mesh = CenterlineMesh::load(mesh_dir, &ext)?;
            let curves =
                weighted_convergence(&layout, &config.verification, &mesh, variables, &ext)?;
            Ok(curves_json(&curves, config.verification.log_base))
        }
        VerifyCommands::Noise {
            study,
            mesh_dir,
            freq,
            mag,
        } => {
            let layout = layout(study, &mut config);
            let mesh = CenterlineMesh::load(mesh_dir, &ext)?;
            let case = NoiseCase {
                frequency: *freq,
                magnitude: mag.clone(),
            };
            let names = &config.pipeline.variables;
            let points = noise_sensitivity(
                &layout,
                &config.verification,
                &mesh,
                &case,
                &names.ut,
                &names.stiff,
                &ext,
            )?;
            Ok(serde_json::to_value(points)?)
        }
    }
}

pub fn init_config(path: &Path, force: bool) -> Result<Value> {
    if path.exists() && !force {
        bail!("{} already exists, use --force to overwrite", path.display());
    }
    ConfigManager::create_default_config(path)?;
    info!("default configuration written to {}", path.display());
    Ok(json!({ "config": path }))
}
