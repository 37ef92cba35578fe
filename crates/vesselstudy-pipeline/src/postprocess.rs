//! Per-timestep post-processing transforms.
//!
//! Every transform reads existing snapshots and writes a distinctly named
//! one, so a batch can be re-run safely after a partial failure.

use ndarray::s;
use std::path::Path;
use tracing::{debug, info};
use vesselstudy_core::{
    discover, modulus_from_multiplier, read_snapshot, series_path, try_discover, write_snapshot,
    ReducedPartition, Result, Snapshot, StudyError,
};
use vesselstudy_parallel::{BatchReport, StageRunner};
use vesselstudy_reduce::{PartitionWeights, ReducedField};

fn require_same_shape(context: &str, expected: &Snapshot, found: &Snapshot) -> Result<()> {
    if expected.dim() != found.dim() {
        return Err(StudyError::shape_mismatch(
            context,
            &[expected.nrows(), expected.ncols()],
            &[found.nrows(), found.ncols()],
        ));
    }
    Ok(())
}

/// Transforms over the series of one run directory.
pub struct Transforms<'a> {
    runner: &'a StageRunner,
    dir: &'a Path,
    ext: &'a str,
}

impl<'a> Transforms<'a> {
    pub fn new(runner: &'a StageRunner, dir: &'a Path, ext: &'a str) -> Self {
        Self { runner, dir, ext }
    }

    fn read(&self, variable: &str, step: u32) -> Result<Snapshot> {
        read_snapshot(&series_path(self.dir, variable, step, self.ext))
    }

    fn write(&self, variable: &str, step: u32, data: &Snapshot) -> Result<()> {
        write_snapshot(&series_path(self.dir, variable, step, self.ext), data)
    }

    /// `space-i = disp-i + reference`.
    pub fn physical_space(&self, disp: &str, space: &str, reference: &Snapshot) -> Result<BatchReport> {
        let index = discover(self.dir, disp, self.ext)?;
        self.runner.run(space, index.steps(), |i| {
            let d = self.read(disp, i)?;
            require_same_shape("physical space", reference, &d)?;
            self.write(space, i, &(&d + reference))
        })
    }

    /// `modulus-i = stiff-i[:, 0]`.
    pub fn stripe_modulus(&self, stiff: &str, modulus: &str) -> Result<BatchReport> {
        let index = discover(self.dir, stiff, self.ext)?;
        self.runner.run(modulus, index.steps(), |i| {
            let k = self.read(stiff, i)?;
            self.write(modulus, i, &k.slice(s![.., 0..1]).to_owned())
        })
    }

    /// Writes the first component of `field` at `final_step` as
    /// `target-i` for every step of `field`.
    pub fn longitudinal_field(&self, field: &str, target: &str, final_step: u32) -> Result<BatchReport> {
        let last = self.read(field, final_step)?;
        if last.ncols() == 0 {
            return Err(StudyError::shape_mismatch(
                "longitudinal field",
                &[last.nrows(), 1],
                &[last.nrows(), 0],
            ));
        }
        let z = last.slice(s![.., 0..1]).to_owned();
        let index = discover(self.dir, field, self.ext)?;
        self.runner
            .run(target, index.steps(), |i| self.write(target, i, &z))
    }

    /// `stiff-i = 10 (1 + dm-i)`.
    pub fn stiffness(&self, dm: &str, stiff: &str) -> Result<BatchReport> {
        let index = discover(self.dir, dm, self.ext)?;
        self.runner.run(stiff, index.steps(), |i| {
            let m = self.read(dm, i)?;
            self.write(stiff, i, &m.mapv(modulus_from_multiplier))
        })
    }

    /// `output-i = -input-i`. A missing input series is skipped.
    pub fn negate(&self, input: &str, output: &str) -> Result<Option<BatchReport>> {
        let Some(index) = try_discover(self.dir, input, self.ext)? else {
            debug!("no {} series in {}, skipping", input, self.dir.display());
            return Ok(None);
        };
        self.runner
            .run(output, index.steps(), |i| {
                let v = self.read(input, i)?;
                self.write(output, i, &(-v))
            })
            .map(Some)
    }

    /// `out-i = current-i - initial-i`.
    pub fn difference(&self, current: &str, initial: &str, out: &str) -> Result<BatchReport> {
        let index = discover(self.dir, current, self.ext)?;
        self.runner.run(out, index.steps(), |i| {
            let c = self.read(current, i)?;
            let r = self.read(initial, i)?;
            require_same_shape("displacement difference", &c, &r)?;
            self.write(out, i, &(&c - &r))
        })
    }

    /// Expands `{prefix}{v}-i` onto the mesh as `{v}-i` for every variable.
    /// Steps are taken from the first variable.
    pub fn expand_reduced(
        &self,
        partition: &ReducedPartition,
        weights: &PartitionWeights,
        variables: &[String],
    ) -> Result<Vec<BatchReport>> {
        let Some(first) = variables.first() else {
            return Ok(Vec::new());
        };
        let index = discover(self.dir, &partition.qualified(first), self.ext)?;
        let segments = partition.segment_count();
        let mut reports = Vec::with_capacity(variables.len());
        for v in variables {
            let reduced = partition.qualified(v);
            let report = self.runner.run(v, index.steps(), |i| {
                let field = ReducedField::from_snapshot(self.read(&reduced, i)?, segments)?;
                self.write(v, i, &field.expand(weights)?)
            })?;
            reports.push(report);
        }
        info!(
            "expanded {} reduced variable(s) from '{}'",
            variables.len(),
            partition.prefix()
        );
        Ok(reports)
    }
}
