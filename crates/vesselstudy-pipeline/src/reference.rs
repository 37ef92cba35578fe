//! Ground-truth targets for inverse runs, synthesized from a forward run.

use crate::mesh::{MeshData, Partitions};
use crate::noise::NoiseModel;
use crate::stage::ExpectedOutput;
use ndarray::{Array1, Axis};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vesselstudy_core::{
    discover, multiplier_from_modulus, read_snapshot, series_path, write_snapshot,
    ReducedPartition, ReferenceConfig, Result, SeriesIndex, Snapshot, StudyError, VariableNames,
};
use vesselstudy_reduce::{pchip_columns, ReducedField};

pub const NOISE: &str = "Noise";
pub const XI: &str = "Xi";
pub const X0: &str = "X0";
pub const XT: &str = "Xt";
pub const P0: &str = "P0";
pub const PT: &str = "Pt";
pub const DATA: &str = "CLDispt";

/// Path of a standalone `.INIT` field.
pub fn init_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.INIT", name))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceSteps {
    pub reference: u32,
    pub final_step: u32,
}

impl ReferenceSteps {
    /// The reference instant is `round(target * final)`.
    pub fn resolve(index: &SeriesIndex, target: f64) -> Self {
        let final_step = index.final_step();
        Self {
            reference: (target * final_step as f64).round() as u32,
            final_step,
        }
    }
}

/// Load scaling applied to the initial state, `t0 / nt`.
pub fn initial_scale(t0: u32, nt: u32) -> f64 {
    t0 as f64 / nt as f64
}

#[derive(Debug, Clone)]
pub struct ReferenceSummary {
    pub steps: ReferenceSteps,
    pub written: Vec<PathBuf>,
}

pub struct ReferenceSynthesizer<'a> {
    config: &'a ReferenceConfig,
    names: &'a VariableNames,
    ext: &'a str,
}

impl<'a> ReferenceSynthesizer<'a> {
    pub fn new(config: &'a ReferenceConfig, names: &'a VariableNames, ext: &'a str) -> Self {
        Self { config, names, ext }
    }

    fn required_names(&self, partitions: &Partitions) -> Vec<String> {
        let mut names: Vec<String> = [NOISE, XI, X0, XT]
            .iter()
            .map(|n| n.to_string())
            .chain([self.names.u0.clone(), self.names.ut.clone(), DATA.to_string()])
            .collect();
        if let Some(material) = &partitions.material {
            names.push(material.qualified(&self.names.dm));
        }
        if let Some(cl) = &partitions.centerline {
            names.extend(self.lagrange_targets(cl));
        }
        names
    }

    /// Initial multiplier targets: the first two configured multipliers,
    /// at the reference and the final instant.
    fn lagrange_targets(&self, cl: &ReducedPartition) -> Vec<String> {
        self.names
            .lagrange
            .iter()
            .take(2)
            .map(|v| cl.qualified(v))
            .collect()
    }

    /// Files that must exist once reference data is in place. Pressure
    /// targets are written when available but not required.
    pub fn expected_outputs(&self, out_dir: &Path, partitions: &Partitions) -> Vec<ExpectedOutput> {
        self.required_names(partitions)
            .iter()
            .map(|n| ExpectedOutput::File(init_path(out_dir, n)))
            .collect()
    }

    /// Ground-truth multiplier field over the partition nodes, row layout.
    pub fn material_field(&self, partition: &ReducedPartition) -> Snapshot {
        let dm = self
            .config
            .material
            .evaluate(partition.node_coordinates().view())
            .mapv(multiplier_from_modulus);
        dm.insert_axis(Axis(0))
    }

    fn read(&self, dir: &Path, variable: &str, step: u32) -> Result<Snapshot> {
        read_snapshot(&series_path(dir, variable, step, self.ext))
    }

    pub fn synthesize(
        &self,
        forward_dir: &Path,
        mesh: &MeshData,
        partitions: &Partitions,
        out_dir: &Path,
    ) -> Result<ReferenceSummary> {
        let material = partitions.material.as_ref().ok_or_else(|| {
            StudyError::InvalidOperation(
                "reference data needs a material partition".to_string(),
            )
        })?;
        let index = discover(forward_dir, &self.names.disp, self.ext)?;
        let steps = ReferenceSteps::resolve(&index, self.config.target);
        let init = initial_scale(self.config.t0, self.config.nt);
        info!(
            "reference data from {}: reference step {}, final step {}",
            forward_dir.display(),
            steps.reference,
            steps.final_step
        );

        let mut rng = NoiseModel::rng(self.config.seed);
        let noise = NoiseModel::new(self.config.noise_amplitude, self.config.spatial_frequency)
            .field(mesh, &mut rng);

        let xi = self.read(forward_dir, &self.names.space, steps.reference)?;
        let u0 = self.read(forward_dir, &self.names.disp, steps.reference)?;
        let ut = self.read(forward_dir, &self.names.disp, steps.final_step)?;
        for (context, found) in [("reference space", &xi), ("final displacement", &ut)] {
            if found.dim() != u0.dim() {
                return Err(StudyError::shape_mismatch(
                    context,
                    &[u0.nrows(), u0.ncols()],
                    &[found.nrows(), found.ncols()],
                ));
            }
        }
        if noise.dim() != u0.dim() {
            return Err(StudyError::shape_mismatch(
                "noise field",
                &[u0.nrows(), u0.ncols()],
                &[noise.nrows(), noise.ncols()],
            ));
        }

        let x0 = &xi - &(&u0 * init);
        let mut fields: Vec<(String, Snapshot)> = vec![
            (XI.to_string(), xi),
            (X0.to_string(), x0.clone()),
            (XT.to_string(), x0),
            (self.names.u0.clone(), &u0 * init),
            (self.names.ut.clone(), &ut * init),
            (DATA.to_string(), &(&ut - &u0) + &noise),
            (NOISE.to_string(), noise),
            (material.qualified(&self.names.dm), self.material_field(material)),
        ];

        let pressure = &self.names.pressure;
        if series_path(forward_dir, pressure, steps.reference, self.ext).is_file() {
            fields.push((P0.to_string(), self.read(forward_dir, pressure, steps.reference)? * init));
            fields.push((PT.to_string(), self.read(forward_dir, pressure, steps.final_step)? * init));
        } else {
            debug!("no {} series in {}", pressure, forward_dir.display());
        }

        if let Some(cl) = &partitions.centerline {
            let source = cl.qualified(&self.names.multiplier);
            let nodes = cl.node_coordinates();
            let targets = self.lagrange_targets(cl);
            for (name, step) in targets.into_iter().zip([steps.reference, steps.final_step]) {
                let data = ReducedField::infer_layout(self.read(forward_dir, &source, step)?)?
                    .into_values();
                let grid = Array1::linspace(0.0, 1.0, data.nrows());
                fields.push((name, pchip_columns(grid.view(), data.view(), nodes.view())?));
            }
        }

        let mut written = Vec::with_capacity(fields.len());
        for (name, data) in &fields {
            let path = init_path(out_dir, name);
            write_snapshot(&path, data)?;
            written.push(path);
        }
        info!("wrote {} reference fields to {}", written.len(), out_dir.display());
        Ok(ReferenceSummary { steps, written })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use vesselstudy_core::{MaterialMode, MaterialProperty};

    #[test]
    fn reference_step_rounds() {
        let dir = tempfile::tempdir().unwrap();
        for s in [0u32, 1, 2, 3, 4, 5, 6, 7] {
            write_snapshot(&series_path(dir.path(), "Disp", s, "D"), &array![[0.0]]).unwrap();
        }
        let index = discover(dir.path(), "Disp", "D").unwrap();
        let steps = ReferenceSteps::resolve(&index, 0.5);
        assert_eq!(steps, ReferenceSteps { reference: 4, final_step: 7 });
        assert_relative_eq!(initial_scale(1, 100), 0.01);
    }

    #[test]
    fn reference_step_on_sparse_output() {
        let dir = tempfile::tempdir().unwrap();
        for s in [0u32, 50, 100] {
            write_snapshot(&series_path(dir.path(), "Disp", s, "D"), &array![[0.0]]).unwrap();
        }
        let index = discover(dir.path(), "Disp", "D").unwrap();
        let steps = ReferenceSteps::resolve(&index, 0.5);
        assert_eq!(steps, ReferenceSteps { reference: 50, final_step: 100 });
        assert!(index.contains(steps.reference));
        assert_eq!(ReferenceSteps::resolve(&index, 1.0).reference, 100);
        assert_eq!(ReferenceSteps::resolve(&index, 0.0).reference, 0);
    }

    #[test]
    fn material_field_encodes_modulus_as_multiplier() {
        let mut config = ReferenceConfig::default();
        config.material = MaterialProperty::new(MaterialMode::Gradient, 30.0, 30.0);
        let names = VariableNames::default();
        let synth = ReferenceSynthesizer::new(&config, &names, "D");
        let partition = ReducedPartition::uniform("DL", 2).unwrap();
        let dm = synth.material_field(&partition);
        assert_eq!(dm.dim(), (1, 3));
        // E(0) = 60 -> 0.1 * 60 - 1
        assert_relative_eq!(dm[[0, 0]], 5.0, epsilon = 1e-12);
        assert_relative_eq!(10.0 * (1.0 + dm[[0, 2]]), 30.0 + 30.0 * (-2.0f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn circumferential_mode_uses_baseline_on_centerline() {
        let mut config = ReferenceConfig::default();
        config.material = MaterialProperty::new(MaterialMode::Circumferential, 40.0, 10.0);
        let names = VariableNames::default();
        let synth = ReferenceSynthesizer::new(&config, &names, "D");
        let dm = synth.material_field(&ReducedPartition::uniform("DL", 4).unwrap());
        for v in dm.iter() {
            assert_relative_eq!(*v, 3.0, epsilon = 1e-12);
        }
    }
}
