use crate::mesh::MeshData;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use vesselstudy_core::Snapshot;

/// Synthetic imaging noise: a smooth standing wave over the centerline and
/// angular coordinates, applied along the wall normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseModel {
    pub amplitude: f64,
    pub spatial_frequency: u32,
}

impl NoiseModel {
    pub fn new(amplitude: f64, spatial_frequency: u32) -> Self {
        Self {
            amplitude,
            spatial_frequency,
        }
    }

    /// Longitudinal and circumferential wave numbers.
    pub fn frequencies(&self) -> (f64, f64) {
        let s = self.spatial_frequency as f64;
        (3.0 * s, 5.0 * s)
    }

    pub fn rng(seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Noise displacement per node, shaped like the mesh normals.
    pub fn field<R: Rng + ?Sized>(&self, mesh: &MeshData, rng: &mut R) -> Snapshot {
        let mut out = Array2::zeros(mesh.normals.dim());
        if self.amplitude == 0.0 {
            return out;
        }
        let (f1, f2) = self.frequencies();
        let phi1 = rng.random_range(0.0..2.0 * PI);
        let phi2 = rng.random_range(0.0..2.0 * PI);
        for (i, (mut row, normal)) in out
            .rows_mut()
            .into_iter()
            .zip(mesh.normals.rows())
            .enumerate()
        {
            let z = mesh.centerline[i];
            let theta = 2.0 * PI * mesh.angle[i];
            let scale =
                self.amplitude * (2.0 * PI * f1 * z + phi1).sin() * (f2 * theta + phi2).cos();
            row.assign(&(&normal * scale));
        }
        out
    }
}
