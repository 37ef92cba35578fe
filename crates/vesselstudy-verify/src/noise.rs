//! Sensitivity of the recovered fields to measurement noise.

use crate::layout::{current_file, reference_file, StudyLayout};
use crate::norms::{relative_error, CenterlineMesh};
use ndarray::Array1;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};
use vesselstudy_core::{read_snapshot, Result, Snapshot, StudyError, VerificationConfig};
use vesselstudy_reduce::PartitionWeights;

/// Per-segment relative errors of one noise realization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoisePoint {
    pub realization: usize,
    pub displacement: Vec<f64>,
    pub stiffness: Vec<f64>,
}

/// Noise amplitude and spatial frequency of one set of noisy runs.
#[derive(Debug, Clone)]
pub struct NoiseCase {
    pub frequency: u32,
    pub magnitude: String,
}

/// Reduced relative error of `value` against `reference`. With
/// `project`, vector fields are taken along the wall normal first.
pub fn reduced_relative_error(
    value: &Snapshot,
    reference: &Snapshot,
    mesh: &CenterlineMesh,
    weights: &PartitionWeights,
    project: bool,
) -> Result<Array1<f64>> {
    if value.dim() != reference.dim() {
        return Err(StudyError::shape_mismatch(
            "noise realization",
            &[reference.nrows(), reference.ncols()],
            &[value.nrows(), value.ncols()],
        ));
    }
    let residual = value - reference;
    let (diff, denom) = if project {
        (mesh.project(&residual), mesh.project(reference))
    } else {
        (
            residual.iter().copied().collect::<Array1<f64>>(),
            reference.iter().copied().collect::<Array1<f64>>(),
        )
    };
    let error = weights.reduce(diff.view())?;
    let scale = weights.reduce(denom.view())?;
    relative_error(error.view(), scale.view())
}

/// Displacement and stiffness errors of every noise realization against
/// the forward run at the noise refinement level.
pub fn noise_sensitivity(
    layout: &StudyLayout,
    config: &VerificationConfig,
    mesh: &CenterlineMesh,
    case: &NoiseCase,
    displacement: &str,
    stiffness: &str,
    ext: &str,
) -> Result<Vec<NoisePoint>> {
    if config.noise_realizations == 0 {
        return Err(StudyError::Config(
            "noise study needs at least one realization".to_string(),
        ));
    }
    let n = config.noise_refinement;
    let forward = layout.forward_dir(n);
    let disp_ref = read_snapshot(&reference_file(&forward, displacement, &config.reference_files)?)?;
    let stiff_ref = read_snapshot(&reference_file(&forward, stiffness, &config.reference_files)?)?;
    let weights = mesh.uniform_weights(n)?;
    debug!(
        "noise study f={} m={}: {} realizations, {} segments",
        case.frequency,
        case.magnitude,
        config.noise_realizations,
        weights.segment_count()
    );

    let points = (0..config.noise_realizations)
        .into_par_iter()
        .map(|k| -> Result<NoisePoint> {
            let dir = layout.noise_dir(n, case.frequency, &case.magnitude, k);
            let load = |v: &str| read_snapshot(&current_file(&dir, v, config.current_step, ext));
            let d = reduced_relative_error(&load(displacement)?, &disp_ref, mesh, &weights, true)?;
            let s = reduced_relative_error(&load(stiffness)?, &stiff_ref, mesh, &weights, false)?;
            Ok(NoisePoint {
                realization: k,
                displacement: d.to_vec(),
                stiffness: s.to_vec(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    info!(
        "noise study f={} m={}: {} realizations evaluated",
        case.frequency,
        case.magnitude,
        points.len()
    );
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn mesh() -> CenterlineMesh {
        CenterlineMesh::new(
            array![0.0, 0.5, 1.0],
            array![[0.0, 1.0], [0.0, 1.0], [0.0, 1.0]],
        )
        .unwrap()
    }

    #[test]
    fn projected_relative_error() {
        let mesh = mesh();
        let weights = mesh.uniform_weights(2).unwrap();
        let reference = array![[9.0, 2.0], [9.0, 2.0], [9.0, 2.0]];
        let value = array![[0.0, 2.5], [0.0, 1.5], [0.0, 2.0]];
        let err = reduced_relative_error(&value, &reference, &mesh, &weights, true).unwrap();
        assert_relative_eq!(err[0], 0.25, epsilon = 1e-12);
        assert_relative_eq!(err[1], -0.25, epsilon = 1e-12);
        assert_relative_eq!(err[2], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_reference_is_rejected() {
        let mesh = mesh();
        let weights = mesh.uniform_weights(2).unwrap();
        let reference = Snapshot::zeros((3, 1));
        let value = array![[1.0], [1.0], [1.0]];
        assert!(matches!(
            reduced_relative_error(&value, &reference, &mesh, &weights, false),
            Err(StudyError::InvalidOperation(_))
        ));
    }
}
