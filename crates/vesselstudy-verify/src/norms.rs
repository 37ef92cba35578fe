//! Error norms between a computed snapshot and its reference.

use ndarray::{Array1, ArrayView1};
use serde::Serialize;
use std::path::Path;
use tracing::debug;
use vesselstudy_core::{
    read_snapshot, series_path, ReducedPartition, Result, Snapshot, StudyError,
};
use vesselstudy_reduce::{project_on_normal, weighted_norm, PartitionWeights};

/// Median and maximum of the absolute entries of an array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AbsStats {
    pub median: f64,
    pub max: f64,
}

impl AbsStats {
    pub fn of(values: &Snapshot) -> Self {
        let mut abs: Vec<f64> = values.iter().map(|v| v.abs()).collect();
        if abs.is_empty() {
            return Self { median: 0.0, max: 0.0 };
        }
        abs.sort_by(f64::total_cmp);
        let mid = abs.len() / 2;
        let median = if abs.len() % 2 == 0 {
            0.5 * (abs[mid - 1] + abs[mid])
        } else {
            abs[mid]
        };
        Self {
            median,
            max: abs[abs.len() - 1],
        }
    }
}

fn check_shapes(context: &str, value: &Snapshot, reference: &Snapshot) -> Result<()> {
    if value.dim() != reference.dim() {
        return Err(StudyError::shape_mismatch(
            context,
            &[reference.nrows(), reference.ncols()],
            &[value.nrows(), value.ncols()],
        ));
    }
    Ok(())
}

/// `sqrt(sum((value - reference)^2))` over every entry.
pub fn calculate_norm(value: &Snapshot, reference: &Snapshot) -> Result<f64> {
    check_shapes("norm", value, reference)?;
    let residual = value - reference;
    debug!(
        "value {:?}, reference {:?}, residual {:?}",
        AbsStats::of(value),
        AbsStats::of(reference),
        AbsStats::of(&residual)
    );
    Ok(residual.iter().map(|r| r * r).sum::<f64>().sqrt())
}

/// Centerline coordinates and wall normals of the mesh the weighted
/// errors are measured on.
#[derive(Debug, Clone)]
pub struct CenterlineMesh {
    pub centerline: Array1<f64>,
    pub normals: Snapshot,
}

pub const CENTERLINE_FIELD: &str = "CenterLineField";
pub const NORMAL_FIELD: &str = "CenterNormalField";

impl CenterlineMesh {
    pub fn new(centerline: Array1<f64>, normals: Snapshot) -> Result<Self> {
        if normals.nrows() != centerline.len() {
            return Err(StudyError::shape_mismatch(
                "centerline normals",
                &[centerline.len(), normals.ncols()],
                &[normals.nrows(), normals.ncols()],
            ));
        }
        Ok(Self { centerline, normals })
    }

    /// Loads `CenterLineField-0` and `CenterNormalField-0` from a mesh
    /// directory. The first column of the centerline field is the
    /// longitudinal coordinate.
    pub fn load(dir: &Path, ext: &str) -> Result<Self> {
        let cl = read_snapshot(&series_path(dir, CENTERLINE_FIELD, 0, ext))?;
        let normals = read_snapshot(&series_path(dir, NORMAL_FIELD, 0, ext))?;
        if cl.ncols() == 0 {
            return Err(StudyError::shape_mismatch(
                "centerline field",
                &[cl.nrows(), 1],
                &[cl.nrows(), 0],
            ));
        }
        Self::new(cl.column(0).to_owned(), normals)
    }

    pub fn node_count(&self) -> usize {
        self.centerline.len()
    }

    /// Weights of a uniform partition with `elements` elements.
    pub fn uniform_weights(&self, elements: usize) -> Result<PartitionWeights> {
        let partition = ReducedPartition::uniform("DL", elements)?;
        PartitionWeights::from_partition(&partition, self.centerline.view())
    }

    /// Normal component of a vector field, or the flattened field when it
    /// is not node-by-dimension.
    pub fn project(&self, field: &Snapshot) -> Array1<f64> {
        project_on_normal(field, &self.normals)
    }
}

/// Reduced residual per segment, before taking any norm.
pub fn reduced_residual(
    value: &Snapshot,
    reference: &Snapshot,
    mesh: &CenterlineMesh,
    weights: &PartitionWeights,
) -> Result<Array1<f64>> {
    check_shapes("weighted norm", value, reference)?;
    let residual = mesh.project(&(value - reference));
    weights.reduce(residual.view())
}

/// Centerline-weighted error: project on the wall normal, reduce per
/// segment, then `sqrt(sum(eps^2)) / len(eps)`.
pub fn calculate_weighted_norm(
    value: &Snapshot,
    reference: &Snapshot,
    mesh: &CenterlineMesh,
    weights: &PartitionWeights,
) -> Result<f64> {
    let eps = reduced_residual(value, reference, mesh, weights)?;
    Ok(weighted_norm(eps.view()))
}

/// `|error| / |reference|` per segment. Segments whose reduced reference
/// is zero have no relative error.
pub fn relative_error(error: ArrayView1<'_, f64>, reference: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
    if error.len() != reference.len() {
        return Err(StudyError::shape_mismatch(
            "relative error",
            &[reference.len()],
            &[error.len()],
        ));
    }
    if let Some(i) = reference.iter().position(|r| *r == 0.0) {
        return Err(StudyError::InvalidOperation(format!(
            "reduced reference is zero on segment {}",
            i
        )));
    }
    Ok(&error / &reference.mapv(f64::abs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn norm_of_unit_residual() {
        let v = array![[1.0, 1.0]];
        let r = array![[0.0, 0.0]];
        assert_relative_eq!(calculate_norm(&v, &r).unwrap(), 2f64.sqrt());
    }

    #[test]
    fn norm_ignores_argument_order() {
        let v = array![[1.0, -2.0], [0.5, 3.0]];
        let r = array![[0.0, 1.0], [2.0, -1.0]];
        assert_eq!(
            calculate_norm(&v, &r).unwrap(),
            calculate_norm(&r, &v).unwrap()
        );
    }

    #[test]
    fn norm_rejects_mismatched_shapes() {
        let err = calculate_norm(&array![[1.0, 1.0]], &array![[1.0], [1.0]]).unwrap_err();
        assert!(matches!(err, StudyError::ShapeMismatch { .. }));
    }

    #[test]
    fn median_of_even_count() {
        let stats = AbsStats::of(&array![[-4.0, 1.0], [2.0, 3.0]]);
        assert_relative_eq!(stats.median, 2.5);
        assert_relative_eq!(stats.max, 4.0);
    }

    #[test]
    fn weighted_norm_sees_only_normal_component() {
        let mesh = CenterlineMesh::new(
            array![0.0, 0.5, 1.0],
            array![[1.0, 0.0], [1.0, 0.0], [1.0, 0.0]],
        )
        .unwrap();
        let weights = mesh.uniform_weights(2).unwrap();
        let reference = Snapshot::zeros((3, 2));
        // Tangential residual only.
        let tangential = array![[0.0, 5.0], [0.0, 5.0], [0.0, 5.0]];
        assert_eq!(
            calculate_weighted_norm(&tangential, &reference, &mesh, &weights).unwrap(),
            0.0
        );
        let normal = array![[2.0, 0.0], [2.0, 0.0], [2.0, 0.0]];
        // Three segments of error 2: sqrt(12) / 3.
        assert_relative_eq!(
            calculate_weighted_norm(&normal, &reference, &mesh, &weights).unwrap(),
            12f64.sqrt() / 3.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn relative_error_needs_nonzero_reference() {
        let e = array![0.5, -1.0];
        assert_eq!(
            relative_error(e.view(), array![-2.0, 4.0].view()).unwrap(),
            array![0.25, -0.25]
        );
        assert!(matches!(
            relative_error(e.view(), array![1.0, 0.0].view()),
            Err(StudyError::InvalidOperation(_))
        ));
    }
}
