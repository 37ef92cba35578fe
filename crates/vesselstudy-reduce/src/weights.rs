use ndarray::{Array1, Array2, ArrayView1, Axis, Zip};
use tracing::debug;
use vesselstudy_core::{ReducedPartition, Result, Snapshot, StudyError};

/// Per-segment node weights, shape `(segment_count, node_count)`.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionWeights {
    matrix: Array2<f64>,
}

impl PartitionWeights {
    /// Weights supplied directly, e.g. by the partition collaborator's own
    /// basis. Negative entries are malformed.
    pub fn from_matrix(matrix: Array2<f64>) -> Result<Self> {
        if matrix.nrows() == 0 || matrix.ncols() == 0 {
            return Err(StudyError::MalformedPartition(format!(
                "weight matrix has shape {:?}",
                matrix.dim()
            )));
        }
        if matrix.iter().any(|w| !(*w >= 0.0)) {
            return Err(StudyError::MalformedPartition(
                "weights must be finite and non-negative".to_string(),
            ));
        }
        Ok(Self { matrix })
    }

    /// Evaluates every segment's triangular window at the centerline
    /// coordinate of each mesh node. Non-finite coordinates are malformed.
    pub fn from_partition(partition: &ReducedPartition, coords: ArrayView1<'_, f64>) -> Result<Self> {
        if let Some(node) = coords.iter().position(|x| !x.is_finite()) {
            return Err(StudyError::MalformedPartition(format!(
                "mesh node {} has centerline coordinate {}",
                node, coords[node]
            )));
        }
        let mut matrix = Array2::zeros((partition.segment_count(), coords.len()));
        for (mut row, segment) in matrix.rows_mut().into_iter().zip(partition.segments()) {
            row.assign(&segment.weights(coords));
        }
        debug!(
            "weights for '{}': {} segments x {} nodes",
            partition.prefix(),
            partition.segment_count(),
            coords.len()
        );
        Ok(Self { matrix })
    }

    pub fn segment_count(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn node_count(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn segment(&self, index: usize) -> ArrayView1<'_, f64> {
        self.matrix.row(index)
    }

    /// Weighted-reduce: one weighted mean per segment.
    pub fn reduce(&self, values: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        if values.len() != self.node_count() {
            return Err(StudyError::MalformedPartition(format!(
                "{} values for {} weighted nodes",
                values.len(),
                self.node_count()
            )));
        }
        let mut out = Array1::zeros(self.segment_count());
        for (i, row) in self.matrix.axis_iter(Axis(0)).enumerate() {
            out[i] = reduce_segment(row, values).map_err(|e| match e {
                StudyError::MalformedPartition(msg) => {
                    StudyError::MalformedPartition(format!("segment {}: {}", i, msg))
                }
                other => other,
            })?;
        }
        Ok(out)
    }
}

/// `sum(w * v) / sum(w)` for one segment.
pub fn reduce_segment(weights: ArrayView1<'_, f64>, values: ArrayView1<'_, f64>) -> Result<f64> {
    if weights.len() != values.len() {
        return Err(StudyError::MalformedPartition(format!(
            "weight length {} does not match value length {}",
            weights.len(),
            values.len()
        )));
    }
    let total = weights.sum();
    if !(total > 0.0) {
        return Err(StudyError::MalformedPartition(
            "segment has no overlapping nodes".to_string(),
        ));
    }
    Ok(weights.dot(&values) / total)
}

/// `sqrt(sum(eps^2)) / len(eps)` over reduced segment errors.
pub fn weighted_norm(reduced: ArrayView1<'_, f64>) -> f64 {
    if reduced.is_empty() {
        return 0.0;
    }
    reduced.dot(&reduced).sqrt() / reduced.len() as f64
}

/// Row-wise dot product of a residual with the wall normals. A residual
/// whose shape differs from the normals is flattened row-major instead.
pub fn project_on_normal(residual: &Snapshot, normals: &Snapshot) -> Array1<f64> {
    if residual.dim() != normals.dim() {
        debug!(
            "residual {:?} does not match normals {:?}; flattening",
            residual.dim(),
            normals.dim()
        );
        return residual.iter().copied().collect();
    }
    let mut out = Array1::zeros(residual.nrows());
    Zip::from(&mut out)
        .and(residual.rows())
        .and(normals.rows())
        .for_each(|o, r, n| *o = r.dot(&n));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn reduce_segment_is_weighted_mean() {
        let w = array![1.0, 3.0];
        let v = array![2.0, 6.0];
        assert_relative_eq!(reduce_segment(w.view(), v.view()).unwrap(), 5.0);
    }

    #[test]
    fn empty_segment_is_rejected() {
        let w = PartitionWeights::from_matrix(array![[1.0, 1.0], [0.0, 0.0]]).unwrap();
        let err = w.reduce(array![1.0, 2.0].view()).unwrap_err();
        match err {
            StudyError::MalformedPartition(msg) => assert!(msg.starts_with("segment 1")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn negative_weights_are_rejected() {
        assert!(PartitionWeights::from_matrix(array![[1.0, -0.5]]).is_err());
        assert!(PartitionWeights::from_matrix(array![[f64::NAN, 1.0]]).is_err());
    }

    #[test]
    fn norm_divides_by_segment_count() {
        let eps = array![3.0, 4.0];
        assert_relative_eq!(weighted_norm(eps.view()), 2.5);
        assert_eq!(weighted_norm(Array1::<f64>::zeros(0).view()), 0.0);
    }

    #[test]
    fn projection_on_normals() {
        let residual = array![[1.0, 2.0, 3.0], [0.5, 0.0, 0.0]];
        let normals = array![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]];
        assert_eq!(project_on_normal(&residual, &normals), array![2.0, 0.5]);

        let scalar = array![[1.0], [2.0]];
        assert_eq!(project_on_normal(&scalar, &normals), array![1.0, 2.0]);
    }

    #[test]
    fn weights_from_uniform_partition() {
        let p = ReducedPartition::uniform("CL", 2).unwrap();
        let coords = array![0.0, 0.25, 0.5, 1.0];
        let w = PartitionWeights::from_partition(&p, coords.view()).unwrap();
        assert_eq!(w.segment_count(), 3);
        assert_eq!(w.node_count(), 4);
        assert_relative_eq!(w.segment(0)[1], 0.5);
        assert_relative_eq!(w.segment(1)[2], 1.0);
        assert_eq!(w.segment(2)[0], 0.0);
    }

    #[test]
    fn non_finite_weights_are_rejected() {
        let values = array![1.0, 2.0];
        let err = reduce_segment(array![f64::NAN, 1.0].view(), values.view()).unwrap_err();
        assert!(matches!(err, StudyError::MalformedPartition(_)));
        let err = reduce_segment(array![0.0, 0.0].view(), values.view()).unwrap_err();
        assert!(matches!(err, StudyError::MalformedPartition(_)));
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let p = ReducedPartition::uniform("CL", 2).unwrap();
        let coords = array![0.0, f64::NAN, 1.0];
        let err = PartitionWeights::from_partition(&p, coords.view()).unwrap_err();
        assert!(matches!(err, StudyError::MalformedPartition(msg) if msg.contains("node 1")));
    }
}
