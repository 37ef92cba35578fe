use crate::weights::PartitionWeights;
use ndarray::{Array2, Axis};
use vesselstudy_core::{Result, Snapshot, StudyError};

/// Values over the reduced node ordering, shape `(reduced_nodes, components)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedField {
    values: Array2<f64>,
}

impl ReducedField {
    /// Accepts `(reduced_nodes, k)` or the single-row layout
    /// `(1, reduced_nodes)` the solver writes for constant vectors.
    pub fn from_snapshot(snapshot: Snapshot, reduced_nodes: usize) -> Result<Self> {
        match snapshot.dim() {
            (n, _) if n == reduced_nodes => Ok(Self { values: snapshot }),
            (1, n) if n == reduced_nodes => Ok(Self {
                values: snapshot.reversed_axes(),
            }),
            found => Err(StudyError::MalformedPartition(format!(
                "reduced field of shape {:?} does not fit {} reduced nodes",
                found, reduced_nodes
            ))),
        }
    }

    /// Like [`ReducedField::from_snapshot`] when the node count is not known
    /// up front: a single row of several values is the row layout, anything
    /// else is node-major.
    pub fn infer_layout(snapshot: Snapshot) -> Result<Self> {
        let reduced_nodes = match snapshot.dim() {
            (1, n) if n > 1 => n,
            (n, _) => n,
        };
        Self::from_snapshot(snapshot, reduced_nodes)
    }

    pub fn constant(value: f64, reduced_nodes: usize, components: usize) -> Self {
        Self {
            values: Array2::from_elem((reduced_nodes, components), value),
        }
    }

    pub fn reduced_nodes(&self) -> usize {
        self.values.nrows()
    }

    pub fn components(&self) -> usize {
        self.values.ncols()
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    /// Interpolates onto the mesh with normalized partition weights, so the
    /// expansion of a constant field is that constant at every node.
    pub fn expand(&self, weights: &PartitionWeights) -> Result<Snapshot> {
        if weights.segment_count() != self.reduced_nodes() {
            return Err(StudyError::shape_mismatch(
                "reduced expansion",
                &[weights.segment_count(), self.components()],
                &[self.reduced_nodes(), self.components()],
            ));
        }
        let w = weights.matrix();
        let totals = w.sum_axis(Axis(0));
        if let Some(node) = totals.iter().position(|t| !(*t > 0.0)) {
            return Err(StudyError::MalformedPartition(format!(
                "mesh node {} has no covering segment",
                node
            )));
        }
        let mut out = w.t().dot(&self.values);
        for (mut row, total) in out.rows_mut().into_iter().zip(totals.iter()) {
            row /= *total;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn row_layout_is_transposed() {
        let f = ReducedField::from_snapshot(array![[1.0, 2.0, 3.0]], 3).unwrap();
        assert_eq!(f.values(), &array![[1.0], [2.0], [3.0]]);
    }

    #[test]
    fn layout_is_inferred_from_shape() {
        let row = ReducedField::infer_layout(array![[1.0, 2.0, 3.0]]).unwrap();
        assert_eq!(row.reduced_nodes(), 3);
        assert_eq!(row.components(), 1);
        let column = ReducedField::infer_layout(array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        assert_eq!(column.into_values(), array![[1.0, 2.0], [3.0, 4.0]]);
    }

    #[test]
    fn wrong_node_count_is_malformed() {
        let err = ReducedField::from_snapshot(array![[1.0, 2.0], [3.0, 4.0]], 3).unwrap_err();
        assert!(matches!(err, StudyError::MalformedPartition(_)));
    }

    #[test]
    fn expansion_interpolates_between_centers() {
        let w = PartitionWeights::from_matrix(array![[1.0, 0.5, 0.0], [0.0, 0.5, 1.0]]).unwrap();
        let f = ReducedField::from_snapshot(array![[2.0], [4.0]], 2).unwrap();
        let full = f.expand(&w).unwrap();
        assert_relative_eq!(full[[0, 0]], 2.0);
        assert_relative_eq!(full[[1, 0]], 3.0);
        assert_relative_eq!(full[[2, 0]], 4.0);
    }

    #[test]
    fn uncovered_node_is_malformed() {
        let w = PartitionWeights::from_matrix(array![[1.0, 0.0]]).unwrap();
        let err = ReducedField::constant(1.0, 1, 1).expand(&w).unwrap_err();
        assert!(matches!(err, StudyError::MalformedPartition(_)));
    }
}
