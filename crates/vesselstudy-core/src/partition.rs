//! Reduced centerline partition.
//!
//! The partition is constructed by an external collaborator; this module
//! only holds and validates it. Each segment carries a triangular support
//! window over the normalized longitudinal coordinate in `[0, 1]`.

use crate::error::{Result, StudyError};
use crate::snapshot::Snapshot;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// Triangular support `(left, center, right)`: weight 1 at `center`,
/// 0 at and beyond `left`/`right`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub left: f64,
    pub center: f64,
    pub right: f64,
}

impl Segment {
    pub fn new(left: f64, center: f64, right: f64) -> Self {
        Self {
            left,
            center,
            right,
        }
    }

    #[inline]
    pub fn weight(&self, x: f64) -> f64 {
        let rising = (x - self.left) / (self.center - self.left);
        let falling = (self.right - x) / (self.right - self.center);
        rising.min(falling).max(0.0)
    }

    pub fn weights(&self, coords: ArrayView1<'_, f64>) -> Array1<f64> {
        coords.mapv(|x| self.weight(x))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReducedPartition {
    prefix: String,
    segments: Vec<Segment>,
    node_count: usize,
}

impl ReducedPartition {
    /// Validates ordering of the supports. `node_count` is the number of
    /// reduced nodes the partition's own basis is written over.
    pub fn new(prefix: impl Into<String>, segments: Vec<Segment>, node_count: usize) -> Result<Self> {
        if segments.is_empty() {
            return Err(StudyError::MalformedPartition(
                "partition has no segments".to_string(),
            ));
        }
        for (i, s) in segments.iter().enumerate() {
            if !(s.left < s.center && s.center < s.right) {
                return Err(StudyError::MalformedPartition(format!(
                    "segment {} support ({}, {}, {}) is not strictly increasing",
                    i, s.left, s.center, s.right
                )));
            }
        }
        if let Some(i) = segments
            .windows(2)
            .position(|w| w[1].center <= w[0].center)
        {
            return Err(StudyError::MalformedPartition(format!(
                "segment centers not increasing at {}: {} then {}",
                i,
                segments[i].center,
                segments[i + 1].center
            )));
        }
        Ok(Self {
            prefix: prefix.into(),
            segments,
            node_count,
        })
    }

    /// Standard hat-function partition with `elements + 1` nodes evenly
    /// spaced on `[0, 1]`; end supports extend half a window past the ends.
    pub fn uniform(prefix: impl Into<String>, elements: usize) -> Result<Self> {
        if elements == 0 {
            return Err(StudyError::MalformedPartition(
                "uniform partition needs at least one element".to_string(),
            ));
        }
        let h = 1.0 / elements as f64;
        let segments = (0..=elements)
            .map(|i| {
                let c = i as f64 * h;
                Segment::new(c - h, c, c + h)
            })
            .collect();
        Self::new(prefix, segments, elements + 1)
    }

    /// Loads an `(n, 3)` support array as written by the partition builder.
    pub fn from_support(prefix: impl Into<String>, support: &Snapshot) -> Result<Self> {
        if support.ncols() != 3 {
            return Err(StudyError::shape_mismatch(
                "partition support",
                &[support.nrows(), 3],
                &[support.nrows(), support.ncols()],
            ));
        }
        let segments: Vec<Segment> = support
            .rows()
            .into_iter()
            .map(|r| Segment::new(r[0], r[1], r[2]))
            .collect();
        let n = segments.len();
        Self::new(prefix, segments, n)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Reduced node parameterization (segment centers).
    pub fn node_coordinates(&self) -> Array1<f64> {
        self.segments.iter().map(|s| s.center).collect()
    }

    /// Name of a reduced variable in this partition's on-disk namespace.
    pub fn qualified(&self, variable: &str) -> String {
        format!("{}{}", self.prefix, variable)
    }

    /// Fails on the first mesh node no segment covers.
    pub fn check_coverage(&self, coords: ArrayView1<'_, f64>) -> Result<()> {
        for (i, &x) in coords.iter().enumerate() {
            let total: f64 = self.segments.iter().map(|s| s.weight(x)).sum();
            if total <= 0.0 {
                return Err(StudyError::MalformedPartition(format!(
                    "mesh node {} at coordinate {} is not covered by '{}'",
                    i, x, self.prefix
                )));
            }
        }
        Ok(())
    }
}
