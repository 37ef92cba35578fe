//! Mesh and partition collaborators.
//!
//! Mesh generation and partition construction happen outside this crate;
//! the providers here only prepare what they can and load the results.

use crate::stage::ExpectedOutput;
use ndarray::{Array1, Array2};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vesselstudy_core::{
    read_snapshot, write_snapshot, ReducedPartition, Result, Snapshot, StudyError,
};

// Stage outputs resolve relative paths against the run directory, so
// collaborator files are kept absolute.
fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

/// Per-node geometry used by the post-processing stages.
#[derive(Debug, Clone)]
pub struct MeshData {
    /// Reference coordinates, `(nodes, dim)`.
    pub coordinates: Snapshot,
    /// Outward wall normals, same shape as `coordinates`.
    pub normals: Snapshot,
    /// Normalized longitudinal coordinate of each node.
    pub centerline: Array1<f64>,
    /// Angular coordinate of each node, in turns.
    pub angle: Array1<f64>,
}

impl MeshData {
    pub fn new(coordinates: Snapshot, normals: Snapshot, centerline: &Snapshot) -> Result<Self> {
        let nodes = coordinates.nrows();
        if normals.dim() != coordinates.dim() {
            return Err(StudyError::shape_mismatch(
                "mesh normals",
                &[coordinates.nrows(), coordinates.ncols()],
                &[normals.nrows(), normals.ncols()],
            ));
        }
        if centerline.nrows() != nodes || centerline.ncols() == 0 {
            return Err(StudyError::shape_mismatch(
                "mesh centerline coordinates",
                &[nodes, 2],
                &[centerline.nrows(), centerline.ncols()],
            ));
        }
        let angle = if centerline.ncols() > 1 {
            centerline.column(1).to_owned()
        } else {
            Array1::zeros(nodes)
        };
        Ok(Self {
            centerline: centerline.column(0).to_owned(),
            angle,
            coordinates,
            normals,
        })
    }

    pub fn node_count(&self) -> usize {
        self.coordinates.nrows()
    }
}

pub trait MeshProvider: Send + Sync {
    /// Files that exist once the mesh is ready.
    fn outputs(&self) -> Vec<ExpectedOutput>;
    fn prepare(&self) -> Result<()>;
    fn load(&self) -> Result<MeshData>;
}

/// A mesh already converted to snapshot files:
/// `{name}.X` coordinates, `{name}.N` normals and `{name}.CL` centerline
/// coordinates (longitudinal, then optionally angular).
#[derive(Debug, Clone)]
pub struct MeshDirectory {
    dir: PathBuf,
    name: String,
}

impl MeshDirectory {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: absolute(dir.into()),
            name: name.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn coordinates_path(&self) -> PathBuf {
        self.dir.join(format!("{}.X", self.name))
    }

    pub fn normals_path(&self) -> PathBuf {
        self.dir.join(format!("{}.N", self.name))
    }

    pub fn centerline_path(&self) -> PathBuf {
        self.dir.join(format!("{}.CL", self.name))
    }

    /// Writes a mesh in this directory's layout.
    pub fn store(&self, coordinates: &Snapshot, normals: &Snapshot, centerline: &Snapshot) -> Result<()> {
        write_snapshot(&self.coordinates_path(), coordinates)?;
        write_snapshot(&self.normals_path(), normals)?;
        write_snapshot(&self.centerline_path(), centerline)
    }
}

impl MeshProvider for MeshDirectory {
    fn outputs(&self) -> Vec<ExpectedOutput> {
        vec![
            ExpectedOutput::File(self.coordinates_path()),
            ExpectedOutput::File(self.normals_path()),
            ExpectedOutput::File(self.centerline_path()),
        ]
    }

    fn prepare(&self) -> Result<()> {
        // Generation is external; report the first file that is missing.
        for path in [
            self.coordinates_path(),
            self.normals_path(),
            self.centerline_path(),
        ] {
            if !path.is_file() {
                return Err(StudyError::MissingInput(path));
            }
        }
        Ok(())
    }

    fn load(&self) -> Result<MeshData> {
        let mesh = MeshData::new(
            read_snapshot(&self.coordinates_path())?,
            read_snapshot(&self.normals_path())?,
            &read_snapshot(&self.centerline_path())?,
        )?;
        debug!("mesh '{}' loaded with {} nodes", self.name, mesh.node_count());
        Ok(mesh)
    }
}

/// The reduced partitions of a run. Forward runs constrain the centerline;
/// inverse runs additionally need the material partition.
#[derive(Debug, Clone, Default)]
pub struct Partitions {
    pub centerline: Option<ReducedPartition>,
    pub material: Option<ReducedPartition>,
}

impl Partitions {
    pub fn iter(&self) -> impl Iterator<Item = &ReducedPartition> {
        self.centerline.iter().chain(self.material.iter())
    }
}

pub trait PartitionProvider: Send + Sync {
    fn outputs(&self) -> Vec<ExpectedOutput>;
    fn prepare(&self, mesh: &MeshData) -> Result<()>;
    fn load(&self) -> Result<Partitions>;
}

fn support_snapshot(partition: &ReducedPartition) -> Snapshot {
    let mut support = Array2::zeros((partition.segment_count(), 3));
    for (mut row, s) in support.rows_mut().into_iter().zip(partition.segments()) {
        row[0] = s.left;
        row[1] = s.center;
        row[2] = s.right;
    }
    support
}

fn load_support(prefix: &str, path: &Path) -> Result<ReducedPartition> {
    ReducedPartition::from_support(prefix, &read_snapshot(path)?)
}

/// Hat-function partitions with evenly spaced nodes, written as
/// `{prefix}.SUPPORT` files in `dir`.
#[derive(Debug, Clone)]
pub struct UniformPartitions {
    dir: PathBuf,
    centerline: Option<(String, usize)>,
    material: Option<(String, usize)>,
}

impl UniformPartitions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: absolute(dir.into()),
            centerline: None,
            material: None,
        }
    }

    pub fn with_centerline(mut self, prefix: impl Into<String>, elements: usize) -> Self {
        self.centerline = Some((prefix.into(), elements));
        self
    }

    pub fn with_material(mut self, prefix: impl Into<String>, elements: usize) -> Self {
        self.material = Some((prefix.into(), elements));
        self
    }

    fn support_path(&self, prefix: &str) -> PathBuf {
        self.dir.join(format!("{}.SUPPORT", prefix))
    }

    fn specs(&self) -> impl Iterator<Item = &(String, usize)> {
        self.centerline.iter().chain(self.material.iter())
    }
}

impl PartitionProvider for UniformPartitions {
    fn outputs(&self) -> Vec<ExpectedOutput> {
        self.specs()
            .map(|(prefix, _)| ExpectedOutput::File(self.support_path(prefix)))
            .collect()
    }

    fn prepare(&self, mesh: &MeshData) -> Result<()> {
        for (prefix, elements) in self.specs() {
            let partition = ReducedPartition::uniform(prefix.as_str(), *elements)?;
            partition.check_coverage(mesh.centerline.view())?;
            write_snapshot(&self.support_path(prefix), &support_snapshot(&partition))?;
            info!(
                "partition '{}' with {} segments written",
                prefix,
                partition.segment_count()
            );
        }
        Ok(())
    }

    fn load(&self) -> Result<Partitions> {
        let load = |spec: &Option<(String, usize)>| -> Result<Option<ReducedPartition>> {
            spec.as_ref()
                .map(|(prefix, _)| load_support(prefix, &self.support_path(prefix)))
                .transpose()
        };
        Ok(Partitions {
            centerline: load(&self.centerline)?,
            material: load(&self.material)?,
        })
    }
}

/// Partitions built by an external tool and stored as support files.
#[derive(Debug, Clone, Default)]
pub struct SupportFilePartitions {
    centerline: Option<(String, PathBuf)>,
    material: Option<(String, PathBuf)>,
}

impl SupportFilePartitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_centerline(mut self, prefix: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.centerline = Some((prefix.into(), absolute(path.into())));
        self
    }

    pub fn with_material(mut self, prefix: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.material = Some((prefix.into(), absolute(path.into())));
        self
    }
}

impl PartitionProvider for SupportFilePartitions {
    fn outputs(&self) -> Vec<ExpectedOutput> {
        self.centerline
            .iter()
            .chain(self.material.iter())
            .map(|(_, path)| ExpectedOutput::File(path.clone()))
            .collect()
    }

    fn prepare(&self, _mesh: &MeshData) -> Result<()> {
        match self
            .centerline
            .iter()
            .chain(self.material.iter())
            .find(|(_, path)| !path.is_file())
        {
            Some((_, path)) => Err(StudyError::MissingInput(path.clone())),
            None => Ok(()),
        }
    }

    fn load(&self) -> Result<Partitions> {
        Ok(Partitions {
            centerline: self
                .centerline
                .as_ref()
                .map(|(prefix, path)| load_support(prefix, path))
                .transpose()?,
            material: self
                .material
                .as_ref()
                .map(|(prefix, path)| load_support(prefix, path))
                .transpose()?,
        })
    }
}
