use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StudyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing input: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Shape mismatch in {context}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        context: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("No files found for variable '{variable}' in {}", .dir.display())]
    EmptyDiscovery { variable: String, dir: PathBuf },

    #[error("External process '{program}' failed with exit code {code}")]
    ExternalProcess { program: String, code: i32 },

    #[error("Malformed partition: {0}")]
    MalformedPartition(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Stage '{stage}' finished without producing: {}", .missing.join(", "))]
    StageIncomplete { stage: String, missing: Vec<String> },

    #[error("{failures} timestep(s) failed; first failure at step {step}: {source}")]
    StageFailed {
        step: u32,
        failures: usize,
        #[source]
        source: Box<StudyError>,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl StudyError {
    pub fn shape_mismatch(context: impl Into<String>, expected: &[usize], found: &[usize]) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StudyError>;
