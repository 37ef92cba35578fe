use crate::stage::RunKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};
use vesselstudy_core::{Result, StudyError};

/// The external finite-element engine: consumes a job description and
/// returns the process exit code.
pub trait Solver: Send + Sync {
    fn run(&self, job_file: &Path, concurrency: usize) -> Result<i32>;

    /// Name used in logs and errors.
    fn program(&self) -> &str {
        "solver"
    }
}

/// Declarative inputs handed to the solver. Its schema beyond these
/// fields belongs to the solver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDescription {
    pub name: String,
    pub kind: RunKind,
    pub output_dir: PathBuf,
    pub mesh_files: Vec<PathBuf>,
    pub partitions: Vec<String>,
    pub final_step: u32,
    pub created_at: DateTime<Utc>,
}

impl JobDescription {
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StudyError::Parse(format!("job description: {}", e)))?;
        std::fs::write(path, json)?;
        debug!("job description written to {}", path.display());
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(StudyError::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| StudyError::Parse(format!("{}: {}", path.display(), e)))
    }
}

/// Solver reached through a host executable. The job file and the
/// concurrency hint are appended to the fixed arguments; stdout and stderr
/// go to `{job}.log` next to the job file.
#[derive(Debug, Clone)]
pub struct ExternalSolver {
    program: String,
    args: Vec<String>,
    cores_flag: String,
}

impl ExternalSolver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cores_flag: "--cores".to_string(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cores_flag(mut self, flag: impl Into<String>) -> Self {
        self.cores_flag = flag.into();
        self
    }

    pub fn log_path(job_file: &Path) -> PathBuf {
        job_file.with_extension("log")
    }
}

impl Solver for ExternalSolver {
    fn run(&self, job_file: &Path, concurrency: usize) -> Result<i32> {
        let log_path = Self::log_path(job_file);
        let log = File::create(&log_path)?;
        let err_log = log.try_clone()?;
        info!(
            "running {} on {} (log: {})",
            self.program,
            job_file.display(),
            log_path.display()
        );
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(job_file)
            .arg(&self.cores_flag)
            .arg(concurrency.to_string())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(err_log))
            .status()?;
        // Killed by a signal.
        let code = status.code().unwrap_or(-1);
        info!("{} exited with code {}", self.program, code);
        Ok(code)
    }

    fn program(&self) -> &str {
        &self.program
    }
}
