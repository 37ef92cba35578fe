use crate::stage::ExpectedOutput;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};
use vesselstudy_core::{Result, StudyError};

/// Converts finished series into a visualization format.
pub trait Exporter: Send + Sync {
    fn outputs(&self, run_dir: &Path) -> Vec<ExpectedOutput>;
    fn export(&self, run_dir: &Path, variables: &[String], space: Option<&Path>) -> Result<()>;
}

/// Runs an external converter as
/// `program [args..] --input <dir> --prefix <prefix> [--space <file>] <vars..>`,
/// which is expected to write `{prefix}-{final}.vtu` into the run directory.
#[derive(Debug, Clone)]
pub struct CommandExporter {
    program: String,
    args: Vec<String>,
    prefix: String,
    final_step: u32,
}

impl CommandExporter {
    pub fn new(program: impl Into<String>, final_step: u32) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            prefix: "res".to_string(),
            final_step,
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

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

impl Exporter for CommandExporter {
    fn outputs(&self, _run_dir: &Path) -> Vec<ExpectedOutput> {
        vec![ExpectedOutput::File(PathBuf::from(format!(
            "{}-{}.vtu",
            self.prefix, self.final_step
        )))]
    }

    fn export(&self, run_dir: &Path, variables: &[String], space: Option<&Path>) -> Result<()> {
        if variables.is_empty() {
            warn!("nothing to export from {}", run_dir.display());
        }
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--input")
            .arg(run_dir)
            .arg("--prefix")
            .arg(&self.prefix);
        if let Some(space) = space {
            cmd.arg("--space").arg(space);
        }
        let output = cmd.args(variables).output()?;
        if !output.status.success() {
            warn!(
                "{} failed: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr)
            );
            return Err(StudyError::ExternalProcess {
                program: self.program.clone(),
                code: output.status.code().unwrap_or(-1),
            });
        }
        info!("exported {} variable(s) with {}", variables.len(), self.program);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_final_frame() {
        let e = CommandExporter::new("convert", 100).with_prefix("inv");
        assert_eq!(
            e.outputs(Path::new("/tmp")),
            vec![ExpectedOutput::File(PathBuf::from("inv-100.vtu"))]
        );
    }

    #[cfg(unix)]
    #[test]
    fn failing_converter_is_external_process_error() {
        let dir = tempfile::tempdir().unwrap();
        let e = CommandExporter::new("false", 100);
        let err = e
            .export(dir.path(), &["Disp".to_string()], None)
            .unwrap_err();
        assert!(matches!(err, StudyError::ExternalProcess { .. }));
    }
}
