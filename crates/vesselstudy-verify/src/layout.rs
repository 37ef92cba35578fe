use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use vesselstudy_core::{series_path, Result, StudyError};

/// Directory naming of a study tree:
///
/// ```text
/// {root}/forward/forward_{shape}_{mode}_{n}
/// {root}/inverse/inverse_{shape}_{mode}_{n}
/// {root}/noise/noise_{shape}_{mode}_{n}_{freq}_{mag}_{k}
/// ```
#[derive(Debug, Clone)]
pub struct StudyLayout {
    root: PathBuf,
    shape: String,
    mode: String,
}

impl StudyLayout {
    pub fn new(root: impl Into<PathBuf>, shape: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            shape: shape.into(),
            mode: mode.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn forward_dir(&self, refinement: usize) -> PathBuf {
        self.root
            .join("forward")
            .join(format!("forward_{}_{}_{}", self.shape, self.mode, refinement))
    }

    pub fn inverse_dir(&self, refinement: usize) -> PathBuf {
        self.root
            .join("inverse")
            .join(format!("inverse_{}_{}_{}", self.shape, self.mode, refinement))
    }

    pub fn noise_dir(&self, refinement: usize, freq: u32, mag: &str, realization: usize) -> PathBuf {
        self.root.join("noise").join(format!(
            "noise_{}_{}_{}_{}_{}_{}",
            self.shape, self.mode, refinement, freq, mag, realization
        ))
    }
}

/// Reference snapshot of a verified variable inside a forward run directory.
pub fn reference_file(
    dir: &Path,
    variable: &str,
    reference_files: &BTreeMap<String, String>,
) -> Result<PathBuf> {
    reference_files
        .get(variable)
        .map(|file| dir.join(file))
        .ok_or_else(|| {
            StudyError::Config(format!("no reference snapshot configured for '{}'", variable))
        })
}

/// Current snapshot `{variable}-{step}` inside an inverse or noise run.
pub fn current_file(dir: &Path, variable: &str, step: u32, ext: &str) -> PathBuf {
    series_path(dir, variable, step, ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesselstudy_core::VerificationConfig;

    #[test]
    fn run_directories() {
        let layout = StudyLayout::new("/study", "bulge", "circ");
        assert_eq!(
            layout.forward_dir(16),
            PathBuf::from("/study/forward/forward_bulge_circ_16")
        );
        assert_eq!(
            layout.inverse_dir(2),
            PathBuf::from("/study/inverse/inverse_bulge_circ_2")
        );
        assert_eq!(
            layout.noise_dir(8, 2, "0.5", 9),
            PathBuf::from("/study/noise/noise_bulge_circ_8_2_0.5_9")
        );
    }

    #[test]
    fn reference_files_come_from_configuration() {
        let files = VerificationConfig::default().reference_files;
        let dir = Path::new("/study/forward/forward_straight_grad_4");
        assert_eq!(
            reference_file(dir, "U0", &files).unwrap(),
            dir.join("Disp-50.D")
        );
        assert_eq!(
            reference_file(dir, "Stiff", &files).unwrap(),
            dir.join("Modulus-100.D")
        );
        assert!(matches!(
            reference_file(dir, "Pres", &files),
            Err(StudyError::Config(_))
        ));
        assert_eq!(current_file(dir, "Stiff", 100, "D"), dir.join("Stiff-100.D"));
    }
}
