use crate::error::StudyError;
use crate::material::{MaterialMode, MaterialProperty};
use crate::series::DEFAULT_EXTENSION;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for StudyError {
    fn from(e: ConfigError) -> Self {
        StudyError::Config(e.to_string())
    }
}

/// Main configuration for a study
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StudyConfig {
    /// Worker pool and progress settings
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Stage pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Synthetic reference data for inverse runs
    #[serde(default)]
    pub reference: ReferenceConfig,

    /// Convergence and noise studies
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Worker threads for per-timestep stages
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Show a progress bar for per-timestep stages
    #[serde(default)]
    pub progress: bool,

    /// Concurrency hint passed to the external solver
    #[serde(default = "default_solver_cores")]
    pub solver_cores: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            progress: false,
            solver_cores: default_solver_cores(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Step at which every stage output must exist to count as complete
    #[serde(default = "default_final_step")]
    pub final_step: u32,

    /// Re-run stages even when their outputs already exist
    #[serde(default)]
    pub override_existing: bool,

    /// Snapshot file extension
    #[serde(default = "default_extension")]
    pub extension: String,

    #[serde(default)]
    pub variables: VariableNames,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            final_step: default_final_step(),
            override_existing: false,
            extension: default_extension(),
            variables: VariableNames::default(),
        }
    }
}

/// On-disk names of the series the pipeline reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableNames {
    pub disp: String,
    pub space: String,
    pub stiff: String,
    pub modulus: String,
    pub cl_field: String,
    pub cl_z: String,
    pub dm: String,
    pub u0: String,
    pub ut: String,
    pub ref_disp: String,
    pub pressure: String,
    /// Centerline multiplier series written by forward runs
    pub multiplier: String,
    /// Reduced centerline multipliers expanded onto the mesh
    pub lagrange: Vec<String>,
}

impl Default for VariableNames {
    fn default() -> Self {
        Self {
            disp: "Disp".to_string(),
            space: "Space".to_string(),
            stiff: "Stiff".to_string(),
            modulus: "Modulus".to_string(),
            cl_field: "CLField".to_string(),
            cl_z: "CLz".to_string(),
            dm: "DM".to_string(),
            u0: "U0".to_string(),
            ut: "Ut".to_string(),
            ref_disp: "RefDisp".to_string(),
            pressure: "Pres".to_string(),
            multiplier: "LM".to_string(),
            lagrange: vec!["0LM".to_string(), "tLM".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Fraction of the forward run taken as the reference instant
    #[serde(default = "default_target")]
    pub target: f64,

    /// Initial step numerator of the load scaling `t0 / nt`
    #[serde(default = "default_t0")]
    pub t0: u32,

    /// Number of load steps of the forward run
    #[serde(default = "default_nt")]
    pub nt: u32,

    /// Amplitude of the synthetic imaging noise
    #[serde(default)]
    pub noise_amplitude: f64,

    /// Spatial frequency multiplier of the synthetic imaging noise
    #[serde(default = "default_spatial_frequency")]
    pub spatial_frequency: u32,

    /// Seed for noise phases; None draws from entropy
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default = "default_material")]
    pub material: MaterialProperty,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            t0: default_t0(),
            nt: default_nt(),
            material: default_material(),
            noise_amplitude: 0.0,
            spatial_frequency: default_spatial_frequency(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    #[serde(default = "default_refinements")]
    pub refinements: Vec<usize>,

    /// Base of the logarithmic error axis
    #[serde(default = "default_log_base")]
    pub log_base: f64,

    #[serde(default = "default_noise_realizations")]
    pub noise_realizations: usize,

    /// Refinement level of the noise study runs
    #[serde(default = "default_noise_refinement")]
    pub noise_refinement: usize,

    /// Refinement level of the fixed high-resolution reference
    #[serde(default = "default_reference_refinement")]
    pub reference_refinement: usize,

    /// Step of the current snapshots compared against the references
    #[serde(default = "default_final_step")]
    pub current_step: u32,

    /// Verified variable -> reference snapshot file name
    #[serde(default = "default_reference_files")]
    pub reference_files: BTreeMap<String, String>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            refinements: default_refinements(),
            log_base: default_log_base(),
            noise_realizations: default_noise_realizations(),
            noise_refinement: default_noise_refinement(),
            reference_refinement: default_reference_refinement(),
            reference_files: default_reference_files(),
            current_step: default_final_step(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}
fn default_solver_cores() -> usize {
    num_cpus::get().min(16)
}
fn default_final_step() -> u32 {
    100
}
fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}
fn default_target() -> f64 {
    0.5
}
fn default_t0() -> u32 {
    1
}
fn default_nt() -> u32 {
    100
}
fn default_material() -> MaterialProperty {
    MaterialProperty::new(MaterialMode::Gradient, 30.0, 30.0)
}
fn default_spatial_frequency() -> u32 {
    1
}
fn default_refinements() -> Vec<usize> {
    vec![2, 4, 8, 16]
}
fn default_log_base() -> f64 {
    10.0
}
fn default_noise_realizations() -> usize {
    10
}
fn default_noise_refinement() -> usize {
    8
}
fn default_reference_refinement() -> usize {
    16
}
fn default_reference_files() -> BTreeMap<String, String> {
    [
        ("U0", "Disp-50.D"),
        ("Ut", "Disp-100.D"),
        ("Stiff", "Modulus-100.D"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}
fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration manager with file discovery and environment overrides
pub struct ConfigManager {
    config: StudyConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (`VESSELSTUDY_*`, `RUST_LOG`)
    /// 2. Config file (explicit path, `./.vesselstudy.toml`, `~/.vesselstudy/config.toml`)
    /// 3. Defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, config_path) = Self::load_config_file(explicit)?;
        let config = Self::apply_overrides(config, |key| std::env::var(key).ok());
        Self::validate_config(&config)?;

        match &config_path {
            Some(path) => info!("Configuration loaded from {}", path.display()),
            None => info!("No config file found, using defaults"),
        }
        debug!(
            "runner: concurrency={} progress={} solver_cores={}",
            config.runner.concurrency, config.runner.progress, config.runner.solver_cores
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn from_config(config: StudyConfig) -> Result<Self, ConfigError> {
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: None,
        })
    }

    fn load_config_file(
        explicit: Option<&Path>,
    ) -> Result<(StudyConfig, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            return Ok((Self::read_toml_file(path)?, Some(path.to_path_buf())));
        }

        let local_config = Path::new(".vesselstudy.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".vesselstudy").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((StudyConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<StudyConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_overrides(
        mut config: StudyConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> StudyConfig {
        if let Some(n) = lookup("VESSELSTUDY_CONCURRENCY").and_then(|v| v.parse().ok()) {
            config.runner.concurrency = n;
        }
        if let Some(n) = lookup("VESSELSTUDY_SOLVER_CORES").and_then(|v| v.parse().ok()) {
            config.runner.solver_cores = n;
        }
        if let Some(flag) = lookup("VESSELSTUDY_PROGRESS") {
            config.runner.progress = flag.to_lowercase() == "true" || flag == "1";
        }
        if let Some(flag) = lookup("VESSELSTUDY_OVERRIDE") {
            config.pipeline.override_existing = flag.to_lowercase() == "true" || flag == "1";
        }
        if let Some(step) = lookup("VESSELSTUDY_FINAL_STEP").and_then(|v| v.parse().ok()) {
            config.pipeline.final_step = step;
        }
        if let Some(t) = lookup("VESSELSTUDY_TARGET").and_then(|v| v.parse().ok()) {
            config.reference.target = t;
        }
        if let Some(a) = lookup("VESSELSTUDY_NOISE").and_then(|v| v.parse().ok()) {
            config.reference.noise_amplitude = a;
        }
        if let Some(f) = lookup("VESSELSTUDY_SPATIAL_FREQ").and_then(|v| v.parse().ok()) {
            config.reference.spatial_frequency = f;
        }
        if let Some(level) = lookup("RUST_LOG") {
            config.logging.level = level;
        }
        config
    }

    fn validate_config(config: &StudyConfig) -> Result<(), ConfigError> {
        if config.runner.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "runner.concurrency must be positive".to_string(),
            ));
        }
        if config.runner.solver_cores == 0 {
            return Err(ConfigError::ValidationError(
                "runner.solver_cores must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&config.reference.target) {
            return Err(ConfigError::ValidationError(format!(
                "reference.target must lie in [0, 1], got {}",
                config.reference.target
            )));
        }
        if config.reference.nt == 0 {
            return Err(ConfigError::ValidationError(
                "reference.nt must be positive".to_string(),
            ));
        }
        if config.reference.noise_amplitude < 0.0 {
            return Err(ConfigError::ValidationError(
                "reference.noise_amplitude must not be negative".to_string(),
            ));
        }
        if config.verification.refinements.is_empty()
            || config.verification.refinements.contains(&0)
        {
            return Err(ConfigError::ValidationError(
                "verification.refinements must be a non-empty list of positive levels"
                    .to_string(),
            ));
        }
        if config.verification.log_base <= 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "verification.log_base must exceed 1, got {}",
                config.verification.log_base
            )));
        }
        if config.pipeline.extension.is_empty() {
            return Err(ConfigError::ValidationError(
                "pipeline.extension must not be empty".to_string(),
            ));
        }

        // RUST_LOG may carry a full directive list; only the leading level is checked
        let level = config
            .logging
            .level
            .split(',')
            .next()
            .unwrap_or_default()
            .to_lowercase();
        match level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ if level.contains('=') => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    other
                )))
            }
        }

        Ok(())
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    pub fn into_config(self) -> StudyConfig {
        self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = StudyConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            }
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}
