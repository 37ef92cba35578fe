//! Core types for the VesselStudy post-processing pipeline.
//!
//! - `series`: discovery of `{variable}-{step}` snapshot series
//! - `snapshot`: text codec for dense per-node arrays
//! - `partition`: reduced centerline partition data contract
//! - `material`: analytic modulus fields for synthetic studies
//! - `config_manager`: layered TOML/environment configuration

pub mod config_manager;
pub mod error;
pub mod material;
pub mod partition;
pub mod series;
pub mod snapshot;

pub use config_manager::{
    ConfigError, ConfigManager, LoggingConfig, PipelineConfig, ReferenceConfig, RunnerConfig,
    StudyConfig, VariableNames, VerificationConfig,
};
pub use error::*;
pub use material::*;
pub use partition::*;
pub use series::*;
pub use snapshot::*;
