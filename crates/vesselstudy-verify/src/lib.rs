//! Verification of study runs against their ground truth.
//!
//! Produces the numeric series behind the convergence and noise figures:
//! L2 and centerline-weighted error curves over refinement levels, and
//! per-realization relative errors under measurement noise.

pub mod convergence;
pub mod layout;
pub mod noise;
pub mod norms;

pub use convergence::{l2_convergence, weighted_convergence, ConvergenceCurve};
pub use layout::{current_file, reference_file, StudyLayout};
pub use noise::{noise_sensitivity, reduced_relative_error, NoiseCase, NoisePoint};
pub use norms::{
    calculate_norm, calculate_weighted_norm, reduced_residual, relative_error, AbsStats,
    CenterlineMesh,
};
