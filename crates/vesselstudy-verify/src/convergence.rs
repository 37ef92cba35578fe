//! Error-versus-refinement curves across a study tree.

use crate::layout::{current_file, reference_file, StudyLayout};
use crate::norms::{calculate_norm, calculate_weighted_norm, CenterlineMesh};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;
use vesselstudy_core::{read_snapshot, Result, StudyError, VerificationConfig};

/// One error per refinement level for one variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConvergenceCurve {
    pub variable: String,
    pub refinements: Vec<usize>,
    pub errors: Vec<f64>,
}

impl ConvergenceCurve {
    /// Errors on a logarithmic axis of the given base.
    pub fn log_values(&self, base: f64) -> Vec<f64> {
        self.errors.iter().map(|e| e.log(base)).collect()
    }

    /// Observed convergence order between consecutive refinement levels:
    /// `log(e_i / e_{i+1}) / log(n_{i+1} / n_i)`.
    pub fn observed_orders(&self) -> Vec<f64> {
        self.refinements
            .windows(2)
            .zip(self.errors.windows(2))
            .map(|(n, e)| (e[0] / e[1]).ln() / (n[1] as f64 / n[0] as f64).ln())
            .collect()
    }
}

fn ensure_refinements(config: &VerificationConfig) -> Result<()> {
    if config.refinements.is_empty() {
        return Err(StudyError::Config(
            "verification needs at least one refinement level".to_string(),
        ));
    }
    Ok(())
}

/// Plain L2 convergence: `inverse_{n}/{v}-{step}` against the reference
/// snapshot in `forward_{n}` at every refinement `n`.
pub fn l2_convergence(
    layout: &StudyLayout,
    config: &VerificationConfig,
    variables: &[String],
    ext: &str,
) -> Result<Vec<ConvergenceCurve>> {
    ensure_refinements(config)?;
    variables
        .iter()
        .map(|v| {
            let errors = config
                .refinements
                .par_iter()
                .map(|&n| {
                    let reference = read_snapshot(&reference_file(
                        &layout.forward_dir(n),
                        v,
                        &config.reference_files,
                    )?)?;
                    let current = read_snapshot(&current_file(
                        &layout.inverse_dir(n),
                        v,
                        config.current_step,
                        ext,
                    ))?;
                    calculate_norm(&current, &reference)
                })
                .collect::<Result<Vec<f64>>>()?;
            info!("{} L2 errors: {:?}", v, errors);
            Ok(ConvergenceCurve {
                variable: v.clone(),
                refinements: config.refinements.clone(),
                errors,
            })
        })
        .collect()
}

/// Centerline-weighted convergence against the single finest forward run.
/// Each level reduces over a uniform partition with `n` elements and is
/// normalized by `sqrt(n)`.
pub fn weighted_convergence(
    layout: &StudyLayout,
    config: &VerificationConfig,
    mesh: &CenterlineMesh,
    variables: &[String],
    ext: &str,
) -> Result<Vec<ConvergenceCurve>> {
    ensure_refinements(config)?;
    let reference_dir = layout.forward_dir(config.reference_refinement);
    variables
        .iter()
        .map(|v| {
            let reference = read_snapshot(&reference_file(
                &reference_dir,
                v,
                &config.reference_files,
            )?)?;
            let errors = config
                .refinements
                .par_iter()
                .map(|&n| -> Result<f64> {
                    let current = read_snapshot(&current_file(
                        &layout.inverse_dir(n),
                        v,
                        config.current_step,
                        ext,
                    ))?;
                    let weights = mesh.uniform_weights(n)?;
                    let error = calculate_weighted_norm(&current, &reference, mesh, &weights)?;
                    Ok(error / (n as f64).sqrt())
                })
                .collect::<Result<Vec<f64>>>()?;
            info!("{} weighted errors: {:?}", v, errors);
            Ok(ConvergenceCurve {
                variable: v.clone(),
                refinements: config.refinements.clone(),
                errors,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn log_values_use_requested_base() {
        let curve = ConvergenceCurve {
            variable: "Ut".to_string(),
            refinements: vec![2, 4],
            errors: vec![100.0, 0.1],
        };
        let logs = curve.log_values(10.0);
        assert_relative_eq!(logs[0], 2.0, epsilon = 1e-12);
        assert_relative_eq!(logs[1], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn second_order_curve() {
        let curve = ConvergenceCurve {
            variable: "U0".to_string(),
            refinements: vec![2, 4, 8],
            errors: vec![1.0, 0.25, 0.0625],
        };
        for order in curve.observed_orders() {
            assert_relative_eq!(order, 2.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn empty_refinement_list_is_a_config_error() {
        let layout = StudyLayout::new("/study", "straight", "grad");
        let config = VerificationConfig {
            refinements: Vec::new(),
            ..VerificationConfig::default()
        };
        assert!(matches!(
            l2_convergence(&layout, &config, &["U0".to_string()], "D"),
            Err(StudyError::Config(_))
        ));
    }
}
