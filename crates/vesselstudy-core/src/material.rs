use crate::error::{Result, StudyError};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Closed-form synthetic modulus field over the reduced coordinate `t`
/// (and, for [`MaterialMode::Circumferential`], an angular coordinate
/// `theta` normalized to `[0, 1]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialMode {
    #[serde(rename = "const")]
    Constant,
    #[serde(rename = "grad")]
    Gradient,
    #[serde(rename = "sine")]
    Sinusoidal,
    #[serde(rename = "circ")]
    Circumferential,
}

impl MaterialMode {
    pub const ALL: [MaterialMode; 4] = [
        MaterialMode::Constant,
        MaterialMode::Gradient,
        MaterialMode::Sinusoidal,
        MaterialMode::Circumferential,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            MaterialMode::Constant => "const",
            MaterialMode::Gradient => "grad",
            MaterialMode::Sinusoidal => "sine",
            MaterialMode::Circumferential => "circ",
        }
    }
}

impl fmt::Display for MaterialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for MaterialMode {
    type Err = StudyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "const" | "constant" => Ok(MaterialMode::Constant),
            "grad" | "gradient" => Ok(MaterialMode::Gradient),
            "sine" | "sinusoidal" => Ok(MaterialMode::Sinusoidal),
            "circ" | "circumferential" => Ok(MaterialMode::Circumferential),
            other => Err(StudyError::Config(format!(
                "unknown material mode '{}'; expected const, grad, sine or circ",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperty {
    pub mode: MaterialMode,
    pub baseline: f64,
    pub amplitude: f64,
}

impl MaterialProperty {
    pub fn new(mode: MaterialMode, baseline: f64, amplitude: f64) -> Self {
        Self {
            mode,
            baseline,
            amplitude,
        }
    }

    pub fn modulus(&self, t: f64, theta: f64) -> f64 {
        let (b, a) = (self.baseline, self.amplitude);
        match self.mode {
            MaterialMode::Constant => b,
            MaterialMode::Gradient => b + a * (-2.0 * t).exp(),
            MaterialMode::Sinusoidal => {
                let c = (PI * t).cos();
                b + a * c * c
            }
            MaterialMode::Circumferential => {
                b + a * (-3.0 * (1.0 - t)).exp() * (2.0 * PI * theta).cos()
            }
        }
    }

    /// Modulus on purely longitudinal nodes. The angular term of the
    /// circumferential mode has zero mean, so it reduces to the baseline.
    pub fn longitudinal_modulus(&self, t: f64) -> f64 {
        match self.mode {
            MaterialMode::Circumferential => self.baseline,
            _ => self.modulus(t, 0.0),
        }
    }

    pub fn evaluate(&self, t: ArrayView1<'_, f64>) -> Array1<f64> {
        t.mapv(|x| self.longitudinal_modulus(x))
    }
}

/// Stiffness modulus represented by a reduced multiplier `dm`.
#[inline]
pub fn modulus_from_multiplier(dm: f64) -> f64 {
    10.0 * (1.0 + dm)
}

/// Inverse of [`modulus_from_multiplier`].
#[inline]
pub fn multiplier_from_modulus(modulus: f64) -> f64 {
    0.1 * modulus - 1.0
}
