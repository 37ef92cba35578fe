//! Shape-preserving piecewise cubic Hermite interpolation (Fritsch–Carlson).

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use vesselstudy_core::{Result, StudyError};

fn check_grid(x: ArrayView1<'_, f64>, len: usize) -> Result<()> {
    if x.len() != len {
        return Err(StudyError::shape_mismatch("pchip samples", &[x.len()], &[len]));
    }
    if x.len() < 2 {
        return Err(StudyError::InvalidOperation(
            "pchip needs at least two samples".to_string(),
        ));
    }
    if x.windows(2).into_iter().any(|w| !(w[1] > w[0])) {
        return Err(StudyError::InvalidOperation(
            "pchip abscissae must be strictly increasing".to_string(),
        ));
    }
    Ok(())
}

// Unlike f64::signum, zero has sign zero.
fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

fn endpoint_slope(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    if sign(d) != sign(m0) {
        0.0
    } else if sign(m0) != sign(m1) && d.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        d
    }
}

fn slopes(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> Vec<f64> {
    let n = x.len();
    let h: Vec<f64> = (0..n - 1).map(|k| x[k + 1] - x[k]).collect();
    let m: Vec<f64> = (0..n - 1).map(|k| (y[k + 1] - y[k]) / h[k]).collect();
    if n == 2 {
        return vec![m[0], m[0]];
    }
    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        if m[k - 1] * m[k] > 0.0 {
            let w1 = 2.0 * h[k] + h[k - 1];
            let w2 = h[k] + 2.0 * h[k - 1];
            d[k] = (w1 + w2) / (w1 / m[k - 1] + w2 / m[k]);
        }
    }
    d[0] = endpoint_slope(h[0], h[1], m[0], m[1]);
    d[n - 1] = endpoint_slope(h[n - 2], h[n - 3], m[n - 2], m[n - 3]);
    d
}

fn evaluate(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>, d: &[f64], at: f64) -> f64 {
    let n = x.len();
    // Interval search; points outside the grid use the end polynomials.
    let k = match x.iter().position(|&xk| xk > at) {
        Some(0) => 0,
        Some(i) => i - 1,
        None => n - 2,
    }
    .min(n - 2);
    let h = x[k + 1] - x[k];
    let t = (at - x[k]) / h;
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    h00 * y[k] + h10 * h * d[k] + h01 * y[k + 1] + h11 * h * d[k + 1]
}

/// Interpolates samples `y(x)` at `at`.
pub fn pchip(
    x: ArrayView1<'_, f64>,
    y: ArrayView1<'_, f64>,
    at: ArrayView1<'_, f64>,
) -> Result<Array1<f64>> {
    check_grid(x, y.len())?;
    let d = slopes(x, y);
    Ok(at.mapv(|p| evaluate(x, y, &d, p)))
}

/// Column-wise [`pchip`] for samples laid out one row per abscissa.
pub fn pchip_columns(
    x: ArrayView1<'_, f64>,
    y: ArrayView2<'_, f64>,
    at: ArrayView1<'_, f64>,
) -> Result<Array2<f64>> {
    check_grid(x, y.nrows())?;
    let mut out = Array2::zeros((at.len(), y.ncols()));
    for (mut col, src) in out.columns_mut().into_iter().zip(y.columns()) {
        let d = slopes(x, src);
        for (o, &p) in col.iter_mut().zip(at.iter()) {
            *o = evaluate(x, src, &d, p);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};

    #[test]
    fn reproduces_samples_and_lines() {
        let x = array![0.0, 0.5, 1.0];
        let y = array![1.0, 2.0, 3.0];
        let at = array![0.0, 0.25, 0.5, 0.9, 1.0];
        let v = pchip(x.view(), y.view(), at.view()).unwrap();
        for (got, want) in v.iter().zip([1.0, 1.5, 2.0, 2.8, 3.0]) {
            assert_relative_eq!(*got, want, epsilon = 1e-12);
        }
    }

    #[test]
    fn monotone_data_stays_monotone() {
        let x = array![0.0, 1.0, 2.0, 3.0, 4.0];
        let y = array![0.0, 0.0, 1.0, 1.0, 5.0];
        let at = Array1::linspace(0.0, 4.0, 81);
        let v = pchip(x.view(), y.view(), at.view()).unwrap();
        for w in v.windows(2) {
            assert!(w[1] >= w[0] - 1e-12);
        }
        // Flat stretches are not overshot.
        assert!(v.iter().take(21).all(|&p| p.abs() < 1e-12));
    }

    #[test]
    fn columns_are_independent() {
        let x = array![0.0, 1.0];
        let y = array![[0.0, 10.0], [2.0, 10.0]];
        let out = pchip_columns(x.view(), y.view(), array![0.5].view()).unwrap();
        assert_relative_eq!(out[[0, 0]], 1.0);
        assert_relative_eq!(out[[0, 1]], 10.0);
    }

    #[test]
    fn rejects_bad_grids() {
        let y = array![1.0, 2.0];
        assert!(pchip(array![0.0].view(), array![1.0].view(), y.view()).is_err());
        assert!(pchip(array![1.0, 0.0].view(), y.view(), y.view()).is_err());
        assert!(pchip(array![0.0, 1.0, 2.0].view(), y.view(), y.view()).is_err());
    }
}
