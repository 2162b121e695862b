//! Correction curves between commanded and target values.
//!
//! A fit maps the value a print file commanded onto the value the filament
//! profile wants: `corrected = c0 + c1*x + c2*x^2`. Inputs are sorted before
//! fitting; only the value distribution matters, not firing order.
//!
//! Exact rules by sample count:
//! - one sample on either side: ratio of the medians (`c1` only)
//! - two and two: secant line through both points
//! - three and three: least-squares parabola via the closed-form 3x3 inverse
//!
//! [`CurveFitter`] extends this to equal-length series longer than three with
//! an ordinary least-squares polynomial of bounded degree.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FitError {
    #[error("cannot fit {observed} target values against {commanded} commanded values")]
    UnsupportedCardinality { observed: usize, commanded: usize },
    #[error("fit input contains a non-finite value")]
    NonFinite,
}

/// Coefficients of `c0 + c1*x + c2*x^2`.
///
/// All-zero coefficients mark a degenerate fit; [`FitResult::correct`] then
/// passes targets through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FitResult {
    pub c0: f64,
    pub c1: f64,
    pub c2: f64,
}

impl FitResult {
    pub const DEGENERATE: Self = Self {
        c0: 0.0,
        c1: 0.0,
        c2: 0.0,
    };

    pub fn new(c0: f64, c1: f64, c2: f64) -> Self {
        Self { c0, c1, c2 }
    }

    pub fn from_coefficients(c: [f64; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }

    pub fn coefficients(&self) -> [f64; 3] {
        [self.c0, self.c1, self.c2]
    }

    /// Raw polynomial value at `x`.
    #[inline]
    pub fn evaluate(&self, x: f64) -> f64 {
        self.c0 + self.c1 * x + self.c2 * x * x
    }

    /// Corrected target for `target`; degenerate fits pass it through.
    #[inline]
    pub fn correct(&self, target: f64) -> f64 {
        if self.is_degenerate() {
            target
        } else {
            self.evaluate(target)
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.c0 == 0.0 && self.c1 == 0.0 && self.c2 == 0.0
    }

    /// Degree implied by the trailing non-zero coefficient.
    pub fn degree(&self) -> usize {
        if self.c2 != 0.0 {
            2
        } else if self.c1 != 0.0 {
            1
        } else {
            0
        }
    }
}

impl std::fmt::Display for FitResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c0={:.6} c1={:.6} c2={:.6}", self.c0, self.c1, self.c2)
    }
}

fn sorted(values: &[f64]) -> Result<Vec<f64>, FitError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    Ok(v)
}

/// Fit using the exact rules for one, two or three samples.
///
/// Any other cardinality is rejected; callers reduce their series first or
/// use [`CurveFitter`].
pub fn fit(observed: &[f64], commanded: &[f64]) -> Result<FitResult, FitError> {
    let obs = sorted(observed)?;
    let cmd = sorted(commanded)?;
    match (obs.len(), cmd.len()) {
        (0, _) | (_, 0) => Err(unsupported(&obs, &cmd)),
        (1, _) | (_, 1) => Ok(ratio_at_median(&obs, &cmd)),
        (2, 2) => Ok(secant(&obs, &cmd)),
        (3, 3) => Ok(quadratic3(&obs, &cmd)),
        _ => Err(unsupported(&obs, &cmd)),
    }
}

fn unsupported(obs: &[f64], cmd: &[f64]) -> FitError {
    FitError::UnsupportedCardinality {
        observed: obs.len(),
        commanded: cmd.len(),
    }
}

fn ratio_at_median(obs: &[f64], cmd: &[f64]) -> FitResult {
    let o = obs[obs.len() / 2];
    let c = cmd[cmd.len() / 2];
    if c == 0.0 {
        return FitResult::DEGENERATE;
    }
    FitResult::new(0.0, o / c, 0.0)
}

fn secant(obs: &[f64], cmd: &[f64]) -> FitResult {
    let dx = cmd[1] - cmd[0];
    if dx == 0.0 {
        return FitResult::DEGENERATE;
    }
    let c1 = (obs[1] - obs[0]) / dx;
    let c0 = obs[0] - c1 * cmd[0];
    FitResult::new(c0, c1, 0.0)
}

/// Least-squares parabola through three samples, solved with the cofactor
/// inverse of the normal-equation matrix.
///
/// Sums are formed about the mean commanded value so the fourth-power sums
/// stay well conditioned at hotend temperatures; coefficients are shifted
/// back afterwards.
fn quadratic3(obs: &[f64], cmd: &[f64]) -> FitResult {
    if cmd[0] == cmd[1] || cmd[1] == cmd[2] {
        return FitResult::DEGENERATE;
    }
    let m = (cmd[0] + cmd[1] + cmd[2]) / 3.0;
    let x: [f64; 3] = [cmd[0] - m, cmd[1] - m, cmd[2] - m];
    let n = 3.0;
    let x1: f64 = x.iter().sum();
    let x2: f64 = x.iter().map(|v| v * v).sum();
    let x3: f64 = x.iter().map(|v| v * v * v).sum();
    let x4: f64 = x.iter().map(|v| v * v * v * v).sum();
    let y1: f64 = obs.iter().sum();
    let x1y1: f64 = x.iter().zip(obs).map(|(a, b)| a * b).sum();
    let x2y1: f64 = x.iter().zip(obs).map(|(a, b)| a * a * b).sum();

    let det = n * (x2 * x4 - x3 * x3) - x1 * (x1 * x4 - x3 * x2) + x2 * (x1 * x3 - x2 * x2);
    if det == 0.0 || !det.is_finite() {
        return FitResult::DEGENERATE;
    }

    // Cofactor matrix of the symmetric normal matrix, already transposed.
    let m11 = x2 * x4 - x3 * x3;
    let m12 = x3 * x2 - x1 * x4;
    let m13 = x1 * x3 - x2 * x2;
    let m22 = n * x4 - x2 * x2;
    let m23 = x1 * x2 - n * x3;
    let m33 = n * x2 - x1 * x1;

    let a = (m11 * y1 + m12 * x1y1 + m13 * x2y1) / det;
    let b = (m12 * y1 + m22 * x1y1 + m23 * x2y1) / det;
    let c = (m13 * y1 + m23 * x1y1 + m33 * x2y1) / det;
    uncenter(a, b, c, m)
}

/// Convert `a + b(x-m) + c(x-m)^2` to plain power-basis coefficients.
fn uncenter(a: f64, b: f64, c: f64, m: f64) -> FitResult {
    FitResult::new(a - b * m + c * m * m, b - 2.0 * c * m, c)
}

/// Fitter with the least-squares extension for longer series.
#[derive(Debug, Clone, Copy)]
pub struct CurveFitter {
    max_degree: usize,
}

impl Default for CurveFitter {
    fn default() -> Self {
        Self { max_degree: 2 }
    }
}

impl CurveFitter {
    /// `max_degree` is clamped to 2, the highest degree a [`FitResult`] holds.
    pub fn new(max_degree: usize) -> Self {
        Self {
            max_degree: max_degree.min(2),
        }
    }

    pub fn max_degree(&self) -> usize {
        self.max_degree
    }

    /// Exact rules for one to three samples; equal-length series longer
    /// than three get a least-squares polynomial of degree
    /// `min(max_degree, len - 1)`.
    pub fn fit(&self, observed: &[f64], commanded: &[f64]) -> Result<FitResult, FitError> {
        let (no, nc) = (observed.len(), commanded.len());
        if no == nc && no > 3 {
            let obs = sorted(observed)?;
            let cmd = sorted(commanded)?;
            return Ok(self.least_squares(&obs, &cmd));
        }
        fit(observed, commanded)
    }

    fn least_squares(&self, obs: &[f64], cmd: &[f64]) -> FitResult {
        let degree = self.max_degree.min(cmd.len() - 1);
        if degree == 0 {
            return ratio_at_median(obs, cmd);
        }
        let m = cmd.iter().sum::<f64>() / cmd.len() as f64;
        let size = degree + 1;
        // Normal equations about the mean: sum x^(i+j) * c_j = sum y * x^i
        let mut powers = [0.0f64; 5];
        let mut rhs = [0.0f64; 3];
        for (&x_raw, &y) in cmd.iter().zip(obs) {
            let x = x_raw - m;
            let mut p = 1.0;
            for (k, slot) in powers.iter_mut().enumerate().take(2 * degree + 1) {
                *slot += p;
                if k < size {
                    rhs[k] += y * p;
                }
                p *= x;
            }
        }
        let mut a = [[0.0f64; 4]; 3];
        for (i, row) in a.iter_mut().enumerate().take(size) {
            for (j, cell) in row.iter_mut().enumerate().take(size) {
                *cell = powers[i + j];
            }
            row[size] = rhs[i];
        }
        match solve(&mut a, size) {
            Some(c) => uncenter(c[0], c[1], if degree == 2 { c[2] } else { 0.0 }, m),
            None => FitResult::DEGENERATE,
        }
    }
}

/// Gaussian elimination with partial pivoting on an augmented system.
fn solve(a: &mut [[f64; 4]; 3], size: usize) -> Option<[f64; 3]> {
    let scale = a
        .iter()
        .take(size)
        .flat_map(|row| row.iter().take(size))
        .fold(0.0f64, |m, v| m.max(v.abs()));
    let tol = scale * 1e-12;
    for col in 0..size {
        let pivot = (col..size).max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))?;
        if a[pivot][col].abs() <= tol {
            return None;
        }
        a.swap(col, pivot);
        for row in col + 1..size {
            let f = a[row][col] / a[col][col];
            for k in col..=size {
                a[row][k] -= f * a[col][k];
            }
        }
    }
    let mut out = [0.0f64; 3];
    for row in (0..size).rev() {
        let mut acc = a[row][size];
        for k in row + 1..size {
            acc -= a[row][k] * out[k];
        }
        out[row] = acc / a[row][row];
        if !out[row].is_finite() {
            return None;
        }
    }
    Some(out)
}
