//! Correlated monthly return sampling
//!
//! The monthly covariance `Σᵢⱼ = ρᵢⱼ·σᵢ·σⱼ / 12` is factored once as
//! `Σ = L·Lᵀ`. Each draw turns independent standard normals `z` into the
//! log-return vector `r = μ + L·z` with the variance drag already folded into
//! `μ`, and returns the growth factors `exp(r)`.
//!
//! The sampler holds no random state. Callers own their RNG and pass it in,
//! so concurrent simulations never share a stream.

use std::f64::consts::TAU;

use rand::Rng;
use rand_distr::{ChiSquared, Distribution};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::AssetClass;

/// Floor for Cholesky pivots that come out zero, negative or vanishingly small.
pub const COVARIANCE_EPSILON: f64 = 1e-10;

/// Distribution of the independent shocks fed into the Cholesky factor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ShockDistribution {
    #[default]
    Normal,
    /// Fat-tailed shocks, rescaled to unit variance. Needs more than 2 degrees of freedom.
    StudentT { degrees_of_freedom: f64 },
}

/// Lower-triangular Cholesky factor, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct CholeskyFactor {
    lower: Vec<f64>,
    dim: usize,
    clamped_pivots: usize,
}

impl CholeskyFactor {
    /// Factor a symmetric `dim × dim` row-major matrix.
    ///
    /// Never fails: pivots at or below [`COVARIANCE_EPSILON`] are clamped to
    /// it and counted in [`clamped_pivots`](Self::clamped_pivots). Rows with a
    /// zero diagonal (riskless assets) factor to zero and are not counted.
    ///
    /// For a matrix that is not positive definite the result is the factor of
    /// a nearby, less correlated matrix: the column below a clamped pivot is
    /// zeroed, and any row whose variance `Σₖ Lᵢₖ²` would exceed the input
    /// diagonal is scaled back onto it.
    #[must_use]
    pub fn decompose(matrix: &[f64], dim: usize) -> Self {
        debug_assert_eq!(matrix.len(), dim * dim);
        let mut lower = vec![0.0; dim * dim];
        let mut clamped = vec![false; dim];

        for i in 0..dim {
            for j in 0..=i {
                let sum: f64 = (0..j).map(|k| lower[i * dim + k] * lower[j * dim + k]).sum();

                if i == j {
                    let pivot = matrix[i * dim + i] - sum;
                    lower[i * dim + i] = if matrix[i * dim + i] == 0.0 {
                        // A riskless asset has no shock to factor
                        0.0
                    } else if pivot <= COVARIANCE_EPSILON || !pivot.is_finite() {
                        clamped[i] = true;
                        COVARIANCE_EPSILON.sqrt()
                    } else {
                        pivot.sqrt()
                    };
                } else {
                    let diag = lower[j * dim + j];
                    lower[i * dim + j] = if diag == 0.0 || clamped[j] {
                        0.0
                    } else {
                        (matrix[i * dim + j] - sum) / diag
                    };
                }
            }

            let row = &mut lower[i * dim..i * dim + i + 1];
            let variance: f64 = row.iter().map(|l| l * l).sum();
            let target = matrix[i * dim + i];
            if variance > target && variance > 0.0 {
                let scale = (target.max(0.0) / variance).sqrt();
                row.iter_mut().for_each(|l| *l *= scale);
            }
        }

        Self {
            lower,
            dim,
            clamped_pivots: clamped.iter().filter(|&&c| c).count(),
        }
    }

    #[must_use]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.lower[row * self.dim + col]
    }

    /// Variance of row `row` of `L·Lᵀ`.
    #[must_use]
    pub fn row_variance(&self, row: usize) -> f64 {
        self.lower[row * self.dim..row * self.dim + row + 1]
            .iter()
            .map(|l| l * l)
            .sum()
    }

    /// Number of pivots that had to be clamped.
    #[must_use]
    pub fn clamped_pivots(&self) -> usize {
        self.clamped_pivots
    }

    /// `out = L · z`
    #[inline]
    pub fn transform_into(&self, z: &[f64], out: &mut [f64]) {
        for (i, slot) in out.iter_mut().enumerate().take(self.dim) {
            let row = &self.lower[i * self.dim..i * self.dim + i + 1];
            *slot = row.iter().zip(z).map(|(l, zj)| l * zj).sum();
        }
    }
}

/// Monthly covariance matrix (row-major) from annual volatilities and a
/// correlation matrix; `None` means uncorrelated.
#[must_use]
pub fn monthly_covariance(assets: &[AssetClass], correlation: Option<&[Vec<f64>]>) -> Vec<f64> {
    let n = assets.len();
    let mut cov = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..n {
            let rho = match correlation {
                Some(matrix) => matrix[i][j],
                None if i == j => 1.0,
                None => 0.0,
            };
            cov[i * n + j] = rho * assets[i].volatility * assets[j].volatility / 12.0;
        }
    }
    cov
}

/// Move every off-diagonal correlation toward +1 by `factor` ∈ [0, 1].
///
/// Models correlations breaking down in a crisis: `ρ' = ρ + (1 − ρ)·factor`.
#[must_use]
pub fn stress_correlation(matrix: &[Vec<f64>], factor: f64) -> Vec<Vec<f64>> {
    matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            row.iter()
                .enumerate()
                .map(|(j, &rho)| {
                    if i == j {
                        1.0
                    } else {
                        (rho + (1.0 - rho) * factor).clamp(-1.0, 1.0)
                    }
                })
                .collect()
        })
        .collect()
}

/// A pair of independent standard normals from two uniforms (Box–Muller).
#[inline]
pub fn box_muller<R: Rng + ?Sized>(rng: &mut R) -> (f64, f64) {
    let u1 = nonzero_uniform(rng);
    let u2 = nonzero_uniform(rng);
    let radius = (-2.0 * u1.ln()).sqrt();
    let theta = TAU * u2;
    (radius * theta.cos(), radius * theta.sin())
}

#[inline]
fn nonzero_uniform<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    loop {
        let u: f64 = rng.random();
        if u > 0.0 {
            return u;
        }
    }
}

/// Joint monthly return sampler for a fixed set of asset classes.
#[derive(Debug, Clone)]
pub struct ReturnSampler {
    /// `ln(1 + mean/12) − ½·(L·Lᵀ)ᵢᵢ` per asset
    drifts: Vec<f64>,
    cholesky: CholeskyFactor,
    student_t: Option<(ChiSquared<f64>, f64)>,
}

impl ReturnSampler {
    pub fn new(
        assets: &[AssetClass],
        correlation: Option<&[Vec<f64>]>,
        shocks: ShockDistribution,
    ) -> Result<Self, ConfigError> {
        let n = assets.len();
        let cov = monthly_covariance(assets, correlation);
        let cholesky = CholeskyFactor::decompose(&cov, n);

        // With exp(r) lognormal, E[exp(r)] = 1 + mean/12 exactly, also when
        // the factor had to shrink a row
        let drifts = assets
            .iter()
            .enumerate()
            .map(|(i, asset)| (1.0 + asset.mean_return / 12.0).ln() - 0.5 * cholesky.row_variance(i))
            .collect();

        let student_t = match shocks {
            ShockDistribution::Normal => None,
            ShockDistribution::StudentT { degrees_of_freedom } => {
                if !(degrees_of_freedom > 2.0) || !degrees_of_freedom.is_finite() {
                    return Err(ConfigError::DegreesOfFreedom(degrees_of_freedom));
                }
                let chi = ChiSquared::new(degrees_of_freedom)
                    .map_err(|_| ConfigError::DegreesOfFreedom(degrees_of_freedom))?;
                Some((chi, degrees_of_freedom))
            }
        };

        Ok(Self {
            drifts,
            cholesky,
            student_t,
        })
    }

    #[must_use]
    pub fn num_assets(&self) -> usize {
        self.drifts.len()
    }

    #[must_use]
    pub fn cholesky(&self) -> &CholeskyFactor {
        &self.cholesky
    }

    #[must_use]
    pub fn covariance_adjusted(&self) -> bool {
        self.cholesky.clamped_pivots > 0
    }

    /// Draw one month of growth factors into `factors`.
    ///
    /// `normals` is scratch space of the same length. Normals are drawn in
    /// Box–Muller pairs, so the first asset sees the same shock stream
    /// whether the portfolio has one asset or two.
    pub fn sample_into<R: Rng + ?Sized>(&self, rng: &mut R, normals: &mut [f64], factors: &mut [f64]) {
        let n = self.num_assets();
        for pair in normals[..n].chunks_mut(2) {
            let (z1, z2) = box_muller(rng);
            pair[0] = z1;
            if let Some(second) = pair.get_mut(1) {
                *second = z2;
            }
        }

        if let Some((chi, dof)) = &self.student_t {
            // Shared mixing variable keeps the correlation structure
            let w: f64 = chi.sample(rng);
            let scale = ((dof - 2.0) / w).sqrt();
            normals[..n].iter_mut().for_each(|z| *z *= scale);
        }

        self.cholesky.transform_into(&normals[..n], &mut factors[..n]);
        for (factor, drift) in factors[..n].iter_mut().zip(&self.drifts) {
            *factor = (drift + *factor).exp();
        }
    }
}
