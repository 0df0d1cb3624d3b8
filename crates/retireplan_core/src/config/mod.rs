//! Monte Carlo simulation configuration
//!
//! `SimulationConfig` holds everything the path engine needs: the asset
//! classes, their correlation, the month-indexed cash-flow events and the
//! run parameters. Scenario files deserialize straight into it; missing run
//! parameters fall back to the defaults below.
//!
//! # Builder DSL
//!
//! ```ignore
//! use retireplan_core::config::SimulationBuilder;
//! use retireplan_core::model::{AssetClass, AssetId, CashFlowItem};
//!
//! let (config, skipped) = SimulationBuilder::new()
//!     .start(2026, 1, 1)
//!     .horizon_years(30)
//!     .iterations(2_000)
//!     .seed(42)
//!     .asset(AssetClass::new(AssetId(1), "Equities").initial_value(250_000.0).mean_return(0.07).volatility(0.18))
//!     .initial_cash(20_000.0)
//!     .income(CashFlowItem::monthly("Pension", 2_400.0, jiff::civil::date(2035, 1, 1)))
//!     .cost(CashFlowItem::monthly("Living", 3_100.0, jiff::civil::date(2026, 1, 1)))
//!     .build();
//! ```

use std::time::Duration;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{AssetClass, CashflowEvent, MonthIndex};
use crate::sampler::ShockDistribution;

pub mod builder;

pub use builder::SimulationBuilder;

fn default_iterations() -> usize {
    1_000
}

fn default_percentiles() -> Vec<u8> {
    vec![5, 10, 25, 50, 75, 90, 95]
}

/// What happens to a bucket that goes below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NegativeBalancePolicy {
    /// Negative balances stay negative and keep compounding
    #[default]
    Compound,
    /// Buckets are clamped to zero after each month's flows
    FloorAtZero,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub assets: Vec<AssetClass>,

    /// Symmetric correlation matrix in `assets` order; identity when absent
    #[serde(default)]
    pub correlation: Option<Vec<Vec<f64>>>,

    pub horizon_months: MonthIndex,

    #[serde(default = "default_iterations")]
    pub iterations: usize,

    /// Percentile levels to report, in percent
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<u8>,

    /// Starting balance of the cash bucket
    #[serde(default)]
    pub initial_cash: f64,

    /// Signed, month-indexed flows (see `schedule::resolve_events`)
    #[serde(default)]
    pub cash_flows: Vec<CashflowEvent>,

    #[serde(default)]
    pub seed: u64,

    #[serde(default)]
    pub negative_balance_policy: NegativeBalancePolicy,

    #[serde(default)]
    pub shocks: ShockDistribution,

    /// Pushes off-diagonal correlations toward +1, in `[0, 1]`
    #[serde(default)]
    pub correlation_stress: Option<f64>,

    /// Upper bound on `iterations` set by the caller
    #[serde(default)]
    pub max_iterations: Option<usize>,

    /// Wall-clock budget in milliseconds; the run stops at a step boundary
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            assets: Vec::new(),
            correlation: None,
            horizon_months: 12,
            iterations: default_iterations(),
            percentiles: default_percentiles(),
            initial_cash: 0.0,
            cash_flows: Vec::new(),
            seed: 0,
            negative_balance_policy: NegativeBalancePolicy::default(),
            shocks: ShockDistribution::default(),
            correlation_stress: None,
            max_iterations: None,
            deadline_ms: None,
        }
    }
}

impl SimulationConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Iterations actually run after applying `max_iterations`.
    #[must_use]
    pub fn effective_iterations(&self) -> usize {
        match self.max_iterations {
            Some(cap) => self.iterations.min(cap),
            None => self.iterations,
        }
    }

    /// Correlation matrix after applying `correlation_stress`.
    #[must_use]
    pub fn effective_correlation(&self) -> Option<Vec<Vec<f64>>> {
        match (&self.correlation, self.correlation_stress) {
            (Some(matrix), Some(factor)) => Some(crate::sampler::stress_correlation(matrix, factor)),
            (Some(matrix), None) => Some(matrix.clone()),
            (None, Some(factor)) if factor > 0.0 => {
                let n = self.assets.len();
                let identity: Vec<Vec<f64>> = (0..n)
                    .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
                    .collect();
                Some(crate::sampler::stress_correlation(&identity, factor))
            }
            (None, _) => None,
        }
    }

    /// Fail-fast structural checks run before any computation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 || self.max_iterations == Some(0) {
            return Err(ConfigError::ZeroIterations);
        }
        if self.horizon_months == 0 {
            return Err(ConfigError::ZeroHorizon);
        }
        if self.assets.is_empty() {
            return Err(ConfigError::NoAssets);
        }

        let mut seen = FxHashSet::default();
        for asset in &self.assets {
            if !seen.insert(asset.id) {
                return Err(ConfigError::DuplicateAsset(asset.id));
            }
            let checks = [
                ("initial_value", asset.initial_value, asset.initial_value.is_finite()),
                (
                    "mean_return",
                    asset.mean_return,
                    asset.mean_return.is_finite() && asset.mean_return > -12.0,
                ),
                (
                    "volatility",
                    asset.volatility,
                    asset.volatility.is_finite() && asset.volatility >= 0.0,
                ),
            ];
            if let Some((field, value, _)) = checks.into_iter().find(|(_, _, ok)| !ok) {
                return Err(ConfigError::InvalidAssetParameter {
                    id: asset.id,
                    field,
                    value,
                });
            }
        }

        if let Some(matrix) = &self.correlation {
            validate_correlation(matrix, self.assets.len())?;
        }

        if let Some(&level) = self.percentiles.iter().find(|&&level| level > 100) {
            return Err(ConfigError::PercentileLevel(level));
        }

        if let Some(factor) = self.correlation_stress
            && !(0.0..=1.0).contains(&factor)
        {
            return Err(ConfigError::StressFactor(factor));
        }

        if let ShockDistribution::StudentT { degrees_of_freedom } = self.shocks
            && !(degrees_of_freedom > 2.0 && degrees_of_freedom.is_finite())
        {
            return Err(ConfigError::DegreesOfFreedom(degrees_of_freedom));
        }

        Ok(())
    }
}

fn validate_correlation(matrix: &[Vec<f64>], n: usize) -> Result<(), ConfigError> {
    if matrix.len() != n || matrix.iter().any(|row| row.len() != n) {
        return Err(ConfigError::CorrelationShape { expected: n });
    }
    for (row, values) in matrix.iter().enumerate() {
        for (col, &value) in values.iter().enumerate() {
            let in_range = value.is_finite() && (-1.0..=1.0).contains(&value);
            if !in_range || (row == col && (value - 1.0).abs() > 1e-9) {
                return Err(ConfigError::CorrelationValue { row, col, value });
            }
            if col > row && (value - matrix[col][row]).abs() > 1e-9 {
                return Err(ConfigError::CorrelationAsymmetric { row, col });
            }
        }
    }
    Ok(())
}
