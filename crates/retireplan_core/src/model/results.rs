//! Projection and simulation results
//!
//! Both result types are plain data meant to be handed to a chart or report
//! layer, so everything here is `Serialize`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::{AssetId, MonthIndex};
use crate::error::ScheduleError;
use crate::percentiles::PercentileTable;

/// One year of the deterministic projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyRow {
    pub year: i16,
    pub income: f64,
    pub costs: f64,
    /// `income - costs`
    pub annual_balance: f64,
    /// Running balance including the starting assets
    pub cumulative_balance: f64,
    pub income_breakdown: BTreeMap<String, f64>,
    pub cost_breakdown: BTreeMap<String, f64>,
    /// Value of the compounding pension capital at year end
    pub pension_capital: Option<f64>,
}

impl YearlyRow {
    pub(crate) fn new(year: i16) -> Self {
        Self {
            year,
            income: 0.0,
            costs: 0.0,
            annual_balance: 0.0,
            cumulative_balance: 0.0,
            income_breakdown: BTreeMap::new(),
            cost_breakdown: BTreeMap::new(),
            pension_capital: None,
        }
    }
}

/// The zero-variance, year-by-year projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeterministicProjection {
    pub starting_balance: f64,
    pub rows: Vec<YearlyRow>,
    /// Items left out because their schedule was invalid
    pub skipped: Vec<ScheduleError>,
}

impl DeterministicProjection {
    /// Cumulative balance after the last projected year.
    #[must_use]
    pub fn final_balance(&self) -> f64 {
        self.rows
            .last()
            .map_or(self.starting_balance, |row| row.cumulative_balance)
    }

    /// First year whose cumulative balance is below zero.
    #[must_use]
    pub fn depletion_year(&self) -> Option<i16> {
        self.rows
            .iter()
            .find(|row| row.cumulative_balance < 0.0)
            .map(|row| row.year)
    }

    #[must_use]
    pub fn row(&self, year: i16) -> Option<&YearlyRow> {
        self.rows.iter().find(|row| row.year == year)
    }
}

/// Non-fatal conditions the caller should know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimulationWarning {
    /// Cholesky pivots had to be clamped; correlations may be understated
    CovarianceAdjusted { clamped_pivots: usize },
    /// Cash flows aimed at an asset that is not in the portfolio were kept as cash
    UnroutedCashflow { asset: AssetId },
    /// The deadline stopped the run early; the table ends at `completed_months`
    DeadlineReached { completed_months: MonthIndex },
    /// The iteration cap reduced the number of paths
    IterationsCapped { requested: usize, used: usize },
}

/// Net scheduled flow in one month (months with |flow| < 1 are not reported).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Injection {
    pub month_index: MonthIndex,
    pub amount: f64,
}

/// Output of the Monte Carlo engine.
///
/// Tables have one row per elapsed month, starting with the initial state at
/// row 0.
#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloResult {
    pub iterations: usize,
    pub horizon_months: MonthIndex,
    /// Cash + live assets + realized value
    pub total: PercentileTable,
    /// Cash + live assets
    pub invested: PercentileTable,
    /// Value moved out of assets at their exit month
    pub realized: PercentileTable,
    /// Initial asset values (no cash) plus cumulative net scheduled flows, without returns
    pub principal_path: Vec<f64>,
    pub injections: Vec<Injection>,
    /// Share of paths whose total never dropped below zero
    pub success_rate: f64,
    pub warnings: Vec<SimulationWarning>,
}

impl MonteCarloResult {
    /// Whether the result was computed from degraded inputs or cut short.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.warnings.iter().any(|w| {
            matches!(
                w,
                SimulationWarning::CovarianceAdjusted { .. }
                    | SimulationWarning::DeadlineReached { .. }
            )
        })
    }

    /// Months actually simulated (less than the horizon after a deadline).
    #[must_use]
    pub fn completed_months(&self) -> MonthIndex {
        self.total.steps().saturating_sub(1) as MonthIndex
    }
}
