//! Deterministic (zero-variance) projection
//!
//! The single-path companion to the Monte Carlo engine: yearly income and
//! costs from the schedule resolver, a running balance, and per-source
//! breakdowns for the default chart view. Pure function of its input.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::date_math::{month_at, month_start};
use crate::error::ConfigError;
use crate::model::{CashFlowItem, DeterministicProjection, MonthIndex, YearlyRow};
use crate::schedule::{monthly_amount, partition_valid, yearly_amount_from};

/// Capital that compounds at its own rate instead of passing through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PensionCapital {
    pub name: String,
    pub capital: f64,
    /// Yearly growth rate, e.g. 0.01 for 1%
    #[serde(default)]
    pub yearly_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectionInput {
    pub incomes: Vec<CashFlowItem>,
    pub costs: Vec<CashFlowItem>,
    #[serde(default)]
    pub liquid_assets: f64,
    #[serde(default)]
    pub illiquid_assets: f64,
    pub first_year: i16,
    pub last_year: i16,
    /// Projection start; defaults to January 1st of `first_year`
    #[serde(default, with = "crate::date_math::flexible_date_opt")]
    pub epoch: Option<Date>,
    #[serde(default)]
    pub pension_capital: Option<PensionCapital>,
}

impl ProjectionInput {
    #[must_use]
    pub fn epoch(&self) -> Date {
        self.epoch
            .unwrap_or_else(|| jiff::civil::date(self.first_year, 1, 1))
    }
}

/// Run the year-by-year projection.
///
/// Invalid items are skipped and listed in the result; only an empty year
/// range is an error.
pub fn project(input: &ProjectionInput) -> Result<DeterministicProjection, ConfigError> {
    if input.last_year < input.first_year {
        return Err(ConfigError::EmptyYearRange {
            first: input.first_year,
            last: input.last_year,
        });
    }

    let epoch = input.epoch();
    let (incomes, mut skipped) = partition_valid(&input.incomes);
    let (costs, cost_errors) = partition_valid(&input.costs);
    skipped.extend(cost_errors);

    let pension_start = input.pension_capital.as_ref().map_or(0.0, |p| p.capital);
    let starting_balance = input.liquid_assets + input.illiquid_assets + pension_start;

    let mut pension_value = pension_start;
    let mut cumulative = starting_balance;
    let mut rows = Vec::with_capacity((input.last_year - input.first_year + 1) as usize);

    for year in input.first_year..=input.last_year {
        let mut row = YearlyRow::new(year);

        for item in &incomes {
            let amount = yearly_amount_from(item, year, epoch);
            if amount > 0.0 {
                row.income += amount;
                *row.income_breakdown.entry(item.name.clone()).or_default() += amount;
            }
        }

        for item in &costs {
            let amount = yearly_amount_from(item, year, epoch);
            if amount > 0.0 {
                row.costs += amount;
                *row
                    .cost_breakdown
                    .entry(item.breakdown_key().to_string())
                    .or_default() += amount;
            }
        }

        if let Some(pension) = &input.pension_capital {
            // Growth is booked as income so the cumulative column reconciles
            let growth = pension_value * pension.yearly_rate;
            pension_value += growth;
            if growth != 0.0 {
                row.income += growth;
                *row.income_breakdown.entry(pension.name.clone()).or_default() += growth;
            }
            row.pension_capital = Some(pension_value);
        }

        row.annual_balance = row.income - row.costs;
        cumulative += row.annual_balance;
        row.cumulative_balance = cumulative;
        rows.push(row);
    }

    debug!(
        years = rows.len(),
        skipped = skipped.len(),
        final_balance = cumulative,
        "Deterministic projection complete"
    );

    Ok(DeterministicProjection {
        starting_balance,
        rows,
        skipped,
    })
}

/// Monthly zero-growth wealth series `D(t)`.
///
/// Element 0 is `start_balance`; element `m + 1` adds the net flow of month
/// `m`. Invalid items are ignored.
#[must_use]
pub fn monthly_balance_series(
    incomes: &[CashFlowItem],
    costs: &[CashFlowItem],
    start_balance: f64,
    epoch: Date,
    months: MonthIndex,
) -> Vec<f64> {
    let epoch = month_start(epoch);
    let (incomes, _) = partition_valid(incomes);
    let (costs, _) = partition_valid(costs);

    let mut series = Vec::with_capacity(months as usize + 1);
    let mut balance = start_balance;
    series.push(balance);
    for m in 0..months {
        let month = month_at(epoch, m);
        let inflow: f64 = incomes
            .iter()
            .map(|item| monthly_amount(item, month, epoch))
            .sum();
        let outflow: f64 = costs
            .iter()
            .map(|item| monthly_amount(item, month, epoch))
            .sum();
        balance += inflow - outflow;
        series.push(balance);
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_empty_year_range_is_config_error() {
        let input = ProjectionInput {
            first_year: 2030,
            last_year: 2029,
            ..Default::default()
        };
        assert!(matches!(
            project(&input),
            Err(ConfigError::EmptyYearRange { .. })
        ));
    }

    #[test]
    fn test_monthly_series_accumulates() {
        let epoch = date(2030, 1, 1);
        let incomes = vec![CashFlowItem::monthly("Salary", 1_000.0, epoch)];
        let costs = vec![CashFlowItem::monthly("Rent", 400.0, date(2030, 2, 1))];
        let series = monthly_balance_series(&incomes, &costs, 50.0, epoch, 3);
        assert_eq!(series, vec![50.0, 1_050.0, 1_650.0, 2_250.0]);
    }
}
