//! Simulation Builder
//!
//! Fluent setup for programmatic runs. Cash flows are kept as calendar items
//! until `build`, which resolves them against the start date into
//! month-indexed events.

use jiff::civil::Date;

use super::{NegativeBalancePolicy, SimulationConfig};
use crate::error::ScheduleError;
use crate::model::{AssetClass, CashFlowItem, MonthIndex};
use crate::sampler::ShockDistribution;
use crate::schedule::resolve_events;

pub struct SimulationBuilder {
    config: SimulationConfig,
    start: Option<Date>,
    incomes: Vec<CashFlowItem>,
    costs: Vec<CashFlowItem>,
}

impl Default for SimulationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SimulationConfig::default(),
            start: None,
            incomes: Vec::new(),
            costs: Vec::new(),
        }
    }

    // =========================================================================
    // Timeline
    // =========================================================================

    #[must_use]
    pub fn start(mut self, year: i16, month: i8, day: i8) -> Self {
        self.start = Some(jiff::civil::date(year, month, day));
        self
    }

    #[must_use]
    pub fn start_date(mut self, date: Date) -> Self {
        self.start = Some(date);
        self
    }

    #[must_use]
    pub fn horizon_years(mut self, years: u32) -> Self {
        self.config.horizon_months = years * 12;
        self
    }

    #[must_use]
    pub fn horizon_months(mut self, months: MonthIndex) -> Self {
        self.config.horizon_months = months;
        self
    }

    // =========================================================================
    // Run parameters
    // =========================================================================

    #[must_use]
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.config.iterations = iterations;
        self
    }

    #[must_use]
    pub fn max_iterations(mut self, cap: usize) -> Self {
        self.config.max_iterations = Some(cap);
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    #[must_use]
    pub fn percentiles(mut self, levels: &[u8]) -> Self {
        self.config.percentiles = levels.to_vec();
        self
    }

    #[must_use]
    pub fn floor_at_zero(mut self) -> Self {
        self.config.negative_balance_policy = NegativeBalancePolicy::FloorAtZero;
        self
    }

    #[must_use]
    pub fn shocks(mut self, shocks: ShockDistribution) -> Self {
        self.config.shocks = shocks;
        self
    }

    #[must_use]
    pub fn correlation_stress(mut self, factor: f64) -> Self {
        self.config.correlation_stress = Some(factor);
        self
    }

    #[must_use]
    pub fn deadline_ms(mut self, millis: u64) -> Self {
        self.config.deadline_ms = Some(millis);
        self
    }

    // =========================================================================
    // Portfolio and flows
    // =========================================================================

    #[must_use]
    pub fn asset(mut self, asset: AssetClass) -> Self {
        self.config.assets.push(asset);
        self
    }

    #[must_use]
    pub fn correlation(mut self, matrix: Vec<Vec<f64>>) -> Self {
        self.config.correlation = Some(matrix);
        self
    }

    #[must_use]
    pub fn initial_cash(mut self, amount: f64) -> Self {
        self.config.initial_cash = amount;
        self
    }

    #[must_use]
    pub fn income(mut self, item: CashFlowItem) -> Self {
        self.incomes.push(item);
        self
    }

    #[must_use]
    pub fn cost(mut self, item: CashFlowItem) -> Self {
        self.costs.push(item);
        self
    }

    /// Resolve cash flows and return the config plus any skipped items.
    ///
    /// Without an explicit start the earliest item start is used, or
    /// 2000-01-01 when there are no items.
    #[must_use]
    pub fn build(self) -> (SimulationConfig, Vec<ScheduleError>) {
        let Self {
            mut config,
            start,
            incomes,
            costs,
        } = self;

        let epoch = start.unwrap_or_else(|| {
            incomes
                .iter()
                .chain(&costs)
                .map(|item| item.start_date)
                .min()
                .unwrap_or_else(|| jiff::civil::date(2000, 1, 1))
        });

        let schedule = resolve_events(&incomes, &costs, epoch, config.horizon_months);
        config.cash_flows = schedule.events;
        (config, schedule.skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssetId;
    use jiff::civil::date;

    #[test]
    fn test_builder_resolves_flows() {
        let (config, skipped) = SimulationBuilder::new()
            .start(2030, 1, 1)
            .horizon_years(1)
            .iterations(10)
            .seed(5)
            .asset(AssetClass::fallback(AssetId(1), "Stocks").initial_value(1_000.0))
            .initial_cash(50.0)
            .income(CashFlowItem::yearly("Bonus", 1_200.0, date(2030, 1, 1)))
            .cost(CashFlowItem::one_time("Car", 500.0, date(2030, 6, 10)))
            .cost(CashFlowItem::monthly("Bad", f64::NAN, date(2030, 1, 1)))
            .build();

        assert_eq!(config.horizon_months, 12);
        assert_eq!(config.iterations, 10);
        assert_eq!(config.seed, 5);
        assert_eq!(config.initial_cash, 50.0);
        assert_eq!(skipped.len(), 1);

        let total: f64 = config.cash_flows.iter().map(|e| e.amount).sum();
        assert!((total - 700.0).abs() < 1e-9);
        assert!(
            config
                .cash_flows
                .iter()
                .any(|e| e.month_index == 5 && e.amount == -500.0)
        );
    }

    #[test]
    fn test_builder_without_start_uses_earliest_item() {
        let (config, _) = SimulationBuilder::new()
            .horizon_months(3)
            .income(CashFlowItem::monthly("Salary", 10.0, date(2031, 3, 1)))
            .build();
        assert_eq!(config.cash_flows.len(), 3);
        assert_eq!(config.cash_flows[0].month_index, 0);
    }
}
