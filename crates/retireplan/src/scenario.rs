//! Scenario files
//!
//! A scenario describes one household: its dates, assets, anchored incomes
//! and costs, and optionally a Monte Carlo portfolio. It is read from YAML
//! (`.yaml`, `.yml`) or JSON (`.json`) depending on the file extension.

use std::fs;
use std::path::{Path, PathBuf};

use jiff::civil::Date;
use retireplan_core::config::{NegativeBalancePolicy, SimulationBuilder, SimulationConfig};
use retireplan_core::date_math::{month_start, months_between};
use retireplan_core::error::{ConfigError, ScheduleError};
use retireplan_core::history::{MarketStatistics, PriceSeries};
use retireplan_core::model::{AssetClass, MonthIndex};
use retireplan_core::planner::{PlanItem, RetirementPlan};
use retireplan_core::projection::PensionCapital;
use retireplan_core::sampler::ShockDistribution;
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("unsupported scenario format {} (expected .yaml, .yml or .json)", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("terminal date {terminal} is before start date {start}")]
    TerminalBeforeStart { start: Date, terminal: Date },
    #[error("scenario has no monte_carlo section")]
    MissingMonteCarlo,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn default_iterations() -> usize {
    1_000
}

/// Portfolio and run parameters for the Monte Carlo engine.
#[derive(Debug, Clone, Deserialize)]
pub struct MonteCarloSection {
    pub assets: Vec<AssetClass>,
    #[serde(default)]
    pub correlation: Option<Vec<Vec<f64>>>,
    /// Monthly prices; when present they replace the assets' return assumptions
    #[serde(default)]
    pub price_history: Vec<PriceSeries>,
    #[serde(default)]
    pub initial_cash: f64,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default)]
    pub percentiles: Option<Vec<u8>>,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub negative_balance_policy: NegativeBalancePolicy,
    #[serde(default)]
    pub shocks: ShockDistribution,
    #[serde(default)]
    pub correlation_stress: Option<f64>,
    #[serde(default)]
    pub max_iterations: Option<usize>,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(with = "retireplan_core::date_math::flexible_date")]
    pub start_date: Date,
    /// Estimated end of life
    #[serde(with = "retireplan_core::date_math::flexible_date")]
    pub terminal_date: Date,
    /// Planned retirement; anchored items resolve against the terminal date when absent
    #[serde(default, with = "retireplan_core::date_math::flexible_date_opt")]
    pub retirement_date: Option<Date>,
    /// Upper bound for the earliest-retirement search (legal retirement age)
    #[serde(default, with = "retireplan_core::date_math::flexible_date_opt")]
    pub latest_retirement_date: Option<Date>,
    #[serde(default)]
    pub liquid_assets: f64,
    #[serde(default)]
    pub illiquid_assets: f64,
    #[serde(default)]
    pub pension_capital: Option<PensionCapital>,
    #[serde(default)]
    pub incomes: Vec<PlanItem>,
    #[serde(default)]
    pub costs: Vec<PlanItem>,
    #[serde(default)]
    pub monte_carlo: Option<MonteCarloSection>,
}

impl Scenario {
    /// Load a scenario, choosing the parser from the file extension.
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        let content = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let parse_error = |message: String| ScenarioError::Parse {
            path: path.to_path_buf(),
            message,
        };
        let scenario: Scenario = match extension.as_deref() {
            Some("yaml" | "yml") => {
                serde_saphyr::from_str(&content).map_err(|e| parse_error(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
            _ => return Err(ScenarioError::UnsupportedFormat(path.to_path_buf())),
        };

        scenario.validate()?;
        info!(
            path = %path.display(),
            incomes = scenario.incomes.len(),
            costs = scenario.costs.len(),
            monte_carlo = scenario.monte_carlo.is_some(),
            "Loaded scenario"
        );
        Ok(scenario)
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        if self.terminal_date < self.start_date {
            return Err(ScenarioError::TerminalBeforeStart {
                start: self.start_date,
                terminal: self.terminal_date,
            });
        }
        Ok(())
    }

    /// Retirement date used when none is searched for.
    #[must_use]
    pub fn retirement_or_terminal(&self) -> Date {
        self.retirement_date.unwrap_or(self.terminal_date)
    }

    /// Last candidate date for the earliest-retirement search.
    #[must_use]
    pub fn search_limit(&self) -> Date {
        self.latest_retirement_date
            .or(self.retirement_date)
            .unwrap_or(self.terminal_date)
    }

    /// Months from the start month through the terminal month.
    #[must_use]
    pub fn horizon_months(&self) -> MonthIndex {
        (months_between(month_start(self.start_date), self.terminal_date) + 1).max(1) as MonthIndex
    }

    #[must_use]
    pub fn plan(&self) -> RetirementPlan {
        RetirementPlan {
            incomes: self.incomes.clone(),
            costs: self.costs.clone(),
            liquid_assets: self.liquid_assets,
            illiquid_assets: self.illiquid_assets,
            pension_capital: self.pension_capital.clone(),
            start_date: self.start_date,
            terminal_date: self.terminal_date,
        }
    }

    /// Monte Carlo configuration for a given retirement date, plus the items
    /// skipped while resolving the cash-flow schedule.
    pub fn simulation_config(
        &self,
        retirement: Date,
    ) -> Result<(SimulationConfig, Vec<ScheduleError>), ScenarioError> {
        let section = self
            .monte_carlo
            .as_ref()
            .ok_or(ScenarioError::MissingMonteCarlo)?;

        let (assets, estimated_correlation) = section.calibrated_assets();
        let correlation = section.correlation.clone().or(estimated_correlation);

        let mut builder = SimulationBuilder::new()
            .start_date(self.start_date)
            .horizon_months(self.horizon_months())
            .iterations(section.iterations)
            .seed(section.seed)
            .initial_cash(section.initial_cash)
            .shocks(section.shocks);
        for asset in assets {
            builder = builder.asset(asset);
        }
        if let Some(matrix) = correlation {
            builder = builder.correlation(matrix);
        }
        if let Some(levels) = &section.percentiles {
            builder = builder.percentiles(levels);
        }
        if section.negative_balance_policy == NegativeBalancePolicy::FloorAtZero {
            builder = builder.floor_at_zero();
        }
        if let Some(factor) = section.correlation_stress {
            builder = builder.correlation_stress(factor);
        }
        if let Some(cap) = section.max_iterations {
            builder = builder.max_iterations(cap);
        }
        if let Some(millis) = section.deadline_ms {
            builder = builder.deadline_ms(millis);
        }

        let (incomes, costs) = self.plan().items_for(retirement);
        for item in incomes {
            builder = builder.income(item);
        }
        for item in costs {
            builder = builder.cost(item);
        }

        let (config, skipped) = builder.build();
        config.validate()?;
        Ok((config, skipped))
    }
}

impl MonteCarloSection {
    /// Assets with return assumptions re-estimated from price history when
    /// any is given, and the estimated correlation when every asset has a
    /// series.
    fn calibrated_assets(&self) -> (Vec<AssetClass>, Option<Vec<Vec<f64>>>) {
        let Some(stats) = MarketStatistics::from_price_history(&self.price_history) else {
            return (self.assets.clone(), None);
        };

        let assets: Vec<AssetClass> = self
            .assets
            .iter()
            .map(|asset| {
                let mut calibrated = stats.asset_class(asset.id, &asset.name, asset.initial_value);
                calibrated.exit_month = asset.exit_month;
                calibrated
            })
            .collect();

        let positions: Option<Vec<usize>> = self
            .assets
            .iter()
            .map(|asset| stats.assets.iter().position(|s| s.id == asset.id))
            .collect();
        let correlation: Option<Vec<Vec<f64>>> = positions.map(|idx| {
            idx.iter()
                .map(|&i| idx.iter().map(|&j| stats.correlation[i][j]).collect())
                .collect()
        });

        debug!(
            observations = stats.observations,
            start = %stats.start_date,
            end = %stats.end_date,
            "Calibrated assets from price history"
        );
        (assets, correlation)
    }
}
