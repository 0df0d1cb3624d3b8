//! Run modes and the JSON report

use jiff::civil::Date;
use retireplan_core::error::{ScheduleError, SimulationError};
use retireplan_core::model::{DeterministicProjection, MonteCarloResult};
use retireplan_core::planner::RetirementAssessment;
use retireplan_core::simulation::monte_carlo_simulate;
use serde::Serialize;
use tracing::info;

use crate::scenario::{Scenario, ScenarioError};

/// What to compute for a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Mode {
    /// Year-by-year projection only
    Deterministic,
    /// Monte Carlo percentile bands only
    MonteCarlo,
    /// Both, when the scenario has a Monte Carlo section
    #[default]
    Both,
    /// Search the earliest feasible retirement date, then project it
    Earliest,
}

#[derive(Debug, Clone, Serialize)]
pub struct EarliestRetirement {
    /// `None` when no date up to `searched_until` keeps the balance non-negative
    pub date: Option<Date>,
    pub searched_until: Date,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

impl From<retireplan_core::error::ConfigError> for ReportError {
    fn from(err: retireplan_core::error::ConfigError) -> Self {
        ReportError::Scenario(ScenarioError::Config(err))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub retirement_date: Date,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest_retirement: Option<EarliestRetirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<RetirementAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deterministic: Option<DeterministicProjection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monte_carlo: Option<MonteCarloResult>,
    /// Items left out of the Monte Carlo schedule
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<ScheduleError>,
}

impl Report {
    pub fn generate(scenario: &Scenario, mode: Mode) -> Result<Self, ReportError> {
        let plan = scenario.plan();

        let (retirement_date, earliest_retirement) = if mode == Mode::Earliest {
            let limit = scenario.search_limit();
            let found = plan.earliest_retirement(scenario.start_date, limit)?;
            info!(earliest = ?found, searched_until = %limit, "Earliest retirement search finished");
            // Without a feasible date, report the plan at the search limit
            (
                found.unwrap_or(limit),
                Some(EarliestRetirement {
                    date: found,
                    searched_until: limit,
                }),
            )
        } else {
            (scenario.retirement_or_terminal(), None)
        };

        let run_deterministic = matches!(mode, Mode::Deterministic | Mode::Both | Mode::Earliest);
        let run_monte_carlo = match mode {
            Mode::MonteCarlo => true,
            Mode::Both | Mode::Earliest => scenario.monte_carlo.is_some(),
            Mode::Deterministic => false,
        };

        let (assessment, deterministic) = if run_deterministic {
            let projection = plan.projection_for(retirement_date)?;
            let assessment = RetirementAssessment::from_projection(retirement_date, &projection);
            (Some(assessment), Some(projection))
        } else {
            (None, None)
        };

        let (monte_carlo, skipped) = if run_monte_carlo {
            let (config, skipped) = scenario.simulation_config(retirement_date)?;
            (Some(monte_carlo_simulate(&config)?), skipped)
        } else {
            (None, Vec::new())
        };

        Ok(Self {
            retirement_date,
            earliest_retirement,
            assessment,
            deterministic,
            monte_carlo,
            skipped,
        })
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;
    use std::io::Write;

    const SCENARIO: &str = r#"{
        "start_date": "2030-01-01",
        "terminal_date": "2040-12-31",
        "retirement_date": "2032-01-01",
        "latest_retirement_date": "2036-01-01",
        "liquid_assets": 100000.0,
        "incomes": [
            {"name": "Salary", "amount": 5000.0, "frequency": "Monthly",
             "start_date": "2030-01-01", "anchor": "EndsAtRetirement"},
            {"name": "Pension", "amount": 2500.0, "frequency": "Monthly",
             "start_date": "2045-01-01", "anchor": "StartsAtRetirement"}
        ],
        "costs": [
            {"name": "Living", "amount": 4000.0, "frequency": "Monthly", "start_date": "2030-01-01"}
        ],
        "monte_carlo": {
            "initial_cash": 100000.0,
            "iterations": 40,
            "seed": 1,
            "assets": [{"id": 1, "name": "Equities", "initial_value": 0.0,
                        "mean_return": 0.05, "volatility": 0.15}]
        }
    }"#;

    fn scenario() -> Scenario {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(SCENARIO.as_bytes()).unwrap();
        Scenario::load(file.path()).unwrap()
    }

    #[test]
    fn test_deterministic_mode() {
        let report = Report::generate(&scenario(), Mode::Deterministic).unwrap();
        assert_eq!(report.retirement_date, date(2032, 1, 1));
        assert!(report.monte_carlo.is_none());
        let assessment = report.assessment.unwrap();
        // 24 working months: 2500·24 − 98k
        assert!((assessment.final_balance + 38_000.0).abs() < 1e-6);
        assert!(!assessment.feasible);

        let projection = report.deterministic.unwrap();
        assert_eq!(assessment.final_balance, projection.final_balance());
        assert_eq!(assessment.depletion_year, projection.depletion_year());
    }

    #[test]
    fn test_earliest_mode() {
        let report = Report::generate(&scenario(), Mode::Earliest).unwrap();
        let earliest = report.earliest_retirement.unwrap();
        assert_eq!(earliest.date, Some(date(2033, 5, 1)));
        assert_eq!(report.retirement_date, date(2033, 5, 1));
        assert!(report.assessment.unwrap().feasible);
        assert!(report.monte_carlo.is_some());
    }

    #[test]
    fn test_both_mode_serializes() {
        let report = Report::generate(&scenario(), Mode::Both).unwrap();
        let mc = report.monte_carlo.as_ref().unwrap();
        assert_eq!(mc.iterations, 40);
        assert_eq!(mc.total.steps(), 133);

        let json = report.to_json(false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["retirement_date"], "2032-01-01");
        assert!(value.get("earliest_retirement").is_none());
        assert!(value["deterministic"]["rows"].is_array());
    }
}
