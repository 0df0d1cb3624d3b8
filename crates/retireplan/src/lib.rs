//! Retirement planning command line
//!
//! Loads a YAML or JSON scenario, runs the deterministic projection, the
//! Monte Carlo simulation or the earliest-retirement search from
//! `retireplan_core`, and renders the outcome as a JSON report.

pub mod logging;
pub mod report;
pub mod scenario;

pub use logging::init_logging;
pub use report::{Mode, Report, ReportError};
pub use scenario::{MonteCarloSection, Scenario, ScenarioError};
