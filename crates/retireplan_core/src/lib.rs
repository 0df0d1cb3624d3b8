//! Retirement projection library
//!
//! Turns a household's incomes, costs and assets into:
//! - a deterministic, year-by-year wealth projection with per-source breakdowns
//! - a Monte Carlo wealth distribution over monthly steps with correlated,
//!   lognormal asset returns, summarized as percentile bands
//!
//! Supporting pieces resolve calendar cash-flow schedules into monthly
//! amounts, search for the earliest feasible retirement date, and estimate
//! return assumptions from price history.
//!
//! # Builder DSL
//!
//! ```ignore
//! use retireplan_core::{SimulationBuilder, monte_carlo_simulate};
//! use retireplan_core::model::{AssetClass, AssetId, CashFlowItem};
//!
//! let (config, _skipped) = SimulationBuilder::new()
//!     .start(2026, 1, 1)
//!     .horizon_years(25)
//!     .asset(AssetClass::fallback(AssetId(1), "Balanced").initial_value(400_000.0))
//!     .cost(CashFlowItem::monthly("Living", 4_000.0, jiff::civil::date(2026, 1, 1)))
//!     .build();
//! let result = monte_carlo_simulate(&config)?;
//! ```

#![warn(clippy::all)]

// ============================================================================
// Core modules
// ============================================================================

pub mod date_math;
pub mod error;
pub mod history;
pub mod percentiles;
pub mod planner;
pub mod projection;
pub mod sampler;
pub mod schedule;
pub mod simulation;

// ============================================================================
// Type definition modules
// ============================================================================

pub mod config;
pub mod model;

// ============================================================================
// Test modules
// ============================================================================

#[cfg(test)]
mod tests;

// ============================================================================
// Public re-exports for convenience
// ============================================================================

pub use config::{NegativeBalancePolicy, SimulationBuilder, SimulationConfig};
pub use error::{ConfigError, DateParseError, ScheduleError, SimulationError};
pub use planner::{Anchor, PlanItem, RetirementAssessment, RetirementPlan};
pub use projection::{PensionCapital, ProjectionInput, project};
pub use sampler::ShockDistribution;
pub use simulation::{SimulationProgress, monte_carlo_simulate, monte_carlo_simulate_with_progress};
