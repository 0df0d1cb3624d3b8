//! Integration tests for the retireplan engine
//!
//! Tests are organized by topic:
//! - `schedule` - Calendar proration and month/year amounts
//! - `projection` - Deterministic yearly aggregation
//! - `monte_carlo` - Path engine properties (growth, correlation, percentiles)
//! - `planner` - Retirement-date anchoring and earliest-date search

mod planner;
mod schedule;
