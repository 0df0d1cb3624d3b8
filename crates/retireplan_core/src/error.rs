use jiff::civil::Date;
use serde::Serialize;
use thiserror::Error;

use crate::model::AssetId;

/// A date string that none of the accepted formats could read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized date {input:?} (expected YYYY-MM-DD, DD.MM.YYYY or an RFC 3339 timestamp)")]
pub struct DateParseError {
    pub input: String,
}

/// Per-item data problems. The offending item is skipped and reported; the
/// rest of the projection proceeds.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
pub enum ScheduleError {
    #[error("cash flow {name:?} starts on {start} after it ends on {end}")]
    StartAfterEnd { name: String, start: Date, end: Date },
    #[error("cash flow {name:?} has invalid amount {amount}")]
    InvalidAmount { name: String, amount: f64 },
}

impl ScheduleError {
    /// Name of the cash flow that was rejected.
    #[must_use]
    pub fn item_name(&self) -> &str {
        match self {
            ScheduleError::StartAfterEnd { name, .. } | ScheduleError::InvalidAmount { name, .. } => {
                name
            }
        }
    }
}

/// Structural configuration problems, raised before any computation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("iterations must be greater than zero")]
    ZeroIterations,
    #[error("horizon must be at least one month")]
    ZeroHorizon,
    #[error("at least one asset class is required")]
    NoAssets,
    #[error("asset {0:?} is defined more than once")]
    DuplicateAsset(AssetId),
    #[error("asset {id:?} has invalid {field} {value}")]
    InvalidAssetParameter {
        id: AssetId,
        field: &'static str,
        value: f64,
    },
    #[error("correlation matrix must be {expected}x{expected}")]
    CorrelationShape { expected: usize },
    #[error("correlation matrix entry ({row}, {col}) = {value} is invalid")]
    CorrelationValue { row: usize, col: usize, value: f64 },
    #[error("correlation matrix is not symmetric at ({row}, {col})")]
    CorrelationAsymmetric { row: usize, col: usize },
    #[error("percentile level {0} is outside 0..=100")]
    PercentileLevel(u8),
    #[error("correlation stress factor {0} must lie in [0, 1]")]
    StressFactor(f64),
    #[error("student-t shocks need more than 2 degrees of freedom, got {0}")]
    DegreesOfFreedom(f64),
    #[error("year range {first}..={last} is empty")]
    EmptyYearRange { first: i16, last: i16 },
}

/// Fatal Monte Carlo outcomes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("simulation cancelled")]
    Cancelled,
}
