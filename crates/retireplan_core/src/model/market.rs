use serde::{Deserialize, Serialize};

use super::ids::{AssetId, MonthIndex};

/// One investable asset class in the Monte Carlo portfolio.
///
/// Returns and volatility are annual figures; the sampler converts them to
/// monthly log-return parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetClass {
    pub id: AssetId,
    #[serde(default)]
    pub name: String,
    pub initial_value: f64,
    /// Expected annual return, e.g. 0.05 for 5%
    pub mean_return: f64,
    /// Annual standard deviation of returns
    pub volatility: f64,
    /// Month in which the position is sold and its value realized
    #[serde(default)]
    pub exit_month: Option<MonthIndex>,
}

impl AssetClass {
    // Used when no market history is available for an asset
    pub const FALLBACK_MEAN_RETURN: f64 = 0.05;
    pub const FALLBACK_VOLATILITY: f64 = 0.15;

    #[must_use]
    pub fn new(id: AssetId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            initial_value: 0.0,
            mean_return: 0.0,
            volatility: 0.0,
            exit_month: None,
        }
    }

    /// Conservative default parameters (5% return, 15% volatility).
    #[must_use]
    pub fn fallback(id: AssetId, name: impl Into<String>) -> Self {
        Self::new(id, name)
            .mean_return(Self::FALLBACK_MEAN_RETURN)
            .volatility(Self::FALLBACK_VOLATILITY)
    }

    #[must_use]
    pub fn initial_value(mut self, value: f64) -> Self {
        self.initial_value = value;
        self
    }

    #[must_use]
    pub fn mean_return(mut self, rate: f64) -> Self {
        self.mean_return = rate;
        self
    }

    #[must_use]
    pub fn volatility(mut self, sigma: f64) -> Self {
        self.volatility = sigma;
        self
    }

    #[must_use]
    pub fn exit_at(mut self, month: MonthIndex) -> Self {
        self.exit_month = Some(month);
        self
    }

    /// Variance of one month's log return.
    #[must_use]
    pub fn monthly_variance(&self) -> f64 {
        self.volatility * self.volatility / 12.0
    }
}
