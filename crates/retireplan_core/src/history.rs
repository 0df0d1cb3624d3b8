//! Market statistics from price history
//!
//! Estimates sampler inputs from monthly price series: the series are
//! aligned on the dates they all share, turned into log returns, and
//! summarized as means, volatilities and a correlation matrix. Max drawdown
//! is kept for reporting.

use std::collections::BTreeMap;

use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{AssetClass, AssetId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(with = "crate::date_math::flexible_date")]
    pub date: Date,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub id: AssetId,
    #[serde(default)]
    pub name: String,
    pub points: Vec<PricePoint>,
}

/// Largest peak-to-trough decline of one series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Drawdown {
    /// Fraction of the peak lost, ≤ 0 (e.g. -0.34)
    pub depth: f64,
    pub peak: Date,
    pub trough: Date,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetStatistics {
    pub id: AssetId,
    pub name: String,
    /// Mean monthly log return
    pub monthly_mean: f64,
    /// Population standard deviation of monthly log returns
    pub monthly_volatility: f64,
    pub max_drawdown: Drawdown,
}

impl AssetStatistics {
    /// Annual arithmetic mean return implied by the log-return moments,
    /// expressed so that the sampler reproduces it: `12·(E[exp(r)] − 1)`.
    #[must_use]
    pub fn annual_mean_return(&self) -> f64 {
        let variance = self.monthly_volatility * self.monthly_volatility;
        12.0 * ((self.monthly_mean + 0.5 * variance).exp() - 1.0)
    }

    #[must_use]
    pub fn annual_volatility(&self) -> f64 {
        self.monthly_volatility * 12f64.sqrt()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketStatistics {
    pub assets: Vec<AssetStatistics>,
    /// Monthly log-return covariance, population estimator
    pub covariance: Vec<Vec<f64>>,
    pub correlation: Vec<Vec<f64>>,
    /// Number of aligned price points (returns = points − 1)
    pub observations: usize,
    pub start_date: Date,
    pub end_date: Date,
}

impl MarketStatistics {
    /// Estimate statistics from price series, `None` when fewer than two
    /// dates are common to every series.
    #[must_use]
    pub fn from_price_history(series: &[PriceSeries]) -> Option<Self> {
        if series.is_empty() {
            return None;
        }
        let n = series.len();

        // date → one price per series; later duplicates win
        let mut by_date: BTreeMap<Date, Vec<Option<f64>>> = BTreeMap::new();
        for (i, s) in series.iter().enumerate() {
            for point in &s.points {
                by_date.entry(point.date).or_insert_with(|| vec![None; n])[i] = Some(point.value);
            }
        }
        let aligned: Vec<(Date, Vec<f64>)> = by_date
            .into_iter()
            .filter_map(|(date, row)| row.into_iter().collect::<Option<Vec<f64>>>().map(|r| (date, r)))
            .collect();

        if aligned.len() < 2 {
            debug!(series = n, aligned = aligned.len(), "Not enough aligned history");
            return None;
        }
        let samples = aligned.len() - 1;

        // returns[i][t] = ln(p[t+1] / p[t]); unusable prices give a zero return
        let returns: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                aligned
                    .windows(2)
                    .map(|w| log_return(w[0].1[i], w[1].1[i]))
                    .collect()
            })
            .collect();

        let means: Vec<f64> = returns
            .iter()
            .map(|r| r.iter().sum::<f64>() / samples as f64)
            .collect();

        let mut covariance = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..=i {
                let sum: f64 = returns[i]
                    .iter()
                    .zip(&returns[j])
                    .map(|(a, b)| (a - means[i]) * (b - means[j]))
                    .sum();
                covariance[i][j] = sum / samples as f64;
                covariance[j][i] = covariance[i][j];
            }
        }

        let stdevs: Vec<f64> = (0..n).map(|i| covariance[i][i].sqrt()).collect();
        let correlation: Vec<Vec<f64>> = (0..n)
            .map(|i| {
                (0..n)
                    .map(|j| {
                        if i == j {
                            1.0
                        } else {
                            let denom = stdevs[i] * stdevs[j];
                            if denom > 0.0 {
                                (covariance[i][j] / denom).clamp(-1.0, 1.0)
                            } else {
                                0.0
                            }
                        }
                    })
                    .collect()
            })
            .collect();

        let assets: Vec<AssetStatistics> = series
            .iter()
            .enumerate()
            .map(|(i, s)| AssetStatistics {
                id: s.id,
                name: s.name.clone(),
                monthly_mean: means[i],
                monthly_volatility: stdevs[i],
                max_drawdown: max_drawdown(&aligned, i),
            })
            .collect();

        let start_date = aligned[0].0;
        let end_date = aligned[samples].0;
        debug!(series = n, observations = aligned.len(), %start_date, %end_date, "Estimated market statistics");

        Some(Self {
            assets,
            covariance,
            correlation,
            observations: aligned.len(),
            start_date,
            end_date,
        })
    }

    #[must_use]
    pub fn get(&self, id: AssetId) -> Option<&AssetStatistics> {
        self.assets.iter().find(|a| a.id == id)
    }

    /// Sampler parameters for `id`, or the conservative fallback when the
    /// asset has no history.
    #[must_use]
    pub fn asset_class(&self, id: AssetId, name: &str, initial_value: f64) -> AssetClass {
        match self.get(id) {
            Some(stats) => AssetClass::new(id, name)
                .initial_value(initial_value)
                .mean_return(stats.annual_mean_return())
                .volatility(stats.annual_volatility()),
            None => AssetClass::fallback(id, name).initial_value(initial_value),
        }
    }
}

fn log_return(p0: f64, p1: f64) -> f64 {
    if p0 > 0.0 && p1 > 0.0 && p0.is_finite() && p1.is_finite() {
        (p1 / p0).ln()
    } else {
        0.0
    }
}

/// Largest decline of column `i` in `aligned`, which must not be empty.
fn max_drawdown(aligned: &[(Date, Vec<f64>)], i: usize) -> Drawdown {
    let first_date = aligned[0].0;
    let mut peak = (first_date, aligned[0].1[i]);
    let mut worst = Drawdown {
        depth: 0.0,
        peak: first_date,
        trough: first_date,
    };
    for (date, row) in aligned {
        let value = row[i];
        if value > peak.1 {
            peak = (*date, value);
        } else if peak.1 > 0.0 {
            let depth = (value - peak.1) / peak.1;
            if depth < worst.depth {
                worst = Drawdown {
                    depth,
                    peak: peak.0,
                    trough: *date,
                };
            }
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    fn series(id: u16, values: &[(Date, f64)]) -> PriceSeries {
        PriceSeries {
            id: AssetId(id),
            name: format!("S{id}"),
            points: values
                .iter()
                .map(|&(date, value)| PricePoint { date, value })
                .collect(),
        }
    }

    #[test]
    fn test_too_little_history() {
        assert!(MarketStatistics::from_price_history(&[]).is_none());
        let s = series(1, &[(date(2020, 1, 1), 100.0)]);
        assert!(MarketStatistics::from_price_history(&[s]).is_none());
    }

    #[test]
    fn test_alignment_uses_common_dates() {
        let a = series(
            1,
            &[
                (date(2020, 1, 1), 100.0),
                (date(2020, 2, 1), 110.0),
                (date(2020, 3, 1), 121.0),
            ],
        );
        let b = series(2, &[(date(2020, 2, 1), 50.0), (date(2020, 3, 1), 55.0)]);
        let stats = MarketStatistics::from_price_history(&[a, b]).unwrap();
        assert_eq!(stats.observations, 2);
        assert_eq!(stats.start_date, date(2020, 2, 1));
        assert!((stats.assets[0].monthly_mean - 1.1f64.ln()).abs() < 1e-12);
        assert_eq!(stats.assets[0].monthly_volatility, 0.0);
        // Zero variance gives no correlation information
        assert_eq!(stats.correlation[0][1], 0.0);
    }

    #[test]
    fn test_moments_and_correlation() {
        let dates = [
            date(2020, 1, 1),
            date(2020, 2, 1),
            date(2020, 3, 1),
            date(2020, 4, 1),
            date(2020, 5, 1),
        ];
        let prices = [100.0, 105.0, 99.0, 108.0, 104.0];
        let a = series(1, &dates.iter().copied().zip(prices).collect::<Vec<_>>());
        // b = a² moves perfectly with a
        let b = series(
            2,
            &dates.iter().copied().zip(prices.map(|p| p * p)).collect::<Vec<_>>(),
        );
        let stats = MarketStatistics::from_price_history(&[a, b]).unwrap();

        assert!((stats.correlation[0][1] - 1.0).abs() < 1e-9);
        assert!((stats.assets[1].monthly_volatility - 2.0 * stats.assets[0].monthly_volatility).abs() < 1e-12);
        let expected_mean = (104.0f64 / 100.0).ln() / 4.0;
        assert!((stats.assets[0].monthly_mean - expected_mean).abs() < 1e-12);
    }

    #[test]
    fn test_max_drawdown_dates() {
        let s = series(
            1,
            &[
                (date(2020, 1, 1), 100.0),
                (date(2020, 2, 1), 120.0),
                (date(2020, 3, 1), 90.0),
                (date(2020, 4, 1), 60.0),
                (date(2020, 5, 1), 130.0),
                (date(2020, 6, 1), 110.0),
            ],
        );
        let stats = MarketStatistics::from_price_history(&[s]).unwrap();
        let dd = stats.assets[0].max_drawdown;
        assert!((dd.depth + 0.5).abs() < 1e-12);
        assert_eq!(dd.peak, date(2020, 2, 1));
        assert_eq!(dd.trough, date(2020, 4, 1));
    }

    #[test]
    fn test_asset_class_conversion() {
        let s = series(1, &[(date(2020, 1, 1), 100.0), (date(2020, 2, 1), 101.0)]);
        let stats = MarketStatistics::from_price_history(&[s]).unwrap();

        let known = stats.asset_class(AssetId(1), "World", 5_000.0);
        assert!((known.mean_return - 0.12).abs() < 1e-9);
        assert_eq!(known.volatility, 0.0);

        let unknown = stats.asset_class(AssetId(7), "Gold", 1_000.0);
        assert_eq!(unknown.mean_return, AssetClass::FALLBACK_MEAN_RETURN);
        assert_eq!(unknown.volatility, AssetClass::FALLBACK_VOLATILITY);
        assert_eq!(unknown.initial_value, 1_000.0);
    }
}
