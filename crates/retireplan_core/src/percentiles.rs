//! Percentile extraction over the iteration ensemble.
//!
//! Percentiles use the nearest-rank rule the charts were built against: sort
//! ascending and take index `floor(p · (n − 1))`. No interpolation.

use serde::{Deserialize, Serialize};

/// Nearest-rank percentile of an already sorted slice. `p` is a fraction in `[0, 1]`.
#[must_use]
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64).floor() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Nearest-rank percentile of unsorted values.
#[must_use]
pub fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    percentile_sorted(&sorted, p)
}

/// Sort `values` in place and read every requested level (in percent) from it.
pub fn percentiles_in_place(values: &mut [f64], levels: &[u8]) -> Vec<f64> {
    values.sort_unstable_by(f64::total_cmp);
    levels
        .iter()
        .map(|&level| percentile_sorted(values, f64::from(level) / 100.0))
        .collect()
}

/// Chart label for a percentile level, e.g. `p5`.
#[must_use]
pub fn label(level: u8) -> String {
    format!("p{level}")
}

/// Dense `{time step × percentile level}` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileTable {
    levels: Vec<u8>,
    /// `rows[step][i]` is the value of `levels[i]` at `step`
    rows: Vec<Vec<f64>>,
}

impl PercentileTable {
    #[must_use]
    pub fn new(levels: &[u8], capacity: usize) -> Self {
        Self {
            levels: levels.to_vec(),
            rows: Vec::with_capacity(capacity),
        }
    }

    /// Append one step; `row` must hold one value per level.
    pub fn push_step(&mut self, row: Vec<f64>) {
        debug_assert_eq!(row.len(), self.levels.len());
        self.rows.push(row);
    }

    #[must_use]
    pub fn levels(&self) -> &[u8] {
        &self.levels
    }

    #[must_use]
    pub fn steps(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn value(&self, step: usize, level: u8) -> Option<f64> {
        let idx = self.levels.iter().position(|&l| l == level)?;
        self.rows.get(step).map(|row| row[idx])
    }

    /// All values of one level across time.
    #[must_use]
    pub fn series(&self, level: u8) -> Option<Vec<f64>> {
        let idx = self.levels.iter().position(|&l| l == level)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// `(label, value)` pairs for one step, in level order.
    #[must_use]
    pub fn at(&self, step: usize) -> Option<Vec<(String, f64)>> {
        self.rows.get(step).map(|row| {
            self.levels
                .iter()
                .zip(row)
                .map(|(&level, &value)| (label(level), value))
                .collect()
        })
    }

    #[must_use]
    pub fn last(&self) -> Option<&[f64]> {
        self.rows.last().map(Vec::as_slice)
    }
}
