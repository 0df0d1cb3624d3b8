//! Retirement date search
//!
//! Some items depend on when the household retires: salaries stop, pension
//! annuities start, a pillar lump sum is paid out. A `RetirementPlan` keeps
//! those items anchored and re-runs the deterministic projection for any
//! candidate retirement date.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::date_math::{month_at, months_between};
use crate::error::ConfigError;
use crate::model::{CashFlowItem, DeterministicProjection, Frequency};
use crate::projection::{PensionCapital, ProjectionInput, project};

/// How an item's dates follow the retirement date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Anchor {
    /// Dates are used as entered
    #[default]
    Fixed,
    /// The item ends on the retirement date (salary)
    EndsAtRetirement,
    /// The item starts on the retirement date (occupational pension)
    StartsAtRetirement,
    /// Paid once, on the retirement date (lump-sum withdrawal)
    AtRetirement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanItem {
    #[serde(flatten)]
    pub item: CashFlowItem,
    #[serde(default)]
    pub anchor: Anchor,
}

impl PlanItem {
    #[must_use]
    pub fn fixed(item: CashFlowItem) -> Self {
        Self {
            item,
            anchor: Anchor::Fixed,
        }
    }

    #[must_use]
    pub fn anchored(item: CashFlowItem, anchor: Anchor) -> Self {
        Self { item, anchor }
    }

    /// The concrete item for a given retirement date.
    #[must_use]
    pub fn resolve(&self, retirement: Date) -> CashFlowItem {
        let mut item = self.item.clone();
        match self.anchor {
            Anchor::Fixed => {}
            Anchor::EndsAtRetirement => item.end_date = Some(retirement),
            Anchor::StartsAtRetirement => item.start_date = retirement,
            Anchor::AtRetirement => {
                item.frequency = Frequency::OneTime;
                item.start_date = retirement;
                item.end_date = None;
            }
        }
        item
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetirementPlan {
    #[serde(default)]
    pub incomes: Vec<PlanItem>,
    #[serde(default)]
    pub costs: Vec<PlanItem>,
    #[serde(default)]
    pub liquid_assets: f64,
    #[serde(default)]
    pub illiquid_assets: f64,
    #[serde(default)]
    pub pension_capital: Option<PensionCapital>,
    /// Projection start
    #[serde(with = "crate::date_math::flexible_date")]
    pub start_date: Date,
    /// Estimated end of life; the projection runs through this year
    #[serde(with = "crate::date_math::flexible_date")]
    pub terminal_date: Date,
}

/// Verdict for one candidate retirement date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetirementAssessment {
    pub retirement_date: Date,
    pub final_balance: f64,
    pub depletion_year: Option<i16>,
    pub feasible: bool,
}

impl RetirementAssessment {
    /// Verdict read from a projection already run for `retirement`.
    #[must_use]
    pub fn from_projection(retirement: Date, projection: &DeterministicProjection) -> Self {
        let final_balance = projection.final_balance();
        Self {
            retirement_date: retirement,
            final_balance,
            depletion_year: projection.depletion_year(),
            feasible: final_balance >= 0.0,
        }
    }
}

impl RetirementPlan {
    /// Incomes and costs with anchored dates filled in.
    #[must_use]
    pub fn items_for(&self, retirement: Date) -> (Vec<CashFlowItem>, Vec<CashFlowItem>) {
        let resolve = |items: &[PlanItem]| -> Vec<CashFlowItem> {
            items.iter().map(|i| i.resolve(retirement)).collect()
        };
        (resolve(&self.incomes), resolve(&self.costs))
    }

    #[must_use]
    pub fn projection_input(&self, retirement: Date) -> ProjectionInput {
        let (incomes, costs) = self.items_for(retirement);
        ProjectionInput {
            incomes,
            costs,
            liquid_assets: self.liquid_assets,
            illiquid_assets: self.illiquid_assets,
            first_year: self.start_date.year(),
            last_year: self.terminal_date.year(),
            epoch: Some(self.start_date),
            pension_capital: self.pension_capital.clone(),
        }
    }

    pub fn projection_for(&self, retirement: Date) -> Result<DeterministicProjection, ConfigError> {
        project(&self.projection_input(retirement))
    }

    /// Cumulative balance at the end of the terminal year.
    pub fn final_balance(&self, retirement: Date) -> Result<f64, ConfigError> {
        Ok(self.projection_for(retirement)?.final_balance())
    }

    pub fn assess(&self, retirement: Date) -> Result<RetirementAssessment, ConfigError> {
        let projection = self.projection_for(retirement)?;
        Ok(RetirementAssessment::from_projection(retirement, &projection))
    }

    /// First candidate date, month by month from `from` up to `latest`, whose
    /// final balance is non-negative. `None` when even `latest` falls short.
    ///
    /// Candidates after `from` itself are month starts.
    pub fn earliest_retirement(&self, from: Date, latest: Date) -> Result<Option<Date>, ConfigError> {
        let months = months_between(from, latest).max(0) as u32;
        for k in 0..=months {
            let candidate = if k == 0 { from } else { month_at(from, k) };
            if candidate > latest {
                break;
            }
            let balance = self.final_balance(candidate)?;
            if balance >= 0.0 {
                debug!(%candidate, balance, scanned = k + 1, "Earliest feasible retirement found");
                return Ok(Some(candidate));
            }
        }
        debug!(%from, %latest, "No feasible retirement date in range");
        Ok(None)
    }
}
