//! Recurring and one-time cash-flow records
//!
//! A `CashFlowItem` is what the household enters: an amount, how often it is
//! paid, and when it is active. The schedule resolver turns items into
//! month-indexed amounts; the engine never looks at frequencies directly.

use std::fmt;
use std::str::FromStr;

use jiff::civil::Date;
use serde::{Deserialize, Deserializer, Serialize};

use super::ids::{AssetId, MonthIndex};
use crate::error::ScheduleError;

/// How often a cash flow is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Frequency {
    OneTime,
    Monthly,
    Yearly,
    SemiAnnual,
    Quarterly,
}

impl Frequency {
    /// Number of months one payment covers, `None` for one-time payments.
    #[must_use]
    pub fn months_per_payment(self) -> Option<u8> {
        match self {
            Frequency::OneTime => None,
            Frequency::Monthly => Some(1),
            Frequency::Yearly => Some(12),
            Frequency::SemiAnnual => Some(6),
            Frequency::Quarterly => Some(3),
        }
    }
}

/// A frequency string that is not one of the known schedules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown frequency {0:?}")]
pub struct UnknownFrequency(pub String);

impl FromStr for Frequency {
    type Err = UnknownFrequency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "onetime" | "once" => Ok(Frequency::OneTime),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" | "annual" | "annually" => Ok(Frequency::Yearly),
            "semiannual" | "semiannually" | "halfyearly" => Ok(Frequency::SemiAnnual),
            "quarterly" => Ok(Frequency::Quarterly),
            _ => Err(UnknownFrequency(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for Frequency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Frequency::OneTime => "one-time",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
            Frequency::SemiAnnual => "semi-annual",
            Frequency::Quarterly => "quarterly",
        };
        f.write_str(s)
    }
}

/// Whether a flow adds to or draws from the household's wealth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FlowDirection {
    #[default]
    Inflow,
    Outflow,
}

impl FlowDirection {
    #[must_use]
    pub fn sign(self) -> f64 {
        match self {
            FlowDirection::Inflow => 1.0,
            FlowDirection::Outflow => -1.0,
        }
    }
}

/// An income, cost, or one-time transfer with its active date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowItem {
    pub name: String,
    pub amount: f64,
    pub frequency: Frequency,
    #[serde(with = "crate::date_math::flexible_date")]
    pub start_date: Date,
    /// Inclusive end date; an end on the 1st of a month excludes that month.
    #[serde(default, with = "crate::date_math::flexible_date_opt")]
    pub end_date: Option<Date>,
    /// Which person in the household the flow belongs to ("p1", "p2", ...)
    #[serde(default)]
    pub owner: String,
    /// Grouping key for cost breakdowns; falls back to `name`
    #[serde(default)]
    pub category: Option<String>,
    /// Asset bucket the Monte Carlo engine routes this flow into (cash when `None`)
    #[serde(default)]
    pub target: Option<AssetId>,
}

impl CashFlowItem {
    #[must_use]
    pub fn new(name: impl Into<String>, amount: f64, frequency: Frequency, start: Date) -> Self {
        Self {
            name: name.into(),
            amount,
            frequency,
            start_date: start,
            end_date: None,
            owner: String::new(),
            category: None,
            target: None,
        }
    }

    #[must_use]
    pub fn monthly(name: impl Into<String>, amount: f64, start: Date) -> Self {
        Self::new(name, amount, Frequency::Monthly, start)
    }

    #[must_use]
    pub fn yearly(name: impl Into<String>, amount: f64, start: Date) -> Self {
        Self::new(name, amount, Frequency::Yearly, start)
    }

    #[must_use]
    pub fn one_time(name: impl Into<String>, amount: f64, on: Date) -> Self {
        Self::new(name, amount, Frequency::OneTime, on)
    }

    #[must_use]
    pub fn until(mut self, end: Date) -> Self {
        self.end_date = Some(end);
        self
    }

    #[must_use]
    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    #[must_use]
    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn into_asset(mut self, asset: AssetId) -> Self {
        self.target = Some(asset);
        self
    }

    /// Key used in cost breakdowns.
    #[must_use]
    pub fn breakdown_key(&self) -> &str {
        self.category.as_deref().unwrap_or(&self.name)
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(ScheduleError::InvalidAmount {
                name: self.name.clone(),
                amount: self.amount,
            });
        }
        if let Some(end) = self.end_date
            && self.start_date > end
        {
            return Err(ScheduleError::StartAfterEnd {
                name: self.name.clone(),
                start: self.start_date,
                end,
            });
        }
        Ok(())
    }
}

/// A signed amount landing in one bucket in one simulated month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CashflowEvent {
    pub month_index: MonthIndex,
    pub amount: f64,
    #[serde(default)]
    pub target: Option<AssetId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_frequency_parsing_accepts_known_spellings() {
        assert_eq!("One-time".parse::<Frequency>().unwrap(), Frequency::OneTime);
        assert_eq!("OneTime".parse::<Frequency>().unwrap(), Frequency::OneTime);
        assert_eq!("Semi-annual".parse::<Frequency>().unwrap(), Frequency::SemiAnnual);
        assert_eq!("quarterly".parse::<Frequency>().unwrap(), Frequency::Quarterly);
        assert_eq!("Yearly".parse::<Frequency>().unwrap(), Frequency::Yearly);
    }

    #[test]
    fn test_frequency_parsing_rejects_unknown() {
        assert!("Fortnightly".parse::<Frequency>().is_err());
        assert!(serde_json::from_str::<Frequency>("\"weekly\"").is_err());
        assert_eq!(
            serde_json::from_str::<Frequency>("\"Monthly\"").unwrap(),
            Frequency::Monthly
        );
    }

    #[test]
    fn test_validate_rejects_reversed_dates() {
        let item = CashFlowItem::monthly("Rent", 2_000.0, date(2030, 1, 1)).until(date(2029, 1, 1));
        assert!(matches!(
            item.validate(),
            Err(ScheduleError::StartAfterEnd { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_negative_amount() {
        let item = CashFlowItem::monthly("Rent", -1.0, date(2030, 1, 1));
        assert!(matches!(
            item.validate(),
            Err(ScheduleError::InvalidAmount { .. })
        ));
        assert!(
            CashFlowItem::one_time("Gift", 10.0, date(2030, 1, 1))
                .until(date(2030, 1, 1))
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_item_deserializes_swiss_dates() {
        let json = r#"{
            "name": "LPP",
            "amount": 57000,
            "frequency": "Yearly",
            "start_date": "01.11.2033",
            "end_date": "2065-12-31"
        }"#;
        let item: CashFlowItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.start_date, date(2033, 11, 1));
        assert_eq!(item.end_date, Some(date(2065, 12, 31)));
        assert_eq!(item.breakdown_key(), "LPP");
        assert!(item.target.is_none());
    }
}
