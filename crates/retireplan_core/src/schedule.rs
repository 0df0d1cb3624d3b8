//! Cash-flow schedule resolution
//!
//! Converts `{amount, frequency, start, end}` records into the amount that
//! lands in each calendar month. Yearly totals are defined as the sum of the
//! twelve monthly amounts, so a year can never be double- or under-counted at
//! its boundaries.

use jiff::civil::Date;
use tracing::warn;

use crate::date_math::{
    add_days, days_in_month, fast_days_between, month_at, month_end, month_start, months_between,
};
use crate::error::ScheduleError;
use crate::model::{CashFlowItem, CashflowEvent, FlowDirection, Frequency, MonthIndex};

/// Stand-in end date for open-ended items.
#[must_use]
pub fn far_future() -> Date {
    jiff::civil::date(2100, 1, 1)
}

/// Last day on which `item` is active.
///
/// An end date on the 1st of a month means "stops at the start of that
/// month", so the month itself is excluded.
fn last_active_day(item: &CashFlowItem) -> Date {
    let end = item.end_date.unwrap_or_else(far_future);
    if end.day() == 1 {
        add_days(end, -1)
    } else {
        end
    }
}

/// Amount `item` contributes to the month containing `target_month`.
///
/// `epoch` is the projection start; anything before it is ignored.
#[must_use]
pub fn monthly_amount(item: &CashFlowItem, target_month: Date, epoch: Date) -> f64 {
    let start = item.start_date.max(epoch);
    let first_day = month_start(target_month);
    let last_day = month_end(target_month);

    let Some(divisor) = item.frequency.months_per_payment() else {
        return if month_start(start) == first_day {
            item.amount
        } else {
            0.0
        };
    };

    let end = last_active_day(item);
    if end < start || end < first_day || start > last_day {
        return 0.0;
    }

    let base = item.amount / f64::from(divisor);

    // Only a mid-month start is prorated; every later month is paid in full
    if start > first_day {
        let overlap_days = fast_days_between(start, end.min(last_day)) + 1;
        let month_days = i32::from(days_in_month(first_day.year(), first_day.month()));
        if overlap_days < month_days {
            return base * f64::from(overlap_days) / f64::from(month_days);
        }
    }
    base
}

/// Total paid by `item` in `year`, measured from the item's own start.
#[must_use]
pub fn yearly_amount(item: &CashFlowItem, year: i16) -> f64 {
    yearly_amount_from(item, year, item.start_date)
}

/// Total paid by `item` in `year`, ignoring anything before `epoch`.
#[must_use]
pub fn yearly_amount_from(item: &CashFlowItem, year: i16, epoch: Date) -> f64 {
    (1..=12)
        .map(|month| monthly_amount(item, jiff::civil::date(year, month, 1), epoch))
        .sum()
}

/// Split items into valid ones and the errors of those that must be skipped.
pub fn partition_valid(items: &[CashFlowItem]) -> (Vec<&CashFlowItem>, Vec<ScheduleError>) {
    let mut valid = Vec::with_capacity(items.len());
    let mut skipped = Vec::new();
    for item in items {
        match item.validate() {
            Ok(()) => valid.push(item),
            Err(err) => {
                warn!(item = %item.name, error = %err, "Skipping cash flow with invalid schedule");
                skipped.push(err);
            }
        }
    }
    (valid, skipped)
}

/// Month-indexed events ready for the Monte Carlo engine.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSchedule {
    /// Sorted by month; within a month, incomes precede costs in input order
    pub events: Vec<CashflowEvent>,
    pub skipped: Vec<ScheduleError>,
}

impl ResolvedSchedule {
    /// Net scheduled flow per month for the first `months` months.
    #[must_use]
    pub fn net_by_month(&self, months: MonthIndex) -> Vec<f64> {
        let mut net = vec![0.0; months as usize];
        for event in &self.events {
            if let Some(slot) = net.get_mut(event.month_index as usize) {
                *slot += event.amount;
            }
        }
        net
    }
}

/// Resolve incomes and costs into signed monthly events over `horizon_months`
/// months starting at the month containing `epoch`.
pub fn resolve_events(
    incomes: &[CashFlowItem],
    costs: &[CashFlowItem],
    epoch: Date,
    horizon_months: MonthIndex,
) -> ResolvedSchedule {
    let epoch = month_start(epoch);
    let (incomes, mut skipped) = partition_valid(incomes);
    let (costs, cost_errors) = partition_valid(costs);
    skipped.extend(cost_errors);

    let flows: Vec<(&CashFlowItem, FlowDirection)> = incomes
        .into_iter()
        .map(|item| (item, FlowDirection::Inflow))
        .chain(costs.into_iter().map(|item| (item, FlowDirection::Outflow)))
        .collect();

    let mut events = Vec::new();
    for (item, direction) in flows {
        // Months outside the item's active range contribute nothing
        let first = months_between(epoch, item.start_date).max(0) as MonthIndex;
        let last_day = match item.frequency {
            Frequency::OneTime => item.start_date.max(epoch),
            _ => last_active_day(item).max(item.start_date),
        };
        let horizon = i32::try_from(horizon_months).unwrap_or(i32::MAX);
        let last = months_between(epoch, last_day).clamp(-1, horizon - 1);
        if last < 0 {
            continue;
        }
        for month_index in first..=last as MonthIndex {
            let amount = monthly_amount(item, month_at(epoch, month_index), epoch);
            if amount != 0.0 {
                events.push(CashflowEvent {
                    month_index,
                    amount: direction.sign() * amount,
                    target: item.target,
                });
            }
        }
    }

    // Stable sort keeps the income-then-cost order inside each month
    events.sort_by_key(|event| event.month_index);

    ResolvedSchedule { events, skipped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_open_ended_item_stops_before_sentinel() {
        let item = CashFlowItem::monthly("Rent", 1_000.0, date(2099, 11, 1));
        assert_eq!(yearly_amount(&item, 2099), 2_000.0);
        assert_eq!(yearly_amount(&item, 2100), 0.0);
    }

    #[test]
    fn test_start_before_epoch_is_clipped() {
        let item = CashFlowItem::monthly("Salary", 9_000.0, date(2020, 3, 15));
        let epoch = date(2026, 1, 1);
        assert_eq!(monthly_amount(&item, date(2025, 12, 1), epoch), 0.0);
        assert_eq!(monthly_amount(&item, date(2026, 1, 1), epoch), 9_000.0);
        assert_eq!(yearly_amount_from(&item, 2026, epoch), 108_000.0);
    }

    #[test]
    fn test_last_month_not_prorated() {
        let item = CashFlowItem::monthly("Salary", 3_100.0, date(2030, 1, 1)).until(date(2030, 3, 10));
        assert_eq!(monthly_amount(&item, date(2030, 3, 1), item.start_date), 3_100.0);
        assert_eq!(monthly_amount(&item, date(2030, 4, 1), item.start_date), 0.0);
    }

    #[test]
    fn test_resolve_events_signs_and_order() {
        let epoch = date(2030, 1, 1);
        let incomes = vec![CashFlowItem::monthly("Salary", 5_000.0, epoch).until(date(2030, 3, 1))];
        let costs = vec![
            CashFlowItem::monthly("Rent", 2_000.0, epoch),
            CashFlowItem::monthly("Broken", 10.0, epoch).until(date(2029, 1, 1)),
        ];

        let schedule = resolve_events(&incomes, &costs, epoch, 4);

        assert_eq!(schedule.skipped.len(), 1);
        assert_eq!(schedule.skipped[0].item_name(), "Broken");
        let month0: Vec<f64> = schedule
            .events
            .iter()
            .filter(|e| e.month_index == 0)
            .map(|e| e.amount)
            .collect();
        assert_eq!(month0, vec![5_000.0, -2_000.0]);
        assert_eq!(schedule.net_by_month(4), vec![3_000.0, 3_000.0, -2_000.0, -2_000.0]);
    }

    #[test]
    fn test_resolve_events_respects_horizon() {
        let epoch = date(2030, 6, 20);
        let incomes = vec![
            CashFlowItem::one_time("Inheritance", 45_000.0, date(2031, 2, 14)),
            CashFlowItem::one_time("Too late", 1.0, date(2040, 1, 1)),
        ];
        let schedule = resolve_events(&incomes, &[], epoch, 12);
        assert_eq!(
            schedule.events,
            vec![CashflowEvent {
                month_index: 8,
                amount: 45_000.0,
                target: None
            }]
        );
    }

    #[test]
    fn test_resolve_events_with_unbounded_horizon() {
        let epoch = date(2030, 1, 1);
        let rent = vec![CashFlowItem::monthly("Rent", 100.0, epoch)];
        let schedule = resolve_events(&rent, &[], epoch, MonthIndex::MAX);

        // Open-ended items stop at the 2100 sentinel
        assert_eq!(schedule.events.len(), 840);
        assert_eq!(schedule.events.last().map(|e| e.month_index), Some(839));
    }
}
