//! Tests for cash-flow schedule resolution
//!
//! These tests verify:
//! - Monthly amounts of a year add up to the yearly amount
//! - One-time items land in exactly one month
//! - An end date on the 1st of a month excludes that month
//! - Mid-month starts are prorated by days, later months are not

use jiff::civil::date;

use crate::model::{CashFlowItem, Frequency};
use crate::schedule::{monthly_amount, resolve_events, yearly_amount};

fn months_of(year: i16) -> impl Iterator<Item = jiff::civil::Date> {
    (1..=12).map(move |m| date(year, m, 1))
}

/// Σ Jan..Dec equals the yearly total for every full year inside the range
#[test]
fn test_monthly_amounts_sum_to_yearly() {
    let item = CashFlowItem::yearly("Rental income", 24_000.0, date(2030, 1, 1)).until(date(2040, 12, 31));

    for year in 2030..=2040 {
        let by_month: f64 = months_of(year)
            .map(|m| monthly_amount(&item, m, item.start_date))
            .sum();
        assert!(
            (by_month - yearly_amount(&item, year)).abs() < 1e-9,
            "year {year}: {by_month}"
        );
        assert!((yearly_amount(&item, year) - 24_000.0).abs() < 1e-9);
    }
}

#[test]
fn test_other_frequencies_annualize() {
    let start = date(2031, 1, 1);
    let quarterly = CashFlowItem::new("Dividend", 900.0, Frequency::Quarterly, start);
    let semi = CashFlowItem::new("Insurance", 1_200.0, Frequency::SemiAnnual, start);
    let monthly = CashFlowItem::monthly("Rent", 1_500.0, start);

    assert!((yearly_amount(&quarterly, 2031) - 3_600.0).abs() < 1e-9);
    assert!((yearly_amount(&semi, 2031) - 2_400.0).abs() < 1e-9);
    assert!((yearly_amount(&monthly, 2031) - 18_000.0).abs() < 1e-9);
}

/// A one-time item contributes its full amount to one month only
#[test]
fn test_one_time_single_month() {
    let item = CashFlowItem::one_time("Inheritance", 80_000.0, date(2035, 8, 17));

    let mut hits = Vec::new();
    for year in 2034..=2036 {
        for m in months_of(year) {
            let amount = monthly_amount(&item, m, item.start_date);
            if amount != 0.0 {
                hits.push((m, amount));
            }
        }
    }
    assert_eq!(hits, vec![(date(2035, 8, 1), 80_000.0)]);
    assert_eq!(yearly_amount(&item, 2035), 80_000.0);
    assert_eq!(yearly_amount(&item, 2036), 0.0);
}

/// End on the 1st of month M → nothing in month M
#[test]
fn test_end_on_first_excludes_month() {
    let item = CashFlowItem::monthly("Salary", 7_000.0, date(2030, 1, 1)).until(date(2032, 6, 1));
    let epoch = item.start_date;

    assert_eq!(monthly_amount(&item, date(2032, 5, 1), epoch), 7_000.0);
    assert_eq!(monthly_amount(&item, date(2032, 6, 1), epoch), 0.0);
    assert_eq!(yearly_amount(&item, 2032), 35_000.0);
}

#[test]
fn test_yearly_item_started_in_november() {
    let item = CashFlowItem::yearly("AVS", 57_000.0, date(2033, 11, 1)).until(date(2065, 12, 31));
    // 2 months × 4750
    assert_eq!(yearly_amount(&item, 2033), 9_500.0);
    assert_eq!(yearly_amount(&item, 2034), 57_000.0);
}

#[test]
fn test_yearly_item_started_in_january() {
    let item = CashFlowItem::yearly("AVS", 57_000.0, date(2033, 1, 1)).until(date(2065, 12, 31));
    assert_eq!(yearly_amount(&item, 2033), 57_000.0);
}

#[test]
fn test_mid_month_start_prorated_once() {
    // 30-day month, active from the 16th → 15 days
    let item = CashFlowItem::monthly("Part-time", 3_000.0, date(2030, 6, 16));
    let epoch = item.start_date;

    assert!((monthly_amount(&item, date(2030, 6, 1), epoch) - 1_500.0).abs() < 1e-9);
    assert_eq!(monthly_amount(&item, date(2030, 7, 1), epoch), 3_000.0);
    assert_eq!(monthly_amount(&item, date(2030, 5, 1), epoch), 0.0);
}

#[test]
fn test_resolved_events_match_monthly_amounts() {
    let epoch = date(2030, 1, 1);
    let incomes = vec![CashFlowItem::yearly("Bonus", 12_000.0, date(2030, 3, 1)).until(date(2031, 1, 1))];
    let costs = vec![CashFlowItem::one_time("Roof", 20_000.0, date(2030, 9, 30))];

    let schedule = resolve_events(&incomes, &costs, epoch, 24);
    let net = schedule.net_by_month(24);

    assert_eq!(net[0], 0.0);
    assert_eq!(net[1], 0.0);
    assert_eq!(net[2], 1_000.0);
    assert_eq!(net[8], 1_000.0 - 20_000.0);
    assert_eq!(net[11], 1_000.0);
    assert_eq!(net[12], 0.0);
    assert!(schedule.skipped.is_empty());
}
