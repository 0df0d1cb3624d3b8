//! Tests for retirement-date planning
//!
//! These tests verify:
//! - Anchored items move with the candidate retirement date
//! - The earliest feasible date is the first month with a non-negative final balance
//! - An infeasible plan yields no date

use jiff::civil::date;

use crate::model::CashFlowItem;
use crate::planner::{Anchor, PlanItem, RetirementAssessment, RetirementPlan};

/// 11 projected years (132 months): salary 5000/month until retirement,
/// pension 2500/month afterwards, living costs 4000/month throughout.
///
/// final = 100k + 5000·w + 2500·(132 − w) − 528k = 2500·w − 98k,
/// so at least w = 40 working months are needed.
fn plan() -> RetirementPlan {
    RetirementPlan {
        incomes: vec![
            PlanItem::anchored(
                CashFlowItem::monthly("Salary", 5_000.0, date(2030, 1, 1)),
                Anchor::EndsAtRetirement,
            ),
            PlanItem::anchored(
                CashFlowItem::monthly("Pension", 2_500.0, date(2045, 1, 1)),
                Anchor::StartsAtRetirement,
            ),
        ],
        costs: vec![PlanItem::fixed(CashFlowItem::monthly(
            "Living",
            4_000.0,
            date(2030, 1, 1),
        ))],
        liquid_assets: 100_000.0,
        illiquid_assets: 0.0,
        pension_capital: None,
        start_date: date(2030, 1, 1),
        terminal_date: date(2040, 12, 31),
    }
}

#[test]
fn test_final_balance_follows_retirement_date() {
    let plan = plan();
    // 40 working months
    let balance = plan.final_balance(date(2033, 5, 1)).unwrap();
    assert!((balance - 2_000.0).abs() < 1e-6, "{balance}");
    // 39 working months
    let balance = plan.final_balance(date(2033, 4, 1)).unwrap();
    assert!((balance + 500.0).abs() < 1e-6, "{balance}");
}

#[test]
fn test_earliest_retirement_found() {
    let plan = plan();
    let earliest = plan
        .earliest_retirement(date(2030, 1, 1), date(2040, 1, 1))
        .unwrap();
    assert_eq!(earliest, Some(date(2033, 5, 1)));

    let assessment = plan.assess(date(2033, 5, 1)).unwrap();
    assert!(assessment.feasible);
    assert_eq!(assessment.depletion_year, None);
}

#[test]
fn test_assessment_from_existing_projection() {
    let plan = plan();
    let retirement = date(2032, 1, 1);
    let projection = plan.projection_for(retirement).unwrap();
    let assessment = RetirementAssessment::from_projection(retirement, &projection);

    assert_eq!(assessment, plan.assess(retirement).unwrap());
    // 24 working months: 2500·24 − 98k
    assert!((assessment.final_balance + 38_000.0).abs() < 1e-6);
    assert_eq!(assessment.depletion_year, Some(2038));
    assert!(!assessment.feasible);
}

#[test]
fn test_earliest_retirement_none_when_infeasible() {
    let mut plan = plan();
    plan.costs[0].item.amount = 9_000.0;
    let earliest = plan
        .earliest_retirement(date(2030, 1, 1), date(2035, 1, 1))
        .unwrap();
    assert_eq!(earliest, None);

    let assessment = plan.assess(date(2035, 1, 1)).unwrap();
    assert!(!assessment.feasible);
    assert!(assessment.depletion_year.is_some());
}

#[test]
fn test_scan_starts_at_given_date() {
    let plan = plan();
    // Already feasible on the first candidate, even mid-month
    let earliest = plan
        .earliest_retirement(date(2036, 3, 15), date(2040, 1, 1))
        .unwrap();
    assert_eq!(earliest, Some(date(2036, 3, 15)));
}
