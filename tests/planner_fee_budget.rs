//! §8 scenario 6: fee-budget partition. `plans = [split x5]`, `split_fee=10`,
//! `spent_today=25`, `max_daily_fee=55` ⇒ remaining 30 admits 3 ops.

use greenfloor::planner::{partition_plans_by_budget, CoinOpKind, CoinOpPlan};

fn split_plans(count: usize, fee_mojos: u64) -> Vec<CoinOpPlan> {
    (0..count)
        .map(|_| CoinOpPlan {
            kind: CoinOpKind::Split,
            size_base_units: 100,
            fee_mojos,
            reason: "ladder_deficit",
        })
        .collect()
}

#[test]
fn scenario_6_admits_exactly_three_of_five() {
    let plans = split_plans(5, 10);
    let result = partition_plans_by_budget(plans, 25, 55);

    assert_eq!(result.allowed.len(), 3, "expected 3 allowed ops, got {:?}", result.allowed);
    assert_eq!(result.overflow.len(), 2, "expected 2 overflow ops, got {:?}", result.overflow);
    for (plan, reason) in &result.overflow {
        assert_eq!(plan.kind, CoinOpKind::Split);
        assert_eq!(*reason, "fee_budget_partial_overflow");
    }
}

#[test]
fn zero_budget_admits_everything() {
    let plans = split_plans(5, 10);
    let result = partition_plans_by_budget(plans.clone(), 25, 0);
    assert_eq!(result.allowed.len(), plans.len());
    assert!(result.overflow.is_empty());
}

#[test]
fn already_exhausted_budget_overflows_every_plan() {
    let plans = split_plans(3, 10);
    let result = partition_plans_by_budget(plans, 55, 55);
    assert!(result.allowed.is_empty());
    assert_eq!(result.overflow.len(), 3);
}
