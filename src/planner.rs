//! Ladder coin-op planner and fee-budget partitioner (§4.10).

use std::cmp::Ordering;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinOpKind {
    Split,
    Combine,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoinOpPlan {
    pub kind: CoinOpKind,
    pub size_base_units: i64,
    pub fee_mojos: u64,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct LadderBucket {
    pub size_base_units: i64,
    pub target_count: i64,
    pub split_buffer_count: i64,
    pub combine_when_excess_factor: f64,
}

/// Plan splits and combines for one market's ladder.
///
/// 1. For every bucket with a positive target, compute
///    `deficit = target + split_buffer - current`; sort deficits descending
///    by `deficit/target` (tie-break ascending size) and emit split plans
///    until `remaining_ops`/`remaining_fee_budget` is exhausted.
/// 2. If ANY bucket had a positive deficit, no combines are planned this
///    cycle — filling denominations takes priority over consolidating them.
/// 3. Otherwise compute `excess = current - floor(target *
///    combine_when_excess_factor)` per bucket, sort ascending by size, and
///    emit combine plans for every bucket with positive excess.
pub fn plan_coin_ops(
    buckets: &[LadderBucket],
    current_counts: &HashMap<i64, i64>,
    remaining_ops: u32,
    split_fee_mojos: u64,
    combine_fee_mojos: u64,
) -> Vec<CoinOpPlan> {
    let mut deficits: Vec<(LadderBucket, i64)> = buckets
        .iter()
        .filter(|b| b.target_count > 0)
        .filter_map(|b| {
            let current = *current_counts.get(&b.size_base_units).unwrap_or(&0);
            let deficit = b.target_count + b.split_buffer_count - current;
            if deficit > 0 {
                Some((*b, deficit))
            } else {
                None
            }
        })
        .collect();

    if !deficits.is_empty() {
        deficits.sort_by(|(a_bucket, a_deficit), (b_bucket, b_deficit)| {
            let a_ratio = *a_deficit as f64 / a_bucket.target_count as f64;
            let b_ratio = *b_deficit as f64 / b_bucket.target_count as f64;
            b_ratio
                .partial_cmp(&a_ratio)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a_bucket.size_base_units.cmp(&b_bucket.size_base_units))
        });

        let mut plans = Vec::new();
        let mut ops_left = remaining_ops;
        for (bucket, deficit) in deficits {
            for _ in 0..deficit {
                if ops_left == 0 {
                    return plans;
                }
                plans.push(CoinOpPlan {
                    kind: CoinOpKind::Split,
                    size_base_units: bucket.size_base_units,
                    fee_mojos: split_fee_mojos,
                    reason: "ladder_deficit",
                });
                ops_left -= 1;
            }
        }
        return plans;
    }

    let mut excesses: Vec<(LadderBucket, i64)> = buckets
        .iter()
        .filter(|b| b.target_count > 0)
        .filter_map(|b| {
            let current = *current_counts.get(&b.size_base_units).unwrap_or(&0);
            let cap = (b.target_count as f64 * b.combine_when_excess_factor).floor() as i64;
            let excess = current - cap;
            if excess > 0 {
                Some((*b, excess))
            } else {
                None
            }
        })
        .collect();
    excesses.sort_by_key(|(bucket, _)| bucket.size_base_units);

    let mut plans = Vec::new();
    let mut ops_left = remaining_ops;
    for (bucket, excess) in excesses {
        for _ in 0..excess {
            if ops_left == 0 {
                return plans;
            }
            plans.push(CoinOpPlan {
                kind: CoinOpKind::Combine,
                size_base_units: bucket.size_base_units,
                fee_mojos: combine_fee_mojos,
                reason: "ladder_excess",
            });
            ops_left -= 1;
        }
    }
    plans
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionedPlans {
    pub allowed: Vec<CoinOpPlan>,
    pub overflow: Vec<(CoinOpPlan, &'static str)>,
}

/// Split `plans` against a remaining fee budget. A non-positive `ceiling`
/// means no budget is enforced — everything is allowed. Otherwise plans are
/// walked in order: whole plans that fit go to `allowed`; the first plan
/// that doesn't fit at all goes to `overflow` with
/// `fee_budget_partial_overflow`, and everything after it overflows too
/// (the budget is exhausted, not reordered).
pub fn partition_plans_by_budget(
    plans: Vec<CoinOpPlan>,
    spent_so_far: u64,
    ceiling: i64,
) -> PartitionedPlans {
    if ceiling <= 0 {
        return PartitionedPlans {
            allowed: plans,
            overflow: Vec::new(),
        };
    }
    let ceiling = ceiling as u64;
    let mut allowed = Vec::new();
    let mut overflow = Vec::new();
    let mut spent = spent_so_far;
    let mut exhausted = false;

    for plan in plans {
        if exhausted {
            overflow.push((plan, "fee_budget_partial_overflow"));
            continue;
        }
        if spent + plan.fee_mojos <= ceiling {
            spent += plan.fee_mojos;
            allowed.push(plan);
        } else {
            exhausted = true;
            overflow.push((plan, "fee_budget_partial_overflow"));
        }
    }
    PartitionedPlans { allowed, overflow }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(size: i64, target: i64, buffer: i64) -> LadderBucket {
        LadderBucket {
            size_base_units: size,
            target_count: target,
            split_buffer_count: buffer,
            combine_when_excess_factor: 2.0,
        }
    }

    #[test]
    fn deficit_wins_over_combine() {
        let buckets = vec![bucket(100, 5, 1), bucket(1000, 2, 0)];
        let mut current = HashMap::new();
        current.insert(100, 2);
        current.insert(1000, 10);
        let plans = plan_coin_ops(&buckets, &current, 50, 10, 10);
        assert!(plans.iter().all(|p| p.kind == CoinOpKind::Split));
        assert!(!plans.is_empty());
    }

    #[test]
    fn combine_only_when_no_deficit() {
        let buckets = vec![bucket(100, 2, 0)];
        let mut current = HashMap::new();
        current.insert(100, 10);
        let plans = plan_coin_ops(&buckets, &current, 50, 10, 10);
        assert!(plans.iter().all(|p| p.kind == CoinOpKind::Combine));
        assert!(!plans.is_empty());
    }

    #[test]
    fn fee_budget_partition_scenario() {
        let plans: Vec<CoinOpPlan> = (0..5)
            .map(|_| CoinOpPlan {
                kind: CoinOpKind::Split,
                size_base_units: 100,
                fee_mojos: 10,
                reason: "ladder_deficit",
            })
            .collect();
        let result = partition_plans_by_budget(plans, 25, 55);
        assert_eq!(result.allowed.len(), 3);
        assert_eq!(result.overflow.len(), 2);
        assert!(result.overflow.iter().all(|(_, reason)| *reason == "fee_budget_partial_overflow"));
    }

    #[test]
    fn non_positive_ceiling_allows_everything() {
        let plans = vec![CoinOpPlan {
            kind: CoinOpKind::Split,
            size_base_units: 100,
            fee_mojos: 1_000_000,
            reason: "ladder_deficit",
        }];
        let result = partition_plans_by_budget(plans, 0, 0);
        assert_eq!(result.allowed.len(), 1);
        assert!(result.overflow.is_empty());
    }
}
