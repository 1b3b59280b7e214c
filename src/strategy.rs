//! Sell-ladder offer-posting planner (§4.11 step e). Mirrors the coin-op
//! planner's deficit math, but counts open offers per denomination instead
//! of coins, and never combines — a missing offer slot is always a deficit.

use std::collections::HashMap;

use crate::planner::LadderBucket;

#[derive(Debug, Clone, PartialEq)]
pub struct OfferPostPlan {
    pub size_base_units: i64,
    pub reason: &'static str,
}

/// One planned offer-post per missing ladder slot: `target_count -
/// open_count`, clamped at zero, for every bucket with a positive target.
/// No split-buffer, no excess/cancel logic here — the cancel policy (§4.9)
/// is what retires stale offers, not this planner.
pub fn plan_offer_posts(
    buckets: &[LadderBucket],
    open_counts_by_size: &HashMap<i64, i64>,
    remaining_ops: u32,
) -> Vec<OfferPostPlan> {
    let mut deficits: Vec<(LadderBucket, i64)> = buckets
        .iter()
        .filter(|b| b.target_count > 0)
        .filter_map(|b| {
            let open = *open_counts_by_size.get(&b.size_base_units).unwrap_or(&0);
            let deficit = b.target_count - open;
            if deficit > 0 {
                Some((*b, deficit))
            } else {
                None
            }
        })
        .collect();
    deficits.sort_by_key(|(bucket, _)| bucket.size_base_units);

    let mut plans = Vec::new();
    let mut ops_left = remaining_ops;
    for (bucket, deficit) in deficits {
        for _ in 0..deficit {
            if ops_left == 0 {
                return plans;
            }
            plans.push(OfferPostPlan {
                size_base_units: bucket.size_base_units,
                reason: "ladder_offer_deficit",
            });
            ops_left -= 1;
        }
    }
    plans
}

/// `ask_price = xch_price_usd * (1 + spread_bps / 10000)`.
pub fn compute_ask_price(xch_price_usd: f64, spread_bps: i64) -> f64 {
    xch_price_usd * (1.0 + spread_bps as f64 / 10_000.0)
}

/// Requested quote-asset amount in base units for offering `size_base_units`
/// of the base asset at `ask_price`, scaled by each side's mojo multiplier
/// (defaulting to 1.0 when unset, i.e. the asset's base unit already is its
/// mojo unit).
pub fn compute_request_amount(
    size_base_units: i64,
    ask_price: f64,
    base_unit_mojo_multiplier: Option<f64>,
    quote_unit_mojo_multiplier: Option<f64>,
) -> u64 {
    let base_multiplier = base_unit_mojo_multiplier.unwrap_or(1.0);
    let quote_multiplier = quote_unit_mojo_multiplier.unwrap_or(1.0);
    let offer_amount_base_asset = size_base_units as f64 * base_multiplier;
    (offer_amount_base_asset * ask_price * quote_multiplier / base_multiplier).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(size: i64, target: i64) -> LadderBucket {
        LadderBucket {
            size_base_units: size,
            target_count: target,
            split_buffer_count: 0,
            combine_when_excess_factor: 2.0,
        }
    }

    #[test]
    fn plans_one_post_per_missing_slot() {
        let buckets = vec![bucket(100, 3), bucket(1000, 1)];
        let mut open = HashMap::new();
        open.insert(100, 1);
        let plans = plan_offer_posts(&buckets, &open, 50);
        assert_eq!(plans.len(), 3);
        assert_eq!(plans.iter().filter(|p| p.size_base_units == 100).count(), 2);
        assert_eq!(plans.iter().filter(|p| p.size_base_units == 1000).count(), 1);
    }

    #[test]
    fn fully_stocked_bucket_plans_nothing() {
        let buckets = vec![bucket(100, 2)];
        let mut open = HashMap::new();
        open.insert(100, 5);
        assert!(plan_offer_posts(&buckets, &open, 50).is_empty());
    }

    #[test]
    fn ask_price_applies_spread() {
        let price = compute_ask_price(20.0, 150);
        assert!((price - 20.3).abs() < 1e-9);
    }

    #[test]
    fn request_amount_rounds_to_nearest_unit() {
        let amount = compute_request_amount(1, 20.3, None, Some(1000.0));
        assert_eq!(amount, 20_300);
    }
}
