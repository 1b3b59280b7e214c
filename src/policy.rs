//! Cancel policy, retry/cooldown controller, and low-inventory hysteresis
//! (§4.9, §3 AlertState invariant).

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::RetryConfig;
use crate::config::models::MarketConfig;

/// Basis-point price move between two consecutive price-policy samples.
/// `None` if either price is missing or non-positive — there's nothing to
/// divide by.
pub fn move_bps(previous: Option<f64>, current: Option<f64>) -> Option<i64> {
    let previous = previous.filter(|p| *p > 0.0)?;
    let current = current?;
    Some((((current - previous).abs() / previous) * 10_000.0).round() as i64)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelDecision {
    pub triggered: bool,
    pub reason: &'static str,
}

/// Decide whether a market's open offer should be cancelled on this price
/// sample. Only applies to `quote_asset_type=unstable` markets opting into
/// `cancel_policy_stable_vs_unstable`; the threshold is basis points of
/// absolute move since the last sample.
pub fn evaluate_cancel_policy(
    market: &MarketConfig,
    previous_price: Option<f64>,
    current_price: Option<f64>,
    threshold_bps: i64,
) -> CancelDecision {
    if market.quote_asset_type != "unstable" {
        return CancelDecision {
            triggered: false,
            reason: "not_unstable_leg_market",
        };
    }
    if !market.pricing.cancel_policy_stable_vs_unstable {
        return CancelDecision {
            triggered: false,
            reason: "not_stable_vs_unstable_market",
        };
    }
    match move_bps(previous_price, current_price) {
        None => CancelDecision {
            triggered: false,
            reason: "missing_price_baseline",
        },
        Some(bps) if bps >= threshold_bps => CancelDecision {
            triggered: true,
            reason: "price_move_threshold_exceeded",
        },
        Some(_) => CancelDecision {
            triggered: false,
            reason: "price_move_below_threshold",
        },
    }
}

/// Per-`(venue, market_id)` or `cancel:<market_id>` cooldown + attempt
/// tracking for offer post/cancel operations. The cooldown maps live for the
/// life of the daemon process; they're not persisted, so a restart resets
/// cooldowns (acceptable — a spurious extra attempt right after restart is
/// harmless next to losing availability entirely).
#[derive(Default)]
pub struct RetryController {
    cooldown_until: HashMap<String, DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptGate {
    Allowed,
    InCooldown,
}

impl RetryController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, key: &str, now: DateTime<Utc>) -> AttemptGate {
        match self.cooldown_until.get(key) {
            Some(until) if *until > now => AttemptGate::InCooldown,
            _ => AttemptGate::Allowed,
        }
    }

    pub fn start_cooldown(&mut self, key: &str, now: DateTime<Utc>, cooldown_s: i64) {
        self.cooldown_until
            .insert(key.to_string(), now + chrono::Duration::seconds(cooldown_s));
    }

    pub fn clear_cooldown(&mut self, key: &str) {
        self.cooldown_until.remove(key);
    }
}

pub fn post_cooldown_key(venue: &str, market_id: &str) -> String {
    format!("{venue}:{market_id}")
}

pub fn cancel_cooldown_key(market_id: &str) -> String {
    format!("cancel:{market_id}")
}

/// Exponential backoff delay in milliseconds for a 1-indexed attempt number:
/// `backoff_ms * 2^(attempt-1)`.
pub fn backoff_delay_ms(config: &RetryConfig, attempt: u32) -> u64 {
    config.backoff_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(32))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowInventoryState {
    pub is_low: bool,
}

/// Hysteresis for the low-inventory alert: once `remaining < threshold`
/// trips `is_low`, it only clears once `remaining >= threshold * (1 +
/// hysteresis/100)` — prevents alert/clear flapping right at the boundary.
pub fn evaluate_low_inventory(
    was_low: bool,
    remaining: i64,
    threshold: i64,
    hysteresis_percent: i64,
) -> LowInventoryState {
    let is_low = if was_low {
        let clear_at = (threshold as f64 * (1.0 + hysteresis_percent as f64 / 100.0)).ceil() as i64;
        remaining < clear_at
    } else {
        remaining < threshold
    };
    LowInventoryState { is_low }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_bps_matches_scenario() {
        assert_eq!(move_bps(Some(100.0), Some(105.0)), Some(500));
    }

    #[test]
    fn low_inventory_hysteresis_scenario() {
        // threshold=100, hysteresis=10%: trips below 100, clears only at >=110.
        let trip = evaluate_low_inventory(false, 90, 100, 10);
        assert!(trip.is_low);
        let still_low = evaluate_low_inventory(true, 105, 100, 10);
        assert!(still_low.is_low);
        let cleared = evaluate_low_inventory(true, 111, 100, 10);
        assert!(!cleared.is_low);
    }

    #[test]
    fn backoff_doubles_each_attempt() {
        let config = RetryConfig {
            max_attempts: 5,
            backoff_ms: 250,
            cooldown_s: 30,
        };
        assert_eq!(backoff_delay_ms(&config, 1), 250);
        assert_eq!(backoff_delay_ms(&config, 2), 500);
        assert_eq!(backoff_delay_ms(&config, 3), 1000);
    }

    #[test]
    fn cooldown_blocks_until_expiry() {
        let mut controller = RetryController::new();
        let now = Utc::now();
        let key = post_cooldown_key("dexie", "xch-usdc");
        controller.start_cooldown(&key, now, 30);
        assert_eq!(controller.check(&key, now), AttemptGate::InCooldown);
        assert_eq!(
            controller.check(&key, now + chrono::Duration::seconds(31)),
            AttemptGate::Allowed
        );
    }
}
