//! §8 scenario 5: low-inventory hysteresis. `threshold=100, hysteresis=10%`:
//! `remaining=90` trips the alert; `remaining=105` stays low (below the
//! 110 clear line); `remaining=111` clears.

use greenfloor::policy::evaluate_low_inventory;

#[test]
fn scenario_5_trips_then_holds_then_clears() {
    let tripped = evaluate_low_inventory(false, 90, 100, 10);
    assert!(tripped.is_low, "expected is_low=true at remaining=90");

    let still_low = evaluate_low_inventory(tripped.is_low, 105, 100, 10);
    assert!(still_low.is_low, "expected is_low to hold at remaining=105, below the 110 clear line");

    let cleared = evaluate_low_inventory(still_low.is_low, 111, 100, 10);
    assert!(!cleared.is_low, "expected is_low=false at remaining=111");
}

#[test]
fn never_tripped_state_uses_the_plain_threshold() {
    let at_threshold = evaluate_low_inventory(false, 100, 100, 10);
    assert!(!at_threshold.is_low, "remaining == threshold should not trip before ever being low");

    let one_below = evaluate_low_inventory(false, 99, 100, 10);
    assert!(one_below.is_low);
}

#[test]
fn zero_hysteresis_clears_right_at_threshold() {
    let tripped = evaluate_low_inventory(false, 50, 100, 0);
    assert!(tripped.is_low);
    let cleared = evaluate_low_inventory(true, 100, 100, 0);
    assert!(!cleared.is_low);
}
