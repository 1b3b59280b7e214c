//! §8 scenario 3: the offer lifecycle transition table, exercised end to end
//! (including the terminal-state no-op case) rather than per-call like the
//! colocated unit tests.

use greenfloor::lifecycle::{apply_offer_signal, OfferSignal, OfferState};

#[test]
fn scenario_3_walks_the_full_lifecycle() {
    let observed = apply_offer_signal(OfferState::Open, OfferSignal::MempoolSeen).unwrap();
    assert_eq!(observed.to_state, OfferState::MempoolObserved);

    let confirmed = apply_offer_signal(observed.to_state, OfferSignal::TxConfirmed).unwrap();
    assert_eq!(confirmed.to_state, OfferState::TxBlockConfirmed);

    let refresh_due = apply_offer_signal(OfferState::Open, OfferSignal::ExpiryNear).unwrap();
    assert_eq!(refresh_due.to_state, OfferState::RefreshDue);

    let reopened = apply_offer_signal(refresh_due.to_state, OfferSignal::RefreshPosted).unwrap();
    assert_eq!(reopened.to_state, OfferState::Open);

    assert!(apply_offer_signal(OfferState::Expired, OfferSignal::Expired).is_none());
}

#[test]
fn tx_confirmed_reachable_from_mempool_observed_directly() {
    let t = apply_offer_signal(OfferState::MempoolObserved, OfferSignal::TxConfirmed).unwrap();
    assert_eq!(t.to_state, OfferState::TxBlockConfirmed);
    assert_eq!(t.action, "reconcile_coins_and_offers");
}

#[test]
fn terminal_states_reject_every_signal() {
    for state in [OfferState::Expired, OfferState::Cancelled, OfferState::UnknownOrphaned] {
        for signal in [
            OfferSignal::MempoolSeen,
            OfferSignal::TxConfirmed,
            OfferSignal::ExpiryNear,
            OfferSignal::Expired,
            OfferSignal::RefreshPosted,
        ] {
            assert!(
                apply_offer_signal(state, signal).is_none(),
                "expected no transition out of a terminal state, state={state:?} signal={signal:?}"
            );
        }
    }
}
