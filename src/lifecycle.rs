//! Offer lifecycle state machine (§4.8). States advance strictly through
//! signals derived from venue status polls and chain confirmations; any
//! `(state, signal)` pair not in the transition table is a no-op.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferState {
    Open,
    MempoolObserved,
    TxBlockConfirmed,
    RefreshDue,
    Expired,
    Cancelled,
    UnknownOrphaned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferSignal {
    MempoolSeen,
    TxConfirmed,
    ExpiryNear,
    Expired,
    RefreshPosted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub to_state: OfferState,
    pub action: &'static str,
    pub reason: &'static str,
}

/// Apply `signal` to `from`, returning the transition or `None` when the
/// pair isn't in the table — callers log `signal_ignored_for_state` for the
/// `None` case.
pub fn apply_offer_signal(from: OfferState, signal: OfferSignal) -> Option<Transition> {
    use OfferSignal::*;
    use OfferState::*;

    match (from, signal) {
        (Open, MempoolSeen) => Some(Transition {
            to_state: MempoolObserved,
            action: "mark_mempool_observed",
            reason: "potential_take_seen",
        }),
        (Open | MempoolObserved, TxConfirmed) => Some(Transition {
            to_state: TxBlockConfirmed,
            action: "reconcile_coins_and_offers",
            reason: "take_confirmed_on_tx_block",
        }),
        (Open, ExpiryNear) => Some(Transition {
            to_state: RefreshDue,
            action: "refresh_offer",
            reason: "refresh_window_entered",
        }),
        (RefreshDue, RefreshPosted) => Some(Transition {
            to_state: Open,
            action: "track_new_offer_open",
            reason: "offer_refreshed",
        }),
        (Open | RefreshDue, Expired) => Some(Transition {
            to_state: OfferState::Expired,
            action: "cleanup_offer_state",
            reason: "offer_expired",
        }),
        _ => None,
    }
}

/// Map a venue's numeric offer status to the lifecycle signal it implies,
/// given the offer's current (already-tracked) state. Status 3 (cancelled)
/// and a 404 single-offer lookup bypass the signal table entirely and write
/// a terminal state directly, since nothing should ever transition a
/// terminal offer back into an active one.
pub fn signal_for_venue_status(status_code: i64, current_state: OfferState) -> Option<OfferSignal> {
    let is_terminal = matches!(
        current_state,
        OfferState::Expired | OfferState::Cancelled | OfferState::UnknownOrphaned
    );
    match status_code {
        4 => Some(OfferSignal::TxConfirmed),
        6 => Some(OfferSignal::Expired),
        3 => None, // caller writes `Cancelled` directly.
        0 | 1 | 2 | 5 if !is_terminal => Some(OfferSignal::MempoolSeen),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mempool_seen_moves_open_to_observed() {
        let t = apply_offer_signal(OfferState::Open, OfferSignal::MempoolSeen).unwrap();
        assert_eq!(t.to_state, OfferState::MempoolObserved);
        assert_eq!(t.reason, "potential_take_seen");
    }

    #[test]
    fn tx_confirmed_from_either_open_or_observed() {
        for from in [OfferState::Open, OfferState::MempoolObserved] {
            let t = apply_offer_signal(from, OfferSignal::TxConfirmed).unwrap();
            assert_eq!(t.to_state, OfferState::TxBlockConfirmed);
            assert_eq!(t.reason, "take_confirmed_on_tx_block");
        }
    }

    #[test]
    fn refresh_cycle_returns_to_open() {
        let due = apply_offer_signal(OfferState::Open, OfferSignal::ExpiryNear).unwrap();
        assert_eq!(due.to_state, OfferState::RefreshDue);
        let reopened = apply_offer_signal(OfferState::RefreshDue, OfferSignal::RefreshPosted).unwrap();
        assert_eq!(reopened.to_state, OfferState::Open);
    }

    #[test]
    fn unmatched_pair_is_a_no_op() {
        assert!(apply_offer_signal(OfferState::Expired, OfferSignal::MempoolSeen).is_none());
        assert!(apply_offer_signal(OfferState::TxBlockConfirmed, OfferSignal::ExpiryNear).is_none());
    }

    #[test]
    fn status_mapping_matches_table() {
        assert_eq!(
            signal_for_venue_status(4, OfferState::Open),
            Some(OfferSignal::TxConfirmed)
        );
        assert_eq!(
            signal_for_venue_status(6, OfferState::Open),
            Some(OfferSignal::Expired)
        );
        assert_eq!(signal_for_venue_status(3, OfferState::Open), None);
        assert_eq!(
            signal_for_venue_status(1, OfferState::Open),
            Some(OfferSignal::MempoolSeen)
        );
        assert_eq!(signal_for_venue_status(1, OfferState::Expired), None);
    }
}
