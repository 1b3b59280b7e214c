//! `coin_id == SHA256(parent_id ++ puzzle_hash ++ amount)` (§8 invariant).
//! `amount` is hashed as its canonical CLVM atom encoding (minimal
//! big-endian, leading zero bytes stripped, a `0x00` prepended only when the
//! leading byte's high bit is set) rather than a fixed 8-byte width — that's
//! the encoding the rest of this daemon already leans on every time it signs
//! an AGG_SIG_ME message over `coin.coin_id()` (`src/spend/mod.rs`).

use chia_protocol::Coin;
use sha2::{Digest, Sha256};

fn clvm_atom_bytes(amount: u64) -> Vec<u8> {
    if amount == 0 {
        return Vec::new();
    }
    let mut bytes = amount.to_be_bytes().to_vec();
    while bytes.len() > 1 && bytes[0] == 0 {
        bytes.remove(0);
    }
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0);
    }
    bytes
}

fn expected_coin_id(parent: &[u8; 32], puzzle_hash: &[u8; 32], amount: u64) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(parent);
    hasher.update(puzzle_hash);
    hasher.update(clvm_atom_bytes(amount));
    hasher.finalize().into()
}

#[test]
fn coin_id_matches_sha256_of_parent_puzzle_amount() {
    let parent = [0x11u8; 32];
    let puzzle_hash = [0x22u8; 32];

    for amount in [0u64, 1, 255, 256, 0x7F_FF_FF_FF, 0x80_00_00_00, 123_456_789, u64::MAX] {
        let coin = Coin {
            parent_coin_info: parent.into(),
            puzzle_hash: puzzle_hash.into(),
            amount,
        };

        let id: [u8; 32] = coin.coin_id().into();
        assert_eq!(
            id,
            expected_coin_id(&parent, &puzzle_hash, amount),
            "coin_id mismatch for amount={amount}"
        );
    }
}

#[test]
fn coin_id_changes_with_any_field() {
    let base = Coin {
        parent_coin_info: [0x01u8; 32].into(),
        puzzle_hash: [0x02u8; 32].into(),
        amount: 1_000,
    };
    let different_parent = Coin {
        parent_coin_info: [0x09u8; 32].into(),
        ..base.clone()
    };
    let different_amount = Coin {
        amount: 1_001,
        ..base.clone()
    };

    let base_id: [u8; 32] = base.coin_id().into();
    let parent_id: [u8; 32] = different_parent.coin_id().into();
    let amount_id: [u8; 32] = different_amount.coin_id().into();

    assert_ne!(base_id, parent_id);
    assert_ne!(base_id, amount_id);
}
