//! End-to-end builder/signer test: load a real keyring file through
//! `KeyProvider::load`, derive the synthetic key a standard coin's puzzle
//! hash resolves to, and build+sign both a coin-op spend bundle (split/
//! combine path) and a maker's offer spend bundle (§4.6) against it.

use std::io::Write;

use chia_protocol::Coin;
use chia_puzzles::standard::standard_puzzle_hash;

use greenfloor::keys::KeyProvider;
use greenfloor::spend::{
    build_and_sign_offer_spend_bundle, build_and_sign_spend_bundle, spend_bundle_to_hex,
    NotarizedPayment, OfferPlan, SpendPlan,
};

const FINGERPRINT: u32 = 1;

/// A keyring with one entry whose master secret key is the scalar `1` —
/// trivially a valid, nonzero BLS12-381 scalar, so key derivation never
/// has to guess at what the library accepts.
fn write_test_keyring() -> tempfile::NamedTempFile {
    let mut key_hex = String::from("0").repeat(63);
    key_hex.push('1');
    let mut file = tempfile::NamedTempFile::new().expect("create temp keyring file");
    writeln!(
        file,
        "keys:\n  - fingerprint: {FINGERPRINT}\n    master_secret_key_hex: \"{key_hex}\""
    )
    .expect("write keyring yaml");
    file
}

fn coin(parent: u8, puzzle_hash: [u8; 32], amount: u64) -> Coin {
    Coin {
        parent_coin_info: [parent; 32].into(),
        puzzle_hash: puzzle_hash.into(),
        amount,
    }
}

#[test]
fn builds_and_signs_a_combine_spend_bundle() {
    let keyring = write_test_keyring();
    let mut provider = KeyProvider::load(keyring.path(), FINGERPRINT, 5).expect("load keyring");
    let synthetic = provider.derive_unhardened(0);
    let puzzle_hash = standard_puzzle_hash(&synthetic.public_key());

    let input_coins = vec![coin(1, puzzle_hash, 700), coin(2, puzzle_hash, 300)];
    let plan = SpendPlan {
        input_coins,
        outputs: vec![(puzzle_hash.to_vec(), 990)],
        fee: 10,
    };

    let bundle = build_and_sign_spend_bundle(&plan, &mut provider, "mainnet").expect("build spend bundle");
    assert_eq!(bundle.coin_spends.len(), 2);

    let hex = spend_bundle_to_hex(&bundle).expect("serialize spend bundle");
    assert!(!hex.is_empty());
    assert!(hex::decode(&hex).is_ok(), "spend bundle hex must decode cleanly");
}

#[test]
fn builds_and_signs_an_offer_spend_bundle() {
    let keyring = write_test_keyring();
    let mut provider = KeyProvider::load(keyring.path(), FINGERPRINT, 5).expect("load keyring");
    let synthetic = provider.derive_unhardened(0);
    let puzzle_hash = standard_puzzle_hash(&synthetic.public_key());

    let offer_coin = coin(3, puzzle_hash, 1_000);
    let plan = OfferPlan {
        input_coins: vec![offer_coin.clone()],
        offer_amount: 900,
        change_puzzle_hash: puzzle_hash.to_vec(),
        change_amount: 100,
        requested_payment: NotarizedPayment {
            nonce: offer_coin.coin_id().into(),
            payments: vec![(vec![0x09; 32], 12_345)],
        },
    };

    let bundle = build_and_sign_offer_spend_bundle(&plan, &mut provider, "mainnet").expect("build offer bundle");
    assert_eq!(bundle.coin_spends.len(), 1);
    assert_eq!(bundle.coin_spends[0].coin.amount, 1_000);
}

#[test]
fn unresolvable_puzzle_hash_fails_the_scan_instead_of_signing_wrong_coin() {
    let keyring = write_test_keyring();
    let mut provider = KeyProvider::load(keyring.path(), FINGERPRINT, 2).expect("load keyring");

    let unrelated_puzzle_hash = [0xAB; 32];
    let plan = SpendPlan {
        input_coins: vec![coin(4, unrelated_puzzle_hash, 500)],
        outputs: vec![(unrelated_puzzle_hash.to_vec(), 490)],
        fee: 10,
    };

    assert!(build_and_sign_spend_bundle(&plan, &mut provider, "mainnet").is_err());
}
