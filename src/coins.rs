use std::collections::HashMap;

use chia_puzzles::cat::cat_puzzle_hash;
use chia_wallet_sdk::Address;
use clvm_traits::ToClvm;
use clvmr::allocator::{Allocator, SExp};
use clvmr::chia_dialect::ChiaDialect;
use clvmr::reduction::Reduction;
use clvmr::serde::node_from_bytes;

use crate::errors::GreenFloorError;
use crate::indexer::{CoinRecord, IndexerClient};

#[derive(Debug, Clone)]
pub struct Coin {
    pub parent_coin_info: String,
    pub puzzle_hash: String,
    pub amount: u64,
}

/// States the source's wallet abstraction treats as spendable. Adopted
/// verbatim per the grounding spec's open-question resolution — see
/// DESIGN.md.
pub const SPENDABLE_STATES: [&str; 5] = ["CONFIRMED", "UNSPENT", "SPENDABLE", "AVAILABLE", "SETTLED"];

/// List unspent XCH coins owned by `address`'s puzzle-hash.
pub async fn list_unspent_xch(
    indexer: &dyn IndexerClient,
    puzzle_hash: &str,
) -> Result<Vec<Coin>, GreenFloorError> {
    let records = indexer.list_coin_records_by_puzzle_hash(puzzle_hash, false).await?;
    Ok(records
        .into_iter()
        .filter(|r| r.spent_block_index == 0)
        .map(coin_from_record)
        .collect())
}

/// Decode a bech32m-encoded receive address into its raw puzzle hash.
pub fn address_to_puzzle_hash(address: &str) -> Result<[u8; 32], GreenFloorError> {
    let decoded = Address::decode(address)
        .map_err(|_| GreenFloorError::invalid("receive_address", "bech32m_decode_failed"))?;
    decoded
        .puzzle_hash
        .to_bytes()
        .try_into()
        .map_err(|_| GreenFloorError::invalid("receive_address", "wrong_length"))
}

/// Parse a coin's hex-encoded wire fields into a `chia_protocol::Coin` ready
/// for the spend bundle builder.
pub fn to_chia_coin(coin: &Coin) -> Result<chia_protocol::Coin, GreenFloorError> {
    Ok(chia_protocol::Coin {
        parent_coin_info: decode_hex32(&coin.parent_coin_info)?.into(),
        puzzle_hash: decode_hex32(&coin.puzzle_hash)?.into(),
        amount: coin.amount,
    })
}

pub fn decode_hex32(s: &str) -> Result<[u8; 32], GreenFloorError> {
    let bytes = hex::decode(s.trim_start_matches("0x"))
        .map_err(|_| GreenFloorError::invalid("coin_field", "bad_hex"))?;
    bytes
        .try_into()
        .map_err(|_| GreenFloorError::invalid("coin_field", "wrong_length"))
}

fn coin_from_record(record: CoinRecord) -> Coin {
    Coin {
        parent_coin_info: record.coin.parent_coin_info,
        puzzle_hash: record.coin.puzzle_hash,
        amount: record.coin.amount,
    }
}

/// Smallest-first, greedy selection: sort ascending by amount and accumulate
/// until the running sum first reaches `target_amount`. Empty if insufficient.
pub fn select_coins(coins: &[Coin], target_amount: u64) -> Vec<Coin> {
    let mut sorted: Vec<&Coin> = coins.iter().collect();
    sorted.sort_by_key(|c| c.amount);

    let mut selected = Vec::new();
    let mut total = 0u64;
    for coin in sorted {
        if total >= target_amount {
            break;
        }
        selected.push(coin.clone());
        total += coin.amount;
    }
    if total < target_amount {
        return Vec::new();
    }
    selected
}

/// A CAT's identity: the asset it's wrapping and the inner (owner) puzzle
/// hash underneath the CAT layer. Both are already known to the caller —
/// the query puzzle hash is derived from them — so provenance verification
/// below is a defensive check against puzzle-hash collisions, not discovery.
#[derive(Debug, Clone, Copy)]
pub struct CatInfo {
    pub asset_id: [u8; 32],
    pub p2_puzzle_hash: [u8; 32],
}

#[derive(Debug, Clone)]
pub struct CatCoin {
    pub coin: Coin,
    pub info: CatInfo,
}

/// List unspent CAT coins for `asset_id` owned by `inner_puzzle_hash`.
///
/// The CAT puzzle hash already binds both the asset id and the inner puzzle
/// hash, so querying by it is sufficient to find the right coins; each
/// candidate is still walked back to its parent's spend (§4.5) to confirm
/// the parent actually created it via `CREATE_COIN`, guarding against a
/// same-puzzle-hash coincidence from an unrelated coin.
pub async fn list_unspent_cat(
    indexer: &dyn IndexerClient,
    inner_puzzle_hash: [u8; 32],
    asset_id: [u8; 32],
) -> Result<Vec<CatCoin>, GreenFloorError> {
    let info = CatInfo { asset_id, p2_puzzle_hash: inner_puzzle_hash };
    let puzzle_hash = cat_puzzle_hash(asset_id, inner_puzzle_hash);
    let puzzle_hash_hex = hex::encode(puzzle_hash);

    let records = indexer
        .list_coin_records_by_puzzle_hash(&puzzle_hash_hex, false)
        .await?;

    let mut coins = Vec::with_capacity(records.len());
    for record in records {
        if record.spent_block_index != 0 {
            continue;
        }
        let coin = coin_from_record(record);
        if verify_cat_provenance(indexer, &coin).await? {
            coins.push(CatCoin { coin, info });
        }
    }
    Ok(coins)
}

/// Fetch the candidate's parent coin record, confirm it was spent, replay
/// its puzzle reveal + solution at the spend height, and look for a
/// `CREATE_COIN` condition matching the candidate's `(puzzle_hash, amount)`.
async fn verify_cat_provenance(
    indexer: &dyn IndexerClient,
    candidate: &Coin,
) -> Result<bool, GreenFloorError> {
    let parent_id = &candidate.parent_coin_info;
    let Some(parent_record) = indexer.get_coin_record_by_name(parent_id).await? else {
        return Ok(false);
    };
    if parent_record.spent_block_index == 0 {
        return Ok(false);
    }

    let Some(solution) = indexer
        .get_puzzle_and_solution(parent_id, Some(parent_record.spent_block_index))
        .await?
    else {
        return Ok(false);
    };

    let puzzle_reveal = match hex::decode(solution.puzzle_reveal.trim_start_matches("0x")) {
        Ok(b) => b,
        Err(_) => return Ok(false),
    };
    let solution_bytes = match hex::decode(solution.solution.trim_start_matches("0x")) {
        Ok(b) => b,
        Err(_) => return Ok(false),
    };

    let target_puzzle_hash = match decode_hex32(&candidate.puzzle_hash) {
        Ok(h) => h,
        Err(_) => return Ok(false),
    };

    Ok(parent_created_matching_coin(
        &puzzle_reveal,
        &solution_bytes,
        &target_puzzle_hash,
        candidate.amount,
    ))
}

/// Run the parent's puzzle against its solution and scan the resulting
/// condition list for `CREATE_COIN(target_puzzle_hash, amount)` (opcode 51).
fn parent_created_matching_coin(
    puzzle_reveal: &[u8],
    solution: &[u8],
    target_puzzle_hash: &[u8; 32],
    amount: u64,
) -> bool {
    let mut allocator = Allocator::new();
    let Ok(puzzle_ptr) = node_from_bytes(&mut allocator, puzzle_reveal) else {
        return false;
    };
    let Ok(solution_ptr) = node_from_bytes(&mut allocator, solution) else {
        return false;
    };
    let dialect = ChiaDialect::new(0);
    let Ok(Reduction(_cost, output)) =
        clvmr::run_program(&mut allocator, &dialect, puzzle_ptr, solution_ptr, 11_000_000_000)
    else {
        return false;
    };

    for condition_ptr in SExp::list_iter(&allocator, output) {
        let items: Vec<_> = SExp::list_iter(&allocator, condition_ptr).collect();
        if items.len() < 3 {
            continue;
        }
        let opcode = match allocator.sexp(items[0]) {
            SExp::Atom => allocator.atom(items[0]).as_ref().first().copied(),
            _ => None,
        };
        if opcode != Some(51) {
            continue;
        }
        let puzzle_hash_bytes = allocator.atom(items[1]).as_ref().to_vec();
        let amount_bytes = allocator.atom(items[2]).as_ref().to_vec();
        let Ok(expected_ptr) = amount.to_clvm(&mut allocator) else {
            continue;
        };
        let expected_bytes = allocator.atom(expected_ptr).as_ref().to_vec();
        if puzzle_hash_bytes == target_puzzle_hash.as_slice() && amount_bytes == expected_bytes {
            return true;
        }
    }
    false
}

/// Exact-match bucket counting: a coin of amount `a` contributes to `size`
/// iff `a == size`. Sizes not present in `ladder_sizes` are ignored.
pub fn compute_bucket_counts_from_coins(
    coin_amounts_base_units: &[u64],
    ladder_sizes: &[i64],
) -> HashMap<i64, i64> {
    let mut counts: HashMap<i64, i64> = ladder_sizes.iter().map(|s| (*s, 0)).collect();
    for amount in coin_amounts_base_units {
        let amount = *amount as i64;
        if let Some(count) = counts.get_mut(&amount) {
            *count += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_coins_is_smallest_first_greedy() {
        let coins = vec![
            Coin { parent_coin_info: "p1".into(), puzzle_hash: "h".into(), amount: 10 },
            Coin { parent_coin_info: "p2".into(), puzzle_hash: "h".into(), amount: 3 },
            Coin { parent_coin_info: "p3".into(), puzzle_hash: "h".into(), amount: 4 },
        ];
        let selected = select_coins(&coins, 6);
        let total: u64 = selected.iter().map(|c| c.amount).sum();
        assert!(total >= 6);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].amount, 3);
        assert_eq!(selected[1].amount, 4);
    }

    #[test]
    fn select_coins_returns_empty_when_insufficient() {
        let coins = vec![Coin { parent_coin_info: "p1".into(), puzzle_hash: "h".into(), amount: 1 }];
        assert!(select_coins(&coins, 100).is_empty());
    }

    #[test]
    fn bucket_counts_use_exact_match() {
        let counts = compute_bucket_counts_from_coins(&[1, 1, 10, 11, 100], &[1, 10, 100]);
        assert_eq!(counts[&1], 2);
        assert_eq!(counts[&10], 1);
        assert_eq!(counts[&100], 1);
    }
}
