//! Spend bundle construction & signing (§4.6) — coin selection, delegated
//! spend conditions, per-target AGG_SIG message construction, and BLS
//! aggregation. This is the one place the daemon touches private key
//! material.

pub mod aggsig;

use chia_bls::{sign, PublicKey, Signature};
use chia_protocol::{Coin, CoinSpend, SpendBundle};
use chia_puzzles::offer::SETTLEMENT_PAYMENTS_PUZZLE_HASH;
use chia_puzzles::standard::{STANDARD_PUZZLE, STANDARD_PUZZLE_HASH};
use clvm_traits::ToClvm;
use clvm_utils::{tree_hash, CurriedProgram};
use clvmr::allocator::Allocator;
use clvmr::chia_dialect::ChiaDialect;
use clvmr::reduction::Reduction;
use clvmr::serde::{node_from_bytes, node_to_bytes};
use sha2::{Digest, Sha256};

use crate::errors::GreenFloorError;
use crate::keys::KeyProvider;
use aggsig::AggSigKind;

/// The dollar-amount movements a coin-op or offer-post plan asks a spend
/// bundle to realize: consume `input_coins`, mint `outputs`, pay `fee`.
#[derive(Debug, Clone)]
pub struct SpendPlan {
    pub input_coins: Vec<Coin>,
    pub outputs: Vec<(Vec<u8>, u64)>,
    pub fee: u64,
}

const COMBINE_ANNOUNCEMENT: &[u8] = b"greenfloor-combine";

/// Build, sign and hex-serialize a spend bundle for `plan`.
///
/// Per coin: resolve its synthetic signing key from `key_provider` (failing
/// with [`GreenFloorError::DerivationScanFailed`] if the puzzle hash isn't
/// reachable within the scan window), curry the standard puzzle, build the
/// delegated-conditions solution, run it through CLVM to recover the exact
/// AGG_SIG targets the puzzle emits, and sign each with the network's
/// AGG_SIG domain rules (§4.6) before aggregating into one signature.
pub fn build_and_sign_spend_bundle(
    plan: &SpendPlan,
    key_provider: &mut KeyProvider,
    network: &str,
) -> Result<SpendBundle, GreenFloorError> {
    if plan.input_coins.is_empty() {
        return Err(GreenFloorError::missing("spend_plan_input_coins"));
    }

    let primary = plan.input_coins[0].clone();
    let secondaries = &plan.input_coins[1..];

    let mut coin_spends = Vec::with_capacity(plan.input_coins.len());
    let mut signatures = Vec::new();

    let primary_conditions = build_primary_conditions(plan, !secondaries.is_empty());
    let (spend, sigs) = spend_one_coin(&primary, &primary_conditions, key_provider, network)?;
    coin_spends.push(spend);
    signatures.extend(sigs);

    for coin in secondaries {
        let conditions = vec![Condition::AssertCoinAnnouncement {
            announcement_id: coin_announcement_id(&primary, COMBINE_ANNOUNCEMENT),
        }];
        let (spend, sigs) = spend_one_coin(coin, &conditions, key_provider, network)?;
        coin_spends.push(spend);
        signatures.extend(sigs);
    }

    let aggregated_signature = aggsig::aggregate(&signatures);
    Ok(SpendBundle {
        coin_spends,
        aggregated_signature,
    })
}

pub fn spend_bundle_to_hex(bundle: &SpendBundle) -> Result<String, GreenFloorError> {
    use chia_protocol::Streamable;
    bundle
        .to_bytes()
        .map(hex::encode)
        .map_err(|e| GreenFloorError::SpendBundleDecodeError(e.to_string()))
}

/// The requested side of an offer: `(nonce, [(puzzle_hash, amount)])`, per
/// the offer codec's notarized-payment contract (§4.6). `nonce` binds this
/// payment to exactly one offered-side settlement coin so a taker can't
/// satisfy it by paying into someone else's offer.
#[derive(Debug, Clone)]
pub struct NotarizedPayment {
    pub nonce: [u8; 32],
    pub payments: Vec<(Vec<u8>, u64)>,
}

/// Coins offered into a standing sell offer, byte-in byte-out: the builder
/// spends `input_coins` worth `offer_amount` of the offered asset into the
/// settlement puzzle and leaves the requested side as an unresolved
/// `ASSERT_PUZZLE_ANNOUNCEMENT`, to be completed later by whichever taker
/// fills it. The resulting bundle is intentionally invalid on its own.
#[derive(Debug, Clone)]
pub struct OfferPlan {
    pub input_coins: Vec<Coin>,
    pub offer_amount: u64,
    pub change_puzzle_hash: Vec<u8>,
    pub change_amount: u64,
    pub requested_payment: NotarizedPayment,
}

/// Build and sign the maker's side of an offer (§4.6 `offer` plan).
///
/// The primary coin's conditions move `offer_amount` into the settlement
/// puzzle and assert a puzzle announcement matching the hash of
/// `requested_payment` — the same announcement a taker's settlement spend
/// emits when they complete the trade by paying the requested asset. No
/// spend of the settlement coin itself is included; that's the taker's job.
pub fn build_and_sign_offer_spend_bundle(
    plan: &OfferPlan,
    key_provider: &mut KeyProvider,
    network: &str,
) -> Result<SpendBundle, GreenFloorError> {
    if plan.input_coins.is_empty() {
        return Err(GreenFloorError::missing("offer_plan_input_coins"));
    }

    let primary = plan.input_coins[0].clone();
    let secondaries = &plan.input_coins[1..];

    let message = notarized_payment_message(&plan.requested_payment)?;
    let announcement_id = puzzle_announcement_id(&SETTLEMENT_PAYMENTS_PUZZLE_HASH, &message);

    let mut primary_conditions = vec![Condition::CreateCoin {
        puzzle_hash: SETTLEMENT_PAYMENTS_PUZZLE_HASH.to_vec(),
        amount: plan.offer_amount,
    }];
    if plan.change_amount > 0 {
        primary_conditions.push(Condition::CreateCoin {
            puzzle_hash: plan.change_puzzle_hash.clone(),
            amount: plan.change_amount,
        });
    }
    primary_conditions.push(Condition::AssertPuzzleAnnouncement { announcement_id });
    if !secondaries.is_empty() {
        primary_conditions.push(Condition::CreateCoinAnnouncement {
            message: COMBINE_ANNOUNCEMENT.to_vec(),
        });
    }

    let (spend, sigs) = spend_one_coin(&primary, &primary_conditions, key_provider, network)?;
    let mut coin_spends = vec![spend];
    let mut signatures = sigs;

    for coin in secondaries {
        let conditions = vec![Condition::AssertCoinAnnouncement {
            announcement_id: coin_announcement_id(&primary, COMBINE_ANNOUNCEMENT),
        }];
        let (spend, sigs) = spend_one_coin(coin, &conditions, key_provider, network)?;
        coin_spends.push(spend);
        signatures.extend(sigs);
    }

    let aggregated_signature = aggsig::aggregate(&signatures);
    Ok(SpendBundle {
        coin_spends,
        aggregated_signature,
    })
}

/// `SHA256` tree hash of the CLVM structure `(nonce ((puzzle_hash amount) ...))`
/// — the message the settlement puzzle signs its `CREATE_PUZZLE_ANNOUNCEMENT`
/// with, and so the message the offering side must assert.
fn notarized_payment_message(payment: &NotarizedPayment) -> Result<[u8; 32], GreenFloorError> {
    let mut allocator = Allocator::new();
    let payments: Vec<(Vec<u8>, (u64, ()))> = payment
        .payments
        .iter()
        .map(|(puzzle_hash, amount)| (puzzle_hash.clone(), (*amount, ())))
        .collect();
    let structure = (payment.nonce.to_vec(), (payments, ()));
    let ptr = structure
        .to_clvm(&mut allocator)
        .map_err(|e| GreenFloorError::invalid("notarized_payment", e.to_string()))?;
    Ok(tree_hash(&allocator, ptr).into())
}

fn puzzle_announcement_id(puzzle_hash: &[u8], message: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(puzzle_hash);
    hasher.update(message);
    hasher.finalize().into()
}

/// Bech32m-encode a completed (or, for the maker's half, intentionally
/// incomplete) spend bundle into offer text a venue will accept.
pub fn encode_offer(bundle: &SpendBundle) -> Result<String, GreenFloorError> {
    chia_wallet_sdk::encode_offer(bundle.clone())
        .map_err(|e| GreenFloorError::invalid("offer_encode", e.to_string()))
}

fn build_primary_conditions(plan: &SpendPlan, needs_announcement: bool) -> Vec<Condition> {
    let mut conditions: Vec<Condition> = plan
        .outputs
        .iter()
        .map(|(puzzle_hash, amount)| Condition::CreateCoin {
            puzzle_hash: puzzle_hash.clone(),
            amount: *amount,
        })
        .collect();
    if plan.fee > 0 {
        conditions.push(Condition::ReserveFee { amount: plan.fee });
    }
    if needs_announcement {
        conditions.push(Condition::CreateCoinAnnouncement {
            message: COMBINE_ANNOUNCEMENT.to_vec(),
        });
    }
    conditions
}

#[derive(Debug, Clone)]
enum Condition {
    CreateCoin { puzzle_hash: Vec<u8>, amount: u64 },
    ReserveFee { amount: u64 },
    CreateCoinAnnouncement { message: Vec<u8> },
    AssertCoinAnnouncement { announcement_id: [u8; 32] },
    AssertPuzzleAnnouncement { announcement_id: [u8; 32] },
}

fn coin_announcement_id(coin: &Coin, message: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(coin.coin_id());
    hasher.update(message);
    hasher.finalize().into()
}

/// Curry the standard puzzle for `public_key`, build the delegated-puzzle
/// solution encoding `conditions`, run it, sign every AGG_SIG condition the
/// run emits, and return the resulting `CoinSpend` plus its signatures.
fn spend_one_coin(
    coin: &Coin,
    conditions: &[Condition],
    key_provider: &mut KeyProvider,
    network: &str,
) -> Result<(CoinSpend, Vec<Signature>), GreenFloorError> {
    let target_puzzle_hash: [u8; 32] = coin
        .puzzle_hash
        .to_bytes()
        .try_into()
        .map_err(|_| GreenFloorError::invalid("coin_puzzle_hash", "wrong_length"))?;
    let key = key_provider
        .synthetic_for_puzzle_hash(target_puzzle_hash)
        .ok_or(GreenFloorError::DerivationScanFailed)?;

    let mut allocator = Allocator::new();
    let puzzle_reveal = curry_standard_puzzle(&mut allocator, &key.public_key())?;
    let solution = build_standard_solution(&mut allocator, conditions)?;

    let dialect = ChiaDialect::new(0);
    let puzzle_ptr = node_from_bytes(&mut allocator, &puzzle_reveal)
        .map_err(|e| GreenFloorError::invalid("puzzle_reveal", e.to_string()))?;
    let solution_ptr = node_from_bytes(&mut allocator, &solution)
        .map_err(|e| GreenFloorError::invalid("solution", e.to_string()))?;
    let Reduction(_cost, output) =
        clvmr::run_program(&mut allocator, &dialect, puzzle_ptr, solution_ptr, 11_000_000_000)
            .map_err(|e| GreenFloorError::invalid("puzzle_run", e.to_string()))?;

    let targets = extract_agg_sig_targets(&allocator, output)?;
    let mut signatures = Vec::with_capacity(targets.len());
    for target in &targets {
        if target.public_key != key.public_key() {
            return Err(GreenFloorError::MissingPrivateKeyForAggSigTarget);
        }
        let message = aggsig::build_message(target.kind, &target.message, coin.coin_id().into(), network);
        signatures.push(sign(&key.secret_key, &message));
    }

    let coin_spend = CoinSpend {
        coin: coin.clone(),
        puzzle_reveal: puzzle_reveal.into(),
        solution: solution.into(),
    };
    Ok((coin_spend, signatures))
}

fn curry_standard_puzzle(
    allocator: &mut Allocator,
    public_key: &PublicKey,
) -> Result<Vec<u8>, GreenFloorError> {
    let mod_ptr = node_from_bytes(allocator, &STANDARD_PUZZLE)
        .map_err(|e| GreenFloorError::invalid("standard_puzzle_mod", e.to_string()))?;
    let curried = CurriedProgram {
        program: mod_ptr,
        args: (public_key.clone(),),
    };
    let ptr = curried
        .to_clvm(allocator)
        .map_err(|e| GreenFloorError::invalid("curry", e.to_string()))?;
    node_to_bytes(allocator, ptr).map_err(|e| GreenFloorError::invalid("curry_serialize", e.to_string()))
}

/// Standard puzzle solution shape: `(original_public_key delegated_puzzle
/// delegated_solution)`, with no hidden puzzle path, so
/// `original_public_key = ()`, `delegated_puzzle = (q . conditions)`, and
/// `delegated_solution = ()`.
fn build_standard_solution(
    allocator: &mut Allocator,
    conditions: &[Condition],
) -> Result<Vec<u8>, GreenFloorError> {
    let condition_ptrs: Result<Vec<_>, GreenFloorError> = conditions
        .iter()
        .map(|c| condition_to_clvm(allocator, c))
        .collect();
    let condition_ptrs = condition_ptrs?;
    let conditions_list = condition_ptrs
        .to_clvm(allocator)
        .map_err(|e| GreenFloorError::invalid("conditions", e.to_string()))?;
    let quoted_conditions = (1u8, clvmr::allocator::NodePtr::from(conditions_list))
        .to_clvm(allocator)
        .map_err(|e| GreenFloorError::invalid("quote_conditions", e.to_string()))?;
    let solution = (
        (),
        (quoted_conditions, ((), ())),
    )
        .to_clvm(allocator)
        .map_err(|e| GreenFloorError::invalid("solution", e.to_string()))?;
    node_to_bytes(allocator, solution).map_err(|e| GreenFloorError::invalid("solution_serialize", e.to_string()))
}

fn condition_to_clvm(
    allocator: &mut Allocator,
    condition: &Condition,
) -> Result<clvmr::allocator::NodePtr, GreenFloorError> {
    let ptr = match condition {
        Condition::CreateCoin { puzzle_hash, amount } => (51u8, (puzzle_hash.clone(), (*amount, ())))
            .to_clvm(allocator),
        Condition::ReserveFee { amount } => (52u8, (*amount, ())).to_clvm(allocator),
        Condition::CreateCoinAnnouncement { message } => {
            (60u8, (message.clone(), ())).to_clvm(allocator)
        }
        Condition::AssertCoinAnnouncement { announcement_id } => {
            (61u8, (announcement_id.to_vec(), ())).to_clvm(allocator)
        }
        Condition::AssertPuzzleAnnouncement { announcement_id } => {
            (63u8, (announcement_id.to_vec(), ())).to_clvm(allocator)
        }
    };
    ptr.map_err(|e| GreenFloorError::invalid("condition_encode", e.to_string()))
}

struct ExtractedAggSig {
    public_key: PublicKey,
    message: Vec<u8>,
    kind: AggSigKind,
}

/// Walk the executed condition list and pull out every AGG_SIG_* opcode's
/// `(pubkey, msg)` pair, independent of which puzzle produced them.
fn extract_agg_sig_targets(
    allocator: &Allocator,
    conditions_root: clvmr::allocator::NodePtr,
) -> Result<Vec<ExtractedAggSig>, GreenFloorError> {
    let mut targets = Vec::new();
    for condition_ptr in clvmr::allocator::SExp::list_iter(allocator, conditions_root) {
        let items: Vec<clvmr::allocator::NodePtr> =
            clvmr::allocator::SExp::list_iter(allocator, condition_ptr).collect();
        if items.len() < 3 {
            continue;
        }
        let opcode = match allocator.sexp(items[0]) {
            clvmr::allocator::SExp::Atom => allocator.atom(items[0]).as_ref().first().copied(),
            _ => None,
        };
        let Some(opcode) = opcode else { continue };
        let Some(kind) = kind_for_opcode(opcode) else { continue };
        let pubkey_bytes = allocator.atom(items[1]);
        let msg_bytes = allocator.atom(items[2]);
        let public_key = <&[u8; 48]>::try_from(pubkey_bytes.as_ref())
            .ok()
            .and_then(|b| PublicKey::from_bytes(b).ok())
            .ok_or_else(|| GreenFloorError::invalid("agg_sig_condition", "bad_public_key"))?;
        targets.push(ExtractedAggSig {
            public_key,
            message: msg_bytes.as_ref().to_vec(),
            kind,
        });
    }
    Ok(targets)
}

fn kind_for_opcode(opcode: u8) -> Option<AggSigKind> {
    match opcode {
        43 => Some(AggSigKind::Parent),
        44 => Some(AggSigKind::Puzzle),
        45 => Some(AggSigKind::Amount),
        46 => Some(AggSigKind::PuzzleAmount),
        47 => Some(AggSigKind::ParentAmount),
        48 => Some(AggSigKind::ParentPuzzle),
        49 => Some(AggSigKind::Unsafe),
        50 => Some(AggSigKind::Me),
        _ => None,
    }
}

/// The standard puzzle hash for an uncurried mod — exposed for callers that
/// want to sanity-check a coin's puzzle hash shape before scanning for it.
pub fn standard_puzzle_mod_hash() -> [u8; 32] {
    STANDARD_PUZZLE_HASH
}
