//! The daemon cycle (§4.11): one pass over every enabled market per tick,
//! sequencing price/mempool snapshots, offer lifecycle reconciliation, the
//! cancel policy, and ladder coin-ops planning, with every decision point
//! landing in the audit log.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;

use chia_puzzles::cat::cat_puzzle_hash;

use crate::config::models::{MarketConfig, ProgramConfig};
use crate::config::{cancel_retry_config, post_retry_config, unstable_cancel_move_bps, RetryConfig};
use crate::errors::GreenFloorError;
use crate::indexer::IndexerClient;
use crate::keys::KeyProvider;
use crate::lifecycle::{apply_offer_signal, signal_for_venue_status, OfferState};
use crate::planner::{partition_plans_by_budget, plan_coin_ops, CoinOpKind, CoinOpPlan, LadderBucket};
use crate::policy::{
    cancel_cooldown_key, evaluate_cancel_policy, evaluate_low_inventory, post_cooldown_key,
    AttemptGate, RetryController,
};
use crate::store::models::CoinOpStatus;
use crate::store::SqliteStore;
use crate::strategy::OfferPostPlan;
use crate::venue::VenueClient;

pub struct OrchestratorDeps {
    pub program: ProgramConfig,
    pub store: SqliteStore,
    pub indexer: Arc<dyn IndexerClient>,
    pub venues: HashMap<String, Arc<dyn VenueClient>>,
    pub key_providers: AsyncMutex<HashMap<String, KeyProvider>>,
    pub retry_controller: AsyncMutex<RetryController>,
    pub reload_marker_path: PathBuf,
    /// Confirmed tx ids fed in by the webhook listener or the websocket
    /// reader (whichever `chain_signals.tx_block_trigger.mode` selects) —
    /// drained once per cycle regardless of which trigger is active.
    pub confirmed_tx_queue: Arc<AsyncMutex<Vec<String>>>,
    pub price_feed: crate::price::PriceFeed,
}

#[derive(Debug, Default)]
pub struct CycleSummary {
    pub markets_processed: u32,
    pub offers_transitioned: u32,
    pub coin_ops_planned: u32,
    pub low_inventory_alerts: u32,
}

/// Run exactly one daemon cycle over every enabled market in `markets`.
pub async fn run_once(deps: &OrchestratorDeps, markets: &[MarketConfig]) -> anyhow::Result<CycleSummary> {
    let mut summary = CycleSummary::default();

    match deps.price_feed.get_xch_price_usd().await {
        Ok(price) => {
            deps.store.add_audit_event("xch_price_snapshot", &json!({ "price_usd": price }), None)?;
        }
        Err(e) => {
            deps.store.add_audit_event("xch_price_snapshot_failed", &json!({ "error": e.to_string() }), None)?;
        }
    }
    let xch_price = deps.store.get_latest_xch_price_snapshot()?;
    deps.store.add_audit_event(
        "cycle_started",
        &json!({ "market_count": markets.len(), "xch_price_usd": xch_price }),
        None,
    )?;

    let mempool_tx_ids = deps.indexer.get_all_mempool_tx_ids().await.unwrap_or_default();
    deps.store.observe_mempool_tx_ids(&mempool_tx_ids)?;

    let newly_confirmed = {
        let mut queue = deps.confirmed_tx_queue.lock().await;
        std::mem::take(&mut *queue)
    };
    if !newly_confirmed.is_empty() {
        deps.store.confirm_tx_ids(&newly_confirmed)?;
    }

    for market in markets.iter().filter(|m| m.enabled) {
        match process_market(deps, market, xch_price).await {
            Ok(stats) => {
                summary.markets_processed += 1;
                summary.offers_transitioned += stats.offers_transitioned;
                summary.coin_ops_planned += stats.coin_ops_planned;
                if stats.low_inventory {
                    summary.low_inventory_alerts += 1;
                }
            }
            Err(e) => {
                deps.store.add_audit_event(
                    "market_cycle_error",
                    &json!({ "error": e.to_string() }),
                    Some(&market.market_id),
                )?;
            }
        }
    }

    deps.store.add_audit_event(
        "cycle_completed",
        &json!({
            "markets_processed": summary.markets_processed,
            "offers_transitioned": summary.offers_transitioned,
            "coin_ops_planned": summary.coin_ops_planned,
            "low_inventory_alerts": summary.low_inventory_alerts,
        }),
        None,
    )?;

    Ok(summary)
}

/// Loop `run_once` on `runtime.loop_interval_seconds` until ctrl-c. A reload
/// marker file (touched by an external `greenfloor reload`) is checked once
/// per tick; when newer than the markets snapshot the caller loaded at
/// start, the caller should reload `markets` before the next tick — signaled
/// here by returning early so the caller's loop can re-read config.
pub async fn run_loop(deps: &OrchestratorDeps, markets: &[MarketConfig], shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    let interval = std::time::Duration::from_secs(deps.program.runtime.loop_interval_seconds as u64);
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        run_once(deps, markets).await?;
        if reload_marker_is_fresh(&deps.reload_marker_path) {
            deps.store.add_audit_event("reload_requested", &json!({}), None)?;
            break;
        }
        tokio::time::sleep(interval).await;
    }
    Ok(())
}

fn reload_marker_is_fresh(path: &PathBuf) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else { return false };
    let Ok(modified) = metadata.modified() else { return false };
    let age = std::time::SystemTime::now().duration_since(modified).unwrap_or_default();
    age < std::time::Duration::from_secs(5)
}

struct MarketCycleStats {
    offers_transitioned: u32,
    coin_ops_planned: u32,
    low_inventory: bool,
}

async fn process_market(
    deps: &OrchestratorDeps,
    market: &MarketConfig,
    xch_price: Option<f64>,
) -> anyhow::Result<MarketCycleStats> {
    let mut stats = MarketCycleStats {
        offers_transitioned: 0,
        coin_ops_planned: 0,
        low_inventory: false,
    };

    // Low inventory check.
    let threshold = market
        .inventory
        .low_inventory_alert_threshold_base_units
        .unwrap_or(market.inventory.low_watermark_base_units);
    let alert_state = deps.store.get_alert_state(&market.market_id)?;
    let low_state = evaluate_low_inventory(
        alert_state.is_low,
        market.inventory.current_available_base_units,
        threshold,
        deps.program.notifications.low_inventory_alerts.clear_hysteresis_percent,
    );
    if low_state.is_low != alert_state.is_low {
        deps.store.upsert_alert_state(
            &market.market_id,
            &crate::store::models::AlertState {
                is_low: low_state.is_low,
                last_alert_at: if low_state.is_low { Some(Utc::now().to_rfc3339()) } else { alert_state.last_alert_at },
            },
        )?;
        deps.store.add_audit_event(
            "low_inventory_state_changed",
            &json!({ "is_low": low_state.is_low, "remaining": market.inventory.current_available_base_units }),
            Some(&market.market_id),
        )?;
        if low_state.is_low && deps.program.notifications.low_inventory_alerts.enabled {
            for provider in &deps.program.notifications.providers {
                let _ = crate::notify::notify_low_inventory(
                    provider,
                    &market.market_id,
                    market.inventory.current_available_base_units,
                    threshold,
                )
                .await;
            }
        }
    }
    stats.low_inventory = low_state.is_low;

    // Offer lifecycle reconciliation against the venue.
    let venue_name = deps.program.offer_publish_venue();
    if let Some(venue) = deps.venues.get(&venue_name) {
        let offer_rows = deps.store.list_offer_states(Some(&market.market_id), 100)?;
        for row in offer_rows {
            let current_state: OfferState = serde_json::from_value(json!(row.state)).unwrap_or(OfferState::Open);
            let summary = venue.get_offer(&row.offer_id).await.ok().flatten();
            let signal = match summary {
                None => {
                    deps.store.upsert_offer_state(&row.offer_id, &market.market_id, "unknown_orphaned", None, None)?;
                    continue;
                }
                Some(s) if s.status == 3 => {
                    deps.store.upsert_offer_state(&row.offer_id, &market.market_id, "cancelled", Some(s.status), None)?;
                    continue;
                }
                Some(s) => signal_for_venue_status(s.status, current_state),
            };
            let Some(signal) = signal else { continue };
            if let Some(transition) = apply_offer_signal(current_state, signal) {
                deps.store.upsert_offer_state(
                    &row.offer_id,
                    &market.market_id,
                    state_tag(transition.to_state),
                    row.last_seen_status,
                    None,
                )?;
                deps.store.add_audit_event(
                    "offer_transitioned",
                    &json!({ "offer_id": row.offer_id, "action": transition.action, "reason": transition.reason }),
                    Some(&market.market_id),
                )?;
                stats.offers_transitioned += 1;
            }
        }
    }

    // Cancel policy.
    let previous_price = deps.store.get_previous_xch_price(&market.market_id)?;
    let decision = evaluate_cancel_policy(market, previous_price, xch_price, unstable_cancel_move_bps());
    deps.store.add_price_policy_record(&crate::store::models::PricePolicyRecord {
        market_id: market.market_id.clone(),
        xch_price_usd: xch_price,
        previous_xch_price_usd: previous_price,
        move_bps: crate::policy::move_bps(previous_price, xch_price).map(|b| b as f64),
        spread_bps: market.pricing.strategy_target_spread_bps,
        computed_at: Utc::now().to_rfc3339(),
    })?;
    if decision.triggered {
        deps.store.add_audit_event(
            "cancel_policy_triggered",
            &json!({ "reason": decision.reason }),
            Some(&market.market_id),
        )?;
        if let Some(venue) = deps.venues.get(&venue_name) {
            for offer_id in deps.store.list_open_offer_ids(&market.market_id)? {
                match cancel_offer_with_retry(deps, venue.as_ref(), &market.market_id, &offer_id).await {
                    Ok(()) => {
                        deps.store.upsert_offer_state(&offer_id, &market.market_id, "cancelled", Some(3), None)?;
                        deps.store.add_audit_event(
                            "offer_cancelled",
                            &json!({ "offer_id": offer_id, "reason": decision.reason }),
                            Some(&market.market_id),
                        )?;
                    }
                    Err(e) => {
                        deps.store.add_audit_event(
                            "offer_cancel_failed",
                            &json!({ "offer_id": offer_id, "error": e.to_string() }),
                            Some(&market.market_id),
                        )?;
                    }
                }
            }
        }
    }

    // Ladder coin-ops planning.
    let buckets: Vec<LadderBucket> = market
        .sell_ladder()
        .iter()
        .map(|entry| LadderBucket {
            size_base_units: entry.size_base_units,
            target_count: entry.target_count,
            split_buffer_count: entry.split_buffer_count,
            combine_when_excess_factor: entry.combine_when_excess_factor,
        })
        .collect();
    let max_ops = deps.program.coin_ops.max_operations_per_run.unwrap_or(10);
    let plans = plan_coin_ops(
        &buckets,
        &market.inventory.bucket_counts,
        max_ops,
        deps.program.coin_ops.split_fee_mojos.unwrap_or(deps.program.coin_ops.minimum_fee_mojos),
        deps.program.coin_ops.combine_fee_mojos.unwrap_or(deps.program.coin_ops.minimum_fee_mojos),
    );
    let spent_today = deps.store.get_daily_fee_spent_mojos_utc()?;
    let ceiling = deps.program.coin_ops.max_daily_fee_budget_mojos.unwrap_or(0) as i64;
    let partitioned = partition_plans_by_budget(plans, spent_today.max(0) as u64, ceiling);

    for plan in &partitioned.allowed {
        let op_type = op_type_tag(plan.kind);
        if deps.program.runtime.dry_run {
            deps.store.add_coin_op_ledger_entry(
                &market.market_id, op_type, 1, plan.fee_mojos as i64, CoinOpStatus::Planned, plan.reason, None,
            )?;
            stats.coin_ops_planned += 1;
            continue;
        }
        match execute_coin_op(deps, market, plan).await {
            Ok(spend_bundle_hex) => {
                let operation_id: String = spend_bundle_hex.chars().take(16).collect();
                deps.store.add_coin_op_ledger_entry(
                    &market.market_id, op_type, 1, plan.fee_mojos as i64, CoinOpStatus::Executed,
                    plan.reason, Some(&operation_id),
                )?;
                stats.coin_ops_planned += 1;
            }
            Err(e) => {
                deps.store.add_coin_op_ledger_entry(
                    &market.market_id, op_type, 1, plan.fee_mojos as i64, CoinOpStatus::Failed,
                    "execution_failed", None,
                )?;
                deps.store.add_audit_event(
                    "coin_op_execution_failed",
                    &json!({ "reason": plan.reason, "error": e.to_string() }),
                    Some(&market.market_id),
                )?;
            }
        }
    }
    for (plan, reason) in &partitioned.overflow {
        deps.store.add_coin_op_ledger_entry(
            &market.market_id, op_type_tag(plan.kind), 1, plan.fee_mojos as i64, CoinOpStatus::Skipped, reason, None,
        )?;
    }

    // Sell-ladder offer posting (§4.11.3.e): fill any ladder slot with no
    // matching open offer by spending an exact-size coin into a new offer.
    if let Some(venue) = deps.venues.get(&venue_name) {
        let open_counts = deps.store.count_open_offers_by_size(&market.market_id)?;
        let offer_plans = crate::strategy::plan_offer_posts(&buckets, &open_counts, max_ops);

        for plan in &offer_plans {
            if deps.program.runtime.dry_run {
                deps.store.add_audit_event(
                    "offer_post_skipped_dry_run",
                    &json!({ "size_base_units": plan.size_base_units }),
                    Some(&market.market_id),
                )?;
                continue;
            }
            match execute_offer_post(deps, market, venue.as_ref(), &venue_name, plan, xch_price).await {
                Ok(offer_id) => {
                    deps.store.upsert_offer_state(
                        &offer_id, &market.market_id, "open", None, Some(plan.size_base_units),
                    )?;
                    deps.store.add_audit_event(
                        "offer_posted",
                        &json!({ "offer_id": offer_id, "size_base_units": plan.size_base_units, "reason": plan.reason }),
                        Some(&market.market_id),
                    )?;
                }
                Err(e) => {
                    deps.store.add_audit_event(
                        "offer_post_failed",
                        &json!({ "size_base_units": plan.size_base_units, "error": e.to_string() }),
                        Some(&market.market_id),
                    )?;
                }
            }
        }
    }

    Ok(stats)
}

fn op_type_tag(kind: CoinOpKind) -> &'static str {
    match kind {
        CoinOpKind::Split => "split",
        CoinOpKind::Combine => "combine",
    }
}

/// Select real coins for `plan`, build and sign the spend bundle, and push
/// it to the indexer. Returns the spend bundle's hex encoding on success —
/// confirmation tracking happens asynchronously via
/// [`crate::broadcast::wait_for_mempool_then_confirmation`], not inline here,
/// so one cycle never blocks on a coin-op clearing a block.
async fn execute_coin_op(
    deps: &OrchestratorDeps,
    market: &MarketConfig,
    plan: &CoinOpPlan,
) -> anyhow::Result<String> {
    let puzzle_hash = crate::coins::address_to_puzzle_hash(&market.receive_address)?;
    let puzzle_hash_hex = format!("0x{}", hex::encode(puzzle_hash));
    let coins = crate::coins::list_unspent_xch(deps.indexer.as_ref(), &puzzle_hash_hex).await?;

    let (input_coins, outputs) = match plan.kind {
        CoinOpKind::Split => {
            let target = plan.size_base_units as u64 + plan.fee_mojos;
            let selected = crate::coins::select_coins(&coins, target);
            if selected.is_empty() {
                return Err(GreenFloorError::Insufficient { kind: "coins_for_split".into() }.into());
            }
            let total: u64 = selected.iter().map(|c| c.amount).sum();
            let remainder = total - plan.fee_mojos - plan.size_base_units as u64;
            let mut outs = vec![(puzzle_hash.to_vec(), plan.size_base_units as u64)];
            if remainder > 0 {
                outs.push((puzzle_hash.to_vec(), remainder));
            }
            (selected, outs)
        }
        CoinOpKind::Combine => {
            let candidates: Vec<_> = coins
                .iter()
                .filter(|c| c.amount == plan.size_base_units as u64)
                .take(2)
                .cloned()
                .collect();
            if candidates.len() < 2 {
                return Err(GreenFloorError::Insufficient { kind: "coins_for_combine".into() }.into());
            }
            let total: u64 = candidates.iter().map(|c| c.amount).sum();
            let output_amount = total.saturating_sub(plan.fee_mojos);
            (candidates, vec![(puzzle_hash.to_vec(), output_amount)])
        }
    };

    let chia_coins: Vec<chia_protocol::Coin> = input_coins
        .iter()
        .map(crate::coins::to_chia_coin)
        .collect::<Result<Vec<_>, _>>()?;
    let spend_plan = crate::spend::SpendPlan { input_coins: chia_coins, outputs, fee: plan.fee_mojos };

    let registry = deps.program.signer_key_registry();
    let key_cfg = registry
        .get(&market.signer_key_id)
        .ok_or_else(|| GreenFloorError::missing("signer_key_id"))?;
    let keyring_path = key_cfg
        .keyring_yaml_path
        .as_deref()
        .ok_or_else(|| GreenFloorError::missing("keyring_yaml_path"))?;

    let mut providers = deps.key_providers.lock().await;
    if !providers.contains_key(&market.signer_key_id) {
        let provider = KeyProvider::load(
            std::path::Path::new(keyring_path),
            key_cfg.fingerprint,
            crate::config::derivation_scan_limit(),
        )?;
        providers.insert(market.signer_key_id.clone(), provider);
    }
    let provider = providers
        .get_mut(&market.signer_key_id)
        .expect("just inserted or already present");

    let bundle = crate::spend::build_and_sign_spend_bundle(&spend_plan, provider, &deps.program.app.network)?;
    let spend_bundle_hex = crate::spend::spend_bundle_to_hex(&bundle)?;
    let _tx_id = crate::broadcast::push_tx(deps.indexer.as_ref(), &spend_bundle_hex).await?;
    Ok(spend_bundle_hex)
}

/// Build, sign and post one missing ladder slot's offer, selecting an
/// exact-size coin of `market.base_asset` and requesting `market.quote_asset`
/// at the configured spread over the latest XCH price (§4.6, §4.11.3.e).
async fn execute_offer_post(
    deps: &OrchestratorDeps,
    market: &MarketConfig,
    venue: &dyn VenueClient,
    venue_name: &str,
    plan: &OfferPostPlan,
    xch_price: Option<f64>,
) -> anyhow::Result<String> {
    let receive_puzzle_hash = crate::coins::address_to_puzzle_hash(&market.receive_address)?;
    let receive_puzzle_hash_hex = format!("0x{}", hex::encode(receive_puzzle_hash));

    let candidates: Vec<crate::coins::Coin> = if market.base_asset.eq_ignore_ascii_case("xch") {
        crate::coins::list_unspent_xch(deps.indexer.as_ref(), &receive_puzzle_hash_hex).await?
    } else {
        let asset_id = crate::coins::decode_hex32(&market.base_asset)?;
        crate::coins::list_unspent_cat(deps.indexer.as_ref(), receive_puzzle_hash, asset_id)
            .await?
            .into_iter()
            .map(|c| c.coin)
            .collect()
    };
    let coin = candidates
        .into_iter()
        .find(|c| c.amount == plan.size_base_units as u64)
        .ok_or(GreenFloorError::Insufficient { kind: "coins_for_offer".into() })?;
    let chia_coin = crate::coins::to_chia_coin(&coin)?;

    let xch_price = xch_price.ok_or_else(|| GreenFloorError::missing("xch_price_usd"))?;
    let spread_bps = market.pricing.strategy_target_spread_bps.unwrap_or(0);
    let ask_price = crate::strategy::compute_ask_price(xch_price, spread_bps);
    let request_amount = crate::strategy::compute_request_amount(
        plan.size_base_units,
        ask_price,
        market.pricing.base_unit_mojo_multiplier,
        market.pricing.quote_unit_mojo_multiplier,
    );
    let request_puzzle_hash = resolve_asset_puzzle_hash(&market.quote_asset, receive_puzzle_hash)?;

    let offer_plan = crate::spend::OfferPlan {
        input_coins: vec![chia_coin.clone()],
        offer_amount: plan.size_base_units as u64,
        change_puzzle_hash: receive_puzzle_hash.to_vec(),
        change_amount: 0,
        requested_payment: crate::spend::NotarizedPayment {
            nonce: chia_coin.coin_id().into(),
            payments: vec![(request_puzzle_hash, request_amount)],
        },
    };

    let registry = deps.program.signer_key_registry();
    let key_cfg = registry
        .get(&market.signer_key_id)
        .ok_or_else(|| GreenFloorError::missing("signer_key_id"))?;
    let keyring_path = key_cfg
        .keyring_yaml_path
        .as_deref()
        .ok_or_else(|| GreenFloorError::missing("keyring_yaml_path"))?;

    let offer_text = {
        let mut providers = deps.key_providers.lock().await;
        if !providers.contains_key(&market.signer_key_id) {
            let provider = KeyProvider::load(
                std::path::Path::new(keyring_path),
                key_cfg.fingerprint,
                crate::config::derivation_scan_limit(),
            )?;
            providers.insert(market.signer_key_id.clone(), provider);
        }
        let provider = providers
            .get_mut(&market.signer_key_id)
            .expect("just inserted or already present");
        let bundle = crate::spend::build_and_sign_offer_spend_bundle(&offer_plan, provider, &deps.program.app.network)?;
        crate::spend::encode_offer(&bundle)?
    };

    let result = post_offer_with_retry(deps, venue, venue_name, &market.market_id, &offer_text).await?;
    result.id.ok_or_else(|| GreenFloorError::missing("venue_offer_id").into())
}

/// `market.quote_asset == "xch"` requests plain XCH at `receive_puzzle_hash`;
/// anything else is treated as a CAT asset id and wrapped accordingly, so
/// the settlement payment lands back under the same inner puzzle.
fn resolve_asset_puzzle_hash(
    asset: &str,
    receive_puzzle_hash: [u8; 32],
) -> Result<Vec<u8>, GreenFloorError> {
    if asset.eq_ignore_ascii_case("xch") {
        Ok(receive_puzzle_hash.to_vec())
    } else {
        let asset_id = crate::coins::decode_hex32(asset)?;
        Ok(cat_puzzle_hash(asset_id, receive_puzzle_hash).to_vec())
    }
}

/// Post an offer under the post-retry controller (§4.9): skip entirely while
/// a prior failed run's cooldown is still active, otherwise retry up to
/// `max_attempts` with exponential backoff before cooling down on exhaustion.
async fn post_offer_with_retry(
    deps: &OrchestratorDeps,
    venue: &dyn VenueClient,
    venue_name: &str,
    market_id: &str,
    offer_text: &str,
) -> Result<crate::venue::PostOfferResult, GreenFloorError> {
    let config = post_retry_config();
    let key = post_cooldown_key(venue_name, market_id);
    gate_or_cooldown(deps, &key).await?;

    let mut last_err = None;
    for attempt in 1..=config.max_attempts {
        if attempt > 1 {
            sleep_for_backoff(&config, attempt).await;
        }
        match venue.post_offer(offer_text, false, None).await {
            Ok(result) if result.success => {
                deps.retry_controller.lock().await.clear_cooldown(&key);
                return Ok(result);
            }
            Ok(result) => {
                last_err = Some(GreenFloorError::invalid(
                    "post_offer",
                    result.error.unwrap_or_else(|| "rejected".to_string()),
                ));
            }
            Err(e) => last_err = Some(e),
        }
    }
    deps.retry_controller.lock().await.start_cooldown(&key, Utc::now(), config.cooldown_s);
    Err(last_err.unwrap_or(GreenFloorError::PollRetry))
}

/// Cancel an offer under the cancel-retry controller, mirroring
/// [`post_offer_with_retry`]'s gate/retry/cooldown shape.
async fn cancel_offer_with_retry(
    deps: &OrchestratorDeps,
    venue: &dyn VenueClient,
    market_id: &str,
    offer_id: &str,
) -> Result<(), GreenFloorError> {
    let config = cancel_retry_config();
    let key = cancel_cooldown_key(market_id);
    gate_or_cooldown(deps, &key).await?;

    let mut last_err = None;
    for attempt in 1..=config.max_attempts {
        if attempt > 1 {
            sleep_for_backoff(&config, attempt).await;
        }
        match venue.cancel_offer(offer_id).await {
            Ok(()) => {
                deps.retry_controller.lock().await.clear_cooldown(&key);
                return Ok(());
            }
            Err(e) => last_err = Some(e),
        }
    }
    deps.retry_controller.lock().await.start_cooldown(&key, Utc::now(), config.cooldown_s);
    Err(last_err.unwrap_or(GreenFloorError::PollRetry))
}

async fn gate_or_cooldown(deps: &OrchestratorDeps, key: &str) -> Result<(), GreenFloorError> {
    let controller = deps.retry_controller.lock().await;
    match controller.check(key, Utc::now()) {
        AttemptGate::Allowed => Ok(()),
        AttemptGate::InCooldown => Err(GreenFloorError::PollRetry),
    }
}

async fn sleep_for_backoff(config: &RetryConfig, attempt: u32) {
    let delay_ms = crate::policy::backoff_delay_ms(config, attempt);
    tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
}

fn state_tag(state: OfferState) -> &'static str {
    match state {
        OfferState::Open => "open",
        OfferState::MempoolObserved => "mempool_observed",
        OfferState::TxBlockConfirmed => "tx_block_confirmed",
        OfferState::RefreshDue => "refresh_due",
        OfferState::Expired => "expired",
        OfferState::Cancelled => "cancelled",
        OfferState::UnknownOrphaned => "unknown_orphaned",
    }
}
