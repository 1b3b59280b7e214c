//! Push a spend bundle and track it to confirmation (§4.7).
//!
//! Three phases: broadcast the bundle, wait for it to show up in the
//! indexer's mempool, then wait for the spent coin to actually clear a
//! block — holding a configurable number of extra blocks afterward before
//! declaring the spend final, to absorb short reorgs. Every phase boundary
//! lands in the audit log so a stuck spend is diagnosable from the ledger
//! alone, without attaching a debugger to a running daemon.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::errors::GreenFloorError;
use crate::indexer::IndexerClient;
use crate::store::SqliteStore;

/// Default extra blocks to wait past the spend height before declaring the
/// transaction reorg-safe (§4.7). Exposed as a config knob, not hardcoded
/// into the wait loop below, per the spec's note that this should be
/// configurable.
pub const DEFAULT_REORG_WATCH_BLOCKS: u32 = 6;

/// How long phase 1 (mempool observation) runs before we log a warning that
/// the node still hasn't picked the spend up — doesn't abort the wait, just
/// makes a slow mempool visible in the audit log.
const MEMPOOL_WAIT_WARNING: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed,
    TimedOut,
}

/// Broadcast `spend_bundle_hex` and return its tx id — the hash of the
/// serialized bundle, the same value `get_coin_record_by_name`/mempool
/// lookups key on.
pub async fn push_tx(indexer: &dyn IndexerClient, spend_bundle_hex: &str) -> Result<String, GreenFloorError> {
    indexer.push_tx(spend_bundle_hex).await?;
    let bytes = hex::decode(spend_bundle_hex.trim_start_matches("0x"))
        .map_err(|_| GreenFloorError::InvalidSpendBundleHex)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// A coinset.org-style deep link for a coin id, for the audit trail — lets
/// an operator jump straight to the explorer from a log line.
fn coinset_url(coinset_base_url: &str, coin_name: &str) -> String {
    format!("{}/coin/{}", coinset_base_url.trim_end_matches('/'), coin_name)
}

/// Poll until `coin_id` shows up spent in the indexer and `reorg_watch_blocks`
/// additional blocks have passed since the spend's confirmation height, or
/// `timeout` elapses first. Every phase transition is recorded as an audit
/// event tagged to `market_id`.
pub async fn wait_for_mempool_then_confirmation(
    indexer: &dyn IndexerClient,
    store: &SqliteStore,
    market_id: Option<&str>,
    coinset_base_url: &str,
    coin_name: &str,
    poll_interval: Duration,
    timeout: Duration,
    reorg_watch_blocks: u32,
) -> Result<ConfirmationOutcome, GreenFloorError> {
    let deadline = tokio::time::Instant::now() + timeout;
    let url = coinset_url(coinset_base_url, coin_name);

    // Phase 1: mempool observation — best-effort, we don't fail the wait if
    // the coin never shows up in the mempool snapshot (the indexer may only
    // expose mempool contents transiently).
    let mut warned = false;
    let phase1_start = tokio::time::Instant::now();
    loop {
        let mempool_ids = indexer.get_all_mempool_tx_ids().await.unwrap_or_default();
        if mempool_ids.iter().any(|id| id == coin_name) {
            store.add_audit_event(
                "in_mempool",
                &json!({ "coin_id": coin_name, "coinset_url": url }),
                market_id,
            )?;
            break;
        }
        if let Some(record) = indexer.get_coin_record_by_name(coin_name).await? {
            if record.spent_block_index > 0 {
                store.add_audit_event(
                    "in_mempool",
                    &json!({ "coin_id": coin_name, "coinset_url": url }),
                    market_id,
                )?;
                break;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(ConfirmationOutcome::TimedOut);
        }
        if !warned && phase1_start.elapsed() >= MEMPOOL_WAIT_WARNING {
            warned = true;
            store.add_audit_event(
                "mempool_wait_warning",
                &json!({ "coin_id": coin_name, "elapsed_seconds": phase1_start.elapsed().as_secs() }),
                market_id,
            )?;
        }
        tokio::time::sleep(poll_interval).await;
    }

    // Phase 2: block confirmation.
    let spent_height = loop {
        if tokio::time::Instant::now() >= deadline {
            return Ok(ConfirmationOutcome::TimedOut);
        }
        if let Some(record) = indexer.get_coin_record_by_name(coin_name).await? {
            if record.spent_block_index > 0 {
                break record.spent_block_index;
            }
        }
        tokio::time::sleep(poll_interval).await;
    };

    // Phase 3: reorg watch — hold until the chain has moved
    // `reorg_watch_blocks` past the confirming height.
    store.add_audit_event(
        "reorg_watch_started",
        &json!({ "coin_id": coin_name, "spent_height": spent_height, "reorg_watch_blocks": reorg_watch_blocks }),
        market_id,
    )?;
    loop {
        if tokio::time::Instant::now() >= deadline {
            store.add_audit_event(
                "reorg_watch_timeout",
                &json!({ "coin_id": coin_name, "spent_height": spent_height }),
                market_id,
            )?;
            return Ok(ConfirmationOutcome::TimedOut);
        }
        let peak = indexer.peak_height().await?;
        if peak >= spent_height + reorg_watch_blocks {
            store.add_audit_event(
                "reorg_watch_complete",
                &json!({ "coin_id": coin_name, "spent_height": spent_height, "peak_height": peak }),
                market_id,
            )?;
            return Ok(ConfirmationOutcome::Confirmed);
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Status lookup for a wallet that decouples "request to sign" from "signed
/// bundle" (a KMS-custody or cloud-wallet signer). Kept independent of any
/// one venue/signer implementation — callers adapt their client to this.
#[async_trait]
pub trait SignatureRequestProvider: Send + Sync {
    async fn get_signature_request_status(&self, signature_request_id: &str) -> Result<String, GreenFloorError>;
}

/// Poll `provider` until the signature request leaves `UNSIGNED`, emitting
/// `signature_wait_warning` at each `warning_interval` and
/// `signature_wait_escalation` from the second warning onward. Transient
/// fetch errors are logged as `poll_retry` and retried; a hard timeout
/// raises [`GreenFloorError::SignatureRequestTimeout`].
pub async fn poll_signature_request_until_not_unsigned(
    provider: &dyn SignatureRequestProvider,
    signature_request_id: &str,
    store: &SqliteStore,
    market_id: Option<&str>,
    poll_interval: Duration,
    timeout: Duration,
    warning_interval: Duration,
) -> Result<String, GreenFloorError> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut next_warning = tokio::time::Instant::now() + warning_interval;
    let mut warnings_emitted = 0u32;

    loop {
        match provider.get_signature_request_status(signature_request_id).await {
            Ok(status) if status != "UNSIGNED" => return Ok(status),
            Ok(_) => {}
            Err(_) => {
                store.add_audit_event(
                    "poll_retry",
                    &json!({ "signature_request_id": signature_request_id }),
                    market_id,
                )?;
            }
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(GreenFloorError::SignatureRequestTimeout);
        }
        if tokio::time::Instant::now() >= next_warning {
            warnings_emitted += 1;
            let event = if warnings_emitted >= 2 { "signature_wait_escalation" } else { "signature_wait_warning" };
            store.add_audit_event(
                event,
                &json!({ "signature_request_id": signature_request_id, "warning_count": warnings_emitted }),
                market_id,
            )?;
            next_warning += warning_interval;
        }
        tokio::time::sleep(poll_interval).await;
    }
}
