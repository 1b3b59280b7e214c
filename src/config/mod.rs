pub mod models;

use std::path::Path;

use anyhow::{Context, Result, bail};

pub use models::{MarketConfig, MarketsConfig, ProgramConfig};

/// Load `program.yaml` from disk.
pub fn load_program_config(path: &Path) -> Result<ProgramConfig> {
    let raw = load_yaml(path)?;
    Ok(raw)
}

/// Load `markets.yaml`, optionally merging a testnet/overlay file's `markets`
/// list onto the base one (matches the source's base+overlay merge: overlay
/// markets are appended after the base markets, not deduplicated).
pub fn load_markets_config(path: &Path, overlay_path: Option<&Path>) -> Result<MarketsConfig> {
    let mut config: MarketsConfig = load_yaml(path)?;
    if let Some(overlay) = overlay_path {
        if overlay.exists() {
            let overlay_config: MarketsConfig = load_yaml(overlay)?;
            config.markets.extend(overlay_config.markets);
        }
    }
    Ok(config)
}

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    serde_yaml::from_str(&contents).with_context(|| format!("parsing config at {}", path.display()))
}

/// Resolution order for an integer environment override:
/// 1. the env var, parsed as the target int type
/// 2. the provided default
///
/// Mirrors the direct-value-wins idiom the daemon uses for every
/// `GREENFLOOR_*` override — no `_FILE` indirection needed here since these
/// are plain tunables, not secrets.
pub fn env_u64(var: &str, default: u64) -> u64 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

pub fn env_i64(var: &str, default: i64) -> i64 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

pub fn env_string(var: &str, default: &str) -> String {
    std::env::var(var).unwrap_or_else(|_| default.to_string())
}

/// Resolve `app.home_dir`, with `GREENFLOOR_HOME` taking precedence.
pub fn resolve_home_dir(program: &ProgramConfig) -> std::path::PathBuf {
    std::env::var("GREENFLOOR_HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from(&program.app.home_dir))
}

/// `(max_attempts, backoff_ms, cooldown_s)` for the post or cancel retry
/// controller (§4.9), built from `GREENFLOOR_OFFER_{POST,CANCEL}_*` env vars.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub cooldown_s: i64,
}

pub fn post_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: env_u64("GREENFLOOR_OFFER_POST_MAX_ATTEMPTS", 2) as u32,
        backoff_ms: env_u64("GREENFLOOR_OFFER_POST_BACKOFF_MS", 250),
        cooldown_s: env_i64("GREENFLOOR_OFFER_POST_COOLDOWN_SECONDS", 30),
    }
}

pub fn cancel_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: env_u64("GREENFLOOR_OFFER_CANCEL_MAX_ATTEMPTS", 2) as u32,
        backoff_ms: env_u64("GREENFLOOR_OFFER_CANCEL_BACKOFF_MS", 250),
        cooldown_s: env_i64("GREENFLOOR_OFFER_CANCEL_COOLDOWN_SECONDS", 30),
    }
}

pub fn unstable_cancel_move_bps() -> i64 {
    let v = env_i64("GREENFLOOR_UNSTABLE_CANCEL_MOVE_BPS", 500);
    if v < 1 { 500 } else { v }
}

pub fn derivation_scan_limit() -> u32 {
    env_u64("GREENFLOOR_CHIA_KEYS_DERIVATION_SCAN_LIMIT", 200) as u32
}

pub fn disabled_market_log_interval_seconds() -> u64 {
    let v = env_u64("GREENFLOOR_DISABLED_MARKET_LOG_INTERVAL_SECONDS", 3600);
    if v < 60 { 3600 } else { v }
}

pub fn coinset_base_url(default: &str) -> String {
    env_string("GREENFLOOR_COINSET_BASE_URL", default)
}

/// Extra blocks to hold past a spend's confirming height before declaring it
/// reorg-safe (§4.7). Configurable via env override; defaults to
/// [`crate::broadcast::DEFAULT_REORG_WATCH_BLOCKS`].
pub fn reorg_watch_blocks() -> u32 {
    env_u64(
        "GREENFLOOR_REORG_WATCH_BLOCKS",
        crate::broadcast::DEFAULT_REORG_WATCH_BLOCKS as u64,
    ) as u32
}

/// Bind address for the tx-block confirmation webhook listener.
pub fn webhook_bind_addr() -> String {
    env_string("GREENFLOOR_WEBHOOK_BIND_ADDR", "0.0.0.0:8787")
}

/// Validate the base markets config doesn't leak testnet addresses, mirroring
/// the source's `_validate_base_markets_addresses` sanity check.
pub fn validate_no_testnet_addresses(path: &Path, config: &MarketsConfig) -> Result<()> {
    let bad: Vec<&str> = config
        .markets
        .iter()
        .filter(|m| m.receive_address.to_lowercase().starts_with("txch1"))
        .map(|m| m.market_id.as_str())
        .collect();
    if !bad.is_empty() {
        bail!(
            "testnet receive_address entries found in base markets config {}; market_ids={}",
            path.display(),
            bad.join(",")
        );
    }
    Ok(())
}
