use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::Mutex as AsyncMutex;

use greenfloor::config::models::ProgramConfig;
use greenfloor::indexer::{CoinsetClient, IndexerClient};
use greenfloor::registry::{RegistryEntry, name_from_config_path};
use greenfloor::venue::VenueClient;
use greenfloor::venue::dexie::DexieClient;
use greenfloor::venue::splash::SplashClient;
use greenfloor::{cli, config, keys, logs, orchestrator, policy, price, ps, registry, stop, store, webhook, ws};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    let runtime = tokio::runtime::Runtime::new()?;

    match cli.command {
        cli::Command::Run { program_config, markets_config, markets_overlay } => {
            runtime.block_on(run_daemon(&program_config, &markets_config, markets_overlay.as_deref(), false))
        }
        cli::Command::Once { program_config, markets_config, markets_overlay } => {
            runtime.block_on(run_daemon(&program_config, &markets_config, markets_overlay.as_deref(), true))
        }
        cli::Command::Doctor { program_config } => runtime.block_on(doctor(&program_config)),
        cli::Command::Ps { home_dir } => ps::run(home_dir.as_deref()),
        cli::Command::Stop { name, home_dir } => stop::run(&name, home_dir.as_deref()),
        cli::Command::Logs { name, lines, follow, home_dir } => logs::run(&name, lines, follow, home_dir.as_deref()),
        cli::Command::Keys { command } => match command {
            cli::KeysCommand::Onboard { chia_keys_dir } => keys_onboard(chia_keys_dir.as_deref()),
        },
        cli::Command::Metrics { program_config } => runtime.block_on(metrics(&program_config)),
    }
}

/// Spawn the confirmed-tx-id feed `chain_signals.tx_block_trigger.mode`
/// selects. Both modes push onto the same queue; the orchestrator doesn't
/// need to know which one is active.
fn spawn_tx_block_trigger(program: &ProgramConfig, sink: Arc<AsyncMutex<Vec<String>>>) {
    let trigger = &program.chain_signals.tx_block_trigger;
    match trigger.mode.as_str() {
        "webhook" => {
            let state = webhook::WebhookState { confirmed_tx_ids: sink };
            let bind_addr = config::webhook_bind_addr();
            tokio::spawn(async move {
                if let Err(e) = webhook::serve(&bind_addr, state).await {
                    eprintln!("webhook listener exited: {e}");
                }
            });
        }
        "websocket" => {
            let url = trigger.websocket_url.clone();
            let interval = std::time::Duration::from_secs(trigger.websocket_reconnect_interval_seconds as u64);
            tokio::spawn(ws::run_reader(url, interval, sink));
        }
        _ => {}
    }
}

fn build_venue_clients(program: &ProgramConfig) -> HashMap<String, Arc<dyn VenueClient>> {
    let mut venues: HashMap<String, Arc<dyn VenueClient>> = HashMap::new();
    venues.insert("dexie".to_string(), Arc::new(DexieClient::new(program.dexie_api_base())));
    venues.insert("splash".to_string(), Arc::new(SplashClient::new(program.splash_api_base())));
    venues
}

async fn run_daemon(
    program_path: &PathBuf,
    markets_path: &PathBuf,
    markets_overlay: Option<&std::path::Path>,
    once: bool,
) -> Result<()> {
    let program = config::load_program_config(program_path)?;
    let markets_cfg = config::load_markets_config(markets_path, markets_overlay)?;
    config::validate_no_testnet_addresses(markets_path, &markets_cfg)?;

    let home_dir = config::resolve_home_dir(&program);
    let store_path = home_dir.join("store.sqlite3");
    let store = store::SqliteStore::open(&store_path)?;

    let indexer: Arc<dyn IndexerClient> = Arc::new(CoinsetClient::new(config::coinset_base_url("https://api.coinset.org")));
    let venues = build_venue_clients(&program);

    let confirmed_tx_queue = Arc::new(AsyncMutex::new(Vec::new()));
    spawn_tx_block_trigger(&program, confirmed_tx_queue.clone());

    let deps = orchestrator::OrchestratorDeps {
        program,
        store,
        indexer,
        venues,
        key_providers: AsyncMutex::new(HashMap::new()),
        retry_controller: AsyncMutex::new(policy::RetryController::new()),
        reload_marker_path: home_dir.join("reload.marker"),
        confirmed_tx_queue,
        price_feed: price::PriceFeed::default_coincodex(),
    };

    if once {
        let summary = orchestrator::run_once(&deps, &markets_cfg.markets).await?;
        println!(
            "cycle complete: {} markets, {} offer transitions, {} coin ops planned",
            summary.markets_processed, summary.offers_transitioned, summary.coin_ops_planned
        );
        return Ok(());
    }

    let name = name_from_config_path(markets_path)?;
    let started_at = chrono::Utc::now().to_rfc3339();
    let log_file = home_dir.join("logs").join(format!("{name}.log"));
    registry::Registry::register(
        Some(&home_dir),
        &name,
        RegistryEntry {
            pid: std::process::id(),
            config_path: markets_path.display().to_string(),
            network: deps.program.app.network.clone(),
            started_at,
            log_file,
        },
    )?;

    let shutdown = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let shutdown_for_handler = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_for_handler.store(true, std::sync::atomic::Ordering::SeqCst);
    })
    .context("installing signal handler")?;

    let result = orchestrator::run_loop(&deps, &markets_cfg.markets, shutdown).await;
    registry::Registry::deregister(Some(&home_dir), &name)?;
    result
}

async fn doctor(program_path: &PathBuf) -> Result<()> {
    let program = config::load_program_config(program_path)?;
    let home_dir = config::resolve_home_dir(&program);
    let store = store::SqliteStore::open(&home_dir.join("store.sqlite3"))?;

    println!("store: {}", if store.health().is_ok() { "ok" } else { "FAIL" });

    let indexer = CoinsetClient::new(config::coinset_base_url("https://api.coinset.org"));
    println!("indexer: {}", if indexer.ping().await.is_ok() { "ok" } else { "FAIL" });

    for (name, venue) in build_venue_clients(&program) {
        println!("venue {name}: {}", if venue.ping().await.is_ok() { "ok" } else { "FAIL" });
    }

    Ok(())
}

async fn metrics(program_path: &PathBuf) -> Result<()> {
    let program = config::load_program_config(program_path)?;
    let home_dir = config::resolve_home_dir(&program);
    let store = store::SqliteStore::open(&home_dir.join("store.sqlite3"))?;

    let events = store.list_recent_audit_events(None, None, 50)?;
    for (id, event_type, market_id, _payload, created_at) in events {
        println!("{id}\t{created_at}\t{event_type}\t{}", market_id.unwrap_or_default());
    }
    Ok(())
}

fn keys_onboard(chia_keys_dir: Option<&std::path::Path>) -> Result<()> {
    let discovery = keys::onboarding::discover_chia_keys(chia_keys_dir);
    println!("chia keys dir: {}", discovery.chia_keys_dir.display());
    println!("existing keyring found: {}", discovery.has_existing_keys);
    if discovery.has_existing_keys {
        println!("re-run with GREENFLOOR_USE_EXISTING_KEYS=1 to reuse it non-interactively.");
    } else {
        println!("no existing chia keyring found; generate or import keys with `chia keys` first.");
    }
    Ok(())
}
