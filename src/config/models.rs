use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One entry in `keys.registry`: maps an operator-facing `key_id` to the
/// BLS master fingerprint it resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerKeyConfig {
    pub key_id: String,
    pub fingerprint: u32,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub keyring_yaml_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub network: String,
    pub home_dir: String,
    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub loop_interval_seconds: u32,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxBlockTriggerConfig {
    pub mode: String,
    #[serde(default)]
    pub websocket_url: String,
    pub websocket_reconnect_interval_seconds: u32,
    #[serde(default)]
    pub fallback_poll_interval_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSignalsConfig {
    pub tx_block_trigger: TxBlockTriggerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueEndpointConfig {
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferPublishConfig {
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VenuesConfig {
    #[serde(default)]
    pub dexie: Option<VenueEndpointConfig>,
    #[serde(default)]
    pub splash: Option<VenueEndpointConfig>,
    #[serde(default)]
    pub offer_publish: Option<OfferPublishConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoinOpsConfig {
    #[serde(default)]
    pub minimum_fee_mojos: u64,
    #[serde(default)]
    pub max_operations_per_run: Option<u32>,
    #[serde(default)]
    pub max_daily_fee_budget_mojos: Option<u64>,
    #[serde(default)]
    pub split_fee_mojos: Option<u64>,
    #[serde(default)]
    pub combine_fee_mojos: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowInventoryAlertsConfig {
    pub enabled: bool,
    pub threshold_mode: String,
    pub default_threshold_base_units: i64,
    pub dedup_cooldown_seconds: i64,
    pub clear_hysteresis_percent: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationProviderConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub enabled: bool,
    #[serde(default)]
    pub user_key_env: Option<String>,
    #[serde(default)]
    pub app_token_env: Option<String>,
    #[serde(default)]
    pub recipient_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub low_inventory_alerts: LowInventoryAlertsConfig,
    pub providers: Vec<NotificationProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KeysConfig {
    #[serde(default)]
    pub registry: Vec<SignerKeyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MarketInventoryConfig {
    pub low_watermark_base_units: i64,
    #[serde(default)]
    pub low_inventory_alert_threshold_base_units: Option<i64>,
    #[serde(default)]
    pub current_available_base_units: i64,
    #[serde(default)]
    pub bucket_counts: HashMap<i64, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketLadderEntry {
    pub size_base_units: i64,
    pub target_count: i64,
    #[serde(default)]
    pub split_buffer_count: i64,
    #[serde(default = "default_combine_factor")]
    pub combine_when_excess_factor: f64,
}

fn default_combine_factor() -> f64 {
    2.0
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MarketPricingConfig {
    #[serde(default)]
    pub strategy_target_spread_bps: Option<i64>,
    #[serde(default)]
    pub strategy_min_xch_price_usd: Option<f64>,
    #[serde(default)]
    pub strategy_max_xch_price_usd: Option<f64>,
    #[serde(default)]
    pub strategy_offer_expiry_unit: Option<String>,
    #[serde(default)]
    pub strategy_offer_expiry_value: Option<u64>,
    #[serde(default)]
    pub cancel_policy_stable_vs_unstable: bool,
    #[serde(default)]
    pub min_price_quote_per_base: Option<f64>,
    #[serde(default)]
    pub max_price_quote_per_base: Option<f64>,
    #[serde(default)]
    pub base_unit_mojo_multiplier: Option<f64>,
    #[serde(default)]
    pub quote_unit_mojo_multiplier: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(rename = "id")]
    pub market_id: String,
    pub enabled: bool,
    pub base_asset: String,
    pub base_symbol: String,
    pub quote_asset: String,
    pub quote_asset_type: String,
    pub receive_address: String,
    pub mode: String,
    pub signer_key_id: String,
    #[serde(default)]
    pub inventory: MarketInventoryConfig,
    #[serde(default)]
    pub pricing: MarketPricingConfig,
    #[serde(default)]
    pub ladders: HashMap<String, Vec<MarketLadderEntry>>,
}

impl MarketConfig {
    pub fn sell_ladder(&self) -> &[MarketLadderEntry] {
        self.ladders
            .get("sell")
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramConfig {
    pub app: AppConfig,
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    pub chain_signals: ChainSignalsConfig,
    #[serde(default)]
    pub venues: VenuesConfig,
    #[serde(default)]
    pub coin_ops: CoinOpsConfig,
    pub notifications: NotificationsConfig,
}

impl ProgramConfig {
    pub fn signer_key_registry(&self) -> HashMap<String, SignerKeyConfig> {
        self.keys
            .registry
            .iter()
            .cloned()
            .map(|k| (k.key_id.clone(), k))
            .collect()
    }

    pub fn offer_publish_venue(&self) -> String {
        self.venues
            .offer_publish
            .as_ref()
            .map(|o| o.provider.clone())
            .unwrap_or_else(|| "dexie".to_string())
    }

    pub fn dexie_api_base(&self) -> String {
        self.venues
            .dexie
            .as_ref()
            .map(|v| v.api_base.clone())
            .unwrap_or_else(|| "https://api.dexie.space".to_string())
    }

    pub fn splash_api_base(&self) -> String {
        self.venues
            .splash
            .as_ref()
            .map(|v| v.api_base.clone())
            .unwrap_or_else(|| "http://john-deere.hoffmang.com:4000".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketsConfig {
    pub markets: Vec<MarketConfig>,
}
