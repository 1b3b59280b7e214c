use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct AlertState {
    pub is_low: bool,
    pub last_alert_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferStateRow {
    pub offer_id: String,
    pub market_id: String,
    pub state: String,
    pub last_seen_status: Option<i64>,
    pub size_base_units: Option<i64>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinOpStatus {
    Executed,
    Planned,
    Skipped,
    Failed,
}

impl CoinOpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoinOpStatus::Executed => "executed",
            CoinOpStatus::Planned => "planned",
            CoinOpStatus::Skipped => "skipped",
            CoinOpStatus::Failed => "failed",
        }
    }
}

/// One computed strategy price/spread decision for a market in a cycle.
/// Append-only; written *after* the cancel policy has consumed the
/// previous/current price pair for the same cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePolicyRecord {
    pub market_id: String,
    pub xch_price_usd: Option<f64>,
    pub previous_xch_price_usd: Option<f64>,
    pub move_bps: Option<f64>,
    pub spread_bps: Option<i64>,
    pub computed_at: String,
}
