use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::GreenFloorError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireCoin {
    pub parent_coin_info: String,
    pub puzzle_hash: String,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinRecord {
    pub coin: WireCoin,
    #[serde(default)]
    pub spent_block_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinSolution {
    pub puzzle_reveal: String,
    pub solution: String,
}

/// Request/response contract over an external coin/mempool indexer. The
/// client never retries internally — that is the retry/cooldown
/// controller's job (§4.9 in the grounding spec).
#[async_trait]
pub trait IndexerClient: Send + Sync {
    async fn list_coin_records_by_puzzle_hash(
        &self,
        puzzle_hash: &str,
        include_spent_coins: bool,
    ) -> Result<Vec<CoinRecord>, GreenFloorError>;

    async fn get_coin_record_by_name(
        &self,
        name: &str,
    ) -> Result<Option<CoinRecord>, GreenFloorError>;

    async fn get_puzzle_and_solution(
        &self,
        coin_id: &str,
        height: Option<u32>,
    ) -> Result<Option<CoinSolution>, GreenFloorError>;

    async fn push_tx(&self, spend_bundle_hex: &str) -> Result<(), GreenFloorError>;

    async fn get_all_mempool_tx_ids(&self) -> Result<Vec<String>, GreenFloorError>;

    async fn get_fee_estimate(&self, target_times: &[u64]) -> Result<Vec<u64>, GreenFloorError>;

    async fn peak_height(&self) -> Result<u32, GreenFloorError>;

    /// Cheap connectivity check for `doctor`.
    async fn ping(&self) -> Result<(), GreenFloorError> {
        self.peak_height().await.map(|_| ())
    }
}

/// Coinset.org-shaped HTTP client. Every call is POST JSON with a
/// `{ success, ... }` envelope; a `success: false` response or a non-2xx
/// status surfaces as one of the tagged error kinds.
pub struct CoinsetClient {
    base_url: String,
    http: reqwest::Client,
}

impl CoinsetClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        CoinsetClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value, GreenFloorError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GreenFloorError::NetworkError(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            return Err(GreenFloorError::HttpError {
                code: status.as_u16(),
                snippet,
            });
        }

        resp.json::<serde_json::Value>()
            .await
            .map_err(|_| GreenFloorError::InvalidResponse)
    }
}

#[async_trait]
impl IndexerClient for CoinsetClient {
    async fn list_coin_records_by_puzzle_hash(
        &self,
        puzzle_hash: &str,
        include_spent_coins: bool,
    ) -> Result<Vec<CoinRecord>, GreenFloorError> {
        let resp = self
            .post(
                "/get_coin_records_by_puzzle_hash",
                json!({ "puzzle_hash": puzzle_hash, "include_spent_coins": include_spent_coins }),
            )
            .await?;
        if !resp.get("success").and_then(|v| v.as_bool()).unwrap_or(false) {
            return Err(GreenFloorError::InvalidResponse);
        }
        let records = resp
            .get("coin_records")
            .cloned()
            .unwrap_or(serde_json::Value::Array(vec![]));
        serde_json::from_value(records).map_err(|_| GreenFloorError::InvalidResponse)
    }

    async fn get_coin_record_by_name(
        &self,
        name: &str,
    ) -> Result<Option<CoinRecord>, GreenFloorError> {
        let resp = self.post("/get_coin_record_by_name", json!({ "name": name })).await?;
        if !resp.get("success").and_then(|v| v.as_bool()).unwrap_or(false) {
            return Ok(None);
        }
        match resp.get("coin_record") {
            Some(v) if !v.is_null() => {
                serde_json::from_value(v.clone()).map(Some).map_err(|_| GreenFloorError::InvalidResponse)
            }
            _ => Ok(None),
        }
    }

    async fn get_puzzle_and_solution(
        &self,
        coin_id: &str,
        height: Option<u32>,
    ) -> Result<Option<CoinSolution>, GreenFloorError> {
        let resp = self
            .post("/get_puzzle_and_solution", json!({ "coin_id": coin_id, "height": height }))
            .await?;
        if !resp.get("success").and_then(|v| v.as_bool()).unwrap_or(false) {
            return Ok(None);
        }
        match resp.get("coin_solution") {
            Some(v) if !v.is_null() => {
                serde_json::from_value(v.clone()).map(Some).map_err(|_| GreenFloorError::InvalidResponse)
            }
            _ => Ok(None),
        }
    }

    async fn push_tx(&self, spend_bundle_hex: &str) -> Result<(), GreenFloorError> {
        let resp = self
            .post("/push_tx", json!({ "spend_bundle": spend_bundle_hex }))
            .await
            .map_err(|e| GreenFloorError::PushTxError(e.to_string()))?;
        let success = resp.get("success").and_then(|v| v.as_bool()).unwrap_or(false);
        if success {
            return Ok(());
        }
        let reason = resp
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        Err(GreenFloorError::PushTxRejected(reason))
    }

    async fn get_all_mempool_tx_ids(&self) -> Result<Vec<String>, GreenFloorError> {
        let resp = self.post("/get_all_mempool_tx_ids", json!({})).await?;
        let ids = resp.get("tx_ids").cloned().unwrap_or(serde_json::Value::Array(vec![]));
        serde_json::from_value(ids).map_err(|_| GreenFloorError::InvalidResponse)
    }

    async fn get_fee_estimate(&self, target_times: &[u64]) -> Result<Vec<u64>, GreenFloorError> {
        let resp = self
            .post("/get_fee_estimate", json!({ "target_times": target_times }))
            .await?;
        let estimates = resp.get("estimates").cloned().unwrap_or(serde_json::Value::Array(vec![]));
        serde_json::from_value(estimates).map_err(|_| GreenFloorError::InvalidResponse)
    }

    async fn peak_height(&self) -> Result<u32, GreenFloorError> {
        let resp = self.post("/get_blockchain_state", json!({})).await?;
        resp.get("blockchain_state")
            .and_then(|s| s.get("peak"))
            .and_then(|p| p.get("height"))
            .and_then(|h| h.as_u64())
            .map(|h| h as u32)
            .ok_or(GreenFloorError::InvalidResponse)
    }
}
