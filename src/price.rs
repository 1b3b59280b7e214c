//! XCH/USD price feed, TTL-cached per request to avoid hammering the
//! upstream quote source every cycle. Feeds the `xch_price_snapshot` audit
//! event the cancel policy and ladder pricing both read back.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::errors::GreenFloorError;

pub struct PriceFeed {
    http: reqwest::Client,
    url: String,
    ttl: Duration,
    cache: Mutex<Option<(f64, Instant)>>,
}

impl PriceFeed {
    pub fn new(url: impl Into<String>, ttl_seconds: u64) -> Self {
        PriceFeed {
            http: reqwest::Client::new(),
            url: url.into(),
            ttl: Duration::from_secs(ttl_seconds.max(1)),
            cache: Mutex::new(None),
        }
    }

    pub fn default_coincodex() -> Self {
        Self::new("https://coincodex.com/api/coincodex/get_coin/xch", 60)
    }

    /// Serve from cache within the TTL; otherwise fetch, and on a failed
    /// fetch fall back to a stale cached price rather than erroring, mirroring
    /// the source adapter's "stale beats unavailable" behavior.
    pub async fn get_xch_price_usd(&self) -> Result<f64, GreenFloorError> {
        if let Some((price, fetched_at)) = *self.cache.lock().unwrap() {
            if fetched_at.elapsed() <= self.ttl {
                return Ok(price);
            }
        }
        match self.fetch().await {
            Ok(price) => {
                *self.cache.lock().unwrap() = Some((price, Instant::now()));
                Ok(price)
            }
            Err(e) => match *self.cache.lock().unwrap() {
                Some((price, _)) => Ok(price),
                None => Err(e),
            },
        }
    }

    async fn fetch(&self) -> Result<f64, GreenFloorError> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| GreenFloorError::NetworkError(e.to_string()))?;
        let payload: Value = resp.json().await.map_err(|_| GreenFloorError::InvalidResponse)?;
        parse_price(&payload).ok_or_else(|| GreenFloorError::invalid("price_response", "missing_price"))
    }
}

/// Accepts either the coincodex single-coin dict shape
/// (`{"last_price_usd": ...}`) or a coingecko-style markets list
/// (`[{"current_price": ...}, ...]`).
fn parse_price(payload: &Value) -> Option<f64> {
    if let Some(p) = payload.get("last_price_usd").and_then(Value::as_f64) {
        return Some(p);
    }
    payload
        .as_array()
        .and_then(|items| items.first())
        .and_then(|first| first.get("current_price"))
        .and_then(Value::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_coincodex_dict_shape() {
        assert_eq!(parse_price(&json!({ "last_price_usd": 12.5 })), Some(12.5));
    }

    #[test]
    fn parses_coingecko_markets_list_shape() {
        assert_eq!(parse_price(&json!([{ "current_price": 9.25 }])), Some(9.25));
    }

    #[test]
    fn rejects_unrecognized_shape() {
        assert_eq!(parse_price(&json!({ "nope": 1.0 })), None);
        assert_eq!(parse_price(&json!([])), None);
    }
}
