use async_trait::async_trait;
use serde_json::json;

use crate::errors::GreenFloorError;

use super::{OfferSummary, PostOfferResult, VenueClient};

pub struct DexieClient {
    base_url: String,
    http: reqwest::Client,
}

impl DexieClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        DexieClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn map_http_err(e: reqwest::Error) -> GreenFloorError {
        GreenFloorError::NetworkError(e.to_string())
    }
}

#[async_trait]
impl VenueClient for DexieClient {
    fn provider_name(&self) -> &'static str {
        "dexie"
    }

    async fn get_offers(&self, base: &str, quote: &str) -> Result<Vec<OfferSummary>, GreenFloorError> {
        let url = format!(
            "{}/v1/offers?offered={}&requested={}&status=0,1,2,4,5,6",
            self.base_url, base, quote
        );
        let resp = self.http.get(&url).send().await.map_err(Self::map_http_err)?;
        if !resp.status().is_success() {
            let code = resp.status().as_u16();
            let snippet = resp.text().await.unwrap_or_default().chars().take(200).collect();
            return Err(GreenFloorError::HttpError { code, snippet });
        }
        let body: serde_json::Value = resp.json().await.map_err(|_| GreenFloorError::InvalidResponse)?;
        let offers = body.get("offers").cloned().unwrap_or(serde_json::Value::Array(vec![]));
        serde_json::from_value(offers).map_err(|_| GreenFloorError::InvalidResponse)
    }

    async fn get_offer(&self, id: &str) -> Result<Option<OfferSummary>, GreenFloorError> {
        let url = format!("{}/v1/offers/{}", self.base_url, id);
        let resp = self.http.get(&url).send().await.map_err(Self::map_http_err)?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let code = resp.status().as_u16();
            let snippet = resp.text().await.unwrap_or_default().chars().take(200).collect();
            return Err(GreenFloorError::HttpError { code, snippet });
        }
        let body: serde_json::Value = resp.json().await.map_err(|_| GreenFloorError::InvalidResponse)?;
        let offer = body.get("offer").cloned();
        match offer {
            Some(v) if !v.is_null() => {
                serde_json::from_value(v).map(Some).map_err(|_| GreenFloorError::InvalidResponse)
            }
            _ => Ok(None),
        }
    }

    async fn post_offer(
        &self,
        offer_text: &str,
        drop_only: bool,
        claim_rewards: Option<bool>,
    ) -> Result<PostOfferResult, GreenFloorError> {
        let url = format!("{}/v1/offers", self.base_url);
        let body = json!({
            "offer": offer_text,
            "drop_only": drop_only,
            "claim_rewards": claim_rewards,
        });
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GreenFloorError::PushTxError(e.to_string()))?;
        if !resp.status().is_success() {
            let code = resp.status().as_u16();
            let snippet = resp.text().await.unwrap_or_default().chars().take(200).collect();
            return Err(GreenFloorError::HttpError { code, snippet });
        }
        resp.json::<PostOfferResult>().await.map_err(|_| GreenFloorError::InvalidResponse)
    }

    async fn cancel_offer(&self, id: &str) -> Result<(), GreenFloorError> {
        let url = format!("{}/v1/offers/{}/cancel", self.base_url, id);
        let resp = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|e| GreenFloorError::NetworkError(e.to_string()))?;
        if resp.status().is_success() {
            return Ok(());
        }
        let code = resp.status().as_u16();
        let snippet = resp.text().await.unwrap_or_default().chars().take(200).collect();
        Err(GreenFloorError::HttpError { code, snippet })
    }
}
