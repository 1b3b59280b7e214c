use async_trait::async_trait;
use serde_json::json;

use crate::errors::GreenFloorError;

use super::{OfferSummary, PostOfferResult, VenueClient};

/// Splash exposes a single POST endpoint for offer submission; it has no
/// listing/cancel API of its own. Markets that publish through splash still
/// read lifecycle status from dexie — `offer_publish.provider` only picks
/// which venue receives the `post_offer` call.
pub struct SplashClient {
    base_url: String,
    http: reqwest::Client,
}

impl SplashClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        SplashClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl VenueClient for SplashClient {
    fn provider_name(&self) -> &'static str {
        "splash"
    }

    async fn get_offers(&self, _base: &str, _quote: &str) -> Result<Vec<OfferSummary>, GreenFloorError> {
        Ok(Vec::new())
    }

    async fn get_offer(&self, _id: &str) -> Result<Option<OfferSummary>, GreenFloorError> {
        Ok(None)
    }

    async fn post_offer(
        &self,
        offer_text: &str,
        _drop_only: bool,
        _claim_rewards: Option<bool>,
    ) -> Result<PostOfferResult, GreenFloorError> {
        let resp = self
            .http
            .post(&self.base_url)
            .json(&json!({ "offer": offer_text }))
            .send()
            .await
            .map_err(|e| GreenFloorError::PushTxError(e.to_string()))?;
        if !resp.status().is_success() {
            let code = resp.status().as_u16();
            let snippet = resp.text().await.unwrap_or_default().chars().take(200).collect();
            return Err(GreenFloorError::HttpError { code, snippet });
        }
        let body: serde_json::Value = resp.json().await.map_err(|_| GreenFloorError::InvalidResponse)?;
        if let Ok(result) = serde_json::from_value::<PostOfferResult>(body.clone()) {
            return Ok(result);
        }
        Ok(PostOfferResult {
            success: false,
            id: None,
            error: Some("invalid_response_format".to_string()),
        })
    }

    async fn cancel_offer(&self, _id: &str) -> Result<(), GreenFloorError> {
        Err(GreenFloorError::InvalidResponse)
    }

    async fn ping(&self) -> Result<(), GreenFloorError> {
        Ok(())
    }
}
