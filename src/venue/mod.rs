pub mod dexie;
pub mod splash;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::GreenFloorError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferSummary {
    pub id: String,
    pub status: i64,
    #[serde(default)]
    pub offer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostOfferResult {
    pub success: bool,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Request/response contract over an external offer marketplace.
/// `status` is a canonical integer mapped to lifecycle signals in §4.8.
#[async_trait]
pub trait VenueClient: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn get_offers(&self, base: &str, quote: &str) -> Result<Vec<OfferSummary>, GreenFloorError>;

    async fn get_offer(&self, id: &str) -> Result<Option<OfferSummary>, GreenFloorError>;

    async fn post_offer(
        &self,
        offer_text: &str,
        drop_only: bool,
        claim_rewards: Option<bool>,
    ) -> Result<PostOfferResult, GreenFloorError>;

    async fn cancel_offer(&self, id: &str) -> Result<(), GreenFloorError>;

    /// Cheap connectivity check for `doctor`.
    async fn ping(&self) -> Result<(), GreenFloorError> {
        self.get_offers("xch", "xch").await.map(|_| ())
    }
}
