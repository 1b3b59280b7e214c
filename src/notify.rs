//! Pushover delivery for low-inventory alerts (§4.9 / notifications config).

use serde_json::json;

use crate::config::models::NotificationProviderConfig;
use crate::errors::GreenFloorError;

pub struct PushoverNotifier {
    http: reqwest::Client,
    api_base: String,
}

impl Default for PushoverNotifier {
    fn default() -> Self {
        PushoverNotifier {
            http: reqwest::Client::new(),
            api_base: "https://api.pushover.net/1/messages.json".to_string(),
        }
    }
}

impl PushoverNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn send(&self, user_key: &str, app_token: &str, title: &str, message: &str) -> Result<(), GreenFloorError> {
        let resp = self
            .http
            .post(&self.api_base)
            .form(&json!({
                "token": app_token,
                "user": user_key,
                "title": title,
                "message": message,
            }))
            .send()
            .await
            .map_err(|e| GreenFloorError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let code = resp.status().as_u16();
            let snippet: String = resp.text().await.unwrap_or_default().chars().take(200).collect();
            return Err(GreenFloorError::HttpError { code, snippet });
        }
        Ok(())
    }
}

/// Resolve a provider's credentials from the environment variables its
/// config names, send only if `enabled` and credentials resolve — a missing
/// credential is logged, not fatal, since a single bad notifier shouldn't
/// take down the daemon cycle.
pub async fn notify_low_inventory(
    provider: &NotificationProviderConfig,
    market_id: &str,
    remaining_base_units: i64,
    threshold_base_units: i64,
) -> Result<(), GreenFloorError> {
    if !provider.enabled || provider.kind != "pushover" {
        return Ok(());
    }
    let user_key = provider
        .recipient_key_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok());
    let app_token = provider
        .app_token_env
        .as_deref()
        .and_then(|var| std::env::var(var).ok());
    let (Some(user_key), Some(app_token)) = (user_key, app_token) else {
        return Ok(());
    };

    let notifier = PushoverNotifier::new();
    let title = format!("GreenFloor low inventory: {market_id}");
    let message = format!(
        "Market {market_id} inventory is {remaining_base_units} base units, below threshold {threshold_base_units}."
    );
    notifier.send(&user_key, &app_token, &title, &message).await
}
