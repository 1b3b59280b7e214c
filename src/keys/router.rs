use std::collections::HashMap;

use crate::config::models::{MarketConfig, SignerKeyConfig};

#[derive(Debug, Clone)]
pub struct KeySelection {
    pub key_id: String,
    pub market_id: String,
    pub fingerprint: Option<u32>,
    pub keyring_yaml_path: Option<String>,
}

/// Resolve the signer key a market should use, enforcing the allowed-keys
/// and registry-network checks the daemon applies before ever touching a
/// private key.
pub fn resolve_market_key(
    market: &MarketConfig,
    allowed_key_ids: Option<&std::collections::HashSet<String>>,
    signer_key_registry: Option<&HashMap<String, SignerKeyConfig>>,
    required_network: Option<&str>,
) -> Result<KeySelection, String> {
    let key_id = market.signer_key_id.trim().to_string();
    if key_id.is_empty() {
        return Err(format!("Market {} is missing signer_key_id", market.market_id));
    }
    if let Some(allowed) = allowed_key_ids {
        if !allowed.contains(&key_id) {
            return Err(format!(
                "Market {} uses signer_key_id={key_id}, which is not allowed",
                market.market_id
            ));
        }
    }
    if let Some(registry) = signer_key_registry {
        let signer_key = registry.get(&key_id).ok_or_else(|| {
            format!(
                "Market {} uses signer_key_id={key_id}, which is not present in signer key registry",
                market.market_id
            )
        })?;
        if let Some(required) = required_network {
            if let Some(network) = &signer_key.network {
                if network != required {
                    return Err(format!(
                        "Market {} uses signer_key_id={key_id}, network mismatch ({network} != {required})",
                        market.market_id
                    ));
                }
            }
        }
        return Ok(KeySelection {
            key_id,
            market_id: market.market_id.clone(),
            fingerprint: Some(signer_key.fingerprint),
            keyring_yaml_path: signer_key.keyring_yaml_path.clone(),
        });
    }
    Ok(KeySelection {
        key_id,
        market_id: market.market_id.clone(),
        fingerprint: None,
        keyring_yaml_path: None,
    })
}
