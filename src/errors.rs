use thiserror::Error;

/// Tagged-string error kinds shared across the core. `Display` renders the
/// exact `prefix:cause` form audit payloads and tests match against, so
/// callers that only need the string (for an audit event body) can use
/// `.to_string()` directly instead of matching on the variant.
#[derive(Debug, Error)]
pub enum GreenFloorError {
    #[error("missing_{field}")]
    Missing { field: String },

    #[error("invalid_{field}:{reason}")]
    Invalid { field: String, reason: String },

    #[error("key_secrets_unavailable")]
    KeySecretsUnavailable,

    #[error("derivation_scan_failed_for_selected_coin")]
    DerivationScanFailed,

    #[error("missing_private_key_for_agg_sig_target")]
    MissingPrivateKeyForAggSigTarget,

    #[error("no_unspent_{kind}")]
    NoUnspent { kind: String },

    #[error("insufficient_{kind}")]
    Insufficient { kind: String },

    #[error("coin_selection_failed:{0}")]
    CoinSelectionFailed(String),

    #[error("push_tx_error:{0}")]
    PushTxError(String),

    #[error("push_tx_rejected:{0}")]
    PushTxRejected(String),

    #[error("invalid_spend_bundle_hex")]
    InvalidSpendBundleHex,

    #[error("spend_bundle_decode_error:{0}")]
    SpendBundleDecodeError(String),

    #[error("http_error:{code}:{snippet}")]
    HttpError { code: u16, snippet: String },

    #[error("network_error:{0}")]
    NetworkError(String),

    #[error("invalid_response")]
    InvalidResponse,

    #[error("signature_request_timeout")]
    SignatureRequestTimeout,

    #[error("poll_retry")]
    PollRetry,

    #[error("store_error:{0}")]
    Store(String),
}

impl GreenFloorError {
    pub fn missing(field: impl Into<String>) -> Self {
        GreenFloorError::Missing { field: field.into() }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        GreenFloorError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<rusqlite::Error> for GreenFloorError {
    fn from(e: rusqlite::Error) -> Self {
        GreenFloorError::Store(e.to_string())
    }
}

impl From<anyhow::Error> for GreenFloorError {
    fn from(e: anyhow::Error) -> Self {
        GreenFloorError::Store(e.to_string())
    }
}
