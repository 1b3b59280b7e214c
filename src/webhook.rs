//! Tx-block confirmation webhook listener (§6 `chain_signals.tx_block_trigger`
//! `mode: webhook`). A small axum server replacing the source's
//! `ThreadingHTTPServer`; confirmed coin/tx ids are pushed onto a shared
//! queue the orchestrator drains once per cycle.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::Mutex;

#[derive(Debug, Deserialize)]
pub struct TxBlockNotification {
    pub tx_ids: Vec<String>,
}

#[derive(Clone, Default)]
pub struct WebhookState {
    pub confirmed_tx_ids: Arc<Mutex<Vec<String>>>,
}

impl WebhookState {
    pub async fn drain(&self) -> Vec<String> {
        let mut guard = self.confirmed_tx_ids.lock().await;
        std::mem::take(&mut *guard)
    }
}

async fn handle_tx_block(State(state): State<WebhookState>, Json(body): Json<TxBlockNotification>) -> &'static str {
    let mut guard = state.confirmed_tx_ids.lock().await;
    guard.extend(body.tx_ids);
    "ok"
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook/tx-block", post(handle_tx_block))
        .with_state(state)
}

pub async fn serve(bind_addr: &str, state: WebhookState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}
