//! Indexer WebSocket reader (§6 `chain_signals.tx_block_trigger`
//! `mode: websocket`). Reconnects on drop at the configured interval and
//! feeds confirmed tx ids into the same shared queue the webhook listener
//! uses, so the orchestrator doesn't need to know which trigger mode is
//! active.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Deserialize)]
struct WsBlockEvent {
    #[serde(default)]
    tx_ids: Vec<String>,
}

/// Run forever, reconnecting every `reconnect_interval` after a dropped
/// connection, pushing every event's `tx_ids` onto `sink`.
pub async fn run_reader(websocket_url: String, reconnect_interval: Duration, sink: Arc<Mutex<Vec<String>>>) {
    loop {
        match connect_async(&websocket_url).await {
            Ok((mut stream, _response)) => {
                while let Some(message) = stream.next().await {
                    match message {
                        Ok(Message::Text(text)) => {
                            if let Ok(event) = serde_json::from_str::<WsBlockEvent>(&text) {
                                if !event.tx_ids.is_empty() {
                                    let mut guard = sink.lock().await;
                                    guard.extend(event.tx_ids);
                                }
                            }
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(_) => break,
                    }
                }
            }
            Err(_) => {
                tokio::time::sleep(reconnect_interval).await;
                continue;
            }
        }
        tokio::time::sleep(reconnect_interval).await;
    }
}
