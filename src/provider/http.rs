//! JSON-RPC over HTTP bridge.
//!
//! Production transport for environments without an injected wallet object:
//! talks JSON-RPC 2.0 to a node that manages its own accounts (a local
//! Hardhat or dev node). Signature prompts never appear on this path, so
//! `eth_requestAccounts` degrades to `eth_accounts` on the node side.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{Provider, ProviderError, ProviderEvent};

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

/// HTTP JSON-RPC wallet transport.
pub struct HttpProvider {
    client: reqwest::Client,
    url: String,
    // Held so subscriber inboxes stay open; this transport never emits.
    subscribers: std::sync::Mutex<Vec<mpsc::UnboundedSender<ProviderEvent>>>,
}

impl HttpProvider {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        log::info!("HTTP provider bridge at {}", url);
        Self {
            client: reqwest::Client::new(),
            url,
            subscribers: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Provider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        log::debug!("rpc -> {} {}", method, params);
        let body = json!({
            "jsonrpc": "2.0",
            "id": Uuid::new_v4().to_string(),
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(format!("{} failed: {}", method, e)))?;

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::transport(format!("{} bad response: {}", method, e)))?;

        if let Some(err) = parsed.error {
            log::debug!("rpc <- {} error {}: {}", method, err.code, err.message);
            return Err(ProviderError::new(err.code, err.message));
        }

        parsed
            .result
            .ok_or_else(|| ProviderError::transport(format!("{}: response carried no result", method)))
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent> {
        // Plain HTTP transports have no push channel; the inbox stays open
        // but silent so the event loop simply idles.
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().expect("subscriber list poisoned").push(tx);
        rx
    }
}
