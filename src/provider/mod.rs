//! Wallet provider boundary.
//!
//! The session never talks to a wallet directly; it goes through the
//! [`Provider`] capability: request/response JSON-RPC calls plus a
//! notification inbox for account and chain changes. Production uses the
//! HTTP bridge in [`http`], tests inject an in-process fake.

pub mod http;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

pub use http::HttpProvider;

/// Well-known wallet error codes (EIP-1193 / EIP-1474 conventions).
pub mod codes {
    /// The user rejected the request.
    pub const USER_REJECTED: i64 = 4001;
    /// The requested chain has not been added to the wallet.
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    /// Contract execution reverted.
    pub const EXECUTION_REVERTED: i64 = 3;
    /// Generic transport failure (also used by nodes for misc errors).
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Error returned by the wallet transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("provider error {code}: {message}")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Transport-level failure (connection refused, timeout, bad payload).
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, message)
    }

    /// Whether the wallet reports the target chain as not yet registered.
    pub fn is_unrecognized_chain(&self) -> bool {
        self.code == codes::UNRECOGNIZED_CHAIN
    }
}

/// Notification pushed by the wallet outside the request/response cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The set of authorized accounts changed; empty means access was
    /// revoked entirely.
    AccountsChanged(Vec<String>),
    /// The wallet's active chain changed (hex chain id).
    ChainChanged(String),
}

/// Injected wallet transport.
///
/// `request` carries any JSON-RPC method the wallet understands
/// (`eth_requestAccounts`, `eth_sendTransaction`, `wallet_switchEthereumChain`,
/// ...). `subscribe` returns a fresh inbox that receives every subsequent
/// [`ProviderEvent`]; each subscriber gets its own channel.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent>;
}
