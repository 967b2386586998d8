use thiserror::Error;

use crate::provider::{codes, ProviderError};

/// Error taxonomy for wallet and ledger operations.
///
/// Every failure the session can surface is one of these variants; callers
/// match on them to decide whether to retry, resubmit, or give up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Web3Error {
    /// No wallet transport is present (nothing injected, no RPC endpoint).
    #[error("No wallet provider available")]
    ProviderUnavailable,

    /// The user declined the connection or signature request.
    #[error("Request rejected by user")]
    UserRejected,

    /// Another mutating operation is already in flight on this session.
    #[error("Another wallet operation is already in flight")]
    Busy,

    /// The session is not connected (or the ledger contract is unbound).
    #[error("Wallet not connected")]
    NotConnected,

    /// Transport or RPC failure talking to the provider.
    #[error("Network error: {0}")]
    Network(String),

    /// The ledger contract rejected the call.
    #[error("Ledger rejected the call: {0}")]
    Reverted(String),

    /// A read failed while reconstructing transaction history.
    #[error("Transaction history unavailable: {0}")]
    HistoryUnavailable(String),

    /// Amount validation failed before submission.
    #[error("Invalid amount: {0}")]
    Validation(String),
}

impl Web3Error {
    /// Whether the caller may simply retry the same call.
    ///
    /// Submission failures (`UserRejected`, `Reverted`) require an explicit
    /// resubmit by the user and are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Web3Error::Network(_) | Web3Error::ProviderUnavailable | Web3Error::HistoryUnavailable(_)
        )
    }
}

impl From<ProviderError> for Web3Error {
    fn from(err: ProviderError) -> Self {
        match err.code {
            codes::USER_REJECTED => Web3Error::UserRejected,
            codes::EXECUTION_REVERTED => Web3Error::Reverted(err.message),
            // Nodes are inconsistent about revert codes; fall back to the
            // message shape used by both geth and hardhat.
            _ if err.message.to_lowercase().contains("revert") => Web3Error::Reverted(err.message),
            _ => Web3Error::Network(format!("provider error {}: {}", err.code, err.message)),
        }
    }
}
