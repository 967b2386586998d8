//! SmartBank ledger contract client.
//!
//! One [`LedgerClient`] is bound per (network, account) pair and rebound by
//! the session whenever either changes. It owns the wire-level concerns:
//! ABI encoding, transaction submission and the confirmation wait. Business
//! rules live in the contract itself; rejections come back as typed
//! `Reverted` errors.

pub mod abi;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Web3Error;
use crate::provider::Provider;
use crate::units::{from_quantity, from_quantity_u64, to_quantity, Wei};

use abi::AbiValue;

/// Direction of a value transfer between wallet and ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDirection {
    Deposit,
    Withdraw,
}

/// A transfer the UI asked for, validated before submission and never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    pub direction: TransferDirection,
    pub amount: Wei,
}

impl TransferRequest {
    /// Fail-fast validation against the caller's available balance.
    pub fn validate(&self, available: Wei) -> Result<(), Web3Error> {
        if self.amount == 0 {
            return Err(Web3Error::Validation("amount must be positive".to_string()));
        }
        if self.amount > available {
            let side = match self.direction {
                TransferDirection::Deposit => "wallet",
                TransferDirection::Withdraw => "ledger",
            };
            return Err(Web3Error::Validation(format!(
                "amount exceeds {} balance ({} > {})",
                side, self.amount, available
            )));
        }
        Ok(())
    }
}

/// Why a submitted transfer ended up `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferFailure {
    UserRejected,
    Reverted,
    NetworkError,
}

/// Lifecycle state of a submitted transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    Submitted,
    Confirmed,
    Failed(TransferFailure),
}

/// Outcome handed to the UI for one submitted transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transaction_id: String,
    pub confirmed_block: Option<u64>,
    pub status: TransferStatus,
}

impl TransferReceipt {
    pub(crate) fn submitted(transaction_id: String) -> Self {
        Self {
            transaction_id,
            confirmed_block: None,
            status: TransferStatus::Submitted,
        }
    }
}

/// One record from the contract's per-account transfer store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerRecord {
    pub is_deposit: bool,
    pub amount: Wei,
    pub timestamp: u64,
    pub block_number: u64,
}

/// Aggregate contract statistics, informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractStats {
    pub total_deposits: Wei,
    pub total_withdrawals: Wei,
    pub total_users: u64,
    pub contract_balance: Wei,
}

/// Inclusion outcome reported by the chain for a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinedReceipt {
    pub block_number: u64,
    pub success: bool,
}

/// Contract binding for one (network, account) pair.
#[derive(Clone)]
pub struct LedgerClient {
    provider: Arc<dyn Provider>,
    contract: String,
    account: String,
    poll_interval: Duration,
}

impl LedgerClient {
    pub fn bind(
        provider: Arc<dyn Provider>,
        contract: impl Into<String>,
        account: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        let contract = contract.into();
        let account = account.into();
        log::debug!("ledger client bound: contract={} account={}", contract, account);
        Self {
            provider,
            contract,
            account,
            poll_interval,
        }
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Submit a value-bearing `deposit()` transaction; returns the tx hash.
    pub async fn deposit(&self, amount: Wei) -> Result<String, Web3Error> {
        let data = abi::encode_call("deposit()", &[])?;
        self.send_transaction(Some(amount), data).await
    }

    /// Submit a `withdraw(uint256)` transaction; returns the tx hash.
    pub async fn withdraw(&self, amount: Wei) -> Result<String, Web3Error> {
        let data = abi::encode_call("withdraw(uint256)", &[AbiValue::Uint(amount)])?;
        self.send_transaction(None, data).await
    }

    /// Ledger-tracked balance for an account. Pure read.
    pub async fn balance_of(&self, account: &str) -> Result<Wei, Web3Error> {
        let data = abi::encode_call("getBalance(address)", &[AbiValue::Address(account.to_string())])?;
        let words = self.call(data).await?;
        Self::single_word(&words).and_then(|word| abi::word_to_wei(&word))
    }

    /// Number of recorded transfers for an account. Pure read.
    pub async fn transaction_count(&self, account: &str) -> Result<u64, Web3Error> {
        let data = abi::encode_call(
            "getTransactionCount(address)",
            &[AbiValue::Address(account.to_string())],
        )?;
        let words = self.call(data).await?;
        Self::single_word(&words).and_then(|word| abi::word_to_u64(&word))
    }

    /// Recorded transfer by ascending index. Pure read.
    pub async fn transaction_at(&self, account: &str, index: u64) -> Result<LedgerRecord, Web3Error> {
        let data = abi::encode_call(
            "getTransaction(address,uint256)",
            &[
                AbiValue::Address(account.to_string()),
                AbiValue::Uint(index as Wei),
            ],
        )?;
        let words = self.call(data).await?;
        if words.len() != 4 {
            return Err(Web3Error::Network(format!(
                "getTransaction returned {} words, expected 4",
                words.len()
            )));
        }
        Ok(LedgerRecord {
            is_deposit: abi::word_to_bool(&words[0])?,
            amount: abi::word_to_wei(&words[1])?,
            timestamp: abi::word_to_u64(&words[2])?,
            block_number: abi::word_to_u64(&words[3])?,
        })
    }

    /// Aggregate contract statistics. Pure read.
    pub async fn stats(&self) -> Result<ContractStats, Web3Error> {
        let data = abi::encode_call("getContractStats()", &[])?;
        let words = self.call(data).await?;
        if words.len() != 4 {
            return Err(Web3Error::Network(format!(
                "getContractStats returned {} words, expected 4",
                words.len()
            )));
        }
        Ok(ContractStats {
            total_deposits: abi::word_to_wei(&words[0])?,
            total_withdrawals: abi::word_to_wei(&words[1])?,
            total_users: abi::word_to_u64(&words[2])?,
            contract_balance: abi::word_to_wei(&words[3])?,
        })
    }

    /// Poll until the chain reports the transaction mined or errors.
    ///
    /// No timeout is imposed here: user-facing confirmation can take as
    /// long as the chain takes, and the caller owns cancellation by
    /// dropping the future.
    pub async fn wait_for_receipt(&self, tx_hash: &str) -> Result<MinedReceipt, Web3Error> {
        loop {
            let result = self
                .provider
                .request("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;

            if result.is_null() {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            let status = result
                .get("status")
                .and_then(Value::as_str)
                .ok_or_else(|| Web3Error::Network("receipt missing status".to_string()))?;
            let block_number = result
                .get("blockNumber")
                .and_then(Value::as_str)
                .ok_or_else(|| Web3Error::Network("receipt missing blockNumber".to_string()))
                .and_then(from_quantity_u64)?;

            log::debug!("tx {} mined in block {} (status {})", tx_hash, block_number, status);
            return Ok(MinedReceipt {
                block_number,
                success: from_quantity(status)? == 1,
            });
        }
    }

    async fn send_transaction(&self, value: Option<Wei>, data: String) -> Result<String, Web3Error> {
        let mut tx = json!({
            "from": self.account,
            "to": self.contract,
            "data": data,
        });
        if let Some(value) = value {
            tx["value"] = Value::String(to_quantity(value));
        }

        let result = self.provider.request("eth_sendTransaction", json!([tx])).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Web3Error::Network("eth_sendTransaction returned no hash".to_string()))
    }

    async fn call(&self, data: String) -> Result<Vec<[u8; 32]>, Web3Error> {
        let params = json!([{ "to": self.contract, "data": data }, "latest"]);
        let result = self.provider.request("eth_call", params).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| Web3Error::Network("eth_call returned non-string data".to_string()))?;
        abi::decode_words(raw)
    }

    fn single_word(words: &[[u8; 32]]) -> Result<[u8; 32], Web3Error> {
        match words {
            [word] => Ok(*word),
            other => Err(Web3Error::Network(format!(
                "expected single return word, got {}",
                other.len()
            ))),
        }
    }
}
