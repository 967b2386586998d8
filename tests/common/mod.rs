//! Common test utilities for wallet session integration tests
//!
//! Provides an in-process fake wallet provider backed by a small fake chain
//! carrying the SmartBank contract: deterministic mining, flat gas cost and
//! failure injection (user rejection, transport failure, forced revert,
//! fail-after-N-calls countdown). Tests drive the real session/ledger code
//! against it, the same way the wallet service tests drive a mock chain
//! backend.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use smartbank_web3::ledger::abi;
use smartbank_web3::provider::{codes, Provider, ProviderError, ProviderEvent};
use smartbank_web3::units::{from_quantity, to_quantity, Wei, WEI_PER_ETHER};
use smartbank_web3::{Session, Web3Config};

/// Default funded account.
pub const ACCOUNT_A: &str = "0x00000000000000000000000000000000000000a1";
/// Second account for switch scenarios.
pub const ACCOUNT_B: &str = "0x00000000000000000000000000000000000000b2";
/// SmartBank contract address on the fake chain.
pub const CONTRACT: &str = "0x00000000000000000000000000000000000000cc";
/// Sepolia chain id, the fake chain's default identity.
pub const SEPOLIA: &str = "0xaa36a7";

/// Flat per-transaction gas charge on the fake chain (0.0001 ether).
pub const GAS_COST: Wei = WEI_PER_ETHER / 10_000;

pub fn init() {
    dotenv::dotenv().ok();
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Config pointing the session at the fake chain's contract.
pub fn test_config() -> Web3Config {
    let mut config = Web3Config::default();
    config
        .contract_addresses
        .insert("sepolia".to_string(), CONTRACT.to_string());
    config.confirm_poll_ms = 5;
    config
}

/// Session wired to a fake provider.
pub fn test_session(provider: &Arc<MockProvider>) -> Session {
    let transport: Arc<dyn Provider> = provider.clone();
    Session::new(transport, test_config())
}

#[derive(Debug, Clone, Copy)]
struct BankRecord {
    is_deposit: bool,
    amount: Wei,
    timestamp: u64,
    block_number: u64,
}

struct ChainState {
    authorized: Vec<String>,
    chain_id: String,
    added_chains: HashSet<String>,
    wallet_balances: HashMap<String, Wei>,
    bank_balances: HashMap<String, Wei>,
    records: HashMap<String, Vec<BankRecord>>,
    total_deposits: Wei,
    total_withdrawals: Wei,
    users: HashSet<String>,
    block_number: u64,
    next_timestamp: u64,
    receipts: HashMap<String, (u64, bool)>,
    // failure injection
    reject_next: bool,
    revert_next: bool,
    fail_transport: bool,
    fail_after: Option<u64>,
    signing_delay: Option<Duration>,
    request_count: u64,
}

impl ChainState {
    fn new() -> Self {
        let mut added = HashSet::new();
        added.insert(SEPOLIA.to_string());
        Self {
            authorized: vec![ACCOUNT_A.to_string()],
            chain_id: SEPOLIA.to_string(),
            added_chains: added,
            wallet_balances: HashMap::from([(ACCOUNT_A.to_string(), 10 * WEI_PER_ETHER)]),
            bank_balances: HashMap::new(),
            records: HashMap::new(),
            total_deposits: 0,
            total_withdrawals: 0,
            users: HashSet::new(),
            block_number: 100,
            next_timestamp: 1_700_000_000,
            receipts: HashMap::new(),
            reject_next: false,
            revert_next: false,
            fail_transport: false,
            fail_after: None,
            signing_delay: None,
            request_count: 0,
        }
    }

    fn mine(&mut self) -> (u64, u64) {
        self.block_number += 1;
        self.next_timestamp += 12;
        (self.block_number, self.next_timestamp)
    }
}

/// In-process fake of the injected wallet transport.
pub struct MockProvider {
    state: Mutex<ChainState>,
    senders: Mutex<Vec<mpsc::UnboundedSender<ProviderEvent>>>,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ChainState::new()),
            senders: Mutex::new(Vec::new()),
        })
    }

    // -- test setup ----------------------------------------------------

    pub fn set_wallet_balance(&self, account: &str, wei: Wei) {
        self.lock().wallet_balances.insert(account.to_string(), wei);
    }

    pub fn set_authorized(&self, accounts: &[&str]) {
        self.lock().authorized = accounts.iter().map(|a| a.to_string()).collect();
    }

    /// Append a ledger record directly, bypassing the transaction path.
    pub fn seed_record(&self, account: &str, is_deposit: bool, amount: Wei) {
        let mut state = self.lock();
        let (block, timestamp) = state.mine();
        state
            .records
            .entry(account.to_string())
            .or_default()
            .push(BankRecord {
                is_deposit,
                amount,
                timestamp,
                block_number: block,
            });
        let balance = state.bank_balances.entry(account.to_string()).or_insert(0);
        if is_deposit {
            *balance += amount;
        } else {
            *balance -= amount.min(*balance);
        }
    }

    // -- failure injection ---------------------------------------------

    /// Decline the next signing request (connection prompt or transaction).
    pub fn reject_next_request(&self) {
        self.lock().reject_next = true;
    }

    /// Mine the next transaction with a reverted status.
    pub fn revert_next_transaction(&self) {
        self.lock().revert_next = true;
    }

    pub fn set_transport_failing(&self, failing: bool) {
        self.lock().fail_transport = failing;
    }

    /// Let the next `n` requests succeed, then fail every request until
    /// cleared with `set_transport_failing(false)`.
    pub fn fail_after(&self, n: u64) {
        self.lock().fail_after = Some(n);
    }

    /// Slow down signing requests so tests can race a second operation.
    pub fn set_signing_delay(&self, delay: Duration) {
        self.lock().signing_delay = Some(delay);
    }

    // -- inspection ----------------------------------------------------

    pub fn request_count(&self) -> u64 {
        self.lock().request_count
    }

    pub fn wallet_balance(&self, account: &str) -> Wei {
        *self.lock().wallet_balances.get(account).unwrap_or(&0)
    }

    pub fn bank_balance(&self, account: &str) -> Wei {
        *self.lock().bank_balances.get(account).unwrap_or(&0)
    }

    // -- wallet-side notifications -------------------------------------

    pub fn emit_accounts_changed(&self, accounts: &[&str]) {
        let event = ProviderEvent::AccountsChanged(accounts.iter().map(|a| a.to_string()).collect());
        self.emit(event);
    }

    pub fn emit_chain_changed(&self, chain_id: &str) {
        self.emit(ProviderEvent::ChainChanged(chain_id.to_string()));
    }

    fn emit(&self, event: ProviderEvent) {
        let senders = self.senders.lock().expect("sender list poisoned");
        for sender in senders.iter() {
            let _ = sender.send(event.clone());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().expect("chain state poisoned")
    }

    // -- request dispatch ----------------------------------------------

    fn handle_send_transaction(&self, params: &Value) -> Result<Value, ProviderError> {
        let tx = &params[0];
        let from = tx["from"].as_str().unwrap_or_default().to_lowercase();
        let data = tx["data"].as_str().unwrap_or_default();
        let value = tx["value"]
            .as_str()
            .map(|v| from_quantity(v).expect("bad tx value"))
            .unwrap_or(0);

        let mut state = self.lock();
        let revert = std::mem::take(&mut state.revert_next);

        let hash = format!(
            "0x{:032x}{:032x}",
            rand::random::<u128>(),
            rand::random::<u128>()
        );

        if selector_matches(data, "deposit()") {
            let wallet = state.wallet_balances.entry(from.clone()).or_insert(0);
            if *wallet < value + GAS_COST {
                return Err(ProviderError::new(
                    -32000,
                    "insufficient funds for gas * price + value",
                ));
            }
            if revert {
                *wallet -= GAS_COST;
                let (block, _) = state.mine();
                state.receipts.insert(hash.clone(), (block, false));
                return Ok(Value::String(hash));
            }
            *wallet -= value + GAS_COST;
            let (block, timestamp) = state.mine();
            state
                .records
                .entry(from.clone())
                .or_default()
                .push(BankRecord {
                    is_deposit: true,
                    amount: value,
                    timestamp,
                    block_number: block,
                });
            *state.bank_balances.entry(from.clone()).or_insert(0) += value;
            state.total_deposits += value;
            state.users.insert(from);
            state.receipts.insert(hash.clone(), (block, true));
            return Ok(Value::String(hash));
        }

        if selector_matches(data, "withdraw(uint256)") {
            let amount = arg_wei(data, 0);
            let bank = *state.bank_balances.get(&from).unwrap_or(&0);
            let wallet = state.wallet_balances.entry(from.clone()).or_insert(0);
            if *wallet < GAS_COST {
                return Err(ProviderError::new(-32000, "insufficient funds for gas"));
            }
            if revert || bank < amount {
                // The contract rejects; the transaction still mines, burning gas.
                *wallet -= GAS_COST;
                let (block, _) = state.mine();
                state.receipts.insert(hash.clone(), (block, false));
                return Ok(Value::String(hash));
            }
            *wallet += amount;
            *wallet -= GAS_COST;
            let (block, timestamp) = state.mine();
            state
                .records
                .entry(from.clone())
                .or_default()
                .push(BankRecord {
                    is_deposit: false,
                    amount,
                    timestamp,
                    block_number: block,
                });
            *state.bank_balances.entry(from.clone()).or_insert(0) -= amount;
            state.total_withdrawals += amount;
            state.receipts.insert(hash.clone(), (block, true));
            return Ok(Value::String(hash));
        }

        Err(ProviderError::new(-32601, format!("unknown calldata: {}", data)))
    }

    fn handle_call(&self, params: &Value) -> Result<Value, ProviderError> {
        let data = params[0]["data"].as_str().unwrap_or_default();
        let state = self.lock();

        if selector_matches(data, "getBalance(address)") {
            let account = arg_address(data, 0);
            let balance = *state.bank_balances.get(&account).unwrap_or(&0);
            return Ok(Value::String(words(&[balance])));
        }
        if selector_matches(data, "getTransactionCount(address)") {
            let account = arg_address(data, 0);
            let count = state.records.get(&account).map_or(0, Vec::len) as Wei;
            return Ok(Value::String(words(&[count])));
        }
        if selector_matches(data, "getTransaction(address,uint256)") {
            let account = arg_address(data, 0);
            let index = arg_wei(data, 1) as usize;
            let record = state
                .records
                .get(&account)
                .and_then(|records| records.get(index))
                .ok_or_else(|| {
                    ProviderError::new(codes::EXECUTION_REVERTED, "execution reverted: Invalid index")
                })?;
            return Ok(Value::String(words(&[
                record.is_deposit as Wei,
                record.amount,
                record.timestamp as Wei,
                record.block_number as Wei,
            ])));
        }
        if selector_matches(data, "getContractStats()") {
            let held: Wei = state.bank_balances.values().sum();
            return Ok(Value::String(words(&[
                state.total_deposits,
                state.total_withdrawals,
                state.users.len() as Wei,
                held,
            ])));
        }

        Err(ProviderError::new(-32601, format!("unknown calldata: {}", data)))
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let delay = {
            let mut state = self.lock();
            state.request_count += 1;

            if state.fail_transport {
                return Err(ProviderError::transport("connection refused"));
            }
            if let Some(remaining) = state.fail_after.as_mut() {
                if *remaining == 0 {
                    state.fail_transport = true;
                    state.fail_after = None;
                    return Err(ProviderError::transport("connection reset"));
                }
                *remaining -= 1;
            }

            match method {
                "eth_requestAccounts" | "eth_sendTransaction" => {
                    if std::mem::take(&mut state.reject_next) {
                        return Err(ProviderError::new(
                            codes::USER_REJECTED,
                            "User rejected the request",
                        ));
                    }
                    state.signing_delay
                }
                _ => None,
            }
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match method {
            "eth_requestAccounts" | "eth_accounts" => {
                Ok(json!(self.lock().authorized.clone()))
            }
            "eth_chainId" => Ok(Value::String(self.lock().chain_id.clone())),
            "eth_getBalance" => {
                let account = params[0].as_str().unwrap_or_default().to_lowercase();
                let balance = *self.lock().wallet_balances.get(&account).unwrap_or(&0);
                Ok(Value::String(to_quantity(balance)))
            }
            "eth_sendTransaction" => self.handle_send_transaction(&params),
            "eth_getTransactionReceipt" => {
                let hash = params[0].as_str().unwrap_or_default();
                match self.lock().receipts.get(hash) {
                    Some((block, success)) => Ok(json!({
                        "status": if *success { "0x1" } else { "0x0" },
                        "blockNumber": to_quantity(*block as Wei),
                    })),
                    None => Ok(Value::Null),
                }
            }
            "eth_call" => self.handle_call(&params),
            "wallet_switchEthereumChain" => {
                let target = params[0]["chainId"].as_str().unwrap_or_default().to_lowercase();
                let known = self.lock().added_chains.contains(&target);
                if !known {
                    return Err(ProviderError::new(
                        codes::UNRECOGNIZED_CHAIN,
                        "Unrecognized chain ID",
                    ));
                }
                self.lock().chain_id = target.clone();
                self.emit(ProviderEvent::ChainChanged(target));
                Ok(Value::Null)
            }
            "wallet_addEthereumChain" => {
                let chain = params[0]["chainId"].as_str().unwrap_or_default().to_lowercase();
                self.lock().added_chains.insert(chain);
                Ok(Value::Null)
            }
            other => Err(ProviderError::new(-32601, format!("method not found: {}", other))),
        }
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProviderEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().expect("sender list poisoned").push(tx);
        rx
    }
}

// -- calldata helpers --------------------------------------------------

fn selector_matches(data: &str, signature: &str) -> bool {
    data.len() >= 10 && data[2..10] == hex::encode(abi::selector(signature))
}

fn arg_word(data: &str, index: usize) -> &str {
    let start = 10 + index * 64;
    &data[start..start + 64]
}

fn arg_address(data: &str, index: usize) -> String {
    format!("0x{}", &arg_word(data, index)[24..]).to_lowercase()
}

fn arg_wei(data: &str, index: usize) -> Wei {
    Wei::from_str_radix(arg_word(data, index), 16).expect("bad uint word")
}

fn words(values: &[Wei]) -> String {
    let mut out = String::with_capacity(2 + values.len() * 64);
    out.push_str("0x");
    for value in values {
        out.push_str(&format!("{:064x}", value));
    }
    out
}
