//! Session state machine.
//!
//! The [`Session`] owns everything the UI needs to know about the wallet:
//! connection status, active account and chain, and the cached wallet and
//! ledger balances. It is the single writer of that state; every other
//! component either reads snapshots or asks the session to mutate through
//! one of the operations here.
//!
//! Mutating operations (`connect`, `resume`, `disconnect`, `switch_network`,
//! `submit_deposit`, `submit_withdraw`) are mutually exclusive per session:
//! each takes an in-flight flag for its whole duration and a concurrent
//! caller fails with `Busy` instead of queueing. Read paths run freely
//! alongside an in-flight confirmation wait.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::Web3Config;
use crate::error::Web3Error;
use crate::history::{self, HistoryEntry};
use crate::ledger::{
    ContractStats, LedgerClient, TransferDirection, TransferFailure, TransferReceipt,
    TransferRequest, TransferStatus,
};
use crate::network::NetworkRegistry;
use crate::provider::Provider;
use crate::units::{from_quantity, Wei};

/// Connection lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Immutable view of the session state, published to subscribers on every
/// mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub account: Option<String>,
    pub chain_id: Option<String>,
    pub wallet_balance: Wei,
    pub ledger_balance: Wei,
}

/// State that only exists while connected. Holding account and chain here
/// makes "account/network are set iff Connected" true by construction.
struct ActiveSession {
    account: String,
    chain_id: String,
    wallet_balance: Wei,
    ledger_balance: Wei,
    /// Unbound when the contract is not deployed on the active network.
    ledger: Option<LedgerClient>,
}

enum ConnectionState {
    Disconnected,
    Connecting,
    Connected(ActiveSession),
}

impl ConnectionState {
    fn snapshot(&self) -> SessionSnapshot {
        match self {
            ConnectionState::Disconnected => SessionSnapshot {
                status: SessionStatus::Disconnected,
                account: None,
                chain_id: None,
                wallet_balance: 0,
                ledger_balance: 0,
            },
            ConnectionState::Connecting => SessionSnapshot {
                status: SessionStatus::Connecting,
                account: None,
                chain_id: None,
                wallet_balance: 0,
                ledger_balance: 0,
            },
            ConnectionState::Connected(active) => SessionSnapshot {
                status: SessionStatus::Connected,
                account: Some(active.account.clone()),
                chain_id: Some(active.chain_id.clone()),
                wallet_balance: active.wallet_balance,
                ledger_balance: active.ledger_balance,
            },
        }
    }
}

type Listener = Box<dyn Fn(&SessionSnapshot) + Send + Sync>;

struct Inner {
    provider: Option<Arc<dyn Provider>>,
    registry: NetworkRegistry,
    config: Web3Config,
    state: Mutex<ConnectionState>,
    in_flight: AtomicBool,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
}

/// Exclusive right to mutate the session; releasing is dropping.
pub(crate) struct OpGuard {
    inner: Arc<Inner>,
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        self.inner.in_flight.store(false, Ordering::Release);
    }
}

/// Handle returned by [`Session::subscribe`]; dropping it unsubscribes.
pub struct SubscriptionHandle {
    id: u64,
    inner: Weak<Inner>,
}

impl SubscriptionHandle {
    pub fn unsubscribe(self) {}
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .listeners
                .lock()
                .expect("listener list poisoned")
                .retain(|(id, _)| *id != self.id);
        }
    }
}

/// Shared handle to one wallet session. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn new(provider: Arc<dyn Provider>, config: Web3Config) -> Self {
        Self::build(Some(provider), config)
    }

    /// Session for an environment with no wallet transport at all; every
    /// connection attempt reports `ProviderUnavailable`.
    pub fn without_provider(config: Web3Config) -> Self {
        Self::build(None, config)
    }

    fn build(provider: Option<Arc<dyn Provider>>, config: Web3Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                provider,
                registry: NetworkRegistry,
                config,
                state: Mutex::new(ConnectionState::Disconnected),
                in_flight: AtomicBool::new(false),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(0),
            }),
        }
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock_state().snapshot()
    }

    /// Register a snapshot listener; every mutation publishes to it.
    pub fn subscribe(
        &self,
        listener: impl Fn(&SessionSnapshot) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .expect("listener list poisoned")
            .push((id, Box::new(listener)));
        SubscriptionHandle {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub(crate) fn provider(&self) -> Option<Arc<dyn Provider>> {
        self.inner.provider.clone()
    }

    // ------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------

    /// Connect through the wallet's account-access prompt.
    ///
    /// Valid from Disconnected; a no-op returning the current snapshot when
    /// already connected. On rejection or a missing provider the session
    /// reverts to Disconnected and the typed error is returned.
    pub async fn connect(&self) -> Result<SessionSnapshot, Web3Error> {
        let _guard = self.begin_mutation()?;
        if matches!(&*self.lock_state(), ConnectionState::Connected(_)) {
            return Ok(self.snapshot());
        }
        self.establish("eth_requestAccounts", false).await
    }

    /// Reconnect silently if the wallet already authorizes an account.
    ///
    /// Used at startup and after a chain-change reset; stays Disconnected
    /// without error when no account is authorized.
    pub async fn resume(&self) -> Result<SessionSnapshot, Web3Error> {
        let _guard = self.begin_mutation()?;
        if matches!(&*self.lock_state(), ConnectionState::Connected(_)) {
            return Ok(self.snapshot());
        }
        self.establish("eth_accounts", true).await
    }

    /// Drop the connection and all cached state. Idempotent.
    pub async fn disconnect(&self) -> Result<(), Web3Error> {
        let _guard = self.begin_mutation()?;
        self.clear_to_disconnected();
        Ok(())
    }

    /// Ask the wallet to switch its active network, registering the chain
    /// from the network table first if the wallet does not know it.
    ///
    /// The session itself is not mutated here: on success the wallet emits
    /// a chain-change notification and the event subscriber performs the
    /// hard reset; on failure the session is untouched.
    pub async fn switch_network(&self, target: &str) -> Result<(), Web3Error> {
        let _guard = self.begin_mutation()?;
        let provider = self.require_provider()?;
        let net = self
            .inner
            .registry
            .resolve(target)
            .ok_or_else(|| Web3Error::Network(format!("unknown network: {}", target)))?;

        let switch = json!([net.switch_chain_params()]);
        match provider.request("wallet_switchEthereumChain", switch.clone()).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_unrecognized_chain() => {
                log::info!("chain {} not registered in wallet, adding it", net.chain_id);
                provider
                    .request("wallet_addEthereumChain", json!([net.add_chain_params()]))
                    .await?;
                provider.request("wallet_switchEthereumChain", switch).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    // ------------------------------------------------------------------
    // Balances
    // ------------------------------------------------------------------

    /// Fetch the wallet native balance and the ledger-tracked balance.
    ///
    /// Read-only: runs without the in-flight flag, so the UI can refresh
    /// while a transfer awaits confirmation. Each side is fetched
    /// independently; a failure on either is returned but the side that
    /// succeeded is still applied and stale values are kept for the rest.
    pub async fn sync_balances(&self) -> Result<SessionSnapshot, Web3Error> {
        let (provider, account, ledger) = {
            match &*self.lock_state() {
                ConnectionState::Connected(active) => (
                    self.require_provider()?,
                    active.account.clone(),
                    active.ledger.clone(),
                ),
                _ => return Err(Web3Error::NotConnected),
            }
        };

        let wallet_result = self.fetch_wallet_balance(&provider, &account).await;
        let ledger_result = match &ledger {
            Some(client) => Some(client.balance_of(&account).await),
            None => None,
        };

        let mut first_error = None;
        {
            let mut state = self.lock_state();
            // The account may have changed while we were on the wire; a
            // write would then cache balances for the wrong account.
            if let ConnectionState::Connected(active) = &mut *state {
                if active.account == account {
                    match wallet_result {
                        Ok(balance) => active.wallet_balance = balance,
                        Err(e) => {
                            log::warn!("wallet balance sync failed: {}", e);
                            first_error.get_or_insert(e);
                        }
                    }
                    match ledger_result {
                        Some(Ok(balance)) => active.ledger_balance = balance,
                        Some(Err(e)) => {
                            log::warn!("ledger balance sync failed: {}", e);
                            first_error.get_or_insert(e);
                        }
                        None => {}
                    }
                }
            }
        }
        self.publish();

        match first_error {
            None => Ok(self.snapshot()),
            Some(e) => Err(e),
        }
    }

    async fn fetch_wallet_balance(
        &self,
        provider: &Arc<dyn Provider>,
        account: &str,
    ) -> Result<Wei, Web3Error> {
        let result = provider
            .request("eth_getBalance", json!([account, "latest"]))
            .await?;
        result
            .as_str()
            .ok_or_else(|| Web3Error::Network("eth_getBalance returned non-string".to_string()))
            .and_then(from_quantity)
    }

    // ------------------------------------------------------------------
    // Transfers
    // ------------------------------------------------------------------

    /// Move native funds into the ledger.
    ///
    /// Validates against the cached wallet balance before any provider
    /// call, submits, and returns a [`PendingTransfer`] whose receipt is
    /// `Submitted`. The in-flight flag stays held until the transfer is
    /// confirmed or the pending handle is dropped.
    pub async fn submit_deposit(&self, amount: Wei) -> Result<PendingTransfer, Web3Error> {
        self.submit(TransferRequest {
            direction: TransferDirection::Deposit,
            amount,
        })
        .await
    }

    /// Move ledger funds back to the wallet. Validates against the cached
    /// ledger balance; otherwise identical to [`Session::submit_deposit`].
    pub async fn submit_withdraw(&self, amount: Wei) -> Result<PendingTransfer, Web3Error> {
        self.submit(TransferRequest {
            direction: TransferDirection::Withdraw,
            amount,
        })
        .await
    }

    async fn submit(&self, request: TransferRequest) -> Result<PendingTransfer, Web3Error> {
        let guard = self.begin_mutation()?;

        let (ledger, available) = {
            match &*self.lock_state() {
                ConnectionState::Connected(active) => {
                    let ledger = active.ledger.clone().ok_or(Web3Error::NotConnected)?;
                    let available = match request.direction {
                        TransferDirection::Deposit => active.wallet_balance,
                        TransferDirection::Withdraw => active.ledger_balance,
                    };
                    (ledger, available)
                }
                _ => return Err(Web3Error::NotConnected),
            }
        };

        request.validate(available)?;

        let tx_hash = match request.direction {
            TransferDirection::Deposit => ledger.deposit(request.amount).await?,
            TransferDirection::Withdraw => ledger.withdraw(request.amount).await?,
        };
        log::info!(
            "{:?} of {} wei submitted as {}",
            request.direction,
            request.amount,
            tx_hash
        );

        Ok(PendingTransfer {
            session: self.clone(),
            ledger,
            receipt: TransferReceipt::submitted(tx_hash),
            _guard: guard,
        })
    }

    // ------------------------------------------------------------------
    // Reads delegated to ledger client / reconstructor
    // ------------------------------------------------------------------

    /// Reconstruct the active account's transfer history, newest first.
    pub async fn get_history(&self) -> Result<Vec<HistoryEntry>, Web3Error> {
        let (ledger, account) = self.require_ledger()?;
        history::reconstruct(&ledger, &account).await
    }

    /// Aggregate contract statistics. Informational only.
    pub async fn get_stats(&self) -> Result<ContractStats, Web3Error> {
        let (ledger, _) = self.require_ledger()?;
        ledger.stats().await
    }

    // ------------------------------------------------------------------
    // External change notifications (called by the event subscriber)
    // ------------------------------------------------------------------

    pub(crate) async fn handle_accounts_changed(
        &self,
        accounts: Vec<String>,
    ) -> Result<(), Web3Error> {
        if accounts.is_empty() {
            log::info!("wallet revoked account access, disconnecting");
            return self.disconnect().await;
        }
        if self.snapshot().account.as_deref() == Some(accounts[0].as_str()) {
            return Ok(());
        }
        log::info!("active account changed to {}, resynchronizing", accounts[0]);
        let _guard = self.begin_mutation()?;
        self.establish("eth_accounts", true).await.map(|_| ())
    }

    pub(crate) async fn handle_chain_changed(&self, chain_id: String) -> Result<(), Web3Error> {
        log::info!("chain changed to {}, resetting session", chain_id);
        let _guard = self.begin_mutation()?;
        // Hard reset: the old contract binding must never execute against
        // the new network.
        self.clear_to_disconnected();
        self.establish("eth_accounts", true).await.map(|_| ())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Derive a fresh connected state from the wallet. Caller holds the
    /// in-flight guard.
    ///
    /// `silent` distinguishes `eth_accounts`-style resumption (no account
    /// means "stay disconnected, not an error") from an explicit connect
    /// (no account means the request was effectively rejected).
    async fn establish(&self, method: &str, silent: bool) -> Result<SessionSnapshot, Web3Error> {
        let provider = match self.require_provider() {
            Ok(p) => p,
            Err(e) => {
                self.clear_to_disconnected();
                return Err(e);
            }
        };

        self.set_state(ConnectionState::Connecting);

        let result = self.derive_active(&provider, method, silent).await;
        match result {
            Ok(Some(active)) => {
                log::info!(
                    "connected: account={} chain={}",
                    active.account,
                    active.chain_id
                );
                self.set_state(ConnectionState::Connected(active));
                // Eager first sync; a failure here only leaves zeros that a
                // manual refresh can fill in.
                if let Err(e) = self.sync_balances().await {
                    log::warn!("initial balance sync failed: {}", e);
                }
                Ok(self.snapshot())
            }
            Ok(None) => {
                self.set_state(ConnectionState::Disconnected);
                Ok(self.snapshot())
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn derive_active(
        &self,
        provider: &Arc<dyn Provider>,
        method: &str,
        silent: bool,
    ) -> Result<Option<ActiveSession>, Web3Error> {
        let accounts = provider.request(method, json!([])).await?;
        let account = match Self::first_account(&accounts) {
            Some(account) => account,
            None if silent => return Ok(None),
            None => return Err(Web3Error::UserRejected),
        };

        let chain_id = provider
            .request("eth_chainId", json!([]))
            .await?
            .as_str()
            .map(str::to_lowercase)
            .ok_or_else(|| Web3Error::Network("eth_chainId returned non-string".to_string()))?;

        let ledger = self.bind_ledger(provider, &chain_id, &account);

        Ok(Some(ActiveSession {
            account,
            chain_id,
            wallet_balance: 0,
            ledger_balance: 0,
            ledger,
        }))
    }

    fn first_account(result: &Value) -> Option<String> {
        result
            .as_array()?
            .first()?
            .as_str()
            .map(str::to_string)
    }

    fn bind_ledger(
        &self,
        provider: &Arc<dyn Provider>,
        chain_id: &str,
        account: &str,
    ) -> Option<LedgerClient> {
        let config = &self.inner.config;
        let slug = self.inner.registry.by_chain_id(chain_id).map(|n| n.id);
        let contract = slug
            .and_then(|slug| config.contract_for(slug))
            .or_else(|| config.contract_for(&config.default_network));

        match contract {
            Some(address) => Some(LedgerClient::bind(
                provider.clone(),
                address,
                account,
                Duration::from_millis(config.confirm_poll_ms),
            )),
            None => {
                log::warn!("SmartBank contract not deployed on chain {}", chain_id);
                None
            }
        }
    }

    fn require_provider(&self) -> Result<Arc<dyn Provider>, Web3Error> {
        self.inner.provider.clone().ok_or(Web3Error::ProviderUnavailable)
    }

    fn require_ledger(&self) -> Result<(LedgerClient, String), Web3Error> {
        match &*self.lock_state() {
            ConnectionState::Connected(active) => {
                let ledger = active.ledger.clone().ok_or(Web3Error::NotConnected)?;
                Ok((ledger, active.account.clone()))
            }
            _ => Err(Web3Error::NotConnected),
        }
    }

    fn begin_mutation(&self) -> Result<OpGuard, Web3Error> {
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Web3Error::Busy);
        }
        Ok(OpGuard {
            inner: self.inner.clone(),
        })
    }

    fn clear_to_disconnected(&self) {
        let was_connected = {
            let mut state = self.lock_state();
            let changed = !matches!(*state, ConnectionState::Disconnected);
            *state = ConnectionState::Disconnected;
            changed
        };
        if was_connected {
            log::info!("session disconnected");
            self.publish();
        }
    }

    fn set_state(&self, next: ConnectionState) {
        *self.lock_state() = next;
        self.publish();
    }

    fn lock_state(&self) -> MutexGuard<'_, ConnectionState> {
        self.inner.state.lock().expect("session state poisoned")
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        let listeners = self.inner.listeners.lock().expect("listener list poisoned");
        for (_, listener) in listeners.iter() {
            listener(&snapshot);
        }
    }
}

/// A submitted, not yet finalized transfer.
///
/// Holds the session's in-flight flag: no other mutating operation can run
/// until this is confirmed or dropped. Dropping releases the flag but does
/// not recall the transaction — it is already on the wire.
pub struct PendingTransfer {
    session: Session,
    ledger: LedgerClient,
    receipt: TransferReceipt,
    _guard: OpGuard,
}

impl std::fmt::Debug for PendingTransfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTransfer")
            .field("receipt", &self.receipt)
            .finish_non_exhaustive()
    }
}

impl PendingTransfer {
    /// The receipt as of submission (`Submitted`).
    pub fn receipt(&self) -> &TransferReceipt {
        &self.receipt
    }

    pub fn transaction_id(&self) -> &str {
        &self.receipt.transaction_id
    }

    /// Wait for the chain to finalize the transfer.
    ///
    /// Resolves the receipt to `Confirmed` (triggering a balance re-sync —
    /// balances are never mutated speculatively) or `Failed` with a typed
    /// reason. Never auto-retries.
    pub async fn confirm(self) -> TransferReceipt {
        let PendingTransfer {
            session,
            ledger,
            mut receipt,
            _guard: guard,
        } = self;

        match ledger.wait_for_receipt(&receipt.transaction_id).await {
            Ok(mined) if mined.success => {
                log::info!(
                    "transfer {} confirmed in block {}",
                    receipt.transaction_id,
                    mined.block_number
                );
                receipt.status = TransferStatus::Confirmed;
                receipt.confirmed_block = Some(mined.block_number);
                drop(guard);
                if let Err(e) = session.sync_balances().await {
                    log::warn!("post-confirmation balance sync failed: {}", e);
                }
            }
            Ok(mined) => {
                log::warn!(
                    "transfer {} reverted in block {}",
                    receipt.transaction_id,
                    mined.block_number
                );
                receipt.status = TransferStatus::Failed(TransferFailure::Reverted);
            }
            Err(Web3Error::Reverted(reason)) => {
                log::warn!("transfer {} reverted: {}", receipt.transaction_id, reason);
                receipt.status = TransferStatus::Failed(TransferFailure::Reverted);
            }
            Err(e) => {
                log::warn!(
                    "confirmation wait for {} failed: {}",
                    receipt.transaction_id,
                    e
                );
                receipt.status = TransferStatus::Failed(TransferFailure::NetworkError);
            }
        }
        receipt
    }
}
