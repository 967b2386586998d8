//! SmartBank Web3: wallet session and ledger client
//!
//! Boundary layer between the SmartBank banking UI and the outside world:
//! the user's wallet provider and the SmartBank ledger contract. The UI
//! renders snapshots; everything asynchronous, partially observable or
//! failure-prone lives here.
//!
//! # Architecture
//!
//! - **Session**: single owner of connection status, active
//!   account/network and cached balances; publishes snapshots to
//!   subscribers and serializes mutating operations.
//! - **Ledger client**: per-(network, account) binding to the contract;
//!   submits deposits/withdrawals and waits for confirmation.
//! - **Provider**: injected wallet transport capability, satisfied by the
//!   HTTP JSON-RPC bridge in production and a fake in tests.
//! - **Event subscriber**: reacts to wallet-side account/network changes.
//!
//! # Example
//!
//! ```ignore
//! use smartbank_web3::{events, HttpProvider, Session, Web3Config};
//! use std::sync::Arc;
//!
//! let config = Web3Config::from_env();
//! let provider = Arc::new(HttpProvider::new("http://127.0.0.1:8545"));
//! let session = Session::new(provider, config);
//!
//! let _events = events::spawn(&session);
//! let snapshot = session.connect().await?;
//! println!("connected as {:?}", snapshot.account);
//!
//! let pending = session.submit_deposit(smartbank_web3::units::parse_ether("0.4")?).await?;
//! let receipt = pending.confirm().await;
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod ledger;
pub mod network;
pub mod provider;
pub mod session;
pub mod units;

pub use config::Web3Config;
pub use error::Web3Error;
pub use events::EventSubscriber;
pub use history::HistoryEntry;
pub use ledger::{
    ContractStats, LedgerClient, TransferDirection, TransferFailure, TransferReceipt,
    TransferRequest, TransferStatus,
};
pub use network::{NetworkDescriptor, NetworkRegistry};
pub use provider::{HttpProvider, Provider, ProviderError, ProviderEvent};
pub use session::{PendingTransfer, Session, SessionSnapshot, SessionStatus, SubscriptionHandle};
pub use units::Wei;
