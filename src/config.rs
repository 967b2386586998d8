/// Session configuration from environment variables
///
/// Controls the default network, the SmartBank contract address per network
/// and the confirmation poll cadence.
use std::collections::HashMap;
use std::env;

/// Address used as the "not deployed yet" placeholder.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// First contract address a fresh Hardhat node deploys to.
const HARDHAT_DEFAULT_CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

#[derive(Clone, Debug)]
pub struct Web3Config {
    /// Registry slug of the network the UI targets by default.
    pub default_network: String,
    /// SmartBank contract address per network slug.
    pub contract_addresses: HashMap<String, String>,
    /// RPC endpoint for the HTTP provider bridge, when one is used.
    pub rpc_url: Option<String>,
    /// Milliseconds between `eth_getTransactionReceipt` polls.
    pub confirm_poll_ms: u64,
}

impl Web3Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `SMARTBANK_NETWORK`: "sepolia" (default) or "hardhat"
    /// - `SMARTBANK_CONTRACT_ADDRESS`: contract address on the default network
    /// - `SMARTBANK_RPC_URL`: JSON-RPC endpoint for the HTTP bridge (optional)
    /// - `SMARTBANK_CONFIRM_POLL_MS`: receipt poll interval (default 1000)
    pub fn from_env() -> Self {
        let default_network = env::var("SMARTBANK_NETWORK")
            .unwrap_or_else(|_| "sepolia".to_string())
            .to_lowercase();
        log::info!("Target network: {}", default_network);

        let mut contract_addresses = Self::default_addresses();
        if let Ok(address) = env::var("SMARTBANK_CONTRACT_ADDRESS") {
            log::info!("Contract address override: {}", address);
            contract_addresses.insert(default_network.clone(), address);
        }

        let rpc_url = env::var("SMARTBANK_RPC_URL").ok();
        if let Some(ref url) = rpc_url {
            log::info!("RPC bridge URL: {}", url);
        }

        let confirm_poll_ms = env::var("SMARTBANK_CONFIRM_POLL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1_000);

        Self {
            default_network,
            contract_addresses,
            rpc_url,
            confirm_poll_ms,
        }
    }

    fn default_addresses() -> HashMap<String, String> {
        let mut addresses = HashMap::new();
        // Update after deployment; the zero address keeps the ledger unbound.
        addresses.insert("sepolia".to_string(), ZERO_ADDRESS.to_string());
        addresses.insert("hardhat".to_string(), HARDHAT_DEFAULT_CONTRACT.to_string());
        addresses
    }

    /// Contract address for a network slug, if deployed there.
    ///
    /// The zero-address placeholder counts as "not deployed".
    pub fn contract_for(&self, network: &str) -> Option<&str> {
        match self.contract_addresses.get(network) {
            Some(addr) if !addr.eq_ignore_ascii_case(ZERO_ADDRESS) => Some(addr.as_str()),
            _ => None,
        }
    }
}

impl Default for Web3Config {
    /// Default configuration (Sepolia, 1s receipt polling)
    fn default() -> Self {
        Self {
            default_network: "sepolia".to_string(),
            contract_addresses: Self::default_addresses(),
            rpc_url: None,
            confirm_poll_ms: 1_000,
        }
    }
}
