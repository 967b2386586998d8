//! Supported network registry.
//!
//! A static table of the networks the SmartBank contract is deployed to,
//! with everything needed to build wallet add/switch requests.

use serde_json::{json, Value};

/// Native asset denomination of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeUnit {
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
}

/// Connection parameters for one supported network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDescriptor {
    /// Registry slug ("sepolia").
    pub id: &'static str,
    /// Hex chain id as the wallet reports it ("0xaa36a7").
    pub chain_id: &'static str,
    pub display_name: &'static str,
    /// RPC endpoints in preference order.
    pub rpc_endpoints: &'static [&'static str],
    pub native_unit: NativeUnit,
    pub block_explorers: &'static [&'static str],
}

impl NetworkDescriptor {
    /// Build the `wallet_addEthereumChain` parameter object for this network.
    pub fn add_chain_params(&self) -> Value {
        json!({
            "chainId": self.chain_id,
            "chainName": self.display_name,
            "nativeCurrency": {
                "name": self.native_unit.name,
                "symbol": self.native_unit.symbol,
                "decimals": self.native_unit.decimals,
            },
            "rpcUrls": self.rpc_endpoints,
            "blockExplorerUrls": self.block_explorers,
        })
    }

    /// Build the `wallet_switchEthereumChain` parameter object.
    pub fn switch_chain_params(&self) -> Value {
        json!({ "chainId": self.chain_id })
    }
}

static NETWORKS: &[NetworkDescriptor] = &[
    NetworkDescriptor {
        id: "sepolia",
        chain_id: "0xaa36a7",
        display_name: "Sepolia Test Network",
        rpc_endpoints: &["https://rpc.sepolia.org"],
        native_unit: NativeUnit {
            name: "Sepolia ETH",
            symbol: "SEP",
            decimals: 18,
        },
        block_explorers: &["https://sepolia.etherscan.io"],
    },
    // Local Hardhat node, used by the deployment scripts during development.
    NetworkDescriptor {
        id: "hardhat",
        chain_id: "0x7a69",
        display_name: "Hardhat Local",
        rpc_endpoints: &["http://127.0.0.1:8545"],
        native_unit: NativeUnit {
            name: "Ether",
            symbol: "ETH",
            decimals: 18,
        },
        block_explorers: &[],
    },
];

/// Lookup over the static network table.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkRegistry;

impl NetworkRegistry {
    /// All supported networks.
    pub fn all(&self) -> &'static [NetworkDescriptor] {
        NETWORKS
    }

    /// Find a network by registry slug.
    pub fn by_id(&self, id: &str) -> Option<&'static NetworkDescriptor> {
        NETWORKS.iter().find(|n| n.id.eq_ignore_ascii_case(id))
    }

    /// Find a network by hex chain id as reported by `eth_chainId`.
    pub fn by_chain_id(&self, chain_id: &str) -> Option<&'static NetworkDescriptor> {
        NETWORKS.iter().find(|n| n.chain_id.eq_ignore_ascii_case(chain_id))
    }

    /// Resolve either a slug or a hex chain id.
    pub fn resolve(&self, target: &str) -> Option<&'static NetworkDescriptor> {
        self.by_id(target).or_else(|| self.by_chain_id(target))
    }
}
