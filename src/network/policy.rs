//! Network policy - allow-list lookups and chain switch negotiation

use std::collections::{BTreeMap, HashMap};

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::wallet::provider::WalletProvider;

use super::table::{
    builtin_networks, NetworkDescriptor, NATIVE_CURRENCY_DECIMALS, SUPPORTED_NETWORKS,
    TESTNET_CHAIN_IDS,
};

/// Provider method switching the active chain
pub const SWITCH_CHAIN_METHOD: &str = "wallet_switchEthereumChain";

/// Provider method registering an unknown chain
pub const ADD_CHAIN_METHOD: &str = "wallet_addEthereumChain";

/// Format a chain id the way providers expect it (`0x`-prefixed hex)
pub fn hex_chain_id(chain_id: u64) -> String {
    format!("0x{:x}", chain_id)
}

/// Parse a chain id reported by a provider
///
/// Accepts `0x`-prefixed hex as well as plain decimal.
pub fn parse_chain_id(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

/// Allow-list of chains plus the single designated default network
#[derive(Debug, Clone)]
pub struct NetworkPolicy {
    networks: BTreeMap<u64, NetworkDescriptor>,
    default_chain_id: u64,
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self {
            networks: builtin_networks()
                .into_iter()
                .map(|n| (n.chain_id, n))
                .collect(),
            default_chain_id: SUPPORTED_NETWORKS[0],
        }
    }
}

impl NetworkPolicy {
    /// Create a policy over an explicit table
    ///
    /// The default network must be present and supported.
    pub fn new(networks: Vec<NetworkDescriptor>, default_chain_id: u64) -> Result<Self> {
        let networks: BTreeMap<u64, NetworkDescriptor> =
            networks.into_iter().map(|n| (n.chain_id, n)).collect();

        match networks.get(&default_chain_id) {
            Some(network) if network.supported => {}
            Some(network) => {
                return Err(Error::Config(format!(
                    "Default network {} ({}) is not a supported network",
                    network.display_name, default_chain_id
                )))
            }
            None => {
                return Err(Error::Config(format!(
                    "Default network {} is not in the network table",
                    default_chain_id
                )))
            }
        }

        Ok(Self {
            networks,
            default_chain_id,
        })
    }

    /// Built-in table with per-chain RPC URL overrides applied
    pub fn with_overrides(
        default_chain_id: u64,
        rpc_overrides: &HashMap<String, String>,
    ) -> Result<Self> {
        let mut networks = builtin_networks();

        for (key, url) in rpc_overrides {
            let chain_id = parse_chain_id(key)
                .ok_or_else(|| Error::Config(format!("Invalid chain id in rpc_overrides: {}", key)))?;
            let network = networks
                .iter_mut()
                .find(|n| n.chain_id == chain_id)
                .ok_or_else(|| Error::Config(format!("Unknown chain id in rpc_overrides: {}", key)))?;
            debug!("Overriding RPC URL for chain {}", chain_id);
            network.rpc_url = url.clone();
        }

        Self::new(networks, default_chain_id)
    }

    /// Check if a chain is in the supported set
    pub fn is_supported(&self, chain_id: u64) -> bool {
        self.networks
            .get(&chain_id)
            .map(|n| n.supported)
            .unwrap_or(false)
    }

    /// Look up a chain's descriptor, supported or not
    pub fn describe(&self, chain_id: u64) -> Option<&NetworkDescriptor> {
        self.networks.get(&chain_id)
    }

    /// Testnet classification, also covering chains without a descriptor
    pub fn is_testnet(&self, chain_id: u64) -> bool {
        self.networks
            .get(&chain_id)
            .map(|n| n.is_testnet)
            .unwrap_or_else(|| TESTNET_CHAIN_IDS.contains(&chain_id))
    }

    pub fn supports_name_resolution(&self, chain_id: u64) -> bool {
        self.networks
            .get(&chain_id)
            .map(|n| n.name_resolution)
            .unwrap_or(false)
    }

    pub fn default_chain_id(&self) -> u64 {
        self.default_chain_id
    }

    /// Display name of a chain, falling back to its id
    pub fn network_name(&self, chain_id: u64) -> String {
        self.networks
            .get(&chain_id)
            .map(|n| n.display_name.clone())
            .unwrap_or_else(|| format!("chain {}", chain_id))
    }

    /// Error raised when the provider cannot be brought onto a supported chain
    pub fn mismatch_error(&self) -> Error {
        Error::NetworkMismatch {
            required: self.network_name(self.default_chain_id),
        }
    }

    /// All descriptors, ordered by chain id
    pub fn networks(&self) -> impl Iterator<Item = &NetworkDescriptor> {
        self.networks.values()
    }

    /// Try to bring the provider onto `chain_id`
    ///
    /// Returns `true` once the provider accepted a switch or registration.
    /// Never fails: every provider error is logged and mapped to `false`.
    pub async fn negotiate(&self, provider: &dyn WalletProvider, chain_id: u64) -> bool {
        let network = match self.networks.get(&chain_id) {
            Some(network) if network.supported => network,
            _ => {
                debug!("Refusing to negotiate unsupported chain {}", chain_id);
                return false;
            }
        };

        if !network.is_complete() {
            warn!(
                "Network {} ({}) is missing registration details, cannot negotiate",
                network.display_name, chain_id
            );
            return false;
        }

        let switch_params = json!([{ "chainId": hex_chain_id(chain_id) }]);
        let switch_error = match provider.request(SWITCH_CHAIN_METHOD, switch_params).await {
            Ok(_) => {
                info!("Provider switched to {}", network.display_name);
                return true;
            }
            Err(e) => e,
        };

        if !switch_error.is_unrecognized_chain() {
            error!(
                "Unable to switch to chain {} on provider: {}",
                chain_id, switch_error
            );
            return false;
        }

        // Testnets get registered, other chains get a second switch carrying
        // the full descriptor. Kept as two branches until the provider quirk
        // behind the second path is confirmed.
        let method = if network.is_testnet {
            ADD_CHAIN_METHOD
        } else {
            SWITCH_CHAIN_METHOD
        };
        debug!(
            "Chain {} unknown to provider, retrying with {}",
            chain_id, method
        );

        match provider
            .request(method, json!([registration_params(network)]))
            .await
        {
            Ok(_) => {
                info!("Provider registered {}", network.display_name);
                true
            }
            Err(e) => {
                error!("Unable to add chain {} to provider: {}", chain_id, e);
                false
            }
        }
    }
}

/// Full chain payload understood by `wallet_addEthereumChain`
fn registration_params(network: &NetworkDescriptor) -> Value {
    json!({
        "chainId": hex_chain_id(network.chain_id),
        "chainName": network.display_name,
        "nativeCurrency": {
            "name": network.currency_name,
            "symbol": network.currency_symbol,
            "decimals": NATIVE_CURRENCY_DECIMALS,
        },
        "rpcUrls": [network.rpc_url],
        "blockExplorerUrls": [network.explorer_url],
    })
}
