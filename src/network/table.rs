//! Built-in network descriptor table

use serde::Serialize;

/// Chain ids classified as testnets
pub const TESTNET_CHAIN_IDS: &[u64] = &[4, 5, 42, 80001];

/// Chain ids where reverse name resolution is available
pub const NAME_RESOLUTION_CHAINS: &[u64] = &[4, 5];

/// Networks the game contracts are deployed on, in preference order
pub const SUPPORTED_NETWORKS: &[u64] = &[5, 137, 1337, 31337, 80001];

/// Native currency decimals advertised when registering a chain
pub const NATIVE_CURRENCY_DECIMALS: u8 = 18;

/// Static description of a known chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkDescriptor {
    pub chain_id: u64,
    pub display_name: String,
    pub currency_name: String,
    pub currency_symbol: String,
    pub rpc_url: String,
    pub explorer_url: String,
    pub is_testnet: bool,
    /// Whether sessions may stay connected on this chain
    pub supported: bool,
    /// Whether reverse name lookup is attempted on this chain
    pub name_resolution: bool,
}

impl NetworkDescriptor {
    /// All fields needed to register the chain with a provider are present
    pub fn is_complete(&self) -> bool {
        !self.display_name.is_empty()
            && !self.currency_name.is_empty()
            && !self.currency_symbol.is_empty()
            && !self.rpc_url.is_empty()
            && !self.explorer_url.is_empty()
    }
}

// (chain id, display name, currency name, currency symbol, rpc url, explorer url)
const BUILTIN: &[(u64, &str, &str, &str, &str, &str)] = &[
    (
        1,
        "Ethereum Mainnet",
        "Ethereum",
        "ETH",
        "https://cloudflare-eth.com",
        "https://etherscan.io",
    ),
    (
        4,
        "Rinkeby Testnet",
        "Ethereum",
        "ETH",
        "",
        "https://rinkeby.etherscan.io",
    ),
    (
        5,
        "Goerli Testnet",
        "Ethereum",
        "ETH",
        "https://rpc.ankr.com/eth_goerli",
        "https://goerli.etherscan.io",
    ),
    (
        137,
        "Polygon Mainnet",
        "Polygon",
        "MATIC",
        "https://polygon-rpc.com",
        "https://polygonscan.com",
    ),
    (1337, "Localhost", "Localhost", "ETH", "http://127.0.0.1:8545", ""),
    (31337, "Localhost", "Localhost", "ETH", "http://127.0.0.1:8545", ""),
    (
        80001,
        "Polygon Mumbai Testnet",
        "Polygon Mumbai",
        "MATIC",
        "https://rpc-mumbai.maticvigil.com",
        "https://mumbai.polygonscan.com",
    ),
];

/// Build the built-in descriptor table
pub fn builtin_networks() -> Vec<NetworkDescriptor> {
    BUILTIN
        .iter()
        .map(
            |&(chain_id, name, currency_name, symbol, rpc_url, explorer_url)| NetworkDescriptor {
                chain_id,
                display_name: name.to_string(),
                currency_name: currency_name.to_string(),
                currency_symbol: symbol.to_string(),
                rpc_url: rpc_url.to_string(),
                explorer_url: explorer_url.to_string(),
                is_testnet: TESTNET_CHAIN_IDS.contains(&chain_id),
                supported: SUPPORTED_NETWORKS.contains(&chain_id),
                name_resolution: NAME_RESOLUTION_CHAINS.contains(&chain_id),
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_supported_network_is_described() {
        let table = builtin_networks();
        for id in SUPPORTED_NETWORKS {
            let network = table.iter().find(|n| n.chain_id == *id);
            assert!(network.is_some(), "missing descriptor for {}", id);
            assert!(network.unwrap().supported);
        }
    }

    #[test]
    fn test_known_but_unsupported() {
        let table = builtin_networks();
        let mainnet = table.iter().find(|n| n.chain_id == 1).unwrap();
        assert!(!mainnet.supported);
        assert!(!mainnet.is_testnet);

        let rinkeby = table.iter().find(|n| n.chain_id == 4).unwrap();
        assert!(rinkeby.is_testnet);
        assert!(rinkeby.name_resolution);
        assert!(!rinkeby.is_complete());
    }

    #[test]
    fn test_public_networks_ship_registration_details() {
        let table = builtin_networks();
        for id in [1, 5, 137, 80001] {
            let network = table.iter().find(|n| n.chain_id == id).unwrap();
            assert!(network.rpc_url.starts_with("https://"), "chain {}", id);
            assert!(network.is_complete(), "chain {}", id);
        }
    }

    #[test]
    fn test_localhost_has_no_explorer() {
        let table = builtin_networks();
        let local = table.iter().find(|n| n.chain_id == 31337).unwrap();
        assert!(local.supported);
        assert!(!local.is_complete());
    }
}
