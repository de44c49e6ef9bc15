//! Network module - supported chain allow-list and provider negotiation
//!
//! ```text
//! WalletSession → NetworkPolicy → WalletProvider (wallet_switchEthereumChain,
//!                                                  wallet_addEthereumChain)
//! ```

pub mod policy;
pub mod table;

pub use policy::{hex_chain_id, parse_chain_id, NetworkPolicy};
pub use table::{builtin_networks, NetworkDescriptor};
